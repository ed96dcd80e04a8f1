use std::collections::HashSet;
use std::fmt;

use tracing::debug;
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::diffuser::Diffuser;
use super::field::FieldElement;
use super::share::{Share, ShareKind};
use super::ShamirError;

/// The secret recovered from a set of shares
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct RecoveredSecret {
    #[zeroize(skip)]
    kind: ShareKind,
    bytes: Vec<u8>,
}

impl RecoveredSecret {
    pub fn kind(&self) -> ShareKind {
        self.kind
    }

    /// Fixed-width bytes, including any left padding
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// The secret as text, with the zero padding removed
    pub fn text(&self) -> String {
        let start = self.bytes.iter().position(|&b| b != 0).unwrap_or(self.bytes.len());
        String::from_utf8_lossy(&self.bytes[start..]).into_owned()
    }

    pub fn hex(&self) -> String {
        hex::encode(&self.bytes)
    }
}

impl fmt::Debug for RecoveredSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecoveredSecret")
            .field("kind", &self.kind)
            .field("len", &self.bytes.len())
            .finish_non_exhaustive()
    }
}

/// Recover a secret from share texts.
///
/// Exactly the threshold number of shares must be supplied; fewer or more
/// produce a wrong secret without any error.
pub fn combine<S: AsRef<str>>(shares: &[S], diffuser: Diffuser) -> Result<RecoveredSecret, ShamirError> {
    let shares = shares
        .iter()
        .map(|text| Share::parse(text.as_ref()))
        .collect::<Result<Vec<_>, _>>()?;

    let first = shares.first().ok_or(ShamirError::NoShares)?;
    let (modulus, kind) = (first.modulus(), first.kind());

    if shares.iter().any(|share| share.modulus() != modulus) {
        return Err(ShamirError::InconsistentShares("shares have different lengths"));
    }
    if shares.iter().any(|share| share.kind() != kind) {
        return Err(ShamirError::InconsistentShares("shares have different kinds"));
    }

    if let Some(share) = shares
        .iter()
        .find(|share| share.kind() != ShareKind::Unknown && !share.has_valid_checksum())
    {
        return Err(ShamirError::InvalidChecksumShare(share.source()));
    }

    // x = 0 would hand out the secret itself
    if shares.iter().any(|share| share.index() == 0) {
        return Err(ShamirError::InvalidShareIndex(0));
    }

    let mut seen = HashSet::new();
    if !shares.iter().all(|share| seen.insert(share.index())) {
        return Err(ShamirError::InconsistentShares("shares have duplicate indices"));
    }

    let secret = interpolate_at_zero(&shares)?;
    let mut diffused = secret.to_be_bytes();
    let bytes = diffuser.unscramble(&diffused)?;
    diffused.zeroize();

    debug!(
        degree = modulus.degree(),
        shares = shares.len(),
        "secret recovered"
    );

    Ok(RecoveredSecret { kind, bytes })
}

/// Combine every whitespace-separated share in `blob`.
pub fn combine_text(blob: &str, diffuser: Diffuser) -> Result<RecoveredSecret, ShamirError> {
    let shares: Vec<&str> = blob.split_whitespace().collect();
    combine(&shares, diffuser)
}

/// Lagrange interpolation at x = 0 after removing the monic `x^k` term.
fn interpolate_at_zero(shares: &[Share]) -> Result<FieldElement, ShamirError> {
    let modulus = shares[0].modulus();
    let k = shares.len() as u64;
    let mut secret = FieldElement::zero(modulus);

    for (i, share_i) in shares.iter().enumerate() {
        let x_i = share_i.point().x();
        let mut term = share_i.point().y().checked_add(&x_i.pow(k))?;

        for (j, share_j) in shares.iter().enumerate() {
            if i == j {
                continue;
            }

            let x_j = share_j.point().x();
            let denominator = x_j.checked_add(x_i)?.inverse()?;
            term = term.checked_mul(x_j)?.checked_mul(&denominator)?;
        }

        secret = secret.checked_add(&term)?;
    }

    Ok(secret)
}
