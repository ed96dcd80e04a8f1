use std::fmt;

use rand::{CryptoRng, RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;
use tracing::debug;
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::diffuser::Diffuser;
use super::field::{FieldElement, FieldModulus, MAX_DEGREE};
use super::share::{Share, ShareKind, SharePoint};
use super::ShamirError;

/// A secret turned into a random polynomial, ready to hand out shares.
///
/// The polynomial is `f(x) = x^t + c[t-1]·x^(t-1) + … + c[1]·x + c[0]` where
/// `c[0]` is the (diffused) secret. The leading `x^t` term keeps share values
/// identical to those printed by `ssss-split`.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SplitSecret {
    #[zeroize(skip)]
    kind: ShareKind,
    #[zeroize(skip)]
    modulus: FieldModulus,
    threshold: usize,
    coefficients: Vec<FieldElement>,
}

/// Split `secret` so that `threshold` shares are needed to recover it.
///
/// The field is the smallest one that holds the secret.
pub fn split(
    kind: ShareKind,
    secret: &[u8],
    threshold: usize,
    diffuser: Diffuser,
) -> Result<SplitSecret, ShamirError> {
    let modulus = FieldModulus::of_byte_size(secret.len()).map_err(|_| ShamirError::SecretTooLarge {
        bytes: secret.len(),
        max: MAX_DEGREE as usize / 8,
    })?;

    let mut rng = ChaCha20Rng::from_entropy();
    split_with(kind, secret, threshold, diffuser, modulus, &mut rng)
}

/// Split `secret` in an explicit field, drawing coefficients from `rng`.
///
/// The secret is left-padded with zero bytes up to the field width.
pub fn split_with<R: RngCore + CryptoRng>(
    kind: ShareKind,
    secret: &[u8],
    threshold: usize,
    diffuser: Diffuser,
    modulus: FieldModulus,
    rng: &mut R,
) -> Result<SplitSecret, ShamirError> {
    if threshold < 2 {
        return Err(ShamirError::InvalidThreshold(threshold));
    }
    if secret.is_empty() {
        return Err(ShamirError::EmptySecret);
    }

    let size = modulus.size_in_bytes();
    if secret.len() > size {
        return Err(ShamirError::SecretTooLarge {
            bytes: secret.len(),
            max: size,
        });
    }

    let mut padded = vec![0u8; size - secret.len()];
    padded.extend_from_slice(secret);
    let mut diffused = diffuser.scramble(&padded)?;
    padded.zeroize();

    let mut coefficients = Vec::with_capacity(threshold);
    coefficients.push(FieldElement::from_be_bytes(modulus, &diffused));
    diffused.zeroize();

    let mut buffer = vec![0u8; size];
    for _ in 1..threshold {
        rng.fill_bytes(&mut buffer);
        coefficients.push(FieldElement::from_be_bytes(modulus, &buffer));
    }
    buffer.zeroize();

    debug!(
        degree = modulus.degree(),
        threshold,
        diffused = diffuser.applies_to(size),
        "secret split into polynomial"
    );

    Ok(SplitSecret {
        kind,
        modulus,
        threshold,
        coefficients,
    })
}

impl SplitSecret {
    /// Evaluate the polynomial at `index` (1-based).
    pub fn share(&self, index: u64) -> Result<Share, ShamirError> {
        if index == 0 {
            return Err(ShamirError::InvalidShareIndex(index));
        }
        let x = FieldElement::from_u64(self.modulus, index)?;

        // Horner, seeded with x for the monic leading term
        let mut y = x.clone();
        for coefficient in self.coefficients[1..].iter().rev() {
            y = y.checked_add(coefficient)?.checked_mul(&x)?;
        }
        y = y.checked_add(&self.coefficients[0])?;

        Ok(Share::new(self.kind, SharePoint::new(x, y)?))
    }

    /// Shares `1..=count`
    pub fn shares(&self, count: usize) -> Result<Vec<Share>, ShamirError> {
        (1..=count as u64).map(|index| self.share(index)).collect()
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    pub fn modulus(&self) -> FieldModulus {
        self.modulus
    }

    pub fn kind(&self) -> ShareKind {
        self.kind
    }
}

impl fmt::Debug for SplitSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SplitSecret")
            .field("kind", &self.kind)
            .field("modulus", &self.modulus)
            .field("threshold", &self.threshold)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand_chacha::ChaCha20Rng;

    fn seeded() -> ChaCha20Rng {
        ChaCha20Rng::from_seed([42u8; 32])
    }

    #[test]
    fn test_split_produces_requested_shares() {
        let split = split(ShareKind::Message, b"Secret seed phrase for testing", 3, Diffuser::Ssss).unwrap();
        let shares = split.shares(5).unwrap();

        assert_eq!(shares.len(), 5);
        assert_eq!(split.modulus().degree(), 240);
        for (i, share) in shares.iter().enumerate() {
            assert_eq!(share.index(), i as u64 + 1);
            assert_eq!(share.kind(), ShareKind::Message);
            assert_eq!(share.point().y().to_be_bytes().len(), 30);
        }
    }

    #[test]
    fn test_invalid_parameters() {
        assert!(matches!(
            split(ShareKind::Message, b"Test secret", 1, Diffuser::Ssss),
            Err(ShamirError::InvalidThreshold(1))
        ));
        assert!(matches!(
            split(ShareKind::Message, b"", 2, Diffuser::Ssss),
            Err(ShamirError::EmptySecret)
        ));
        // Threshold is checked before the secret
        assert!(matches!(
            split(ShareKind::Message, b"", 0, Diffuser::Ssss),
            Err(ShamirError::InvalidThreshold(0))
        ));
        assert!(matches!(
            split(ShareKind::Message, &[7u8; 129], 2, Diffuser::Ssss),
            Err(ShamirError::SecretTooLarge { bytes: 129, max: 128 })
        ));

        let small = FieldModulus::new(64).unwrap();
        assert!(matches!(
            split_with(ShareKind::Message, b"nine byte", 2, Diffuser::Ssss, small, &mut seeded()),
            Err(ShamirError::SecretTooLarge { bytes: 9, max: 8 })
        ));
    }

    #[test]
    fn test_largest_secret_fits() {
        let split = split(ShareKind::Unknown, &[0xAB; 128], 2, Diffuser::Ssss).unwrap();
        assert_eq!(split.modulus().degree(), MAX_DEGREE);
    }

    #[test]
    fn test_deterministic_generation() {
        let modulus = FieldModulus::of_byte_size(18).unwrap();
        let a = split_with(ShareKind::Message, b"Deterministic test", 2, Diffuser::Ssss, modulus, &mut seeded()).unwrap();
        let b = split_with(ShareKind::Message, b"Deterministic test", 2, Diffuser::Ssss, modulus, &mut seeded()).unwrap();

        // Shares should be identical with the same seed
        assert_eq!(a.shares(3).unwrap()[2].to_string(), b.shares(3).unwrap()[2].to_string());
    }

    #[test]
    fn test_share_index_bounds() {
        let modulus = FieldModulus::new(8).unwrap();
        let split = split_with(ShareKind::Unknown, b"k", 2, Diffuser::None, modulus, &mut seeded()).unwrap();

        assert!(matches!(split.share(0), Err(ShamirError::InvalidShareIndex(0))));
        assert!(matches!(split.share(256), Err(ShamirError::InvalidShareIndex(256))));
        assert!(split.share(255).is_ok());
    }

    #[test]
    fn test_monic_polynomial_at_zero_coefficients() {
        // All-zero random coefficients make f(x) = x^2 + secret
        struct ZeroRng;
        impl RngCore for ZeroRng {
            fn next_u32(&mut self) -> u32 {
                0
            }
            fn next_u64(&mut self) -> u64 {
                0
            }
            fn fill_bytes(&mut self, dest: &mut [u8]) {
                dest.fill(0);
            }
            fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
                dest.fill(0);
                Ok(())
            }
        }
        impl CryptoRng for ZeroRng {}

        let modulus = FieldModulus::new(8).unwrap();
        let split = split_with(ShareKind::Unknown, &[0x10], 2, Diffuser::None, modulus, &mut ZeroRng).unwrap();

        // 3^2 = 5 in GF(2^8), 5 xor 0x10 = 0x15
        assert_eq!(split.share(3).unwrap().to_plain_string(0), "3-15");
    }

    #[test]
    fn test_shares_from_many_threads() {
        let split = split(ShareKind::Message, b"shared across threads", 3, Diffuser::Ssss).unwrap();
        let expected: Vec<String> = split.shares(8).unwrap().iter().map(ToString::to_string).collect();

        std::thread::scope(|scope| {
            let handles: Vec<_> = (1..=8u64)
                .map(|index| {
                    let split = &split;
                    scope.spawn(move || split.share(index).unwrap().to_string())
                })
                .collect();

            for (handle, expected) in handles.into_iter().zip(&expected) {
                assert_eq!(&handle.join().unwrap(), expected);
            }
        });
    }

    #[test]
    fn test_debug_hides_coefficients() {
        let split = split(ShareKind::Message, b"do not print me", 2, Diffuser::Ssss).unwrap();
        let debug = format!("{:?}", split);
        assert!(debug.contains("threshold: 2"));
        assert!(!debug.contains("coefficients"));
    }
}
