//! Shamir's secret sharing over GF(2^n), compatible with the `ssss` tools.
//!
//! A secret of up to 128 bytes is (optionally) diffused, placed as the
//! constant term of a random polynomial and handed out as points on it.
//! Any `threshold` points recover the secret.

mod combiner;
mod diffuser;
mod field;
mod share;
mod splitter;

pub use combiner::{combine, combine_text, RecoveredSecret};
pub use diffuser::{Diffuser, MIN_DIFFUSION_BYTES};
pub use field::{FieldElement, FieldModulus, MAX_DEGREE};
pub use share::{Share, ShareKind, SharePoint};
pub use splitter::{split, split_with, SplitSecret};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ShamirError {
    #[error("threshold must be at least 2, got {0}")]
    InvalidThreshold(usize),
    #[error("secret cannot be empty")]
    EmptySecret,
    #[error("secret is {bytes} bytes, at most {max} bytes are supported")]
    SecretTooLarge { bytes: usize, max: usize },
    #[error("unsupported field size: {0} bits")]
    UnsupportedFieldSize(u32),
    #[error("field mismatch: GF(2^{left}) and GF(2^{right})")]
    FieldMismatch { left: u32, right: u32 },
    #[error("zero has no multiplicative inverse")]
    NotInvertible,
    #[error("share index {0} is out of range for this field")]
    InvalidShareIndex(u64),
    #[error("invalid share: {0:?}")]
    InvalidShareSyntax(String),
    #[error("no shares given")]
    NoShares,
    #[error("inconsistent shares: {0}")]
    InconsistentShares(&'static str),
    #[error("checksum mismatch in share {0:?}")]
    InvalidChecksumShare(String),
    #[error("diffusion needs at least {min} bytes, got {bytes}")]
    DiffusionTooShort { bytes: usize, min: usize },
    #[error("invalid hex secret")]
    InvalidHexSecret,
}

/// Split a text message into `shares` checksummed share strings.
pub fn split_message(text: &str, threshold: usize, shares: usize) -> Result<Vec<String>, ShamirError> {
    let split = split(ShareKind::Message, text.as_bytes(), threshold, Diffuser::default())?;
    Ok(split.shares(shares)?.iter().map(ToString::to_string).collect())
}

/// Decode a hex secret. An odd number of digits gets a leading zero.
pub fn parse_hex_secret(text: &str) -> Result<Vec<u8>, ShamirError> {
    let text = text.trim();
    let decoded = if text.len() % 2 == 1 {
        hex::decode(format!("0{}", text))
    } else {
        hex::decode(text)
    };
    decoded.map_err(|_| ShamirError::InvalidHexSecret)
}
