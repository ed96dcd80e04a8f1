//! Shamir's Secret Sharing over GF(2^n), share-compatible with the `ssss`
//! tools, plus the pieces the `secret-splitter` binary is built from.

pub mod config;
pub mod crypto;
pub mod logging;
pub mod shamir;
