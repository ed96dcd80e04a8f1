//! Shares and their text encoding.
//!
//! A share is written as `{checksum}{kind}-{x}-{y}`, e.g.
//! `b81-1-f844243438cd26e13e29341a`, where the checksum is the first byte of
//! SHA-1 over everything after it. The `{checksum}{kind}-` prefix is optional
//! so that shares printed by `ssss-split` (`1-f844...`, or `token-1-f844...`)
//! parse as well.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use sha1::{Digest, Sha1};

use super::field::{FieldElement, FieldModulus};
use super::ShamirError;

static SHARE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:(?P<token>[^-]*)-)??(?:(?P<checksum>[0-9a-fA-F]{2})(?P<kind>[0-9a-fA-F])-)?(?P<x>[0-9]+)-(?P<y>[0-9a-fA-F]+)$",
    )
    .expect("share pattern is a valid regex")
});

/// What the shared secret is, carried through the share text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ShareKind {
    /// Shares without a kind prefix (e.g. produced by `ssss-split`)
    #[default]
    Unknown,
    /// A text or binary message
    Message,
    /// The master key of an encrypted file
    File,
    /// A nibble with no known meaning, kept so that it still takes part in
    /// checksum and kind checks
    Other(u8),
}

impl ShareKind {
    pub fn nibble(self) -> u8 {
        match self {
            ShareKind::Unknown => 0,
            ShareKind::Message => 1,
            ShareKind::File => 2,
            ShareKind::Other(nibble) => nibble,
        }
    }

    pub fn from_nibble(nibble: u8) -> Self {
        match nibble {
            0 => ShareKind::Unknown,
            1 => ShareKind::Message,
            2 => ShareKind::File,
            other => ShareKind::Other(other),
        }
    }
}

/// One point `(x, y)` on the secret polynomial. Both coordinates share a field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharePoint {
    x: FieldElement,
    y: FieldElement,
}

impl SharePoint {
    pub fn new(x: FieldElement, y: FieldElement) -> Result<Self, ShamirError> {
        if x.modulus() != y.modulus() {
            return Err(ShamirError::FieldMismatch {
                left: x.modulus().degree(),
                right: y.modulus().degree(),
            });
        }
        Ok(Self { x, y })
    }

    pub fn x(&self) -> &FieldElement {
        &self.x
    }

    pub fn y(&self) -> &FieldElement {
        &self.y
    }

    pub fn modulus(&self) -> FieldModulus {
        self.y.modulus()
    }

    /// The share index (x as an integer)
    pub fn index(&self) -> u64 {
        // x is always built from a u64 index
        self.x.to_u64().unwrap_or_default()
    }
}

impl fmt::Display for SharePoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{:x}", self.index(), self.y)
    }
}

/// A single share handed to a participant
#[derive(Debug, Clone)]
pub struct Share {
    kind: ShareKind,
    point: SharePoint,
    /// Checksum found in the parsed text, if it had one
    embedded_checksum: Option<u8>,
    /// The text this share was parsed from
    source: Option<String>,
}

impl Share {
    pub fn new(kind: ShareKind, point: SharePoint) -> Self {
        Self {
            kind,
            point,
            embedded_checksum: None,
            source: None,
        }
    }

    /// Parse a share in either the checksummed or the plain `ssss` form
    pub fn parse(text: &str) -> Result<Self, ShamirError> {
        let invalid = || ShamirError::InvalidShareSyntax(text.to_string());

        let captures = SHARE_RE.captures(text.trim()).ok_or_else(invalid)?;

        let kind = match captures.name("kind") {
            Some(nibble) => u8::from_str_radix(nibble.as_str(), 16)
                .map(ShareKind::from_nibble)
                .map_err(|_| invalid())?,
            None => ShareKind::Unknown,
        };

        let embedded_checksum = match captures.name("checksum") {
            Some(checksum) => Some(u8::from_str_radix(checksum.as_str(), 16).map_err(|_| invalid())?),
            None => None,
        };

        // Index 0 parses; the combiner rejects it after checking the checksum
        let index: u64 = captures["x"].parse().map_err(|_| invalid())?;

        // The width of y decides the field
        let y_hex = &captures["y"];
        if y_hex.len() % 2 != 0 {
            return Err(invalid());
        }
        let degree = u32::try_from(y_hex.len() * 4).map_err(|_| invalid())?;
        let modulus = FieldModulus::new(degree).map_err(|_| invalid())?;

        let y_bytes = hex::decode(y_hex).map_err(|_| invalid())?;
        let x = FieldElement::from_u64(modulus, index).map_err(|_| invalid())?;
        let y = FieldElement::from_be_bytes(modulus, &y_bytes);

        Ok(Self {
            kind,
            point: SharePoint::new(x, y)?,
            embedded_checksum,
            source: Some(text.trim().to_string()),
        })
    }

    pub fn kind(&self) -> ShareKind {
        self.kind
    }

    pub fn point(&self) -> &SharePoint {
        &self.point
    }

    pub fn index(&self) -> u64 {
        self.point.index()
    }

    pub fn modulus(&self) -> FieldModulus {
        self.point.modulus()
    }

    /// First byte of SHA-1 over the canonical `{kind}-{x}-{y}` text
    pub fn checksum(&self) -> u8 {
        Sha1::digest(self.body().as_bytes())[0]
    }

    /// Whether the parsed text carried a checksum and it matches.
    /// Freshly generated shares have nothing to check and report `false`.
    pub fn has_valid_checksum(&self) -> bool {
        self.embedded_checksum == Some(self.checksum())
    }

    /// The text the share was parsed from, or its canonical form
    pub fn source(&self) -> String {
        self.source.clone().unwrap_or_else(|| self.to_string())
    }

    /// The `ssss` form `{x}-{y}` with the index zero-padded to `index_width` digits.
    pub fn to_plain_string(&self, index_width: usize) -> String {
        format!("{:0width$}-{:x}", self.index(), self.point.y, width = index_width)
    }

    fn body(&self) -> String {
        format!("{:x}-{}", self.kind.nibble(), self.point)
    }
}

impl fmt::Display for Share {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02x}{}", self.checksum(), self.body())
    }
}

impl FromStr for Share {
    type Err = ShamirError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Share::parse(s)
    }
}
