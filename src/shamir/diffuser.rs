//! Reversible diffusion layer applied to a secret before it is split.
//!
//! The XTEA variant reproduces the diffusion of the `ssss` tools: the
//! secret is viewed as 16-bit big-endian words stored least significant
//! word first, and a zero-keyed XTEA block transform is slid over that
//! buffer `40 * len` times at a stride of two bytes, wrapping around the
//! end. Structured secrets (short text, zero-padded keys) therefore no
//! longer show up as structure in the polynomial's constant term.

use tracing::warn;
use zeroize::Zeroize;

use super::ShamirError;

/// Secrets shorter than this (64 bits) are never diffused by [`Diffuser::Ssss`].
pub const MIN_DIFFUSION_BYTES: usize = 8;

const OUTER_ROUNDS: usize = 40;
const INNER_ROUNDS: u32 = 32;
const DELTA: u32 = 0x9E37_79B9;
const DECIPHER_INITIAL_SUM: u32 = DELTA.wrapping_mul(INNER_ROUNDS);

/// Which diffusion to apply to a secret.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Diffuser {
    /// Leaves the secret untouched
    None,
    /// Always runs the XTEA transform (secret must be at least 8 bytes)
    Xtea,
    /// XTEA for secrets of 8 bytes or more, untouched below that.
    /// This is what `ssss-split` does by default.
    #[default]
    Ssss,
}

#[derive(Clone, Copy)]
enum Direction {
    Scramble,
    Unscramble,
}

impl Diffuser {
    /// Whether a secret of `byte_len` bytes actually gets diffused
    pub fn applies_to(&self, byte_len: usize) -> bool {
        match self {
            Diffuser::None => false,
            Diffuser::Xtea => true,
            Diffuser::Ssss => byte_len >= MIN_DIFFUSION_BYTES,
        }
    }

    /// Diffuse a big-endian secret. The output has the same length.
    pub fn scramble(&self, block: &[u8]) -> Result<Vec<u8>, ShamirError> {
        self.apply(block, Direction::Scramble)
    }

    /// Undo [`Diffuser::scramble`].
    pub fn unscramble(&self, block: &[u8]) -> Result<Vec<u8>, ShamirError> {
        self.apply(block, Direction::Unscramble)
    }

    fn apply(&self, block: &[u8], direction: Direction) -> Result<Vec<u8>, ShamirError> {
        match self {
            Diffuser::None => Ok(block.to_vec()),
            Diffuser::Ssss if block.len() < MIN_DIFFUSION_BYTES => {
                warn!(
                    bytes = block.len(),
                    "secret too short for the diffusion layer, skipping it"
                );
                Ok(block.to_vec())
            }
            Diffuser::Xtea | Diffuser::Ssss => xtea_diffuse(block, direction),
        }
    }
}

fn xtea_diffuse(block: &[u8], direction: Direction) -> Result<Vec<u8>, ShamirError> {
    let len = block.len();
    if len < MIN_DIFFUSION_BYTES {
        return Err(ShamirError::DiffusionTooShort {
            bytes: len,
            min: MIN_DIFFUSION_BYTES,
        });
    }

    let mut words = to_word_order(block);

    // With an odd length the top word only holds one byte; move it into the
    // circular window
    if len % 2 == 1 {
        words[len - 1] = words[len];
    }

    let passes = (0..OUTER_ROUNDS * len).step_by(2);
    match direction {
        Direction::Scramble => {
            for idx in passes {
                process_window(&mut words, idx, len, encipher_block);
            }
        }
        Direction::Unscramble => {
            for idx in passes.rev() {
                process_window(&mut words, idx, len, decipher_block);
            }
        }
    }

    if len % 2 == 1 {
        words[len] = words[len - 1];
        words[len - 1] = 0;
    }

    let diffused = from_word_order(&words, len);
    words.zeroize();
    Ok(diffused)
}

/// Big-endian bytes to 16-bit big-endian words, least significant word first.
fn to_word_order(block: &[u8]) -> Vec<u8> {
    let mut padded = Vec::with_capacity(block.len() + 1);
    if block.len() % 2 == 1 {
        padded.push(0);
    }
    padded.extend_from_slice(block);

    let words = reverse_words(&padded);
    padded.zeroize();
    words
}

fn from_word_order(words: &[u8], len: usize) -> Vec<u8> {
    let mut padded = reverse_words(words);
    let block = padded[padded.len() - len..].to_vec();
    padded.zeroize();
    block
}

fn reverse_words(bytes: &[u8]) -> Vec<u8> {
    bytes
        .chunks_exact(2)
        .rev()
        .flat_map(|word| word.iter().copied())
        .collect()
}

/// Run one block operation over the 8 bytes starting at `idx`, wrapping at `len`.
fn process_window(data: &mut [u8], idx: usize, len: usize, block_op: fn(&mut [u32; 2])) {
    let mut v = [0u32; 2];

    for (i, word) in v.iter_mut().enumerate() {
        for k in 0..4 {
            *word = (*word << 8) | data[(idx + 4 * i + k) % len] as u32;
        }
    }

    block_op(&mut v);

    for (i, word) in v.iter().enumerate() {
        for k in 0..4 {
            data[(idx + 4 * i + k) % len] = (word >> (24 - 8 * k)) as u8;
        }
    }

    v.zeroize();
}

// XTEA with an all-zero key
fn encipher_block(v: &mut [u32; 2]) {
    let mut sum = 0u32;

    for _ in 0..INNER_ROUNDS {
        v[0] = v[0].wrapping_add((((v[1] << 4) ^ (v[1] >> 5)).wrapping_add(v[1])) ^ sum);
        sum = sum.wrapping_add(DELTA);
        v[1] = v[1].wrapping_add((((v[0] << 4) ^ (v[0] >> 5)).wrapping_add(v[0])) ^ sum);
    }
}

fn decipher_block(v: &mut [u32; 2]) {
    let mut sum = DECIPHER_INITIAL_SUM;

    for _ in 0..INNER_ROUNDS {
        v[1] = v[1].wrapping_sub((((v[0] << 4) ^ (v[0] >> 5)).wrapping_add(v[0])) ^ sum);
        sum = sum.wrapping_sub(DELTA);
        v[0] = v[0].wrapping_sub((((v[1] << 4) ^ (v[1] >> 5)).wrapping_add(v[1])) ^ sum);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_xtea_known_vectors() {
        let cases: [(&[u8], &str); 4] = [
            (b"hello123", "499f2778b3a9d5ef"),
            (b"hello1234", "1acbe8bd5bbc9ea735"),
            (b"Hello World!", "62bbc3e0ee2a905592919569"),
            (&[0, 0, 0, 0, 0, 0, 0, 0, 0, 1], "7373e4cf9f748bf8a29f"),
        ];

        for (plain, scrambled) in cases {
            let diffused = Diffuser::Xtea.scramble(plain).unwrap();
            assert_eq!(hex::encode(&diffused), scrambled);
            assert_eq!(Diffuser::Xtea.unscramble(&diffused).unwrap(), plain);
        }
    }

    #[test]
    fn test_round_trip_across_lengths() {
        for len in MIN_DIFFUSION_BYTES..=48 {
            let secret: Vec<u8> = (0..len).map(|i| (i * 7) as u8).collect();
            let scrambled = Diffuser::Xtea.scramble(&secret).unwrap();

            assert_eq!(scrambled.len(), len);
            assert_ne!(scrambled, secret);
            assert_eq!(Diffuser::Xtea.unscramble(&scrambled).unwrap(), secret);
        }
    }

    #[test]
    fn test_single_bit_change_spreads() {
        let a = Diffuser::Xtea.scramble(&[0u8; 16]).unwrap();
        let mut flipped = [0u8; 16];
        flipped[15] = 1;
        let b = Diffuser::Xtea.scramble(&flipped).unwrap();

        let differing = a.iter().zip(&b).filter(|(x, y)| x != y).count();
        assert!(differing > 8, "only {} bytes changed", differing);
    }

    #[test]
    fn test_ssss_skips_short_secrets() {
        let secret = b"hello12";
        assert!(!Diffuser::Ssss.applies_to(secret.len()));
        assert_eq!(Diffuser::Ssss.scramble(secret).unwrap(), secret);
        assert_eq!(Diffuser::Ssss.unscramble(secret).unwrap(), secret);

        assert!(Diffuser::Ssss.applies_to(8));
        assert_eq!(
            Diffuser::Ssss.scramble(b"hello123").unwrap(),
            Diffuser::Xtea.scramble(b"hello123").unwrap()
        );
    }

    #[test]
    fn test_none_is_identity() {
        assert!(!Diffuser::None.applies_to(64));
        assert_eq!(Diffuser::None.scramble(b"anything at all").unwrap(), b"anything at all");
    }

    #[test]
    fn test_xtea_rejects_short_input() {
        assert!(matches!(
            Diffuser::Xtea.scramble(b"short"),
            Err(ShamirError::DiffusionTooShort { bytes: 5, min: 8 })
        ));
    }

    #[test]
    fn test_default_is_ssss() {
        assert_eq!(Diffuser::default(), Diffuser::Ssss);
    }
}
