//! Arithmetic in the binary fields GF(2^n) used for splitting.
//!
//! Every supported field is defined by an irreducible pentanomial
//! `x^n + x^a + x^b + x^c + 1`. The table below holds the three middle
//! exponents for n = 8, 16, ..., 1024 and is the same table the `ssss`
//! tools use, which keeps shares interchangeable between the two programs.
//! For each degree the entry is the lexicographically smallest irreducible
//! pentanomial.
//!
//! Field elements are fixed-width bit vectors stored as little-endian
//! `u64` limbs. Bits at or above the degree are always zero.

use std::cmp::Ordering;
use std::fmt;

use zeroize::{Zeroize, ZeroizeOnDrop};

use super::ShamirError;

/// Largest supported field degree in bits (128-byte secrets).
pub const MAX_DEGREE: u32 = 1024;

/// Middle exponents `[a, b, c]` of `x^n + x^a + x^b + x^c + 1`, indexed by `n / 8 - 1`.
const IRREDUCIBLE_TAPS: [[u16; 3]; 128] = [
    [4, 3, 1], [5, 3, 1], [4, 3, 1], [7, 3, 2], [5, 4, 3], [5, 3, 2],
    [7, 4, 2], [4, 3, 1], [10, 9, 3], [9, 4, 2], [7, 6, 2], [10, 9, 6],
    [4, 3, 1], [5, 4, 3], [4, 3, 1], [7, 2, 1], [5, 3, 2], [7, 4, 2],
    [6, 3, 2], [5, 3, 2], [15, 3, 2], [11, 3, 2], [9, 8, 7], [7, 2, 1],
    [5, 3, 2], [9, 3, 1], [7, 3, 1], [9, 8, 3], [9, 4, 2], [8, 5, 3],
    [15, 14, 10], [10, 5, 2], [9, 6, 2], [9, 3, 2], [9, 5, 2], [11, 10, 1],
    [7, 3, 2], [11, 2, 1], [9, 7, 4], [4, 3, 1], [8, 3, 1], [7, 4, 1],
    [7, 2, 1], [13, 11, 6], [5, 3, 2], [7, 3, 2], [8, 7, 5], [12, 3, 2],
    [13, 10, 6], [5, 3, 2], [5, 3, 2], [9, 5, 2], [9, 7, 2], [13, 4, 3],
    [4, 3, 1], [11, 6, 4], [18, 9, 6], [19, 18, 13], [11, 3, 2], [15, 9, 6],
    [4, 3, 1], [16, 5, 2], [15, 14, 6], [8, 5, 2], [15, 11, 2], [11, 6, 2],
    [7, 5, 3], [8, 3, 1], [19, 16, 9], [11, 9, 6], [15, 7, 6], [13, 4, 3],
    [14, 13, 3], [13, 6, 3], [9, 5, 2], [19, 13, 6], [19, 10, 3], [11, 6, 5],
    [9, 2, 1], [14, 3, 2], [13, 3, 1], [7, 5, 4], [11, 9, 8], [11, 6, 5],
    [23, 16, 9], [19, 14, 6], [23, 10, 2], [8, 3, 2], [5, 4, 3], [9, 6, 4],
    [4, 3, 2], [13, 8, 6], [13, 11, 1], [13, 10, 3], [11, 6, 5], [19, 17, 4],
    [15, 14, 7], [13, 9, 6], [9, 7, 3], [9, 7, 1], [14, 3, 2], [11, 8, 2],
    [11, 6, 4], [13, 5, 2], [11, 5, 1], [11, 4, 1], [19, 10, 3], [21, 10, 6],
    [13, 3, 1], [15, 7, 5], [19, 18, 10], [7, 5, 3], [12, 7, 2], [7, 5, 1],
    [14, 9, 6], [10, 3, 2], [15, 13, 12], [12, 11, 9], [16, 9, 7], [12, 9, 3],
    [9, 5, 2], [17, 10, 6], [24, 9, 3], [17, 15, 13], [5, 4, 3], [19, 17, 8],
    [15, 6, 3], [19, 6, 1],
];

/// The irreducible polynomial that defines one field GF(2^n).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FieldModulus {
    degree: u32,
    taps: [u16; 3],
}

impl FieldModulus {
    /// Look up the field of the given degree in bits
    pub fn new(degree: u32) -> Result<Self, ShamirError> {
        if !Self::is_valid_degree(degree) {
            return Err(ShamirError::UnsupportedFieldSize(degree));
        }

        Ok(Self {
            degree,
            taps: IRREDUCIBLE_TAPS[(degree / 8 - 1) as usize],
        })
    }

    /// Pick the smallest field that can hold `byte_len` bytes
    pub fn of_byte_size(byte_len: usize) -> Result<Self, ShamirError> {
        let bits = byte_len.saturating_mul(8);
        let degree = (8..=MAX_DEGREE)
            .step_by(8)
            .find(|&degree| degree as usize >= bits)
            .ok_or_else(|| {
                ShamirError::UnsupportedFieldSize(u32::try_from(bits).unwrap_or(u32::MAX))
            })?;

        Self::new(degree)
    }

    /// The largest field in the table
    pub fn largest() -> Self {
        Self {
            degree: MAX_DEGREE,
            taps: IRREDUCIBLE_TAPS[IRREDUCIBLE_TAPS.len() - 1],
        }
    }

    /// Whether a field of `degree` bits is in the table
    pub fn is_valid_degree(degree: u32) -> bool {
        (8..=MAX_DEGREE).contains(&degree) && degree % 8 == 0
    }

    pub fn degree(&self) -> u32 {
        self.degree
    }

    pub fn size_in_bytes(&self) -> usize {
        self.degree as usize / 8
    }

    /// Middle exponents of the pentanomial, highest first
    pub fn taps(&self) -> [u16; 3] {
        self.taps
    }

    fn limb_count(&self) -> usize {
        (self.degree as usize + 63) / 64
    }

    /// The full polynomial including the `x^degree` term, `width` limbs wide.
    fn polynomial_limbs(&self, width: usize) -> Vec<u64> {
        let mut limbs = vec![0u64; width];
        for bit in self.exponents() {
            limbs[bit / 64] ^= 1u64 << (bit % 64);
        }
        limbs
    }

    fn exponents(&self) -> [usize; 5] {
        [
            self.degree as usize,
            self.taps[0] as usize,
            self.taps[1] as usize,
            self.taps[2] as usize,
            0,
        ]
    }
}

impl fmt::Display for FieldModulus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let terms: Vec<String> = self
            .exponents()
            .iter()
            .map(|&exponent| match exponent {
                0 => "1".to_string(),
                1 => "x".to_string(),
                _ => format!("x^{}", exponent),
            })
            .collect();
        write!(f, "{}", terms.join(" + "))
    }
}

/// A value in GF(2^n) for some [`FieldModulus`].
#[derive(Clone, PartialEq, Eq, Hash, Zeroize, ZeroizeOnDrop)]
pub struct FieldElement {
    #[zeroize(skip)]
    modulus: FieldModulus,
    limbs: Vec<u64>,
}

impl FieldElement {
    pub fn zero(modulus: FieldModulus) -> Self {
        Self {
            modulus,
            limbs: vec![0u64; modulus.limb_count()],
        }
    }

    pub fn one(modulus: FieldModulus) -> Self {
        let mut element = Self::zero(modulus);
        element.limbs[0] = 1;
        element
    }

    /// Build an element from a small integer, e.g. a share index.
    pub fn from_u64(modulus: FieldModulus, value: u64) -> Result<Self, ShamirError> {
        if modulus.degree < 64 && value >> modulus.degree != 0 {
            return Err(ShamirError::InvalidShareIndex(value));
        }

        let mut element = Self::zero(modulus);
        element.limbs[0] = value;
        Ok(element)
    }

    /// Build an element from big-endian bytes.
    ///
    /// Shorter input is zero-padded on the left; longer input keeps only the
    /// low-order `size_in_bytes` bytes.
    pub fn from_be_bytes(modulus: FieldModulus, bytes: &[u8]) -> Self {
        let size = modulus.size_in_bytes();
        let bytes = if bytes.len() > size {
            &bytes[bytes.len() - size..]
        } else {
            bytes
        };

        let mut element = Self::zero(modulus);
        for (i, &byte) in bytes.iter().rev().enumerate() {
            element.limbs[i / 8] |= (byte as u64) << ((i % 8) * 8);
        }
        element
    }

    /// Fixed-width big-endian encoding (`size_in_bytes` long)
    pub fn to_be_bytes(&self) -> Vec<u8> {
        let size = self.modulus.size_in_bytes();
        let mut bytes = vec![0u8; size];
        for i in 0..size {
            bytes[size - 1 - i] = (self.limbs[i / 8] >> ((i % 8) * 8)) as u8;
        }
        bytes
    }

    pub fn modulus(&self) -> FieldModulus {
        self.modulus
    }

    pub fn is_zero(&self) -> bool {
        self.limbs.iter().all(|&limb| limb == 0)
    }

    pub fn is_one(&self) -> bool {
        self.limbs[0] == 1 && self.limbs[1..].iter().all(|&limb| limb == 0)
    }

    /// The value as an integer, if it fits in 64 bits
    pub fn to_u64(&self) -> Option<u64> {
        if self.limbs[1..].iter().any(|&limb| limb != 0) {
            return None;
        }
        Some(self.limbs[0])
    }

    /// Field addition (XOR). Fails when the elements live in different fields.
    pub fn checked_add(&self, other: &Self) -> Result<Self, ShamirError> {
        self.ensure_same_field(other)?;

        let mut sum = self.clone();
        sum.xor_assign(other);
        Ok(sum)
    }

    /// Field multiplication. Fails when the elements live in different fields.
    pub fn checked_mul(&self, other: &Self) -> Result<Self, ShamirError> {
        self.ensure_same_field(other)?;
        Ok(self.mul_same_field(other))
    }

    pub fn square(&self) -> Self {
        self.mul_same_field(self)
    }

    /// Raise to a small integer power by square-and-multiply
    pub fn pow(&self, mut exponent: u64) -> Self {
        let mut result = Self::one(self.modulus);
        let mut base = self.clone();

        while exponent > 0 {
            if exponent & 1 == 1 {
                result = result.mul_same_field(&base);
            }
            base = base.square();
            exponent >>= 1;
        }

        result
    }

    /// Multiplicative inverse via the extended Euclidean algorithm.
    pub fn inverse(&self) -> Result<Self, ShamirError> {
        if self.is_zero() {
            return Err(ShamirError::NotInvertible);
        }

        // Room for the x^degree term of the modulus
        let width = self.modulus.degree as usize / 64 + 1;

        let mut u = self.limbs.clone();
        u.resize(width, 0);
        let mut v = self.modulus.polynomial_limbs(width);
        let mut g1 = vec![0u64; width];
        g1[0] = 1;
        let mut g2 = vec![0u64; width];

        // Invariants: self * g1 == u and self * g2 == v (mod the field polynomial)
        loop {
            let du = highest_bit(&u).ok_or(ShamirError::NotInvertible)?;
            if du == 0 {
                break;
            }

            let dv = highest_bit(&v).ok_or(ShamirError::NotInvertible)?;
            let shift = if du < dv {
                std::mem::swap(&mut u, &mut v);
                std::mem::swap(&mut g1, &mut g2);
                dv - du
            } else {
                du - dv
            };

            xor_shifted(&mut u, &v, shift);
            xor_shifted(&mut g1, &g2, shift);
        }

        let mut inverse = Self::zero(self.modulus);
        let limb_count = inverse.limbs.len();
        inverse.limbs.copy_from_slice(&g1[..limb_count]);

        u.zeroize();
        v.zeroize();
        g1.zeroize();
        g2.zeroize();

        Ok(inverse)
    }

    fn ensure_same_field(&self, other: &Self) -> Result<(), ShamirError> {
        if self.modulus != other.modulus {
            return Err(ShamirError::FieldMismatch {
                left: self.modulus.degree,
                right: other.modulus.degree,
            });
        }
        Ok(())
    }

    fn bit(&self, index: u32) -> bool {
        let index = index as usize;
        (self.limbs[index / 64] >> (index % 64)) & 1 == 1
    }

    fn xor_assign(&mut self, other: &Self) {
        for (limb, other) in self.limbs.iter_mut().zip(&other.limbs) {
            *limb ^= other;
        }
    }

    /// Classic shift-and-add multiplication, most significant bit of `other` first.
    fn mul_same_field(&self, other: &Self) -> Self {
        let mut product = Self::zero(self.modulus);

        for i in (0..self.modulus.degree).rev() {
            product.shift_left_reduce();
            if other.bit(i) {
                product.xor_assign(self);
            }
        }

        product
    }

    /// Multiply by x and reduce.
    fn shift_left_reduce(&mut self) {
        let degree = self.modulus.degree as usize;

        let mut carry = 0u64;
        for limb in self.limbs.iter_mut() {
            let next = *limb >> 63;
            *limb = (*limb << 1) | carry;
            carry = next;
        }

        let overflow = if degree % 64 == 0 {
            carry == 1
        } else {
            let (word, bit) = (degree / 64, degree % 64);
            let set = (self.limbs[word] >> bit) & 1 == 1;
            self.limbs[word] &= !(1u64 << bit);
            set
        };

        if overflow {
            for &tap in self.modulus.taps.iter() {
                let tap = tap as usize;
                self.limbs[tap / 64] ^= 1u64 << (tap % 64);
            }
            self.limbs[0] ^= 1;
        }
    }
}

impl PartialOrd for FieldElement {
    /// Elements of different fields are unordered.
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        if self.modulus != other.modulus {
            return None;
        }
        Some(self.limbs.iter().rev().cmp(other.limbs.iter().rev()))
    }
}

impl fmt::LowerHex for FieldElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.to_be_bytes()))
    }
}

impl fmt::Display for FieldElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::LowerHex::fmt(self, f)
    }
}

impl fmt::Debug for FieldElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FieldElement(GF(2^{}), {:x})", self.modulus.degree, self)
    }
}

fn highest_bit(limbs: &[u64]) -> Option<usize> {
    limbs
        .iter()
        .enumerate()
        .rev()
        .find(|(_, limb)| **limb != 0)
        .map(|(i, limb)| i * 64 + 63 - limb.leading_zeros() as usize)
}

/// `target ^= source << shift`, dropping bits past the end of `target`.
fn xor_shifted(target: &mut [u64], source: &[u64], shift: usize) {
    let (words, bits) = (shift / 64, shift % 64);

    for (i, &limb) in source.iter().enumerate() {
        if limb == 0 {
            continue;
        }
        if i + words < target.len() {
            target[i + words] ^= limb << bits;
        }
        if bits > 0 && i + words + 1 < target.len() {
            target[i + words + 1] ^= limb >> (64 - bits);
        }
    }
}
