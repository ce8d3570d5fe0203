use std::{
    cmp::Ordering,
    ops::{BitAnd, BitOr, BitXor, Not},
};

use primitive_types::{U256, U512};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::common::decode;

#[derive(Default, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct Word(U256);

impl Word {
    pub fn zero() -> Self {
        Self(U256::zero())
    }

    pub fn one() -> Self {
        Self(U256::one())
    }

    pub fn max() -> Self {
        Self(U256::max_value())
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn into_bytes(&self) -> [u8; 32] {
        self.0.to_big_endian()
    }

    /// Big-endian, shorter inputs are left-padded with zeros.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(U256::from_big_endian(bytes))
    }

    pub fn from_hex(hex: &str) -> eyre::Result<Self> {
        let hex = hex.trim_start_matches("0x");
        let word = U256::from_str_radix(hex, 16);
        Ok(Self(
            word.map_err(|_| eyre::eyre!("Invalid U256: '{hex}'."))?,
        ))
    }

    pub fn low_u64(&self) -> u64 {
        self.0.low_u64()
    }

    pub fn to_usize(&self) -> Option<usize> {
        if self.0 > U256::from(usize::MAX) {
            None
        } else {
            Some(self.0.as_usize())
        }
    }

    pub fn bit(&self, index: usize) -> bool {
        self.0.bit(index)
    }

    /// Number of significant bytes, zero for zero.
    pub fn byte_len(&self) -> usize {
        self.0.bits().div_ceil(8)
    }

    /// Number of 32-byte words needed to hold `self` bytes, saturating.
    pub fn words(&self) -> Word {
        let (quot, rem) = self.0.div_mod(U256::from(32));
        if rem.is_zero() {
            Self(quot)
        } else {
            Self(quot + U256::one())
        }
    }

    pub fn wrapping_add(&self, rhs: Word) -> Word {
        Self(self.0.overflowing_add(rhs.0).0)
    }

    pub fn wrapping_sub(&self, rhs: Word) -> Word {
        Self(self.0.overflowing_sub(rhs.0).0)
    }

    pub fn wrapping_mul(&self, rhs: Word) -> Word {
        Self(self.0.overflowing_mul(rhs.0).0)
    }

    pub fn saturating_add(&self, rhs: Word) -> Word {
        Self(self.0.saturating_add(rhs.0))
    }

    pub fn saturating_sub(&self, rhs: Word) -> Word {
        Self(self.0.saturating_sub(rhs.0))
    }

    pub fn saturating_mul(&self, rhs: Word) -> Word {
        Self(self.0.saturating_mul(rhs.0))
    }

    pub fn div(&self, rhs: Word) -> Word {
        if rhs.is_zero() {
            Self::zero()
        } else {
            Self(self.0 / rhs.0)
        }
    }

    pub fn rem(&self, rhs: Word) -> Word {
        if rhs.is_zero() {
            Self::zero()
        } else {
            Self(self.0 % rhs.0)
        }
    }

    pub fn pow(&self, exp: Word) -> Word {
        let (ret, _) = self.0.overflowing_pow(exp.0);
        Self(ret)
    }

    pub fn add_modulo(&self, that: &Word, modulo: &Word) -> Word {
        if modulo.is_zero() {
            return Self::zero();
        }
        let sum = U512::from(self.0) + U512::from(that.0);
        narrow(sum % U512::from(modulo.0))
    }

    pub fn mul_modulo(&self, that: &Word, modulo: &Word) -> Word {
        if modulo.is_zero() {
            return Self::zero();
        }
        narrow(self.0.full_mul(that.0) % U512::from(modulo.0))
    }

    /// BYTE: the `index`-th byte counting from the most significant one.
    pub fn byte(&self, index: Word) -> Word {
        match index.to_usize() {
            Some(i) if i < 32 => Word::from(self.into_bytes()[i]),
            _ => Self::zero(),
        }
    }

    pub fn sign_extend(&self, index: Word) -> Word {
        if index >= Word::from(31) {
            return *self;
        }
        let bit = index.low_u64() as usize * 8 + 7;
        let mask = (U256::one() << bit) - U256::one();
        if self.0.bit(bit) {
            Self(self.0 | !mask)
        } else {
            Self(self.0 & mask)
        }
    }
}

// Two's-complement interpretation.
impl Word {
    pub fn is_negative(&self) -> bool {
        self.0.bit(255)
    }

    pub fn negate(&self) -> Word {
        Self((!self.0).overflowing_add(U256::one()).0)
    }

    fn magnitude(&self) -> U256 {
        if self.is_negative() {
            self.negate().0
        } else {
            self.0
        }
    }

    /// SDIV, truncating toward zero. MIN / -1 wraps back to MIN.
    pub fn sdiv(&self, rhs: Word) -> Word {
        if rhs.is_zero() {
            return Self::zero();
        }
        let quot = Self(self.magnitude() / rhs.magnitude());
        if self.is_negative() ^ rhs.is_negative() {
            quot.negate()
        } else {
            quot
        }
    }

    /// SMOD, the result takes the sign of the dividend.
    pub fn smod(&self, rhs: Word) -> Word {
        if rhs.is_zero() {
            return Self::zero();
        }
        let rem = Self(self.magnitude() % rhs.magnitude());
        if self.is_negative() {
            rem.negate()
        } else {
            rem
        }
    }

    pub fn signed_cmp(&self, rhs: &Word) -> Ordering {
        match (self.is_negative(), rhs.is_negative()) {
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            _ => self.0.cmp(&rhs.0),
        }
    }
}

fn narrow(value: U512) -> Word {
    Word::from_bytes(&value.to_big_endian()[32..])
}

impl std::fmt::Debug for Word {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::LowerHex::fmt(&self.0, f)
    }
}

impl std::fmt::Display for Word {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::LowerHex::fmt(&self.0, f)
    }
}

impl std::fmt::LowerHex for Word {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::LowerHex::fmt(&self.0, f)
    }
}

impl From<bool> for Word {
    fn from(value: bool) -> Self {
        if value { Self::one() } else { Self::zero() }
    }
}

impl From<u8> for Word {
    fn from(value: u8) -> Self {
        Self(U256::from(value))
    }
}

impl From<i32> for Word {
    fn from(value: i32) -> Self {
        Self(U256::from(value))
    }
}

impl From<u64> for Word {
    fn from(value: u64) -> Self {
        Self(U256::from(value))
    }
}

impl From<usize> for Word {
    fn from(value: usize) -> Self {
        Self(U256::from(value))
    }
}

impl From<u128> for Word {
    fn from(value: u128) -> Self {
        Self(U256::from(value))
    }
}

impl BitAnd for Word {
    type Output = Word;

    fn bitand(self, rhs: Self) -> Self::Output {
        Self(self.0 & rhs.0)
    }
}

impl BitOr for Word {
    type Output = Word;

    fn bitor(self, rhs: Self) -> Self::Output {
        Self(self.0 | rhs.0)
    }
}

impl BitXor for Word {
    type Output = Word;

    fn bitxor(self, rhs: Self) -> Self::Output {
        Self(self.0 ^ rhs.0)
    }
}

impl Not for Word {
    type Output = Word;

    fn not(self) -> Self::Output {
        Self(!self.0)
    }
}

impl Serialize for Word {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let hex = format!("{:#x}", self.0);
        serializer.serialize_str(&hex)
    }
}

impl<'de> Deserialize<'de> for Word {
    fn deserialize<D>(deserializer: D) -> Result<Word, D::Error>
    where
        D: Deserializer<'de>,
    {
        use serde::de::Error;

        let hex: String = Deserialize::deserialize(deserializer)?;
        Word::from_hex(&hex).map_err(|_| {
            D::Error::invalid_value(serde::de::Unexpected::Str(&hex), &"Invalid hex word")
        })
    }
}

pub const fn word(s: &str) -> Word {
    let b = decode::<32>(s);
    Word(U256([
        u64::from_be_bytes([b[24], b[25], b[26], b[27], b[28], b[29], b[30], b[31]]),
        u64::from_be_bytes([b[16], b[17], b[18], b[19], b[20], b[21], b[22], b[23]]),
        u64::from_be_bytes([b[8], b[9], b[10], b[11], b[12], b[13], b[14], b[15]]),
        u64::from_be_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]),
    ]))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn neg(n: u64) -> Word {
        Word::from(n).negate()
    }

    #[test]
    fn test_wrapping() {
        assert_eq!(Word::max().wrapping_add(Word::one()), Word::zero());
        assert_eq!(Word::zero().wrapping_sub(Word::one()), Word::max());
        assert_eq!(
            word("0x8000000000000000000000000000000000000000000000000000000000000000")
                .wrapping_mul(Word::from(2)),
            Word::zero()
        );
    }

    #[test]
    fn test_division_by_zero() {
        assert_eq!(Word::from(7).div(Word::zero()), Word::zero());
        assert_eq!(Word::from(7).rem(Word::zero()), Word::zero());
        assert_eq!(neg(7).sdiv(Word::zero()), Word::zero());
        assert_eq!(neg(7).smod(Word::zero()), Word::zero());
        assert_eq!(
            Word::from(7).add_modulo(&Word::one(), &Word::zero()),
            Word::zero()
        );
    }

    #[test]
    fn test_signed() {
        assert_eq!(neg(10).sdiv(Word::from(3)), neg(3));
        assert_eq!(Word::from(10).sdiv(neg(3)), neg(3));
        assert_eq!(neg(10).sdiv(neg(3)), Word::from(3));
        assert_eq!(neg(10).smod(Word::from(3)), neg(1));
        assert_eq!(Word::from(10).smod(neg(3)), Word::from(1));

        let min = word("0x8000000000000000000000000000000000000000000000000000000000000000");
        assert_eq!(min.sdiv(Word::max()), min);
        assert_eq!(min.smod(Word::max()), Word::zero());

        assert_eq!(neg(1).signed_cmp(&Word::one()), Ordering::Less);
        assert_eq!(neg(1).signed_cmp(&neg(2)), Ordering::Greater);
        assert_eq!(Word::from(5).signed_cmp(&Word::from(5)), Ordering::Equal);
    }

    #[test]
    fn test_modular() {
        assert_eq!(
            Word::max().add_modulo(&Word::from(2), &Word::from(2)),
            Word::one()
        );
        assert_eq!(
            Word::max().mul_modulo(&Word::max(), &Word::from(12)),
            Word::from(9)
        );
    }

    #[test]
    fn test_sign_extend() {
        assert_eq!(Word::from(0xff).sign_extend(Word::zero()), Word::max());
        assert_eq!(Word::from(0x7f).sign_extend(Word::zero()), Word::from(0x7f));
        assert_eq!(Word::from(0x1ff).sign_extend(Word::zero()), Word::max());
        assert_eq!(
            Word::from(0x80ff).sign_extend(Word::one()),
            word("0xffffffffffffffffffffffffffffffffffffffffffffffffffffffffffff80ff")
        );
        assert_eq!(Word::from(0xff).sign_extend(Word::from(31)), Word::from(0xff));
        assert_eq!(Word::from(0xff).sign_extend(Word::max()), Word::from(0xff));
    }

    #[test]
    fn test_byte() {
        let w = word("0x0102030405060708091011121314151617181920212223242526272829303132");
        assert_eq!(w.byte(Word::zero()), Word::from(0x01));
        assert_eq!(w.byte(Word::from(31)), Word::from(0x32));
        assert_eq!(w.byte(Word::from(32)), Word::zero());
        assert_eq!(w.byte(Word::max()), Word::zero());
    }

    #[test]
    fn test_sizes() {
        assert_eq!(Word::zero().byte_len(), 0);
        assert_eq!(Word::from(0x100).byte_len(), 2);
        assert_eq!(Word::max().byte_len(), 32);
        assert_eq!(Word::from(33).words(), Word::from(2));
        assert_eq!(Word::from(32).words(), Word::one());
        assert_eq!(Word::max().words(), word("0x0800000000000000000000000000000000000000000000000000000000000000"));
    }

    #[test]
    fn test_const_word() {
        assert_eq!(word("0x2a"), Word::from(42));
        assert_eq!(
            word("0x0102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f20"),
            Word::from_bytes(&(1..=32).collect::<Vec<u8>>())
        );
    }
}
