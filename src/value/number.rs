//! Arbitrary-precision numeric payloads: plain integers (tag-free major
//! types 0/1), bignums (tags 2/3), decimal fractions (tag 4), bigfloats
//! (tag 5) and rationals (tag 30). Mirrors the shape of the teacher
//! crate's `value::number::Number`, but as owned, encodable values rather
//! than zero-copy views over existing bytes.
use num_bigint::{BigInt, Sign};
use num_rational::BigRational;
use std::fmt::{self, Display};

/// An arbitrary-precision signed integer: the `i128` fast path covers every
/// value producible by a single CBOR major-type-0/1 head (up to
/// `u64::MAX` in magnitude), the `Big` path covers tag-2/3 bignums that
/// exceed it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Integer {
    Small(i128),
    Big(BigInt),
}

impl Integer {
    pub fn from_u64(v: u64) -> Self {
        Integer::Small(v as i128)
    }

    /// Construct from a CBOR major-type-1 argument `n`, representing
    /// `-1 - n`.
    pub fn from_neg_arg(n: u64) -> Self {
        Integer::Small(-1_i128 - n as i128)
    }

    /// Decode a tag-2/3 big-endian unsigned byte string, negating for tag 3.
    pub fn from_bignum_bytes(bytes: &[u8], negative: bool) -> Self {
        let magnitude = BigInt::from_bytes_be(Sign::Plus, bytes);
        let big = if negative { -(magnitude + 1u8) } else { magnitude };
        Integer::Big(big).normalize()
    }

    /// Shrink a `Big` value back to `Small` when it fits, so that equality
    /// and encoding don't have to special-case two representations of the
    /// same number.
    fn normalize(self) -> Self {
        match self {
            Integer::Big(b) => match i128::try_from(&b) {
                Ok(small) => Integer::Small(small),
                Err(_) => Integer::Big(b),
            },
            small => small,
        }
    }

    pub fn is_negative(&self) -> bool {
        match self {
            Integer::Small(v) => *v < 0,
            Integer::Big(b) => b.sign() == Sign::Minus,
        }
    }

    /// Split into (is_negative, big-endian unsigned magnitude bytes, minus one
    /// applied for negatives) — the representation tag 2/3 and major types
    /// 0/1 both need.
    pub fn to_unsigned_bytes(&self) -> (bool, Vec<u8>) {
        match self {
            Integer::Small(v) => {
                let negative = *v < 0;
                let magnitude: u128 = if negative { (-1 - *v) as u128 } else { *v as u128 };
                (negative, strip_leading_zeros(&magnitude.to_be_bytes()))
            }
            Integer::Big(b) => {
                let negative = b.sign() == Sign::Minus;
                let magnitude = if negative { -(b.clone()) - 1 } else { b.clone() };
                let (_, bytes) = magnitude.to_bytes_be();
                (negative, bytes)
            }
        }
    }

    /// Fits in a u64 head argument directly (i.e. representable by a bare
    /// major-type-0/1 item without falling back to tag 2/3).
    pub fn as_u64_arg(&self) -> Option<(bool, u64)> {
        match self {
            Integer::Small(v) => {
                if *v >= 0 {
                    u64::try_from(*v).ok().map(|u| (false, u))
                } else {
                    u64::try_from(-1 - *v).ok().map(|u| (true, u))
                }
            }
            Integer::Big(_) => None,
        }
    }
}

fn strip_leading_zeros(bytes: &[u8]) -> Vec<u8> {
    let first_nonzero = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len() - 1);
    bytes[first_nonzero..].to_vec()
}

impl Display for Integer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Integer::Small(v) => write!(f, "{}", v),
            Integer::Big(b) => write!(f, "{}", b),
        }
    }
}

impl From<i64> for Integer {
    fn from(v: i64) -> Self {
        Integer::Small(v as i128)
    }
}

impl From<u64> for Integer {
    fn from(v: u64) -> Self {
        Integer::Small(v as i128)
    }
}

/// `mantissa * 10^exponent` (tag 4).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BigDecimal {
    pub exponent: i64,
    pub mantissa: Integer,
}

impl Display for BigDecimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}e{}", self.mantissa, self.exponent)
    }
}

/// `mantissa * 2^exponent` (tag 5).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BigFloat {
    pub exponent: i64,
    pub mantissa: Integer,
}

impl Display for BigFloat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}p{}", self.mantissa, self.exponent)
    }
}

/// An arbitrary-precision rational number (tag 30).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rational(pub BigRational);

impl Display for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.0.numer(), self.0.denom())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bignum_round_trip() {
        let i = Integer::from_bignum_bytes(&[1, 2, 3], false);
        let (neg, bytes) = i.to_unsigned_bytes();
        assert!(!neg);
        assert_eq!(bytes, vec![1, 2, 3]);

        let i = Integer::from_bignum_bytes(&[1, 2, 3], true);
        assert!(i.is_negative());
    }

    #[test]
    fn small_normalizes_from_big() {
        let i = Integer::from_bignum_bytes(&[1], false);
        assert_eq!(i, Integer::Small(1));
    }

    #[test]
    fn as_u64_arg_roundtrips() {
        assert_eq!(Integer::Small(1000000).as_u64_arg(), Some((false, 1000000)));
        assert_eq!(Integer::Small(-1).as_u64_arg(), Some((true, 0)));
    }
}
