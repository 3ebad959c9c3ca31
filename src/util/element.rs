//! Numeric element types a holder can store.
//!
//! A simulation runs either in native floating point or in scaled-integer
//! fixed point. Every number read from a file flows through
//! [`Element::parse`], so the same loaders serve both.

use std::fmt;

use crate::fixedpoint;

/// A scalar that can live in a matrix.
pub trait Element: Copy + Default + PartialEq + fmt::Debug + 'static {
    /// Human-readable type name.
    const NAME: &'static str;

    /// Parse decimal text. `exponent` is the binary-point position and is
    /// ignored by floating-point types. Unparsable text yields zero.
    fn parse(text: &str, exponent: i32) -> Self;

    /// Whether this value is exactly zero.
    fn is_zero(&self) -> bool;

    /// Convert to `f64` for display. Fixed-point values need the exponent.
    fn to_f64(self, exponent: i32) -> f64;
}

impl Element for f64 {
    const NAME: &'static str = "f64";

    #[inline]
    fn parse(text: &str, _exponent: i32) -> Self {
        text.trim().parse().unwrap_or(0.0)
    }

    #[inline]
    fn is_zero(&self) -> bool {
        *self == 0.0
    }

    #[inline]
    fn to_f64(self, _exponent: i32) -> f64 {
        self
    }
}

impl Element for f32 {
    const NAME: &'static str = "f32";

    #[inline]
    fn parse(text: &str, _exponent: i32) -> Self {
        text.trim().parse().unwrap_or(0.0)
    }

    #[inline]
    fn is_zero(&self) -> bool {
        *self == 0.0
    }

    #[inline]
    fn to_f64(self, _exponent: i32) -> f64 {
        self as f64
    }
}

/// Fixed point: the integer carries the value, the exponent travels beside it.
impl Element for i32 {
    const NAME: &'static str = "fixed";

    #[inline]
    fn parse(text: &str, exponent: i32) -> Self {
        fixedpoint::encode(text, exponent)
    }

    #[inline]
    fn is_zero(&self) -> bool {
        *self == 0
    }

    #[inline]
    fn to_f64(self, exponent: i32) -> f64 {
        fixedpoint::decode(self, exponent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_float_parse() {
        assert_eq!(f64::parse(" 1.5 ", 0), 1.5);
        assert_eq!(f64::parse("bogus", 0), 0.0);
        assert_eq!(f32::parse("-2e3", 0), -2000.0);
    }

    #[test]
    fn test_fixed_parse() {
        // 1.0 at exponent 0 puts the binary point just below the MSB.
        assert_eq!(i32::parse("1", 0), 1 << fixedpoint::FIXED_MSB);
        assert!(i32::parse("0", 5).is_zero());
        assert_eq!(i32::parse("0.5", 0).to_f64(0), 0.5);
    }
}
