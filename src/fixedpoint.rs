//! Fixed-point encode/decode.
//!
//! A fixed-point value is a 32-bit integer whose binary point sits at an
//! exponent supplied by the caller. With exponent `e`, the integer `x`
//! represents `x * 2^(e - FIXED_MSB)`, so `1 << FIXED_MSB` at exponent 0 is 1.0.
//! The exponent is never stored with the value.
//!
//! Conversion decomposes the IEEE-754 binary64 layout explicitly (1 sign bit,
//! 11 exponent bits, 52 mantissa bits) and shifts the mantissa into place,
//! matching the scaling the simulation core applies to its own state.

/// Bit position of the most significant magnitude bit in a fixed-point value.
pub const FIXED_MSB: i32 = 30;

/// Sentinel for NaN.
pub const FIXED_NAN: i32 = i32::MIN;

/// Sentinel for +Infinity. Negative infinity is `-FIXED_INFINITY`.
pub const FIXED_INFINITY: i32 = i32::MAX;

const MANTISSA_BITS: i32 = 52;
const EXPONENT_MASK: u64 = 0x7FF;
const EXPONENT_BIAS: i32 = 1023;
const MANTISSA_MASK: u64 = (1 << MANTISSA_BITS) - 1;
const IMPLICIT_BIT: u64 = 1 << MANTISSA_BITS;

/// Sign, unbiased exponent and full mantissa of a finite binary64 value.
///
/// `value == (-1)^negative * mantissa * 2^(exponent - 52)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Decomposed {
    pub negative: bool,
    pub exponent: i32,
    /// 53-bit mantissa with the implicit leading bit restored (absent for
    /// subnormals).
    pub mantissa: u64,
}

/// Split a finite `f64` into its fields.
pub fn decompose(value: f64) -> Decomposed {
    let bits = value.to_bits();
    let negative = bits >> 63 != 0;
    let raw_exponent = ((bits >> MANTISSA_BITS) & EXPONENT_MASK) as i32;
    let fraction = bits & MANTISSA_MASK;
    if raw_exponent == 0 {
        // Subnormal: no implicit bit, exponent pinned at the minimum.
        Decomposed { negative, exponent: 1 - EXPONENT_BIAS, mantissa: fraction }
    } else {
        Decomposed {
            negative,
            exponent: raw_exponent - EXPONENT_BIAS,
            mantissa: fraction | IMPLICIT_BIT,
        }
    }
}

/// Encode a native float at the given exponent.
pub fn encode_f64(value: f64, exponent: i32) -> i32 {
    if value == 0.0 {
        return 0;
    }
    if value.is_nan() {
        return FIXED_NAN;
    }
    if value.is_infinite() {
        return if value > 0.0 { FIXED_INFINITY } else { -FIXED_INFINITY };
    }

    let d = decompose(value);
    let mut mantissa = d.mantissa as i64;
    if d.negative {
        mantissa = -mantissa;
    }

    // Right shift that aligns the binary64 mantissa to the target format.
    let shift = (MANTISSA_BITS - FIXED_MSB) + exponent - d.exponent;
    let result = if shift <= 0 {
        // A normal mantissa is at least 2^52, so any left shift overflows.
        return saturate(d.negative);
    } else if shift >= 63 {
        if mantissa < 0 { -1 } else { 0 }
    } else {
        mantissa >> shift
    };

    if result > FIXED_INFINITY as i64 || result < -(FIXED_INFINITY as i64) {
        return saturate(d.negative);
    }
    result as i32
}

/// Encode decimal text at the given exponent. Unparsable text encodes as 0.
pub fn encode(text: &str, exponent: i32) -> i32 {
    match text.trim().parse::<f64>() {
        Ok(value) => encode_f64(value, exponent),
        Err(_) => 0,
    }
}

/// Decode a fixed-point value back to a native float.
pub fn decode(bits: i32, exponent: i32) -> f64 {
    match bits {
        FIXED_NAN => f64::NAN,
        FIXED_INFINITY => f64::INFINITY,
        b if b == -FIXED_INFINITY => f64::NEG_INFINITY,
        b => b as f64 * pow2(exponent - FIXED_MSB),
    }
}

#[inline]
fn saturate(negative: bool) -> i32 {
    if negative { -FIXED_INFINITY } else { FIXED_INFINITY }
}

/// Exact power of two, built from its bit pattern when in the normal range.
fn pow2(n: i32) -> f64 {
    if (1 - EXPONENT_BIAS..=EXPONENT_BIAS).contains(&n) {
        f64::from_bits(((n + EXPONENT_BIAS) as u64) << MANTISSA_BITS)
    } else {
        2f64.powi(n)
    }
}
