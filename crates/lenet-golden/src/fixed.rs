// SPDX-License-Identifier: AGPL-3.0-only

//! Fixed-point quantizer
//!
//! Scalar conversions between real values and the integer representations
//! the datapath uses:
//!
//! ```text
//! real ──quantize──▶ int8 (Q1.7)        weights, activations
//! real ──quantize_wide──▶ int32 (Q14)   biases, at the accumulator scale
//! int32 ──requantize(shift)──▶ int8     layer output
//! ```
//!
//! Rounding is half away from zero, clamping is the defined overflow
//! behavior, and the requantizer shift is arithmetic (rounds toward −∞)
//! exactly like the RTL shifter.

use crate::error::{GoldenError, Result};
use lenet_chip::quant::{CONV_FRAC_BITS, DENSE_FRAC_BITS};

/// Element-wise activation applied before the requantizer shift.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    /// `max(0, x)`
    Relu,
    /// Pass through unchanged
    Identity,
}

impl Activation {
    /// Activation enabled by a layer's ReLU flag.
    #[must_use]
    pub const fn from_relu(relu: bool) -> Self {
        if relu {
            Self::Relu
        } else {
            Self::Identity
        }
    }

    /// Apply to one accumulator value.
    #[must_use]
    pub const fn apply(self, value: i32) -> i32 {
        match self {
            Self::Relu => {
                if value < 0 {
                    0
                } else {
                    value
                }
            }
            Self::Identity => value,
        }
    }
}

/// Signed fixed-point format: total bits and fractional bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedPointFormat {
    /// Total width including sign
    pub bits: u32,
    /// Fractional bits (`scale = 2^frac_bits`)
    pub frac_bits: u32,
}

impl FixedPointFormat {
    /// Q1.7: conv weights and activations.
    pub const Q7: Self = Self::new(8, CONV_FRAC_BITS);

    /// Scale-64 dense weights.
    pub const Q6: Self = Self::new(8, DENSE_FRAC_BITS);

    /// Create a format
    pub const fn new(bits: u32, frac_bits: u32) -> Self {
        Self { bits, frac_bits }
    }

    /// `2^frac_bits`, exact for every exponent used here
    #[must_use]
    pub fn scale(self) -> f64 {
        f64::from(self.frac_bits).exp2()
    }

    /// 32-bit accumulator format of a product of `self` and `other`.
    #[must_use]
    pub const fn accumulator_with(self, other: Self) -> Self {
        Self::new(32, self.frac_bits + other.frac_bits)
    }

    /// Integer representation of `real` in this format (rounded, saturated).
    ///
    /// Formats are at most 32 bits wide, so the result always fits `i32`.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn to_fixed(self, real: f64) -> i32 {
        let (min, max) = signed_bounds(self.bits.clamp(1, 32));
        round_clamped(real * self.scale(), min, max) as i32
    }
}

/// Quantize a real value to int8: scale, round half away from zero, clamp.
///
/// Never fails. NaN maps to 0.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn quantize(real: f64, frac_bits: u32) -> i8 {
    FixedPointFormat::new(8, frac_bits).to_fixed(real) as i8
}

/// Quantize a real value to int32 at `frac_bits` (bias quantization).
///
/// The accumulator scale for Q7 operands is `frac_bits = 14`.
#[must_use]
pub fn quantize_wide(real: f64, frac_bits: u32) -> i32 {
    FixedPointFormat::new(32, frac_bits).to_fixed(real)
}

/// The hardware 8-bit saturating cast.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn saturate_i8(value: i64) -> i8 {
    value.clamp(-128, 127) as i8
}

/// Requantize an accumulator: optional ReLU, arithmetic right shift, clamp.
///
/// The shift rounds toward negative infinity (`-301 >> 2 == -76`), matching
/// the RTL shifter rather than integer division. Shifts of 32 or more leave
/// only the sign.
#[must_use]
pub fn requantize(acc: i32, shift: u32, activation: Activation) -> i8 {
    let value = activation.apply(acc);
    let shifted = if shift >= 32 {
        if value < 0 {
            -1
        } else {
            0
        }
    } else {
        value >> shift
    };
    saturate_i8(i64::from(shifted))
}

/// True if `value` fits in a signed `bits`-wide two's-complement integer.
#[must_use]
pub fn fits(value: i64, bits: u32) -> bool {
    let (min, max) = signed_bounds(bits);
    (min..=max).contains(&value)
}

/// Inclusive signed range of a `bits`-wide integer (`bits` in 1..=64).
#[must_use]
pub fn signed_bounds(bits: u32) -> (i64, i64) {
    if bits >= 64 {
        (i64::MIN, i64::MAX)
    } else {
        let half = 1_i64 << (bits - 1);
        (-half, half - 1)
    }
}

/// Render a signed value as zero-padded two's-complement hex.
///
/// Produces `bit_width / 4` lowercase digits, no `0x` prefix.
///
/// # Errors
///
/// Returns `InvalidConfig` if `bit_width` is not a multiple of 4 in 4..=64,
/// and `RangeViolation` if `value` does not fit. Callers clamp before
/// encoding, so the latter indicates a quantizer bug.
pub fn encode_hex(value: i64, bit_width: u32) -> Result<String> {
    check_hex_width(bit_width)?;
    if !fits(value, bit_width) {
        return Err(GoldenError::range_violation(value, bit_width));
    }
    #[allow(clippy::cast_sign_loss)]
    let raw = (value as u64) & mask(bit_width);
    Ok(format!("{raw:0width$x}", width = (bit_width / 4) as usize))
}

/// Parse two's-complement hex text of `bit_width` bits into a signed value.
///
/// Surrounding whitespace is ignored; either case is accepted.
///
/// # Errors
///
/// Returns `Parse` for empty text, non-hex characters or more digits than
/// `bit_width / 4`.
pub fn decode_hex(text: &str, bit_width: u32) -> Result<i64> {
    check_hex_width(bit_width)?;
    let digits = text.trim();
    if digits.is_empty() {
        return Err(GoldenError::parse(0, "empty hex value"));
    }
    if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(GoldenError::parse(0, format!("invalid hex value '{digits}'")));
    }
    if digits.len() > (bit_width / 4) as usize {
        return Err(GoldenError::parse(
            0,
            format!("'{digits}' is wider than {bit_width} bits"),
        ));
    }
    let raw = u64::from_str_radix(digits, 16)
        .map_err(|e| GoldenError::parse(0, format!("invalid hex value '{digits}': {e}")))?;
    Ok(sign_extend(raw, bit_width))
}

/// Interpret the low `bits` bits of `raw` as a signed value.
#[must_use]
#[allow(clippy::cast_possible_wrap)]
pub fn sign_extend(raw: u64, bits: u32) -> i64 {
    if bits >= 64 {
        return raw as i64;
    }
    let unused = 64 - bits;
    ((raw << unused) as i64) >> unused
}

/// Low-`bits` mask.
#[must_use]
pub fn mask(bits: u32) -> u64 {
    if bits >= 64 {
        u64::MAX
    } else {
        (1_u64 << bits) - 1
    }
}

fn check_hex_width(bit_width: u32) -> Result<()> {
    if bit_width == 0 || bit_width > 64 || bit_width % 4 != 0 {
        return Err(GoldenError::invalid_config(format!(
            "hex width must be a multiple of 4 in 4..=64, got {bit_width}"
        )));
    }
    Ok(())
}

#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn round_clamped(scaled: f64, min: i64, max: i64) -> i64 {
    if scaled.is_nan() {
        return 0;
    }
    // f64::round is half away from zero
    let rounded = scaled.round();
    if rounded <= min as f64 {
        min
    } else if rounded >= max as f64 {
        max
    } else {
        rounded as i64
    }
}
