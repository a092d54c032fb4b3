// SPDX-License-Identifier: AGPL-3.0-only

//! Fixed-point formats used by the datapath.

/// Fractional bits of conv weights and activations (Q1.7).
pub const CONV_FRAC_BITS: u32 = 7;

/// Fractional bits of fully-connected weights (scale 64).
pub const DENSE_FRAC_BITS: u32 = 6;

/// Arithmetic right shift applied by the requantizer after every layer.
pub const QUANT_SHIFT: u32 = 8;

/// Signed 8-bit saturation bounds of the requantizer output.
pub const INT8_MIN: i32 = -128;
/// Upper saturation bound.
pub const INT8_MAX: i32 = 127;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bias_scale_is_product_of_operand_scales() {
        // Q7 x Q7 accumulates in Q14: 128 * 128 = 16384
        assert_eq!(1_i64 << (2 * CONV_FRAC_BITS), 16_384);
        assert_eq!(1_i64 << (2 * DENSE_FRAC_BITS), 4_096);
    }
}
