//! Quality-scaled quantization of DCT coefficients.

use crate::constants::{BLOCK_DIM, MAXIMUM_DC_STEP, MAXIMUM_QUALITY, MINIMUM_QUALITY};

/// Standard JPEG luminance quantization table (Quality 50).
#[rustfmt::skip]
pub const STD_LUMINANCE_QUANT_TABLE: [u8; BLOCK_DIM] = [
    16, 11, 10, 16, 24, 40, 51, 61,
    12, 12, 14, 19, 26, 58, 60, 55,
    14, 13, 16, 24, 40, 57, 69, 56,
    14, 17, 22, 29, 51, 87, 80, 62,
    18, 22, 37, 56, 68, 109, 103, 77,
    24, 35, 55, 64, 81, 104, 113, 92,
    49, 64, 78, 87, 103, 121, 120, 101,
    72, 92, 95, 98, 112, 100, 103, 99,
];

// Largest quantized magnitude whose category the standard AC table can code.
const MAX_AC_LEVEL: i16 = 1023;
const MIN_DC_LEVEL: i16 = -1024;
const MAX_DC_LEVEL: i16 = 1023;

// Steps are powers of two up to 2^7.
const MAX_STEP_EXPONENT: i32 = 7;
// Exponent at which every coefficient sits at the largest step.
const MAX_LADDER_LEVEL: i32 = MAX_STEP_EXPONENT + 1;

/// Ladder level for a quality, or `None` at quality 100 (all steps 1).
///
/// The level is the IJG step for a base entry of 16, rounded to the nearest
/// power of two, and never decreases as quality drops.
fn ladder_level(quality: u32) -> Option<i32> {
    let quality = quality.clamp(MINIMUM_QUALITY, MAXIMUM_QUALITY);
    if quality == MAXIMUM_QUALITY {
        return None;
    }
    let scale = if quality < 50 {
        5000 / quality
    } else {
        200 - 2 * quality
    };
    let base_step = 16.0 * scale as f64 / 100.0;
    Some((base_step.log2().round() as i32).clamp(0, MAX_LADDER_LEVEL))
}

// Frequency weight of a base entry: log2(base / 16) rounded, -1 to 3.
fn frequency_weight(base: u8) -> i32 {
    (base as f64 / 16.0).log2().round() as i32
}

/// Quantization table for a quality factor (1-100).
///
/// Every step is a power of two `2^clamp(level + weight, 0, 7)`, where the
/// weight follows the standard luminance table and the level rises with the
/// IJG scale factor. Quality 100 yields all ones. Because a step only ever
/// doubles as quality drops, each table's reconstruction grid contains the
/// grid of every coarser table, so no quality step can lower the error. The
/// DC step is capped so that flat blocks survive exactly.
pub fn scaled_quant_table(quality: u32) -> [u8; BLOCK_DIM] {
    let Some(level) = ladder_level(quality) else {
        return [1; BLOCK_DIM];
    };
    let mut table = [0u8; BLOCK_DIM];
    for (step, &base) in table.iter_mut().zip(STD_LUMINANCE_QUANT_TABLE.iter()) {
        let exponent = (level + frequency_weight(base)).clamp(0, MAX_STEP_EXPONENT);
        *step = 1u8 << exponent;
    }
    table[0] = table[0].min(MAXIMUM_DC_STEP);
    table
}

/// Quantizes DCT coefficients, clamping to the range the entropy coder handles.
pub fn quantize_block(
    dct_block: &[f32; BLOCK_DIM],
    quant_table: &[u8; BLOCK_DIM],
    output: &mut [i16; BLOCK_DIM],
) {
    for i in 0..BLOCK_DIM {
        let level = (dct_block[i] / quant_table[i] as f32).round() as i32;
        output[i] = if i == 0 {
            level.clamp(MIN_DC_LEVEL as i32, MAX_DC_LEVEL as i32) as i16
        } else {
            level.clamp(-(MAX_AC_LEVEL as i32), MAX_AC_LEVEL as i32) as i16
        };
    }
}

pub fn dequantize_block(
    quant_block: &[i16; BLOCK_DIM],
    quant_table: &[u8; BLOCK_DIM],
    output: &mut [f32; BLOCK_DIM],
) {
    for i in 0..BLOCK_DIM {
        output[i] = quant_block[i] as f32 * quant_table[i] as f32;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quality_100_is_unit_step() {
        assert!(scaled_quant_table(100).iter().all(|&q| q == 1));
    }

    #[test]
    fn test_steps_double_as_quality_drops() {
        let mut previous = scaled_quant_table(100);
        for quality in (1..100).rev() {
            let table = scaled_quant_table(quality);
            for i in 0..BLOCK_DIM {
                assert!(table[i].is_power_of_two(), "step {i} at quality {quality}");
                assert_eq!(table[i] % previous[i], 0, "step {i} not nested at quality {quality}");
            }
            previous = table;
        }
        assert_eq!(previous[0], MAXIMUM_DC_STEP);
        assert!(previous.iter().skip(1).all(|&q| q == 128));
    }

    #[test]
    fn test_ladder_follows_ijg_scale() {
        assert_eq!(ladder_level(100), None);
        assert_eq!(ladder_level(99), Some(0));
        assert_eq!(ladder_level(75), Some(3));
        assert_eq!(ladder_level(50), Some(4));
        assert_eq!(ladder_level(1), Some(MAX_LADDER_LEVEL));
        // Quality 50 keeps the base table within a factor of sqrt(2).
        let table = scaled_quant_table(50);
        for (i, (&step, &base)) in table.iter().zip(STD_LUMINANCE_QUANT_TABLE.iter()).enumerate().skip(1) {
            let ratio = step as f64 / base as f64;
            assert!((0.7..=1.42).contains(&ratio), "entry {i}: {step} vs {base}");
        }
    }

    #[test]
    fn test_quantize_dequantize() {
        let table = scaled_quant_table(50);
        let mut coeffs = [0.0f32; BLOCK_DIM];
        coeffs[0] = -224.0;
        coeffs[1] = 3.0;
        let mut levels = [0i16; BLOCK_DIM];
        quantize_block(&coeffs, &table, &mut levels);
        assert_eq!(levels[0], -28);
        assert_eq!(levels[1], 0);

        let mut restored = [0.0f32; BLOCK_DIM];
        dequantize_block(&levels, &table, &mut restored);
        assert_eq!(restored[0], -224.0);
    }
}
