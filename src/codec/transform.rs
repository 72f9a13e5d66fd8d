//! Orthonormal 8x8 type-II discrete cosine transform.

use std::f32::consts::PI;
use std::sync::OnceLock;

use crate::constants::{BLOCK_DIM, BLOCK_SIZE};

/// Zigzag scan pattern for 8x8 blocks.
#[rustfmt::skip]
pub const ZIGZAG_ORDER: [usize; BLOCK_DIM] = [
     0,  1,  8, 16,  9,  2,  3, 10,
    17, 24, 32, 25, 18, 11,  4,  5,
    12, 19, 26, 33, 40, 48, 41, 34,
    27, 20, 13,  6,  7, 14, 21, 28,
    35, 42, 49, 56, 57, 50, 43, 36,
    29, 22, 15, 23, 30, 37, 44, 51,
    58, 59, 52, 45, 38, 31, 39, 46,
    53, 60, 61, 54, 47, 55, 62, 63,
];

// basis[u][x] = 0.5 * c(u) * cos((2x + 1) * u * pi / 16)
fn basis() -> &'static [[f32; BLOCK_SIZE]; BLOCK_SIZE] {
    static BASIS: OnceLock<[[f32; BLOCK_SIZE]; BLOCK_SIZE]> = OnceLock::new();
    BASIS.get_or_init(|| {
        let mut table = [[0.0f32; BLOCK_SIZE]; BLOCK_SIZE];
        for (u, row) in table.iter_mut().enumerate() {
            let cu = if u == 0 { 1.0 / 2.0f32.sqrt() } else { 1.0 };
            for (x, value) in row.iter_mut().enumerate() {
                *value = 0.5 * cu * ((((2 * x + 1) * u) as f32 * PI) / 16.0).cos();
            }
        }
        table
    })
}

/// Forward DCT of a row-major block; `output[u * 8 + v]` is the coefficient
/// for vertical frequency `u` and horizontal frequency `v`.
pub fn fdct_8x8(input: &[f32; BLOCK_DIM], output: &mut [f32; BLOCK_DIM]) {
    let c = basis();
    let mut rows = [0.0f32; BLOCK_DIM];
    for y in 0..BLOCK_SIZE {
        for v in 0..BLOCK_SIZE {
            let mut sum = 0.0f32;
            for x in 0..BLOCK_SIZE {
                sum += c[v][x] * input[y * BLOCK_SIZE + x];
            }
            rows[y * BLOCK_SIZE + v] = sum;
        }
    }
    for u in 0..BLOCK_SIZE {
        for v in 0..BLOCK_SIZE {
            let mut sum = 0.0f32;
            for y in 0..BLOCK_SIZE {
                sum += c[u][y] * rows[y * BLOCK_SIZE + v];
            }
            output[u * BLOCK_SIZE + v] = sum;
        }
    }
}

pub fn idct_8x8(input: &[f32; BLOCK_DIM], output: &mut [f32; BLOCK_DIM]) {
    let c = basis();
    let mut cols = [0.0f32; BLOCK_DIM];
    for y in 0..BLOCK_SIZE {
        for v in 0..BLOCK_SIZE {
            let mut sum = 0.0f32;
            for u in 0..BLOCK_SIZE {
                sum += c[u][y] * input[u * BLOCK_SIZE + v];
            }
            cols[y * BLOCK_SIZE + v] = sum;
        }
    }
    for y in 0..BLOCK_SIZE {
        for x in 0..BLOCK_SIZE {
            let mut sum = 0.0f32;
            for v in 0..BLOCK_SIZE {
                sum += c[v][x] * cols[y * BLOCK_SIZE + v];
            }
            output[y * BLOCK_SIZE + x] = sum;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fdct_idct_dc_only() {
        let input = [-128.0f32; BLOCK_DIM];
        let mut dct_coeffs = [0.0f32; BLOCK_DIM];
        fdct_8x8(&input, &mut dct_coeffs);
        assert!((dct_coeffs[0] + 1024.0).abs() < 0.01, "DC = {}", dct_coeffs[0]);
        assert!(dct_coeffs[1..].iter().all(|c| c.abs() < 0.01));

        let mut output = [0.0f32; BLOCK_DIM];
        idct_8x8(&dct_coeffs, &mut output);
        for i in 0..BLOCK_DIM {
            assert!((input[i] - output[i]).abs() < 0.01, "Mismatch at {}: {} vs {}", i, input[i], output[i]);
        }
    }

    #[test]
    fn test_fdct_idct_roundtrip_textured_block() {
        let mut input = [0.0f32; BLOCK_DIM];
        for (i, value) in input.iter_mut().enumerate() {
            *value = ((i * 37) % 256) as f32 - 128.0;
        }
        let mut coeffs = [0.0f32; BLOCK_DIM];
        let mut output = [0.0f32; BLOCK_DIM];
        fdct_8x8(&input, &mut coeffs);
        idct_8x8(&coeffs, &mut output);
        for i in 0..BLOCK_DIM {
            assert!((input[i] - output[i]).abs() < 0.05);
        }
    }

    #[test]
    fn test_horizontal_ramp_has_no_vertical_frequencies() {
        let mut input = [0.0f32; BLOCK_DIM];
        for y in 0..BLOCK_SIZE {
            for x in 0..BLOCK_SIZE {
                input[y * BLOCK_SIZE + x] = x as f32 * 10.0;
            }
        }
        let mut coeffs = [0.0f32; BLOCK_DIM];
        fdct_8x8(&input, &mut coeffs);
        for u in 1..BLOCK_SIZE {
            for v in 0..BLOCK_SIZE {
                assert!(coeffs[u * BLOCK_SIZE + v].abs() < 0.01);
            }
        }
        assert!(coeffs[1].abs() > 1.0);
    }

    #[test]
    fn test_zigzag_is_permutation() {
        let mut seen = [false; BLOCK_DIM];
        for &i in &ZIGZAG_ORDER {
            seen[i] = true;
        }
        assert!(seen.iter().all(|&s| s));
    }
}
