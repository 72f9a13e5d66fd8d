//! Quality metrics for codec evaluation.
//!
//! MSE and PSNR between an original and a reconstructed buffer, plus the
//! compression ratio derived from actual byte counts.

use serde::Serialize;

use crate::constants::{LOSSLESS_PSNR, MAX_SAMPLE_VALUE};
use crate::error::{CompressionError, Result};
use crate::pixel_buffer::PixelBuffer;

fn check_dimensions(original: &PixelBuffer, reconstructed: &PixelBuffer) -> Result<()> {
    if original.dimensions() != reconstructed.dimensions() {
        return Err(CompressionError::DimensionMismatch {
            expected: original.dimensions(),
            actual: reconstructed.dimensions(),
        });
    }
    Ok(())
}

fn squared_error_sum<'a>(pairs: impl Iterator<Item = (&'a u8, &'a u8)>) -> f64 {
    pairs
        .map(|(&x, &y)| {
            let diff = f64::from(x) - f64::from(y);
            diff * diff
        })
        .sum()
}

/// Mean squared error over every sample of every channel.
///
/// # Errors
///
/// Returns [`CompressionError::DimensionMismatch`] if the buffers differ in
/// width, height or channel count.
pub fn mse(original: &PixelBuffer, reconstructed: &PixelBuffer) -> Result<f64> {
    check_dimensions(original, reconstructed)?;
    let sum = squared_error_sum(original.samples().iter().zip(reconstructed.samples()));
    Ok(sum / original.byte_len() as f64)
}

/// MSE of each channel separately, in channel order.
pub fn channel_mse(original: &PixelBuffer, reconstructed: &PixelBuffer) -> Result<Vec<f64>> {
    check_dimensions(original, reconstructed)?;
    let channels = original.channels() as usize;
    let pixels = original.dimensions().pixel_count() as f64;
    Ok((0..channels)
        .map(|c| {
            let a = original.samples().iter().skip(c).step_by(channels);
            let b = reconstructed.samples().iter().skip(c).step_by(channels);
            squared_error_sum(a.zip(b)) / pixels
        })
        .collect())
}

/// `10 * log10(255^2 / mse)`; infinite when `mse` is zero.
pub fn psnr_from_mse(mse: f64) -> f64 {
    if mse == 0.0 {
        return LOSSLESS_PSNR;
    }
    let peak = f64::from(MAX_SAMPLE_VALUE);
    10.0 * (peak * peak / mse).log10()
}

/// Peak signal-to-noise ratio in dB.
///
/// Returns `f64::INFINITY` when the buffers are identical, never `NaN`.
///
/// # Example
///
/// ```
/// use satcomp_rs::metrics::psnr;
/// use satcomp_rs::PixelBuffer;
///
/// let original = PixelBuffer::new(3, 1, 1, vec![100, 150, 200]).unwrap();
/// let decoded = PixelBuffer::new(3, 1, 1, vec![101, 149, 198]).unwrap();
/// assert!(psnr(&original, &decoded).unwrap() > 30.0);
/// ```
pub fn psnr(original: &PixelBuffer, reconstructed: &PixelBuffer) -> Result<f64> {
    Ok(psnr_from_mse(mse(original, reconstructed)?))
}

/// `original / encoded`, from real byte counts only.
pub fn compression_ratio(original_bytes: usize, encoded_bytes: usize) -> f64 {
    if encoded_bytes == 0 {
        return f64::INFINITY;
    }
    original_bytes as f64 / encoded_bytes as f64
}

/// All reconstruction metrics of one round trip.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualityMetrics {
    pub mse: f64,
    pub channel_mse: Vec<f64>,
    pub psnr_db: f64,
}

impl QualityMetrics {
    pub fn measure(original: &PixelBuffer, reconstructed: &PixelBuffer) -> Result<Self> {
        let mse = mse(original, reconstructed)?;
        Ok(Self {
            mse,
            channel_mse: channel_mse(original, reconstructed)?,
            psnr_db: psnr_from_mse(mse),
        })
    }

    pub fn is_lossless(&self) -> bool {
        self.mse == 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gray(samples: &[u8]) -> PixelBuffer {
        PixelBuffer::new(samples.len() as u32, 1, 1, samples.to_vec()).unwrap()
    }

    #[test]
    fn test_psnr_identical() {
        let buf = gray(&[10, 20, 30, 40]);
        let db = psnr(&buf, &buf).unwrap();
        assert!(db.is_infinite() && db > 0.0);
    }

    #[test]
    fn test_psnr_known_value() {
        // MSE = 1.0 -> PSNR = 10 * log10(65025) ~ 48.13
        let db = psnr(&gray(&[100]), &gray(&[101])).unwrap();
        assert!((db - 48.13).abs() < 0.1, "PSNR = {db}");
    }

    #[test]
    fn test_mse_known_value() {
        // (9 + 16) / 2
        assert!((mse(&gray(&[0, 0]), &gray(&[3, 4])).unwrap() - 12.5).abs() < 1e-10);
    }

    #[test]
    fn test_dimension_mismatch() {
        let a = gray(&[1, 2, 3, 4]);
        let b = PixelBuffer::new(2, 2, 1, vec![1, 2, 3, 4]).unwrap();
        assert!(matches!(
            psnr(&a, &b),
            Err(CompressionError::DimensionMismatch { .. })
        ));
        let rgb = PixelBuffer::new(4, 1, 3, vec![0; 12]).unwrap();
        assert!(mse(&a, &rgb).is_err());
    }

    #[test]
    fn test_psnr_symmetry() {
        let a = gray(&[10, 20, 30]);
        let b = gray(&[15, 25, 35]);
        assert!((psnr(&a, &b).unwrap() - psnr(&b, &a).unwrap()).abs() < f64::EPSILON);
    }

    #[test]
    fn test_channel_mse() {
        let a = PixelBuffer::new(2, 1, 3, vec![0, 0, 0, 0, 0, 0]).unwrap();
        let b = PixelBuffer::new(2, 1, 3, vec![2, 0, 0, 2, 0, 4]).unwrap();
        assert_eq!(channel_mse(&a, &b).unwrap(), vec![4.0, 0.0, 8.0]);
        let metrics = QualityMetrics::measure(&a, &b).unwrap();
        assert!((metrics.mse - 4.0).abs() < 1e-12);
        assert!(!metrics.is_lossless());
    }

    #[test]
    fn test_compression_ratio() {
        assert_eq!(compression_ratio(1000, 250), 4.0);
        assert_eq!(compression_ratio(16, 32), 0.5);
    }
}
