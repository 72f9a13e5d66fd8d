//! Lossy principal component codec.
//!
//! Each image row of a channel is one observation of `width` features. The
//! rows are centred, projected onto the leading `k` eigenvectors of their
//! covariance (only those `k` are computed) and stored as scores. Stream layout after the frame header:
//! `components: varint`, then per channel the `width` column means, the `k`
//! basis vectors (`width` values each) and the `k` score vectors (`height`
//! values each), all `f32` little-endian.

use rayon::prelude::*;

use crate::cancel::CancellationToken;
use crate::codec::PixelCodec;
use crate::error::{CompressionError, Result};
use crate::linalg::{self, Matrix};
use crate::parameters::{CodecParameters, CompressionMethod, max_pca_components};
use crate::pixel_buffer::{Dimensions, PixelBuffer};
use crate::stream::{StreamReader, StreamWriter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PcaCodec {
    pub components: u32,
}

impl PcaCodec {
    pub fn new(components: u32) -> Self {
        Self { components }
    }
}

struct Projection {
    means: Vec<f32>,
    /// `k` columns of length `width`.
    basis: Vec<f32>,
    /// `k` columns of length `height`.
    scores: Vec<f32>,
}

impl Projection {
    fn fit(
        plane: &[u8],
        width: usize,
        height: usize,
        components: usize,
        cancel: &CancellationToken,
    ) -> Result<Self> {
        let mut means = vec![0.0f64; width];
        for row in plane.chunks(width) {
            for (mean, &x) in means.iter_mut().zip(row) {
                *mean += x as f64;
            }
        }
        for mean in &mut means {
            *mean /= height as f64;
        }

        let mut centred = Matrix::zeros(height, width);
        for r in 0..height {
            for c in 0..width {
                centred.set(r, c, plane[r * width + c] as f64 - means[c]);
            }
        }

        // The scatter matrix X^T X shares its eigenvectors with the covariance.
        let scatter = centred.transpose_multiply(&centred);
        let axes = linalg::leading_eigen(&scatter, components, cancel)?.eigenvectors;
        let scores = centred.multiply(&axes);

        Ok(Self {
            means: means.into_iter().map(|m| m as f32).collect(),
            basis: axes.to_f32(),
            scores: scores.to_f32(),
        })
    }

    fn reconstruct(&self, width: usize, height: usize) -> Vec<u8> {
        let components = self.basis.len() / width;
        let mut plane = Vec::with_capacity(width * height);
        for r in 0..height {
            for c in 0..width {
                let value = self.means[c] as f64
                    + (0..components)
                        .map(|k| self.scores[k * height + r] as f64 * self.basis[k * width + c] as f64)
                        .sum::<f64>();
                plane.push(value.round().clamp(0.0, 255.0) as u8);
            }
        }
        plane
    }
}

impl PixelCodec for PcaCodec {
    fn method(&self) -> CompressionMethod {
        CompressionMethod::Pca
    }

    fn validate_parameters(&self, dims: Dimensions) -> Result<()> {
        CodecParameters::Pca {
            components: self.components,
        }
        .validate(dims)
    }

    fn encode(&self, buffer: &PixelBuffer, cancel: &CancellationToken) -> Result<Vec<u8>> {
        buffer.validate()?;
        let dims = buffer.dimensions();
        self.validate_parameters(dims)?;

        let width = dims.width as usize;
        let height = dims.height as usize;
        let components = self.components as usize;

        let projections = buffer
            .planes()
            .par_iter()
            .map(|plane| Projection::fit(plane, width, height, components, cancel))
            .collect::<Result<Vec<_>>>()?;

        let mut stream = StreamWriter::new();
        stream.write_frame_header(dims);
        stream.write_varint(components as u64);
        for projection in &projections {
            for &value in projection
                .means
                .iter()
                .chain(&projection.basis)
                .chain(&projection.scores)
            {
                stream.write_f32(value);
            }
        }
        Ok(stream.finish())
    }

    fn decode(&self, data: &[u8], cancel: &CancellationToken) -> Result<PixelBuffer> {
        let mut stream = StreamReader::new(data);
        let dims = stream.read_frame_header()?;
        let components = stream.read_varint_u32()?;
        if components == 0 || components > max_pca_components(dims) {
            return Err(CompressionError::DecodeFailure(format!(
                "stored component count {components} invalid for a {dims} frame"
            )));
        }

        let width = dims.width as usize;
        let height = dims.height as usize;
        let components = components as usize;
        let mut projections = Vec::with_capacity(dims.channels as usize);
        for _ in 0..dims.channels {
            projections.push(Projection {
                means: stream.read_f32_vec(width)?,
                basis: stream.read_f32_vec(components * width)?,
                scores: stream.read_f32_vec(components * height)?,
            });
        }
        stream.expect_end()?;
        cancel.check()?;

        let planes: Vec<Vec<u8>> = projections
            .par_iter()
            .map(|projection| projection.reconstruct(width, height))
            .collect();
        PixelBuffer::from_planes(dims.width, dims.height, &planes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics;

    fn textured(width: u32, height: u32, channels: u8) -> PixelBuffer {
        let mut samples = Vec::new();
        for y in 0..height {
            for x in 0..width {
                for c in 0..channels as u32 {
                    samples.push(((x * 11 + y * 5 + c * 29 + x * y * 3) % 256) as u8);
                }
            }
        }
        PixelBuffer::new(width, height, channels, samples).unwrap()
    }

    #[test]
    fn test_all_components_reproduce_image() {
        let cancel = CancellationToken::new();
        let buffer = textured(6, 9, 3);
        let codec = PcaCodec::new(6);
        let decoded = codec.decode(&codec.encode(&buffer, &cancel).unwrap(), &cancel).unwrap();
        for (&a, &b) in buffer.samples().iter().zip(decoded.samples()) {
            assert!((a as i32 - b as i32).abs() <= 1, "{a} vs {b}");
        }
    }

    #[test]
    fn test_identical_rows_need_no_components() {
        let cancel = CancellationToken::new();
        let row: Vec<u8> = (0..10).map(|x| x * 20).collect();
        let samples = row.repeat(7);
        let buffer = PixelBuffer::new(10, 7, 1, samples).unwrap();
        let codec = PcaCodec::new(1);
        let decoded = codec.decode(&codec.encode(&buffer, &cancel).unwrap(), &cancel).unwrap();
        assert_eq!(decoded, buffer);
    }

    #[test]
    fn test_more_components_improve_quality() {
        let cancel = CancellationToken::new();
        let buffer = textured(12, 12, 1);
        let psnr = |k: u32| {
            let codec = PcaCodec::new(k);
            let decoded = codec.decode(&codec.encode(&buffer, &cancel).unwrap(), &cancel).unwrap();
            metrics::psnr(&buffer, &decoded).unwrap()
        };
        assert!(psnr(8) > psnr(2));
    }

    #[test]
    fn test_components_checked_against_width() {
        let cancel = CancellationToken::new();
        let buffer = textured(4, 9, 1);
        assert!(matches!(
            PcaCodec::new(5).encode(&buffer, &cancel),
            Err(CompressionError::InvalidParameter { name: "components", max: 4, .. })
        ));
        assert!(PcaCodec::new(0).encode(&buffer, &cancel).is_err());
    }
}
