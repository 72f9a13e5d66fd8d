//! Lossy truncated-SVD codec.
//!
//! Every channel is treated as a `height x width` matrix and replaced by its
//! best rank-`k` approximation. Stream layout after the frame header:
//! `rank: varint`, then per channel the `k` singular values, the `k` left
//! singular vectors (`height` values each) and the `k` right singular vectors
//! (`width` values each), all `f32` little-endian.

use rayon::prelude::*;

use crate::cancel::CancellationToken;
use crate::codec::PixelCodec;
use crate::error::{CompressionError, Result};
use crate::linalg::{self, Matrix};
use crate::parameters::{CodecParameters, CompressionMethod};
use crate::pixel_buffer::{Dimensions, PixelBuffer};
use crate::stream::{StreamReader, StreamWriter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SvdCodec {
    pub rank: u32,
}

impl SvdCodec {
    pub fn new(rank: u32) -> Self {
        Self { rank }
    }
}

/// Rank-`k` factors of one channel.
struct LowRankFactors {
    singular_values: Vec<f32>,
    /// `k` columns of length `height`.
    left: Vec<f32>,
    /// `k` columns of length `width`.
    right: Vec<f32>,
}

impl LowRankFactors {
    fn from_svd(svd: &linalg::Svd) -> Self {
        Self {
            singular_values: svd.singular_values.iter().map(|&s| s as f32).collect(),
            left: svd.u.to_f32(),
            right: svd.v.to_f32(),
        }
    }

    fn reconstruct(&self, width: usize, height: usize) -> Vec<u8> {
        let rank = self.singular_values.len();
        let mut plane = Vec::with_capacity(width * height);
        for r in 0..height {
            for c in 0..width {
                let value: f64 = (0..rank)
                    .map(|j| {
                        self.left[j * height + r] as f64
                            * self.singular_values[j] as f64
                            * self.right[j * width + c] as f64
                    })
                    .sum();
                plane.push(value.round().clamp(0.0, 255.0) as u8);
            }
        }
        plane
    }
}

impl PixelCodec for SvdCodec {
    fn method(&self) -> CompressionMethod {
        CompressionMethod::Svd
    }

    fn validate_parameters(&self, dims: Dimensions) -> Result<()> {
        CodecParameters::Svd { rank: self.rank }.validate(dims)
    }

    fn encode(&self, buffer: &PixelBuffer, cancel: &CancellationToken) -> Result<Vec<u8>> {
        buffer.validate()?;
        let dims = buffer.dimensions();
        self.validate_parameters(dims)?;

        let width = dims.width as usize;
        let height = dims.height as usize;
        let rank = self.rank as usize;

        let factors = buffer
            .planes()
            .par_iter()
            .map(|plane| {
                let matrix = Matrix::from_row_major_u8(height, width, plane);
                let svd = linalg::truncated_svd(&matrix, rank, cancel)?;
                Ok(LowRankFactors::from_svd(&svd))
            })
            .collect::<Result<Vec<_>>>()?;
        log::trace!("svd kept {rank} of {} singular values per channel", dims.min_side());

        let mut stream = StreamWriter::new();
        stream.write_frame_header(dims);
        stream.write_varint(rank as u64);
        for channel in &factors {
            for &value in channel
                .singular_values
                .iter()
                .chain(&channel.left)
                .chain(&channel.right)
            {
                stream.write_f32(value);
            }
        }
        Ok(stream.finish())
    }

    fn decode(&self, data: &[u8], cancel: &CancellationToken) -> Result<PixelBuffer> {
        let mut stream = StreamReader::new(data);
        let dims = stream.read_frame_header()?;
        let rank = stream.read_varint_u32()?;
        if rank == 0 || rank > dims.min_side() {
            return Err(CompressionError::DecodeFailure(format!(
                "stored rank {rank} invalid for a {dims} frame"
            )));
        }

        let width = dims.width as usize;
        let height = dims.height as usize;
        let rank = rank as usize;
        let mut factors = Vec::with_capacity(dims.channels as usize);
        for _ in 0..dims.channels {
            factors.push(LowRankFactors {
                singular_values: stream.read_f32_vec(rank)?,
                left: stream.read_f32_vec(rank * height)?,
                right: stream.read_f32_vec(rank * width)?,
            });
        }
        stream.expect_end()?;
        cancel.check()?;

        let planes: Vec<Vec<u8>> = factors
            .par_iter()
            .map(|channel| channel.reconstruct(width, height))
            .collect();
        PixelBuffer::from_planes(dims.width, dims.height, &planes)
    }
}
