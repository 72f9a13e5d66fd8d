//! Lossless run-length coding of channel planes.
//!
//! Stream layout after the frame header: `(value, run - 1)` byte pairs over
//! the planes of channel 0, 1, ... concatenated in row-major order. Runs are
//! capped at 256 samples and may cross row and channel boundaries.

use crate::cancel::CancellationToken;
use crate::codec::PixelCodec;
use crate::error::{CompressionError, Result};
use crate::parameters::CompressionMethod;
use crate::pixel_buffer::{Dimensions, PixelBuffer};
use crate::stream::{StreamReader, StreamWriter};

const MAX_RUN: usize = 256;
// Run pairs decoded between cancellation checks.
const CHECK_INTERVAL: usize = 1 << 12;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RleCodec;

impl PixelCodec for RleCodec {
    fn method(&self) -> CompressionMethod {
        CompressionMethod::Rle
    }

    fn validate_parameters(&self, _dims: Dimensions) -> Result<()> {
        Ok(())
    }

    fn encode(&self, buffer: &PixelBuffer, cancel: &CancellationToken) -> Result<Vec<u8>> {
        buffer.validate()?;
        let mut stream = StreamWriter::new();
        stream.write_frame_header(buffer.dimensions());

        let mut current: Option<(u8, usize)> = None;
        for plane in buffer.planes() {
            cancel.check()?;
            for sample in plane {
                current = match current {
                    Some((value, run)) if value == sample && run < MAX_RUN => Some((value, run + 1)),
                    Some((value, run)) => {
                        stream.write_bytes(&[value, (run - 1) as u8]);
                        Some((sample, 1))
                    }
                    None => Some((sample, 1)),
                };
            }
        }
        if let Some((value, run)) = current {
            stream.write_bytes(&[value, (run - 1) as u8]);
        }
        Ok(stream.finish())
    }

    fn decode(&self, data: &[u8], cancel: &CancellationToken) -> Result<PixelBuffer> {
        let mut stream = StreamReader::new(data);
        let dims = stream.read_frame_header()?;
        let total = dims.sample_count();
        let capacity = (stream.remaining().len() / 2).saturating_mul(MAX_RUN);
        if total > capacity {
            return Err(CompressionError::DecodeFailure(format!(
                "{} payload byte(s) cannot hold {total} samples",
                stream.remaining().len()
            )));
        }

        let mut planar = Vec::with_capacity(total);
        let mut pairs = 0usize;
        while planar.len() < total {
            if pairs % CHECK_INTERVAL == 0 {
                cancel.check()?;
            }
            pairs += 1;
            let value = stream.read_byte()?;
            let run = stream.read_byte()? as usize + 1;
            if planar.len() + run > total {
                return Err(CompressionError::DecodeFailure(format!(
                    "run of {run} overshoots the {total} sample frame"
                )));
            }
            planar.resize(planar.len() + run, value);
        }
        stream.expect_end()?;

        let plane_len = dims.pixel_count();
        let planes: Vec<Vec<u8>> = planar.chunks(plane_len).map(<[u8]>::to_vec).collect();
        PixelBuffer::from_planes(dims.width, dims.height, &planes)
    }
}
