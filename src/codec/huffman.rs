//! Lossless Huffman coding of the interleaved sample stream.
//!
//! Stream layout after the frame header: 16 varint code counts (lengths
//! 1..=16), the symbols in code order, then the bit-packed payload.

use crate::cancel::CancellationToken;
use crate::codec::PixelCodec;
use crate::constants::MAX_HUFFMAN_CODE_LENGTH;
use crate::entropy::{BitReader, BitWriter, HuffmanTable};
use crate::error::{CompressionError, Result};
use crate::parameters::CompressionMethod;
use crate::pixel_buffer::{Dimensions, PixelBuffer};
use crate::stream::{StreamReader, StreamWriter};

// Samples coded between cancellation checks.
const CHECK_INTERVAL: usize = 1 << 16;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HuffmanCodec;

impl PixelCodec for HuffmanCodec {
    fn method(&self) -> CompressionMethod {
        CompressionMethod::Huffman
    }

    fn validate_parameters(&self, _dims: Dimensions) -> Result<()> {
        Ok(())
    }

    fn encode(&self, buffer: &PixelBuffer, cancel: &CancellationToken) -> Result<Vec<u8>> {
        buffer.validate()?;
        let samples = buffer.samples();

        let mut frequencies = [0u64; 256];
        for &sample in samples {
            frequencies[sample as usize] += 1;
        }
        let table = HuffmanTable::from_frequencies(&frequencies)?;

        let mut stream = StreamWriter::new();
        stream.write_frame_header(buffer.dimensions());
        for &count in &table.counts {
            stream.write_varint(count as u64);
        }
        stream.write_bytes(&table.values);

        let mut bits = BitWriter::new();
        for chunk in samples.chunks(CHECK_INTERVAL) {
            cancel.check()?;
            for &sample in chunk {
                table.encode(sample, &mut bits)?;
            }
        }
        stream.write_bytes(&bits.finish());
        Ok(stream.finish())
    }

    fn decode(&self, data: &[u8], cancel: &CancellationToken) -> Result<PixelBuffer> {
        let mut stream = StreamReader::new(data);
        let dims = stream.read_frame_header()?;

        let mut counts = [0u16; MAX_HUFFMAN_CODE_LENGTH];
        for count in counts.iter_mut() {
            *count = u16::try_from(stream.read_varint()?)
                .map_err(|_| CompressionError::DecodeFailure("huffman code count overflow".into()))?;
        }
        let symbol_count: usize = counts.iter().map(|&c| c as usize).sum();
        if symbol_count > 256 {
            return Err(CompressionError::DecodeFailure(format!(
                "huffman table declares {symbol_count} symbols"
            )));
        }
        let values = stream.read_bytes(symbol_count)?;
        let table = HuffmanTable::from_counts(&counts, values)?;

        let payload = stream.remaining();
        let mut bits = BitReader::new(payload);
        let total = dims.sample_count();
        // Every code is at least one bit long.
        if total > payload.len().saturating_mul(8) {
            return Err(CompressionError::DecodeFailure(format!(
                "{} payload byte(s) cannot hold {total} samples",
                payload.len()
            )));
        }
        let mut samples = Vec::with_capacity(total);
        while samples.len() < total {
            cancel.check()?;
            let chunk_end = (samples.len() + CHECK_INTERVAL).min(total);
            while samples.len() < chunk_end {
                samples.push(table.decode(&mut bits)?);
            }
        }
        if bits.bytes_consumed() != payload.len() {
            return Err(CompressionError::DecodeFailure(format!(
                "{} trailing byte(s) after huffman payload",
                payload.len() - bits.bytes_consumed()
            )));
        }
        PixelBuffer::from_dimensions(dims, samples)
    }
}
