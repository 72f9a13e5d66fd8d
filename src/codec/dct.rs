//! Lossy block DCT codec in the style of baseline JPEG.
//!
//! Each channel is cut into 8x8 blocks (edge blocks padded by replicating the
//! last row/column), transformed, quantized with a quality-scaled table and
//! entropy coded: DC as a difference from the previous block of the same
//! channel, AC as zig-zag run/size symbols, both with the standard JPEG
//! luminance Huffman tables.
//!
//! Stream layout after the frame header: `quality: u8`, then the bit payload
//! for channel 0, 1, ... with blocks in row-major order.

use rayon::prelude::*;

use crate::cancel::CancellationToken;
use crate::codec::PixelCodec;
use crate::codec::quantization::{dequantize_block, quantize_block, scaled_quant_table};
use crate::codec::transform::{ZIGZAG_ORDER, fdct_8x8, idct_8x8};
use crate::constants::{BLOCK_DIM, BLOCK_SIZE, MAXIMUM_QUALITY, MINIMUM_QUALITY};
use crate::entropy::huffman_table::{decode_magnitude, magnitude_bits, magnitude_category};
use crate::entropy::{BitReader, BitWriter, HuffmanTable};
use crate::error::{CompressionError, Result};
use crate::parameters::{CodecParameters, CompressionMethod};
use crate::pixel_buffer::{Dimensions, PixelBuffer};
use crate::stream::{StreamReader, StreamWriter};

const END_OF_BLOCK: u8 = 0x00;
const ZERO_RUN: u8 = 0xF0;

type CoefficientBlock = [i16; BLOCK_DIM];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DctCodec {
    pub quality: u32,
}

impl DctCodec {
    pub fn new(quality: u32) -> Self {
        Self { quality }
    }
}

struct BlockGrid {
    width: usize,
    height: usize,
    blocks_w: usize,
    blocks_h: usize,
}

impl BlockGrid {
    fn new(dims: Dimensions) -> Self {
        let width = dims.width as usize;
        let height = dims.height as usize;
        Self {
            width,
            height,
            blocks_w: width.div_ceil(BLOCK_SIZE),
            blocks_h: height.div_ceil(BLOCK_SIZE),
        }
    }

    fn block_count(&self) -> usize {
        self.blocks_w * self.blocks_h
    }

    /// Level-shifted block with edge replication.
    fn extract(&self, plane: &[u8], block: usize) -> [f32; BLOCK_DIM] {
        let block_y = (block / self.blocks_w) * BLOCK_SIZE;
        let block_x = (block % self.blocks_w) * BLOCK_SIZE;
        let mut data = [0.0f32; BLOCK_DIM];
        for y in 0..BLOCK_SIZE {
            let py = (block_y + y).min(self.height - 1);
            for x in 0..BLOCK_SIZE {
                let px = (block_x + x).min(self.width - 1);
                data[y * BLOCK_SIZE + x] = plane[py * self.width + px] as f32 - 128.0;
            }
        }
        data
    }

    fn place(&self, plane: &mut [u8], block: usize, pixels: &[u8; BLOCK_DIM]) {
        let block_y = (block / self.blocks_w) * BLOCK_SIZE;
        let block_x = (block % self.blocks_w) * BLOCK_SIZE;
        for y in 0..BLOCK_SIZE.min(self.height - block_y) {
            let row = (block_y + y) * self.width;
            for x in 0..BLOCK_SIZE.min(self.width - block_x) {
                plane[row + block_x + x] = pixels[y * BLOCK_SIZE + x];
            }
        }
    }
}

struct EntropyTables {
    dc: HuffmanTable,
    ac: HuffmanTable,
}

impl EntropyTables {
    fn standard() -> Result<Self> {
        Ok(Self {
            dc: HuffmanTable::standard_luminance_dc()?,
            ac: HuffmanTable::standard_luminance_ac()?,
        })
    }

    fn encode_block(
        &self,
        coeffs: &CoefficientBlock,
        dc_previous: &mut i16,
        bits: &mut BitWriter,
    ) -> Result<()> {
        let mut zigzag = [0i16; BLOCK_DIM];
        for i in 0..BLOCK_DIM {
            zigzag[i] = coeffs[ZIGZAG_ORDER[i]];
        }

        // DC
        let diff = zigzag[0] - *dc_previous;
        *dc_previous = zigzag[0];
        let dc_category = magnitude_category(diff);
        self.dc.encode(dc_category, bits)?;
        let (dc_bits, dc_len) = magnitude_bits(diff, dc_category);
        bits.write_bits(dc_bits, dc_len);

        // AC
        let mut run = 0u8;
        for &value in &zigzag[1..] {
            if value == 0 {
                run += 1;
                continue;
            }
            while run > 15 {
                self.ac.encode(ZERO_RUN, bits)?;
                run -= 16;
            }
            let category = magnitude_category(value);
            self.ac.encode((run << 4) | category, bits)?;
            let (ac_bits, ac_len) = magnitude_bits(value, category);
            bits.write_bits(ac_bits, ac_len);
            run = 0;
        }
        if run > 0 {
            self.ac.encode(END_OF_BLOCK, bits)?;
        }
        Ok(())
    }

    fn decode_block(&self, dc_previous: &mut i16, bits: &mut BitReader) -> Result<CoefficientBlock> {
        let mut coeffs = [0i16; BLOCK_DIM];

        let dc_category = self.dc.decode(bits)?;
        if dc_category > 11 {
            return Err(CompressionError::DecodeFailure(format!(
                "DC category {dc_category} out of range"
            )));
        }
        let diff = decode_magnitude(bits.read_bits(dc_category)?, dc_category);
        let dc = *dc_previous as i32 + diff as i32;
        *dc_previous = i16::try_from(dc)
            .map_err(|_| CompressionError::DecodeFailure("DC coefficient overflow".into()))?;
        coeffs[0] = *dc_previous;

        let mut k = 1usize;
        while k < BLOCK_DIM {
            let symbol = self.ac.decode(bits)?;
            let run = (symbol >> 4) as usize;
            let size = symbol & 0x0F;
            if size == 0 {
                if symbol == ZERO_RUN {
                    k += 16;
                    continue;
                }
                break;
            }
            k += run;
            if k >= BLOCK_DIM {
                return Err(CompressionError::DecodeFailure(
                    "AC run overflows the block".into(),
                ));
            }
            coeffs[ZIGZAG_ORDER[k]] = decode_magnitude(bits.read_bits(size)?, size);
            k += 1;
        }
        if k > BLOCK_DIM {
            return Err(CompressionError::DecodeFailure(
                "zero run overflows the block".into(),
            ));
        }
        Ok(coeffs)
    }
}

fn transform_plane(plane: &[u8], grid: &BlockGrid, quant_table: &[u8; BLOCK_DIM]) -> Vec<CoefficientBlock> {
    (0..grid.block_count())
        .into_par_iter()
        .map(|block| {
            let samples = grid.extract(plane, block);
            let mut coeffs = [0.0f32; BLOCK_DIM];
            fdct_8x8(&samples, &mut coeffs);
            let mut levels = [0i16; BLOCK_DIM];
            quantize_block(&coeffs, quant_table, &mut levels);
            levels
        })
        .collect()
}

fn reconstruct_plane(blocks: &[CoefficientBlock], grid: &BlockGrid, quant_table: &[u8; BLOCK_DIM]) -> Vec<u8> {
    let pixels: Vec<[u8; BLOCK_DIM]> = blocks
        .par_iter()
        .map(|levels| {
            let mut coeffs = [0.0f32; BLOCK_DIM];
            dequantize_block(levels, quant_table, &mut coeffs);
            let mut samples = [0.0f32; BLOCK_DIM];
            idct_8x8(&coeffs, &mut samples);
            let mut out = [0u8; BLOCK_DIM];
            for (o, s) in out.iter_mut().zip(samples.iter()) {
                *o = (s + 128.0).round().clamp(0.0, 255.0) as u8;
            }
            out
        })
        .collect();

    let mut plane = vec![0u8; grid.width * grid.height];
    for (block, block_pixels) in pixels.iter().enumerate() {
        grid.place(&mut plane, block, block_pixels);
    }
    plane
}

impl PixelCodec for DctCodec {
    fn method(&self) -> CompressionMethod {
        CompressionMethod::Dct
    }

    fn validate_parameters(&self, dims: Dimensions) -> Result<()> {
        CodecParameters::Dct {
            quality: self.quality,
        }
        .validate(dims)
    }

    fn encode(&self, buffer: &PixelBuffer, cancel: &CancellationToken) -> Result<Vec<u8>> {
        buffer.validate()?;
        self.validate_parameters(buffer.dimensions())?;

        let grid = BlockGrid::new(buffer.dimensions());
        let quant_table = scaled_quant_table(self.quality);
        let tables = EntropyTables::standard()?;

        let mut stream = StreamWriter::new();
        stream.write_frame_header(buffer.dimensions());
        stream.write_byte(self.quality as u8);

        let mut bits = BitWriter::new();
        for plane in buffer.planes() {
            cancel.check()?;
            let blocks = transform_plane(&plane, &grid, &quant_table);
            let mut dc_previous = 0i16;
            for block in &blocks {
                tables.encode_block(block, &mut dc_previous, &mut bits)?;
            }
        }
        stream.write_bytes(&bits.finish());
        Ok(stream.finish())
    }

    fn decode(&self, data: &[u8], cancel: &CancellationToken) -> Result<PixelBuffer> {
        let mut stream = StreamReader::new(data);
        let dims = stream.read_frame_header()?;
        let quality = stream.read_byte()? as u32;
        if !(MINIMUM_QUALITY..=MAXIMUM_QUALITY).contains(&quality) {
            return Err(CompressionError::DecodeFailure(format!(
                "stored quality {quality} out of range"
            )));
        }

        let grid = BlockGrid::new(dims);
        let quant_table = scaled_quant_table(quality);
        let tables = EntropyTables::standard()?;

        let payload = stream.remaining();
        let mut bits = BitReader::new(payload);
        let mut planes = Vec::with_capacity(dims.channels as usize);
        for _ in 0..dims.channels {
            cancel.check()?;
            let mut dc_previous = 0i16;
            let mut blocks = Vec::with_capacity(grid.block_count());
            for _ in 0..grid.block_count() {
                blocks.push(tables.decode_block(&mut dc_previous, &mut bits)?);
            }
            planes.push(reconstruct_plane(&blocks, &grid, &quant_table));
        }
        if bits.bytes_consumed() != payload.len() {
            return Err(CompressionError::DecodeFailure(
                "trailing bytes after DCT payload".into(),
            ));
        }
        PixelBuffer::from_planes(dims.width, dims.height, &planes)
    }
}
