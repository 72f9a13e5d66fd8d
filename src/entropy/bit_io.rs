//! MSB-first bit packing for entropy-coded payloads.

use crate::error::{CompressionError, Result};

/// Packs bits into a growable byte vector.
#[derive(Debug, Default)]
pub struct BitWriter {
    data: Vec<u8>,
    bit_buffer: u32,
    bits_in_buffer: u32,
}

impl BitWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes the low `length` bits of `value`, most significant first. `length` <= 16.
    pub fn write_bits(&mut self, value: u16, length: u8) {
        if length == 0 {
            return;
        }
        let length = length as u32;
        let mask = (1u32 << length) - 1;
        self.bit_buffer = (self.bit_buffer << length) | (value as u32 & mask);
        self.bits_in_buffer += length;

        while self.bits_in_buffer >= 8 {
            let shift = self.bits_in_buffer - 8;
            self.data.push(((self.bit_buffer >> shift) & 0xFF) as u8);
            self.bits_in_buffer = shift;
            self.bit_buffer &= (1u32 << shift) - 1;
        }
    }

    /// Pads the final partial byte with ones and returns the packed bytes.
    pub fn finish(mut self) -> Vec<u8> {
        if self.bits_in_buffer > 0 {
            let pad_bits = 8 - self.bits_in_buffer;
            let value = (1u32 << pad_bits) - 1;
            self.write_bits(value as u16, pad_bits as u8);
        }
        self.data
    }
}

pub struct BitReader<'a> {
    source: &'a [u8],
    position: usize,
    bit_buffer: u32,
    bits_in_buffer: u32,
}

impl<'a> BitReader<'a> {
    pub fn new(source: &'a [u8]) -> Self {
        Self {
            source,
            position: 0,
            bit_buffer: 0,
            bits_in_buffer: 0,
        }
    }

    pub fn read_bits(&mut self, count: u8) -> Result<u16> {
        if count == 0 {
            return Ok(0);
        }
        let count = count as u32;
        while self.bits_in_buffer < count {
            let byte = *self
                .source
                .get(self.position)
                .ok_or_else(|| CompressionError::truncated("bit payload"))?;
            self.position += 1;
            self.bit_buffer = (self.bit_buffer << 8) | byte as u32;
            self.bits_in_buffer += 8;
        }

        let shift = self.bits_in_buffer - count;
        let value = (self.bit_buffer >> shift) & ((1 << count) - 1);
        self.bits_in_buffer -= count;
        self.bit_buffer &= (1u32 << self.bits_in_buffer) - 1;
        Ok(value as u16)
    }

    pub fn read_bit(&mut self) -> Result<u16> {
        self.read_bits(1)
    }

    /// Number of whole bytes pulled from the source so far.
    pub fn bytes_consumed(&self) -> usize {
        self.position
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bit_writer_reader_roundtrip() {
        let mut writer = BitWriter::new();
        writer.write_bits(0x01, 2);
        writer.write_bits(0xFF, 8);
        writer.write_bits(0x0A, 4);
        writer.write_bits(0xBEEF, 16);
        let buffer = writer.finish();
        assert_eq!(buffer.len(), 4);

        let mut reader = BitReader::new(&buffer);
        assert_eq!(reader.read_bits(2).unwrap(), 0x01);
        assert_eq!(reader.read_bits(8).unwrap(), 0xFF);
        assert_eq!(reader.read_bits(4).unwrap(), 0x0A);
        assert_eq!(reader.read_bits(16).unwrap(), 0xBEEF);
        // Padding bits are ones.
        assert_eq!(reader.read_bits(2).unwrap(), 0b11);
        assert!(reader.read_bits(1).is_err());
    }
}
