//! Byte-level framing shared by all codec streams.
//!
//! Every stream opens with a frame header (`width` and `height` as LEB128
//! varints, then a channel byte) so a decoder needs nothing but the bytes and
//! the method tag to rebuild the image.

use std::io::Cursor;

use byteorder::{LittleEndian, ReadBytesExt};

use crate::constants::MAX_FRAME_SAMPLES;
use crate::error::{CompressionError, Result};
use crate::pixel_buffer::Dimensions;

/// Append-only writer for codec streams.
#[derive(Debug, Default)]
pub struct StreamWriter {
    data: Vec<u8>,
}

impl StreamWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_byte(&mut self, value: u8) {
        self.data.push(value);
    }

    pub fn write_bytes(&mut self, values: &[u8]) {
        self.data.extend_from_slice(values);
    }

    pub fn write_varint(&mut self, mut value: u64) {
        loop {
            let byte = (value & 0x7F) as u8;
            value >>= 7;
            if value == 0 {
                self.data.push(byte);
                return;
            }
            self.data.push(byte | 0x80);
        }
    }

    pub fn write_f32(&mut self, value: f32) {
        self.data.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_frame_header(&mut self, dims: Dimensions) {
        self.write_varint(dims.width as u64);
        self.write_varint(dims.height as u64);
        self.write_byte(dims.channels);
    }

    pub fn finish(self) -> Vec<u8> {
        self.data
    }
}

/// Bounds-checked reader; running off the end is a [`CompressionError::DecodeFailure`].
pub struct StreamReader<'a> {
    cursor: Cursor<&'a [u8]>,
}

impl<'a> StreamReader<'a> {
    pub fn new(source: &'a [u8]) -> Self {
        Self {
            cursor: Cursor::new(source),
        }
    }

    pub fn position(&self) -> usize {
        self.cursor.position() as usize
    }

    pub fn remaining(&self) -> &'a [u8] {
        let source = *self.cursor.get_ref();
        &source[self.position().min(source.len())..]
    }

    pub fn read_byte(&mut self) -> Result<u8> {
        self.cursor
            .read_u8()
            .map_err(|_| CompressionError::truncated("stream"))
    }

    pub fn read_bytes(&mut self, count: usize) -> Result<&'a [u8]> {
        let rest = self.remaining();
        if rest.len() < count {
            return Err(CompressionError::truncated("stream"));
        }
        self.cursor.set_position((self.position() + count) as u64);
        Ok(&rest[..count])
    }

    pub fn read_varint(&mut self) -> Result<u64> {
        let mut value = 0u64;
        for shift in (0..64).step_by(7) {
            let byte = self.read_byte()?;
            value |= ((byte & 0x7F) as u64) << shift;
            if byte & 0x80 == 0 {
                return Ok(value);
            }
        }
        Err(CompressionError::DecodeFailure("varint overflow".into()))
    }

    pub fn read_varint_u32(&mut self) -> Result<u32> {
        let value = self.read_varint()?;
        u32::try_from(value)
            .map_err(|_| CompressionError::DecodeFailure(format!("value {value} exceeds 32 bits")))
    }

    pub fn read_f32(&mut self) -> Result<f32> {
        self.cursor
            .read_f32::<LittleEndian>()
            .map_err(|_| CompressionError::truncated("floating point block"))
    }

    pub fn read_f32_vec(&mut self, count: usize) -> Result<Vec<f32>> {
        if self.remaining().len() / 4 < count {
            return Err(CompressionError::truncated("floating point block"));
        }
        (0..count).map(|_| self.read_f32()).collect()
    }

    pub fn read_frame_header(&mut self) -> Result<Dimensions> {
        let width = self.read_varint_u32()?;
        let height = self.read_varint_u32()?;
        let channels = self.read_byte()?;
        let dims = Dimensions::new(width, height, channels).map_err(|_| {
            CompressionError::DecodeFailure(format!(
                "invalid frame header {width}x{height}x{channels}"
            ))
        })?;
        if dims.sample_count() > MAX_FRAME_SAMPLES {
            return Err(CompressionError::DecodeFailure(format!(
                "frame {dims} exceeds the sample limit"
            )));
        }
        Ok(dims)
    }

    /// Fails unless every byte has been consumed.
    pub fn expect_end(&self) -> Result<()> {
        let trailing = self.remaining().len();
        if trailing != 0 {
            return Err(CompressionError::DecodeFailure(format!(
                "{trailing} trailing byte(s) after payload"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_varint_boundaries() {
        let mut writer = StreamWriter::new();
        for value in [0u64, 127, 128, 16_383, 16_384, u32::MAX as u64] {
            writer.write_varint(value);
        }
        let data = writer.finish();
        assert_eq!(&data[..3], &[0x00, 0x7F, 0x80]);

        let mut reader = StreamReader::new(&data);
        for value in [0u64, 127, 128, 16_383, 16_384, u32::MAX as u64] {
            assert_eq!(reader.read_varint().unwrap(), value);
        }
        assert!(reader.expect_end().is_ok());
    }

    #[test]
    fn test_frame_header_is_compact() {
        let mut writer = StreamWriter::new();
        writer.write_frame_header(Dimensions::new(4, 4, 1).unwrap());
        assert_eq!(writer.finish(), vec![4, 4, 1]);
    }

    #[test]
    fn test_rejects_bad_frame_header() {
        let mut reader = StreamReader::new(&[4, 0, 1]);
        assert!(matches!(
            reader.read_frame_header(),
            Err(CompressionError::DecodeFailure(_))
        ));

        let mut reader = StreamReader::new(&[4, 4]);
        assert!(matches!(
            reader.read_frame_header(),
            Err(CompressionError::DecodeFailure(_))
        ));
    }

    #[test]
    fn test_read_bytes_bounds() {
        let mut reader = StreamReader::new(&[1, 2, 3]);
        assert_eq!(reader.read_bytes(2).unwrap(), &[1, 2]);
        assert!(reader.read_bytes(2).is_err());
        assert_eq!(reader.read_byte().unwrap(), 3);
    }

    #[test]
    fn test_f32_is_little_endian() {
        let mut writer = StreamWriter::new();
        writer.write_f32(1.0);
        writer.write_f32(-2.5);
        let data = writer.finish();
        assert_eq!(&data[..4], &[0x00, 0x00, 0x80, 0x3F]);

        let mut reader = StreamReader::new(&data);
        assert_eq!(reader.read_f32_vec(2).unwrap(), vec![1.0, -2.5]);
        assert!(reader.read_f32().is_err());
    }
}
