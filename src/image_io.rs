//! Bridge between image containers (PNG, JPEG, TIFF) and [`PixelBuffer`].

use std::io::Write;

use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder};

use crate::constants::{ALLOWED_UPLOAD_EXTENSIONS, GRAYSCALE_CHANNELS, RGB_CHANNELS};
use crate::error::{CompressionError, Result};
use crate::pixel_buffer::PixelBuffer;

/// Decodes a container into 8-bit grayscale or RGB samples. Alpha is dropped
/// and deeper samples are scaled down to 8 bits.
pub fn decode_image(bytes: &[u8]) -> Result<PixelBuffer> {
    let image = image::load_from_memory(bytes)
        .map_err(|e| CompressionError::ImageFormat(format!("image decode failed: {}", e)))?;
    if image.color().has_color() {
        let rgb = image.to_rgb8();
        let (width, height) = rgb.dimensions();
        PixelBuffer::new(width, height, RGB_CHANNELS, rgb.into_raw())
    } else {
        let luma = image.to_luma8();
        let (width, height) = luma.dimensions();
        PixelBuffer::new(width, height, GRAYSCALE_CHANNELS, luma.into_raw())
    }
}

pub fn encode_png(buffer: &PixelBuffer) -> Result<Vec<u8>> {
    let color = if buffer.channels() == GRAYSCALE_CHANNELS {
        ExtendedColorType::L8
    } else {
        ExtendedColorType::Rgb8
    };
    let mut out = Vec::new();
    PngEncoder::new(&mut out)
        .write_image(buffer.samples(), buffer.width(), buffer.height(), color)
        .map_err(|e| CompressionError::ImageFormat(format!("PNG encode failed: {}", e)))?;
    Ok(out)
}

/// Writes a binary PGM (grayscale) or PPM (RGB).
pub fn write_pnm<W: Write>(writer: &mut W, buffer: &PixelBuffer) -> std::io::Result<()> {
    let magic = if buffer.channels() == GRAYSCALE_CHANNELS {
        "P5"
    } else {
        "P6"
    };
    write!(writer, "{}\n{} {}\n255\n", magic, buffer.width(), buffer.height())?;
    writer.write_all(buffer.samples())
}

/// True when the file name carries one of the accepted image extensions.
pub fn is_supported_upload(filename: &str) -> bool {
    filename
        .rsplit_once('.')
        .map(|(_, ext)| {
            let ext = ext.to_ascii_lowercase();
            ALLOWED_UPLOAD_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_png_roundtrip_gray_and_rgb() {
        let gray = PixelBuffer::new(3, 2, 1, vec![0, 50, 100, 150, 200, 250]).unwrap();
        assert_eq!(decode_image(&encode_png(&gray).unwrap()).unwrap(), gray);

        let rgb = PixelBuffer::new(2, 1, 3, vec![255, 0, 0, 0, 128, 255]).unwrap();
        assert_eq!(decode_image(&encode_png(&rgb).unwrap()).unwrap(), rgb);
    }

    #[test]
    fn test_garbage_is_image_format_error() {
        assert!(matches!(
            decode_image(b"definitely not an image"),
            Err(CompressionError::ImageFormat(_))
        ));
    }

    #[test]
    fn test_upload_extensions() {
        assert!(is_supported_upload("scene.TIF"));
        assert!(is_supported_upload("a.b.jpeg"));
        assert!(!is_supported_upload("clip.mp4"));
        assert!(!is_supported_upload("noextension"));
    }

    #[test]
    fn test_pnm_header() {
        let gray = PixelBuffer::new(2, 1, 1, vec![1, 2]).unwrap();
        let mut out = Vec::new();
        write_pnm(&mut out, &gray).unwrap();
        assert_eq!(out, b"P5\n2 1\n255\n\x01\x02");
    }
}
