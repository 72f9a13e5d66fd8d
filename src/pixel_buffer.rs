//! Uniform 8-bit pixel buffer consumed and produced by every codec.

use std::fmt;

use crate::constants::{GRAYSCALE_CHANNELS, RGB_CHANNELS};
use crate::error::{CompressionError, Result};

/// Width, height and channel count of an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
    pub channels: u8,
}

impl Dimensions {
    pub fn new(width: u32, height: u32, channels: u8) -> Result<Self> {
        let dims = Self {
            width,
            height,
            channels,
        };
        if width == 0
            || height == 0
            || (channels != GRAYSCALE_CHANNELS && channels != RGB_CHANNELS)
            || dims.checked_sample_count().is_none()
        {
            return Err(CompressionError::InvalidDimensions {
                width,
                height,
                channels,
            });
        }
        Ok(dims)
    }

    fn checked_sample_count(&self) -> Option<usize> {
        (self.width as usize)
            .checked_mul(self.height as usize)?
            .checked_mul(self.channels as usize)
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn sample_count(&self) -> usize {
        self.pixel_count() * self.channels as usize
    }

    /// Shorter side of the image, the largest rank a channel matrix can carry.
    pub fn min_side(&self) -> u32 {
        self.width.min(self.height)
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}x{}", self.width, self.height, self.channels)
    }
}

/// Row-major interleaved samples: `samples[(y * width + x) * channels + c]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    dims: Dimensions,
    samples: Vec<u8>,
}

impl PixelBuffer {
    pub fn new(width: u32, height: u32, channels: u8, samples: Vec<u8>) -> Result<Self> {
        Self::from_dimensions(Dimensions::new(width, height, channels)?, samples)
    }

    pub fn from_dimensions(dims: Dimensions, samples: Vec<u8>) -> Result<Self> {
        if samples.len() != dims.sample_count() {
            return Err(CompressionError::InvalidBuffer {
                expected: dims.sample_count(),
                actual: samples.len(),
            });
        }
        Ok(Self { dims, samples })
    }

    /// Builds an interleaved buffer from one plane per channel.
    pub fn from_planes(width: u32, height: u32, planes: &[Vec<u8>]) -> Result<Self> {
        let channels = u8::try_from(planes.len()).map_err(|_| CompressionError::InvalidDimensions {
            width,
            height,
            channels: u8::MAX,
        })?;
        let dims = Dimensions::new(width, height, channels)?;
        let pixel_count = dims.pixel_count();
        for plane in planes {
            if plane.len() != pixel_count {
                return Err(CompressionError::InvalidBuffer {
                    expected: pixel_count,
                    actual: plane.len(),
                });
            }
        }

        let mut samples = vec![0u8; dims.sample_count()];
        for (c, plane) in planes.iter().enumerate() {
            for (i, &value) in plane.iter().enumerate() {
                samples[i * planes.len() + c] = value;
            }
        }
        Ok(Self { dims, samples })
    }

    pub fn dimensions(&self) -> Dimensions {
        self.dims
    }

    pub fn width(&self) -> u32 {
        self.dims.width
    }

    pub fn height(&self) -> u32 {
        self.dims.height
    }

    pub fn channels(&self) -> u8 {
        self.dims.channels
    }

    pub fn samples(&self) -> &[u8] {
        &self.samples
    }

    pub fn byte_len(&self) -> usize {
        self.samples.len()
    }

    /// Re-checks the length invariant; codecs call this before touching samples.
    pub fn validate(&self) -> Result<()> {
        if self.samples.len() != self.dims.sample_count() {
            return Err(CompressionError::InvalidBuffer {
                expected: self.dims.sample_count(),
                actual: self.samples.len(),
            });
        }
        Ok(())
    }

    pub fn plane(&self, channel: usize) -> Vec<u8> {
        let channels = self.dims.channels as usize;
        self.samples
            .iter()
            .skip(channel)
            .step_by(channels)
            .copied()
            .collect()
    }

    pub fn planes(&self) -> Vec<Vec<u8>> {
        (0..self.dims.channels as usize).map(|c| self.plane(c)).collect()
    }

    /// Converts RGB to single-channel luma (ITU-R BT.601 weights). Grayscale input is returned as is.
    pub fn to_grayscale(&self) -> PixelBuffer {
        if self.dims.channels == GRAYSCALE_CHANNELS {
            return self.clone();
        }
        let samples = self
            .samples
            .chunks_exact(RGB_CHANNELS as usize)
            .map(|px| {
                let r = px[0] as f32;
                let g = px[1] as f32;
                let b = px[2] as f32;
                (0.299 * r + 0.587 * g + 0.114 * b).round().clamp(0.0, 255.0) as u8
            })
            .collect();
        PixelBuffer {
            dims: Dimensions {
                channels: GRAYSCALE_CHANNELS,
                ..self.dims
            },
            samples,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_length_mismatch() {
        let err = PixelBuffer::new(2, 2, 1, vec![0; 3]).unwrap_err();
        assert_eq!(
            err,
            CompressionError::InvalidBuffer {
                expected: 4,
                actual: 3
            }
        );
    }

    #[test]
    fn test_rejects_unsupported_channels() {
        assert!(matches!(
            PixelBuffer::new(2, 2, 2, vec![0; 8]),
            Err(CompressionError::InvalidDimensions { channels: 2, .. })
        ));
        assert!(PixelBuffer::new(0, 2, 1, vec![]).is_err());
    }

    #[test]
    fn test_planes_roundtrip() {
        let samples: Vec<u8> = (0..12).collect();
        let buffer = PixelBuffer::new(2, 2, 3, samples).unwrap();
        let planes = buffer.planes();
        assert_eq!(planes[0], vec![0, 3, 6, 9]);
        assert_eq!(planes[2], vec![2, 5, 8, 11]);

        let rebuilt = PixelBuffer::from_planes(2, 2, &planes).unwrap();
        assert_eq!(rebuilt, buffer);
    }

    #[test]
    fn test_grayscale_conversion() {
        let buffer = PixelBuffer::new(2, 1, 3, vec![255, 255, 255, 255, 0, 0]).unwrap();
        let gray = buffer.to_grayscale();
        assert_eq!(gray.channels(), 1);
        assert_eq!(gray.samples(), &[255, 76]);
    }
}
