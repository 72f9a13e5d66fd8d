use thiserror::Error;

use crate::parameters::CompressionMethod;
use crate::pixel_buffer::Dimensions;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CompressionError {
    #[error("Invalid parameter for {method}: {name} = {value} is outside [{min}, {max}]")]
    InvalidParameter {
        method: CompressionMethod,
        name: &'static str,
        value: i64,
        min: i64,
        max: i64,
    },
    #[error("Unsupported compression method `{0}`")]
    UnsupportedMethod(String),
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        expected: Dimensions,
        actual: Dimensions,
    },
    #[error("Decode failure: {0}")]
    DecodeFailure(String),
    #[error("Invalid pixel buffer: expected {expected} samples, got {actual}")]
    InvalidBuffer { expected: usize, actual: usize },
    #[error("Invalid image dimensions {width}x{height} with {channels} channel(s)")]
    InvalidDimensions {
        width: u32,
        height: u32,
        channels: u8,
    },
    #[error("Could not read or write image container: {0}")]
    ImageFormat(String),
    #[error("Operation cancelled")]
    Cancelled,
}

impl CompressionError {
    pub(crate) fn truncated(what: &str) -> Self {
        Self::DecodeFailure(format!("truncated {what}"))
    }

    /// True for failures caused by the caller's request rather than by the engine.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidParameter { .. }
                | Self::UnsupportedMethod(_)
                | Self::InvalidBuffer { .. }
                | Self::InvalidDimensions { .. }
                | Self::ImageFormat(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, CompressionError>;
