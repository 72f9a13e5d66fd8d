//! Compression methods and their per-image parameters.

use std::fmt;
use std::str::FromStr;

use num_enum::{IntoPrimitive, TryFromPrimitive};
use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_LEVEL, DEFAULT_QUALITY, MAXIMUM_LEVEL, MAXIMUM_QUALITY, MINIMUM_LEVEL, MINIMUM_QUALITY,
};
use crate::error::{CompressionError, Result};
use crate::pixel_buffer::Dimensions;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive, IntoPrimitive, Serialize, Deserialize,
)]
#[repr(u8)]
#[serde(rename_all = "lowercase")]
pub enum CompressionMethod {
    Huffman = 1,
    Dct = 2,
    Svd = 3,
    Pca = 4,
    Rle = 5,
}

impl CompressionMethod {
    pub const ALL: [CompressionMethod; 5] = [
        CompressionMethod::Huffman,
        CompressionMethod::Dct,
        CompressionMethod::Svd,
        CompressionMethod::Pca,
        CompressionMethod::Rle,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Huffman => "huffman",
            Self::Dct => "dct",
            Self::Svd => "svd",
            Self::Pca => "pca",
            Self::Rle => "rle",
        }
    }

    pub fn is_lossless(self) -> bool {
        matches!(self, Self::Huffman | Self::Rle)
    }
}

impl fmt::Display for CompressionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CompressionMethod {
    type Err = CompressionError;

    /// Case-insensitive; `auto` selects SVD.
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "huffman" => Ok(Self::Huffman),
            "dct" => Ok(Self::Dct),
            "svd" | "auto" => Ok(Self::Svd),
            "pca" => Ok(Self::Pca),
            "rle" => Ok(Self::Rle),
            _ => Err(CompressionError::UnsupportedMethod(s.to_string())),
        }
    }
}

/// Parameters of one codec invocation, keyed by method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "lowercase")]
pub enum CodecParameters {
    Huffman,
    Dct { quality: u32 },
    Svd { rank: u32 },
    Pca { components: u32 },
    Rle,
}

impl CodecParameters {
    pub fn method(&self) -> CompressionMethod {
        match self {
            Self::Huffman => CompressionMethod::Huffman,
            Self::Dct { .. } => CompressionMethod::Dct,
            Self::Svd { .. } => CompressionMethod::Svd,
            Self::Pca { .. } => CompressionMethod::Pca,
            Self::Rle => CompressionMethod::Rle,
        }
    }

    /// Checks the parameter against the concrete image it will be applied to.
    pub fn validate(&self, dims: Dimensions) -> Result<()> {
        match *self {
            Self::Huffman | Self::Rle => Ok(()),
            Self::Dct { quality } => check_range(
                CompressionMethod::Dct,
                "quality",
                quality,
                MINIMUM_QUALITY,
                MAXIMUM_QUALITY,
            ),
            Self::Svd { rank } => {
                check_range(CompressionMethod::Svd, "rank", rank, 1, dims.min_side())
            }
            Self::Pca { components } => check_range(
                CompressionMethod::Pca,
                "components",
                components,
                1,
                max_pca_components(dims),
            ),
        }
    }
}

impl fmt::Display for CodecParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Huffman | Self::Rle => write!(f, "{}", self.method()),
            Self::Dct { quality } => write!(f, "dct(quality={quality})"),
            Self::Svd { rank } => write!(f, "svd(rank={rank})"),
            Self::Pca { components } => write!(f, "pca(components={components})"),
        }
    }
}

/// Dimension of a channel's feature space: each image row is one observation
/// of `width` features.
pub fn max_pca_components(dims: Dimensions) -> u32 {
    dims.width
}

fn check_range(
    method: CompressionMethod,
    name: &'static str,
    value: u32,
    min: u32,
    max: u32,
) -> Result<()> {
    if value < min || value > max {
        log::debug!("rejecting {method} {name}={value}, allowed [{min}, {max}]");
        return Err(CompressionError::InvalidParameter {
            method,
            name,
            value: value as i64,
            min: min as i64,
            max: max as i64,
        });
    }
    Ok(())
}

/// Raw numeric knobs as supplied by a caller (CLI flags or form fields).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterRequest {
    pub quality: Option<u32>,
    pub rank: Option<u32>,
    pub components: Option<u32>,
    /// Legacy compression level in `[10, 90]`; higher means smaller output.
    pub level: Option<u32>,
}

impl ParameterRequest {
    /// Resolves the request into concrete parameters for `method` on an image of
    /// size `dims`. Values are validated, never clamped. A supplied `level` must
    /// be in range even when the method or an explicit knob ignores it.
    pub fn resolve(&self, method: CompressionMethod, dims: Dimensions) -> Result<CodecParameters> {
        let level = self.level.map(|level| checked_level(method, level)).transpose()?;
        let params = match method {
            CompressionMethod::Huffman => CodecParameters::Huffman,
            CompressionMethod::Rle => CodecParameters::Rle,
            CompressionMethod::Dct => {
                let quality = match (self.quality, level) {
                    (Some(quality), _) => quality,
                    (None, Some(level)) => 100 - level,
                    (None, None) => DEFAULT_QUALITY,
                };
                CodecParameters::Dct { quality }
            }
            CompressionMethod::Svd => {
                let rank = self
                    .rank
                    .unwrap_or_else(|| scale_by_level(level.unwrap_or(DEFAULT_LEVEL), dims.min_side()));
                CodecParameters::Svd { rank }
            }
            CompressionMethod::Pca => {
                let components = self.components.unwrap_or_else(|| {
                    scale_by_level(level.unwrap_or(DEFAULT_LEVEL), max_pca_components(dims))
                });
                CodecParameters::Pca { components }
            }
        };
        params.validate(dims)?;
        Ok(params)
    }
}

fn checked_level(method: CompressionMethod, level: u32) -> Result<u32> {
    check_range(method, "level", level, MINIMUM_LEVEL, MAXIMUM_LEVEL)?;
    Ok(level)
}

fn scale_by_level(level: u32, full: u32) -> u32 {
    let kept = (100 - level) as u64 * full as u64 / 100;
    (kept as u32).max(1)
}
