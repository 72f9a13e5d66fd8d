//! JSON record returned to HTTP and CLI callers.

use base64::{Engine as _, engine::general_purpose};
use serde::Serialize;

use crate::error::{CompressionError, Result};
use crate::image_io;
use crate::parameters::{CodecParameters, CompressionMethod};
use crate::pipeline::CompressionResult;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompressionReport {
    pub media_type: &'static str,
    pub method: CompressionMethod,
    pub parameters: CodecParameters,
    /// Reconstructed image as a `data:image/png;base64,` URL.
    pub compressed_media_url: String,
    pub original_size: usize,
    pub compressed_size: usize,
    pub compression_ratio: f64,
    /// `None` for an exact reconstruction (infinite PSNR has no JSON form).
    pub psnr: Option<f64>,
    pub mse: f64,
    pub channel_mse: Vec<f64>,
    /// Seconds.
    pub processing_time: f64,
    pub width: u32,
    pub height: u32,
    pub channels: u8,
}

impl CompressionReport {
    pub fn from_result(result: &CompressionResult) -> Result<Self> {
        let png = image_io::encode_png(&result.reconstructed)?;
        let compressed_media_url = format!(
            "data:image/png;base64,{}",
            general_purpose::STANDARD.encode(png)
        );
        Ok(Self {
            media_type: "image",
            method: result.artifact.method(),
            parameters: result.artifact.parameters(),
            compressed_media_url,
            original_size: result.original_byte_length,
            compressed_size: result.encoded_byte_length,
            compression_ratio: result.compression_ratio,
            psnr: result.psnr_db.is_finite().then_some(result.psnr_db),
            mse: result.mse,
            channel_mse: result.channel_mse.clone(),
            processing_time: result.elapsed_time_ms / 1000.0,
            width: result.reconstructed.width(),
            height: result.reconstructed.height(),
            channels: result.reconstructed.channels(),
        })
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| CompressionError::ImageFormat(format!("report serialization failed: {}", e)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl From<&CompressionError> for ErrorResponse {
    fn from(err: &CompressionError) -> Self {
        Self {
            error: err.to_string(),
        }
    }
}
