//! Compression pipeline: container bytes in, artifact and metrics out.
//!
//! Every call runs the selected codec's encode and then its decode, so the
//! result carries both the compressed stream and the reconstruction the
//! metrics were measured on. Nothing is shared between calls; all knobs come
//! in through [`PipelineConfig`].

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;

use crate::cancel::CancellationToken;
use crate::codec::{self, Codec, PixelCodec};
use crate::constants::{CONTAINER_MAGIC, CONTAINER_VERSION};
use crate::error::{CompressionError, Result};
use crate::image_io;
use crate::metrics::{self, QualityMetrics};
use crate::parameters::{CodecParameters, CompressionMethod, ParameterRequest};
use crate::pixel_buffer::PixelBuffer;
use crate::stream::{StreamReader, StreamWriter};

/// Colour handling applied before coding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorMode {
    #[default]
    Preserve,
    /// Convert RGB input to luma first.
    Grayscale,
}

/// Discrete pipeline milestones, reported in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Decoded,
    Dispatched,
    Encoded,
    Reconstructed,
    Measured,
}

/// Receiver of progress events. Reporting never affects results.
pub trait ProgressSink: Send + Sync {
    fn report(&self, phase: Phase);
}

impl<F> ProgressSink for F
where
    F: Fn(Phase) + Send + Sync,
{
    fn report(&self, phase: Phase) {
        self(phase)
    }
}

#[derive(Clone, Default)]
pub struct PipelineConfig {
    pub color_mode: ColorMode,
    pub cancel: CancellationToken,
    pub progress: Option<Arc<dyn ProgressSink>>,
}

impl PipelineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_color_mode(mut self, color_mode: ColorMode) -> Self {
        self.color_mode = color_mode;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = Some(progress);
        self
    }

    fn report(&self, phase: Phase) {
        if let Some(sink) = &self.progress {
            sink.report(phase);
        }
    }
}

impl fmt::Debug for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineConfig")
            .field("color_mode", &self.color_mode)
            .field("cancelled", &self.cancel.is_cancelled())
            .field("progress", &self.progress.is_some())
            .finish()
    }
}

/// Output of one codec's encode; immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedArtifact {
    parameters: CodecParameters,
    byte_stream: Vec<u8>,
}

impl EncodedArtifact {
    pub fn new(parameters: CodecParameters, byte_stream: Vec<u8>) -> Self {
        Self {
            parameters,
            byte_stream,
        }
    }

    pub fn method(&self) -> CompressionMethod {
        self.parameters.method()
    }

    pub fn parameters(&self) -> CodecParameters {
        self.parameters
    }

    pub fn byte_stream(&self) -> &[u8] {
        &self.byte_stream
    }

    pub fn byte_length(&self) -> usize {
        self.byte_stream.len()
    }

    /// File form: magic, version, method tag, parameter value (varint), stream.
    pub fn to_container_bytes(&self) -> Vec<u8> {
        let mut writer = StreamWriter::new();
        writer.write_bytes(&CONTAINER_MAGIC);
        writer.write_byte(CONTAINER_VERSION);
        writer.write_byte(self.method().into());
        writer.write_varint(parameter_value(self.parameters) as u64);
        writer.write_bytes(&self.byte_stream);
        writer.finish()
    }

    pub fn from_container_bytes(data: &[u8]) -> Result<Self> {
        let mut reader = StreamReader::new(data);
        if reader.read_bytes(CONTAINER_MAGIC.len())? != CONTAINER_MAGIC {
            return Err(CompressionError::DecodeFailure("missing SATC magic".into()));
        }
        let version = reader.read_byte()?;
        if version != CONTAINER_VERSION {
            return Err(CompressionError::DecodeFailure(format!(
                "unsupported container version {version}"
            )));
        }
        let tag = reader.read_byte()?;
        let method = CompressionMethod::try_from(tag)
            .map_err(|_| CompressionError::DecodeFailure(format!("unknown method tag {tag}")))?;
        let value = reader.read_varint_u32()?;
        let parameters = match method {
            CompressionMethod::Huffman => CodecParameters::Huffman,
            CompressionMethod::Rle => CodecParameters::Rle,
            CompressionMethod::Dct => CodecParameters::Dct { quality: value },
            CompressionMethod::Svd => CodecParameters::Svd { rank: value },
            CompressionMethod::Pca => CodecParameters::Pca { components: value },
        };
        Ok(Self::new(parameters, reader.remaining().to_vec()))
    }
}

fn parameter_value(parameters: CodecParameters) -> u32 {
    match parameters {
        CodecParameters::Huffman | CodecParameters::Rle => 0,
        CodecParameters::Dct { quality } => quality,
        CodecParameters::Svd { rank } => rank,
        CodecParameters::Pca { components } => components,
    }
}

/// Everything one pipeline invocation produces.
#[derive(Debug, Clone)]
pub struct CompressionResult {
    /// Raw sample bytes of the coded image (`width * height * channels`).
    pub original_byte_length: usize,
    pub encoded_byte_length: usize,
    /// Exactly `original_byte_length / encoded_byte_length`.
    pub compression_ratio: f64,
    /// `f64::INFINITY` when the reconstruction is exact.
    pub psnr_db: f64,
    pub mse: f64,
    pub channel_mse: Vec<f64>,
    pub reconstructed: PixelBuffer,
    pub elapsed_time_ms: f64,
    pub artifact: EncodedArtifact,
}

/// Decodes `image_bytes`, applies `params` and measures the round trip.
pub fn compress(
    image_bytes: &[u8],
    params: CodecParameters,
    config: &PipelineConfig,
) -> Result<CompressionResult> {
    let started = Instant::now();
    let original = decode_container(image_bytes, config)?;
    let codec = codec::dispatch(params, original.dimensions())?;
    config.report(Phase::Dispatched);
    run(&original, codec, config, started)
}

/// Like [`compress`], but resolves a method name and raw knobs against the
/// decoded image first.
pub fn compress_request(
    image_bytes: &[u8],
    method: &str,
    request: &ParameterRequest,
    config: &PipelineConfig,
) -> Result<CompressionResult> {
    let started = Instant::now();
    // Unknown names fail before the container is parsed.
    method.parse::<CompressionMethod>()?;
    let original = decode_container(image_bytes, config)?;
    let codec = codec::dispatch_request(method, request, original.dimensions())?;
    config.report(Phase::Dispatched);
    run(&original, codec, config, started)
}

/// Runs the pipeline on an already decoded buffer.
pub fn compress_buffer(
    buffer: &PixelBuffer,
    params: CodecParameters,
    config: &PipelineConfig,
) -> Result<CompressionResult> {
    let started = Instant::now();
    buffer.validate()?;
    let original = apply_color_mode(buffer, config.color_mode);
    config.report(Phase::Decoded);
    let codec = codec::dispatch(params, original.dimensions())?;
    config.report(Phase::Dispatched);
    run(&original, codec, config, started)
}

/// Reconstructs the pixels an artifact encodes.
pub fn decode(artifact: &EncodedArtifact) -> Result<PixelBuffer> {
    decode_with_cancellation(artifact, &CancellationToken::new())
}

pub fn decode_with_cancellation(
    artifact: &EncodedArtifact,
    cancel: &CancellationToken,
) -> Result<PixelBuffer> {
    Codec::from_parameters(artifact.parameters).decode(&artifact.byte_stream, cancel)
}

fn decode_container(image_bytes: &[u8], config: &PipelineConfig) -> Result<PixelBuffer> {
    let decoded = image_io::decode_image(image_bytes)?;
    let original = apply_color_mode(&decoded, config.color_mode);
    log::debug!(
        "decoded {} byte container into {}",
        image_bytes.len(),
        original.dimensions()
    );
    config.report(Phase::Decoded);
    Ok(original)
}

fn apply_color_mode(buffer: &PixelBuffer, mode: ColorMode) -> PixelBuffer {
    match mode {
        ColorMode::Preserve => buffer.clone(),
        ColorMode::Grayscale => buffer.to_grayscale(),
    }
}

fn run(
    original: &PixelBuffer,
    codec: Codec,
    config: &PipelineConfig,
    started: Instant,
) -> Result<CompressionResult> {
    config.cancel.check()?;
    let parameters = codec.parameters();

    let byte_stream = codec.encode(original, &config.cancel)?;
    config.report(Phase::Encoded);

    let reconstructed = codec.decode(&byte_stream, &config.cancel)?;
    config.report(Phase::Reconstructed);

    let quality = QualityMetrics::measure(original, &reconstructed)?;
    config.report(Phase::Measured);

    let original_byte_length = original.byte_len();
    let encoded_byte_length = byte_stream.len();
    let elapsed_time_ms = started.elapsed().as_secs_f64() * 1000.0;
    let compression_ratio = metrics::compression_ratio(original_byte_length, encoded_byte_length);

    log::info!(
        "{} on {}: {} -> {} bytes (ratio {:.3}, psnr {:.2} dB) in {:.1} ms",
        parameters,
        original.dimensions(),
        original_byte_length,
        encoded_byte_length,
        compression_ratio,
        quality.psnr_db,
        elapsed_time_ms
    );

    Ok(CompressionResult {
        original_byte_length,
        encoded_byte_length,
        compression_ratio,
        psnr_db: quality.psnr_db,
        mse: quality.mse,
        channel_mse: quality.channel_mse,
        reconstructed,
        elapsed_time_ms,
        artifact: EncodedArtifact::new(parameters, byte_stream),
    })
}
