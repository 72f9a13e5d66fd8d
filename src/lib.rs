//! Image compression engine with real codecs and honest metrics.
//!
//! Five codecs share one [`PixelCodec`] interface: lossless Huffman and RLE,
//! lossy block DCT, and lossy low-rank SVD and PCA. The [`pipeline`] decodes an
//! image container, dispatches to a codec, runs encode and decode, and reports
//! MSE, PSNR and the compression ratio computed from actual byte counts.
//!
//! ```
//! use satcomp_rs::{CodecParameters, PipelineConfig, PixelBuffer, pipeline};
//!
//! let image = PixelBuffer::new(4, 4, 1, vec![128; 16]).unwrap();
//! let result = pipeline::compress_buffer(
//!     &image,
//!     CodecParameters::Dct { quality: 50 },
//!     &PipelineConfig::new(),
//! )
//! .unwrap();
//! assert!(result.encoded_byte_length < 16);
//! assert_eq!(result.reconstructed, image);
//! ```

pub mod cancel;
pub mod codec;
pub mod constants;
pub mod entropy;
pub mod error;
pub mod image_io;
pub mod linalg;
pub mod metrics;
pub mod parameters;
pub mod pipeline;
pub mod pixel_buffer;
pub mod report;
#[cfg(feature = "server")]
pub mod server;
pub mod stream;

pub use cancel::CancellationToken;
pub use codec::{Codec, PixelCodec, dispatch, dispatch_request};
pub use error::{CompressionError, Result};
pub use metrics::QualityMetrics;
pub use parameters::{CodecParameters, CompressionMethod, ParameterRequest};
pub use pipeline::{
    ColorMode, CompressionResult, EncodedArtifact, Phase, PipelineConfig, ProgressSink, compress,
    compress_buffer, compress_request, decode,
};
pub use pixel_buffer::{Dimensions, PixelBuffer};
pub use report::CompressionReport;
