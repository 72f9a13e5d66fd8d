//! Codec abstraction and dispatcher.
//!
//! Each method is a small stateless struct implementing [`PixelCodec`]. The
//! [`Codec`] enum carries one variant per method and is what the dispatcher
//! hands to the pipeline, so callers never match on method names themselves.

pub mod dct;
pub mod huffman;
pub mod pca;
pub mod quantization;
pub mod rle;
pub mod svd;
pub mod transform;

pub use dct::DctCodec;
pub use huffman::HuffmanCodec;
pub use pca::PcaCodec;
pub use rle::RleCodec;
pub use svd::SvdCodec;

use crate::cancel::CancellationToken;
use crate::error::Result;
use crate::parameters::{CodecParameters, CompressionMethod, ParameterRequest};
use crate::pixel_buffer::{Dimensions, PixelBuffer};

/// Capability set every codec provides.
pub trait PixelCodec {
    fn method(&self) -> CompressionMethod;

    /// Checks this codec's parameters against a concrete image size.
    fn validate_parameters(&self, dims: Dimensions) -> Result<()>;

    fn encode(&self, buffer: &PixelBuffer, cancel: &CancellationToken) -> Result<Vec<u8>>;

    /// Decodes a stream produced by [`PixelCodec::encode`]. Streams are
    /// self-describing, so parameters stored in the stream take precedence.
    fn decode(&self, stream: &[u8], cancel: &CancellationToken) -> Result<PixelBuffer>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codec {
    Huffman(HuffmanCodec),
    Dct(DctCodec),
    Svd(SvdCodec),
    Pca(PcaCodec),
    Rle(RleCodec),
}

impl Codec {
    pub fn from_parameters(params: CodecParameters) -> Self {
        match params {
            CodecParameters::Huffman => Self::Huffman(HuffmanCodec),
            CodecParameters::Dct { quality } => Self::Dct(DctCodec::new(quality)),
            CodecParameters::Svd { rank } => Self::Svd(SvdCodec::new(rank)),
            CodecParameters::Pca { components } => Self::Pca(PcaCodec::new(components)),
            CodecParameters::Rle => Self::Rle(RleCodec),
        }
    }

    pub fn parameters(&self) -> CodecParameters {
        match self {
            Self::Huffman(_) => CodecParameters::Huffman,
            Self::Dct(codec) => CodecParameters::Dct {
                quality: codec.quality,
            },
            Self::Svd(codec) => CodecParameters::Svd { rank: codec.rank },
            Self::Pca(codec) => CodecParameters::Pca {
                components: codec.components,
            },
            Self::Rle(_) => CodecParameters::Rle,
        }
    }

    fn inner(&self) -> &dyn PixelCodec {
        match self {
            Self::Huffman(codec) => codec,
            Self::Dct(codec) => codec,
            Self::Svd(codec) => codec,
            Self::Pca(codec) => codec,
            Self::Rle(codec) => codec,
        }
    }
}

impl PixelCodec for Codec {
    fn method(&self) -> CompressionMethod {
        self.inner().method()
    }

    fn validate_parameters(&self, dims: Dimensions) -> Result<()> {
        self.inner().validate_parameters(dims)
    }

    fn encode(&self, buffer: &PixelBuffer, cancel: &CancellationToken) -> Result<Vec<u8>> {
        self.inner().encode(buffer, cancel)
    }

    fn decode(&self, stream: &[u8], cancel: &CancellationToken) -> Result<PixelBuffer> {
        self.inner().decode(stream, cancel)
    }
}

/// Selects the codec for `params`, rejecting parameters that do not fit an
/// image of size `dims` before any codec work starts.
pub fn dispatch(params: CodecParameters, dims: Dimensions) -> Result<Codec> {
    let codec = Codec::from_parameters(params);
    codec.validate_parameters(dims)?;
    Ok(codec)
}

/// Resolves a method name and raw knobs into a validated codec.
pub fn dispatch_request(method: &str, request: &ParameterRequest, dims: Dimensions) -> Result<Codec> {
    let method: CompressionMethod = method.parse()?;
    let params = request.resolve(method, dims)?;
    dispatch(params, dims)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CompressionError;

    #[test]
    fn test_dispatch_selects_variant() {
        let dims = Dimensions::new(16, 8, 3).unwrap();
        let codec = dispatch(CodecParameters::Svd { rank: 8 }, dims).unwrap();
        assert_eq!(codec, Codec::Svd(SvdCodec::new(8)));
        assert_eq!(codec.method(), CompressionMethod::Svd);
        assert_eq!(codec.parameters(), CodecParameters::Svd { rank: 8 });
    }

    #[test]
    fn test_dispatch_rejects_before_encoding() {
        let dims = Dimensions::new(16, 8, 1).unwrap();
        assert!(matches!(
            dispatch(CodecParameters::Svd { rank: 9 }, dims),
            Err(CompressionError::InvalidParameter { .. })
        ));
        assert!(matches!(
            dispatch_request("jpeg2000", &ParameterRequest::default(), dims),
            Err(CompressionError::UnsupportedMethod(_))
        ));
    }

    #[test]
    fn test_dispatch_request_defaults() {
        let dims = Dimensions::new(16, 8, 1).unwrap();
        let codec = dispatch_request("dct", &ParameterRequest::default(), dims).unwrap();
        assert_eq!(codec.parameters(), CodecParameters::Dct { quality: 75 });
        let codec = dispatch_request("rle", &ParameterRequest::default(), dims).unwrap();
        assert_eq!(codec.method(), CompressionMethod::Rle);
    }
}
