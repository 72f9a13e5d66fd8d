pub const MAX_SAMPLE_VALUE: u8 = 255;
pub const GRAYSCALE_CHANNELS: u8 = 1;
pub const RGB_CHANNELS: u8 = 3;

// Upper bound on width * height * channels accepted from an encoded stream.
pub const MAX_FRAME_SAMPLES: usize = 1 << 28;

pub const BLOCK_SIZE: usize = 8;
pub const BLOCK_DIM: usize = BLOCK_SIZE * BLOCK_SIZE;

pub const MINIMUM_QUALITY: u32 = 1;
pub const MAXIMUM_QUALITY: u32 = 100;
pub const DEFAULT_QUALITY: u32 = 75;

// Legacy "compression level" slider: higher means more compression.
pub const MINIMUM_LEVEL: u32 = 10;
pub const MAXIMUM_LEVEL: u32 = 90;
pub const DEFAULT_LEVEL: u32 = 50;

// Coarsest DC step that still reproduces flat 8x8 blocks exactly.
pub const MAXIMUM_DC_STEP: u8 = 8;

pub const MAX_HUFFMAN_CODE_LENGTH: usize = 16;

pub const MAX_JACOBI_SWEEPS: usize = 64;
pub const JACOBI_TOLERANCE: f64 = 1e-12;

// Subspace iteration for the leading k eigenpairs: the block carries k plus
// this many guard vectors. Smaller problems go straight to full Jacobi.
pub const SUBSPACE_OVERSAMPLE: usize = 8;
pub const MAX_SUBSPACE_ITERATIONS: usize = 100;
pub const SUBSPACE_TOLERANCE: f64 = 1e-10;

/// PSNR reported when the reconstruction is bit-exact (MSE = 0).
pub const LOSSLESS_PSNR: f64 = f64::INFINITY;

// Container wrapper used for artifact files.
pub const CONTAINER_MAGIC: [u8; 4] = *b"SATC";
pub const CONTAINER_VERSION: u8 = 1;

pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 100 * 1024 * 1024;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;

pub const ALLOWED_UPLOAD_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "tif", "tiff"];
