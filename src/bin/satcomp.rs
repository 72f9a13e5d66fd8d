//! satcomp CLI - compress images with Huffman, DCT, SVD, PCA or RLE and
//! report honest quality metrics.

use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::path::PathBuf;

use satcomp_rs::image_io;
use satcomp_rs::pipeline::{self, ColorMode, EncodedArtifact, PipelineConfig};
use satcomp_rs::report::CompressionReport;
use satcomp_rs::{CompressionMethod, ParameterRequest};

/// Image compression engine with real codecs and honest metrics
#[derive(Parser)]
#[command(name = "satcomp")]
#[command(author = "satcomp-rs contributors")]
#[command(version)]
#[command(about = "Compress satellite images and measure what the codec really did", long_about = None)]
#[command(after_help = "EXAMPLES:
    satcomp compress -i scene.png -o scene.satc -m dct --quality 60
    satcomp compress -i scene.tif -o scene.satc -m svd --rank 32 --report report.json
    satcomp decode -i scene.satc -o scene.png
    satcomp info -i scene.satc
    satcomp serve --bind 0.0.0.0:5000

METHODS:
    huffman, rle (lossless), dct, svd, pca (lossy), auto (= svd)")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compress an image and write the encoded artifact
    ///
    /// The image is decoded, coded with the selected method, decoded again and
    /// compared against the original. Metrics are printed to stdout.
    #[command(visible_alias = "c")]
    Compress {
        /// Input image (PNG, JPEG or TIFF)
        #[arg(short, long, help = "Path to the input image file")]
        input: PathBuf,

        /// Output artifact
        #[arg(short, long, help = "Path for the encoded .satc file")]
        output: PathBuf,

        /// Compression method
        #[arg(short, long, default_value = "auto")]
        method: String,

        /// Legacy compression level (10-90, higher compresses more)
        #[arg(short, long)]
        level: Option<u32>,

        /// DCT quality (1-100)
        #[arg(short, long)]
        quality: Option<u32>,

        /// SVD rank (1 to the shorter image side)
        #[arg(short, long)]
        rank: Option<u32>,

        /// PCA components retained (1 to the image width)
        #[arg(long)]
        components: Option<u32>,

        /// Convert to grayscale before coding
        #[arg(short, long)]
        grayscale: bool,

        /// Write the JSON report here
        #[arg(long)]
        report: Option<PathBuf>,

        /// Write the reconstructed image here as PNG
        #[arg(long)]
        preview: Option<PathBuf>,
    },

    /// Decode an artifact back to pixels
    #[command(visible_alias = "d")]
    Decode {
        /// Input artifact
        #[arg(short, long, help = "Path to the .satc file")]
        input: PathBuf,

        /// Output file path for decoded pixels
        #[arg(short, long, help = "Path for the output file")]
        output: PathBuf,

        /// Output format
        #[arg(short, long, default_value = "png", value_enum)]
        format: OutputFormat,
    },

    /// Display artifact or image metadata
    #[command(visible_alias = "i")]
    Info {
        /// Input file path
        #[arg(short, long, help = "Path to a .satc artifact or an image")]
        input: PathBuf,
    },

    /// List compression methods and their parameters
    #[command(visible_alias = "l")]
    List,

    /// Serve the HTTP compression API
    #[cfg(feature = "server")]
    #[command(visible_alias = "s")]
    Serve {
        /// Socket address to listen on
        #[arg(short, long, default_value = "127.0.0.1:5000")]
        bind: std::net::SocketAddr,

        /// Largest accepted upload in MiB
        #[arg(long, default_value = "100")]
        max_upload_mb: usize,

        /// Per-request timeout in seconds
        #[arg(long, default_value = "120")]
        timeout_secs: u64,

        /// Convert uploads to grayscale unless the form overrides it
        #[arg(short, long)]
        grayscale: bool,
    },
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Portable Network Graphics
    Png,
    /// Portable PixMap (PPM/PGM) format
    Ppm,
    /// Raw interleaved 8-bit samples
    Raw,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Compress {
            input,
            output,
            method,
            level,
            quality,
            rank,
            components,
            grayscale,
            report,
            preview,
        } => {
            let request = ParameterRequest {
                quality,
                rank,
                components,
                level,
            };
            compress_image(&input, &output, &method, &request, grayscale, report, preview)
        }
        Commands::Decode {
            input,
            output,
            format,
        } => decode_artifact(&input, &output, &format),
        Commands::Info { input } => show_info(&input),
        Commands::List => list_methods(),
        #[cfg(feature = "server")]
        Commands::Serve {
            bind,
            max_upload_mb,
            timeout_secs,
            grayscale,
        } => {
            let config = satcomp_rs::server::ServerConfig {
                bind,
                max_upload_bytes: max_upload_mb * 1024 * 1024,
                request_timeout: std::time::Duration::from_secs(timeout_secs),
                grayscale,
            };
            satcomp_rs::server::run(config).map_err(Into::into)
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn compress_image(
    input: &PathBuf,
    output: &PathBuf,
    method: &str,
    request: &ParameterRequest,
    grayscale: bool,
    report_path: Option<PathBuf>,
    preview_path: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let data = fs::read(input)?;
    let color_mode = if grayscale {
        ColorMode::Grayscale
    } else {
        ColorMode::Preserve
    };
    let config = PipelineConfig::new().with_color_mode(color_mode);
    let result = pipeline::compress_request(&data, method, request, &config)?;

    fs::write(output, result.artifact.to_container_bytes())?;
    if let Some(path) = preview_path {
        fs::write(path, image_io::encode_png(&result.reconstructed)?)?;
    }
    if let Some(path) = report_path {
        fs::write(path, CompressionReport::from_result(&result)?.to_json()?)?;
    }

    let dims = result.reconstructed.dimensions();
    println!(
        "✓ Compressed {}x{} image ({} channel(s)) to {:?} with {}",
        dims.width,
        dims.height,
        dims.channels,
        output,
        result.artifact.parameters()
    );
    println!("  Original:   {} bytes", result.original_byte_length);
    println!("  Encoded:    {} bytes", result.encoded_byte_length);
    println!("  Ratio:      {:.3}", result.compression_ratio);
    println!("  MSE:        {:.4}", result.mse);
    if result.psnr_db.is_finite() {
        println!("  PSNR:       {:.2} dB", result.psnr_db);
    } else {
        println!("  PSNR:       ∞ (exact reconstruction)");
    }
    println!("  Time:       {:.1} ms", result.elapsed_time_ms);
    Ok(())
}

fn decode_artifact(
    input: &PathBuf,
    output: &PathBuf,
    format: &OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let data = fs::read(input)?;
    let artifact = EncodedArtifact::from_container_bytes(&data)?;
    let buffer = pipeline::decode(&artifact)?;

    match format {
        OutputFormat::Png => fs::write(output, image_io::encode_png(&buffer)?)?,
        OutputFormat::Ppm => {
            let mut file = fs::File::create(output)?;
            image_io::write_pnm(&mut file, &buffer)?;
        }
        OutputFormat::Raw => fs::write(output, buffer.samples())?,
    }

    println!(
        "✓ Decoded {}x{} image ({} channel(s)) to {:?}",
        buffer.width(),
        buffer.height(),
        buffer.channels(),
        output
    );
    Ok(())
}

fn show_info(input: &PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let data = fs::read(input)?;

    println!("File: {:?}", input);
    println!("Size: {} bytes", data.len());
    println!();

    if data.starts_with(&satcomp_rs::constants::CONTAINER_MAGIC) {
        let artifact = EncodedArtifact::from_container_bytes(&data)?;
        let buffer = pipeline::decode(&artifact)?;
        println!("Format: satcomp artifact");
        println!("  Method:     {}", artifact.method());
        println!("  Parameters: {}", artifact.parameters());
        println!(
            "  Dimensions: {}x{}",
            buffer.width(),
            buffer.height()
        );
        println!("  Channels:   {}", buffer.channels());
        println!("  Stream:     {} bytes", artifact.byte_length());
        println!(
            "  Ratio:      {:.3}",
            satcomp_rs::metrics::compression_ratio(buffer.byte_len(), artifact.byte_length())
        );
    } else {
        let buffer = image_io::decode_image(&data)?;
        println!("Format: image container");
        println!("  Dimensions: {}x{}", buffer.width(), buffer.height());
        println!("  Channels:   {}", buffer.channels());
        println!("  Raw size:   {} bytes", buffer.byte_len());
    }

    Ok(())
}

fn list_methods() -> Result<(), Box<dyn std::error::Error>> {
    println!("Supported Methods:");
    println!();
    for method in CompressionMethod::ALL {
        let (kind, parameter) = match method {
            CompressionMethod::Huffman => ("lossless", "none"),
            CompressionMethod::Rle => ("lossless", "none"),
            CompressionMethod::Dct => ("lossy", "--quality 1-100 (default 75)"),
            CompressionMethod::Svd => ("lossy", "--rank 1..min(width, height)"),
            CompressionMethod::Pca => ("lossy", "--components 1..width"),
        };
        println!("  {} ({})", method, kind);
        println!("    Parameter: {}", parameter);
        println!();
    }
    println!("  --level 10-90 maps onto quality, rank or components when those are omitted.");
    println!("  `auto` selects svd.");
    Ok(())
}
