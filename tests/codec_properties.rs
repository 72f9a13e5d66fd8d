use proptest::prelude::*;

use satcomp_rs::codec::{DctCodec, HuffmanCodec, PcaCodec, RleCodec, SvdCodec};
use satcomp_rs::{CancellationToken, CodecParameters, PipelineConfig, PixelBuffer, PixelCodec, compress_buffer};

fn arb_buffer() -> impl Strategy<Value = PixelBuffer> {
    (1u32..12, 1u32..12, prop::sample::select(vec![1u8, 3]))
        .prop_flat_map(|(w, h, c)| {
            let n = (w * h) as usize * c as usize;
            (Just(w), Just(h), Just(c), prop::collection::vec(any::<u8>(), n))
        })
        .prop_map(|(w, h, c, samples)| PixelBuffer::new(w, h, c, samples).unwrap())
}

// Few distinct values in long runs, the case RLE is built for.
fn arb_runny_buffer() -> impl Strategy<Value = PixelBuffer> {
    (1u32..40, 1u32..40)
        .prop_flat_map(|(w, h)| {
            let n = (w * h) as usize;
            (Just(w), Just(h), prop::collection::vec((0u8..3, 1usize..300), 1..20), Just(n))
        })
        .prop_map(|(w, h, runs, n)| {
            let mut samples: Vec<u8> = runs
                .iter()
                .flat_map(|&(v, len)| std::iter::repeat_n(v * 100, len))
                .cycle()
                .take(n)
                .collect();
            samples.truncate(n);
            PixelBuffer::new(w, h, 1, samples).unwrap()
        })
}

fn textured(width: u32, height: u32, channels: u8) -> PixelBuffer {
    let mut samples = Vec::new();
    for y in 0..height {
        for x in 0..width {
            for c in 0..channels as u32 {
                let v = 120.0
                    + 50.0 * ((x as f64 * 0.7 + c as f64).sin())
                    + 30.0 * ((y as f64 * 0.45).cos())
                    + ((x * 31 + y * 17) % 13) as f64;
                samples.push(v.round().clamp(0.0, 255.0) as u8);
            }
        }
    }
    PixelBuffer::new(width, height, channels, samples).unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn huffman_roundtrip_is_exact(buffer in arb_buffer()) {
        let cancel = CancellationToken::new();
        let encoded = HuffmanCodec.encode(&buffer, &cancel).unwrap();
        prop_assert_eq!(HuffmanCodec.decode(&encoded, &cancel).unwrap(), buffer);
    }

    #[test]
    fn rle_roundtrip_is_exact(buffer in arb_buffer()) {
        let cancel = CancellationToken::new();
        let encoded = RleCodec.encode(&buffer, &cancel).unwrap();
        prop_assert_eq!(RleCodec.decode(&encoded, &cancel).unwrap(), buffer);
    }

    #[test]
    fn rle_roundtrip_on_runs(buffer in arb_runny_buffer()) {
        let cancel = CancellationToken::new();
        let encoded = RleCodec.encode(&buffer, &cancel).unwrap();
        prop_assert_eq!(RleCodec.decode(&encoded, &cancel).unwrap(), buffer);
    }

    #[test]
    fn full_rank_svd_is_within_one_level(buffer in arb_buffer()) {
        let cancel = CancellationToken::new();
        let codec = SvdCodec::new(buffer.dimensions().min_side());
        let decoded = codec.decode(&codec.encode(&buffer, &cancel).unwrap(), &cancel).unwrap();
        for (&a, &b) in buffer.samples().iter().zip(decoded.samples()) {
            prop_assert!((a as i32 - b as i32).abs() <= 1, "{} vs {}", a, b);
        }
    }

    #[test]
    fn ratio_is_byte_count_quotient(buffer in arb_buffer(), quality in 1u32..=100) {
        let config = PipelineConfig::new();
        for params in [
            CodecParameters::Huffman,
            CodecParameters::Rle,
            CodecParameters::Dct { quality },
            CodecParameters::Svd { rank: 1 },
            CodecParameters::Pca { components: 1 },
        ] {
            let result = compress_buffer(&buffer, params, &config).unwrap();
            prop_assert_eq!(result.encoded_byte_length, result.artifact.byte_length());
            prop_assert_eq!(
                result.compression_ratio,
                result.original_byte_length as f64 / result.encoded_byte_length as f64
            );
            prop_assert!(!result.psnr_db.is_nan());
        }
    }
}

#[test]
fn full_component_pca_is_within_one_level() {
    let cancel = CancellationToken::new();
    let buffer = textured(10, 14, 3);
    let codec = PcaCodec::new(10);
    let decoded = codec.decode(&codec.encode(&buffer, &cancel).unwrap(), &cancel).unwrap();
    for (&a, &b) in buffer.samples().iter().zip(decoded.samples()) {
        assert!((a as i32 - b as i32).abs() <= 1, "{a} vs {b}");
    }
}

#[test]
fn dct_psnr_does_not_rise_as_quality_drops() {
    let config = PipelineConfig::new();
    for buffer in [textured(48, 40, 1), textured(32, 32, 3)] {
        let dims = buffer.dimensions();
        let mut previous = f64::INFINITY;
        for quality in (1..=100).rev() {
            let result = compress_buffer(&buffer, CodecParameters::Dct { quality }, &config).unwrap();
            assert!(
                result.psnr_db <= previous,
                "{dims} quality {quality}: {} dB after {previous} dB",
                result.psnr_db
            );
            previous = result.psnr_db;
        }
    }
}

#[test]
fn dct_quality_100_is_near_lossless_and_quality_1_is_blocky() {
    let buffer = textured(32, 32, 3);
    let config = PipelineConfig::new();
    let best = compress_buffer(&buffer, CodecParameters::Dct { quality: 100 }, &config).unwrap();
    let worst = compress_buffer(&buffer, CodecParameters::Dct { quality: 1 }, &config).unwrap();
    assert!(best.psnr_db > 45.0, "{}", best.psnr_db);
    assert!(worst.psnr_db < best.psnr_db);
    assert!(worst.encoded_byte_length < best.encoded_byte_length);
}

#[test]
fn svd_size_shrinks_with_rank() {
    let buffer = textured(24, 16, 1);
    let cancel = CancellationToken::new();
    let sizes: Vec<usize> = [16, 8, 4, 2, 1]
        .iter()
        .map(|&k| SvdCodec::new(k).encode(&buffer, &cancel).unwrap().len())
        .collect();
    assert!(sizes.windows(2).all(|pair| pair[1] < pair[0]), "{sizes:?}");
    let per_rank = (1 + 24 + 16) * 4;
    assert_eq!(sizes[0] - sizes[1], 8 * per_rank);
}

#[test]
fn low_rank_codecs_handle_large_channels() {
    let buffer = textured(320, 240, 3);
    let config = PipelineConfig::new();
    for (coarse, fine) in [
        (CodecParameters::Svd { rank: 2 }, CodecParameters::Svd { rank: 12 }),
        (CodecParameters::Pca { components: 2 }, CodecParameters::Pca { components: 12 }),
    ] {
        let coarse = compress_buffer(&buffer, coarse, &config).unwrap();
        let fine = compress_buffer(&buffer, fine, &config).unwrap();
        assert!(fine.psnr_db > coarse.psnr_db, "{} vs {}", fine.psnr_db, coarse.psnr_db);
        assert!(fine.encoded_byte_length > coarse.encoded_byte_length);
        assert!(coarse.psnr_db > 15.0, "{}", coarse.psnr_db);
    }
}

#[test]
fn huffman_ratio_tracks_entropy() {
    let config = PipelineConfig::new();
    let flat = PixelBuffer::new(32, 32, 1, vec![77; 1024]).unwrap();
    let noisy = PixelBuffer::new(32, 32, 1, (0..1024).map(|i| (i * 97 % 256) as u8).collect()).unwrap();
    let flat_ratio = compress_buffer(&flat, CodecParameters::Huffman, &config)
        .unwrap()
        .compression_ratio;
    let noisy_ratio = compress_buffer(&noisy, CodecParameters::Huffman, &config)
        .unwrap()
        .compression_ratio;
    assert!(flat_ratio > 4.0);
    assert!(noisy_ratio < 1.0);
}

#[test]
fn dct_codec_matches_pipeline_stream() {
    let buffer = textured(16, 8, 1);
    let cancel = CancellationToken::new();
    let direct = DctCodec::new(60).encode(&buffer, &cancel).unwrap();
    let result = compress_buffer(&buffer, CodecParameters::Dct { quality: 60 }, &PipelineConfig::new()).unwrap();
    assert_eq!(result.artifact.byte_stream(), direct.as_slice());
}
