//! Behavioural properties of the matting engine
//!
//! These tests drive the public API only and compare the engine against a
//! straightforward per-pixel oracle on synthetic images.

use hairmatte::{
    process, remove_background, Bitmap, ExecutionMode, MattingEngine, MattingError,
    MattingParams,
};

/// Deterministic xorshift noise so the fixtures are stable across runs
fn noise_bitmap(width: u32, height: u32, seed: u32) -> Bitmap {
    let mut state = seed.max(1);
    let mut data = Vec::with_capacity(width as usize * height as usize * 4);
    for _ in 0..width * height {
        for _ in 0..3 {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            data.push((state >> 24) as u8);
        }
        data.push(255);
    }
    Bitmap::new(width, height, data).unwrap()
}

/// Portrait-like fixture: light backdrop, dark tinted strands, grey subject
fn portrait_bitmap(width: u32, height: u32) -> Bitmap {
    let mut data = Vec::with_capacity(width as usize * height as usize * 4);
    for y in 0..height {
        for x in 0..width {
            let px = if x < width / 3 {
                [248, 247, 250, 255]
            } else if x < 2 * width / 3 {
                let v = ((x + y) % 40) as u8;
                [60 + v, 40, 30, 255]
            } else {
                [120, 121, 119, 255]
            };
            data.extend_from_slice(&px);
        }
    }
    Bitmap::new(width, height, data).unwrap()
}

fn oracle_alpha(r: u8, g: u8, b: u8, a: u8, bt: i32, hs: i32) -> u8 {
    let (ri, gi, bi) = (i32::from(r), i32::from(g), i32::from(b));
    let l = 0.299 * f64::from(r) + 0.587 * f64::from(g) + 0.114 * f64::from(b);
    let v = (ri - gi).abs().max((ri - bi).abs()).max((gi - bi).abs());

    if v > hs && l < 150.0 {
        (2 * v).min(255) as u8
    } else if l > f64::from(240 - bt) {
        0
    } else {
        a
    }
}

fn assert_matches_oracle(input: &Bitmap, output: &Bitmap, bt: i32, hs: i32) {
    assert_eq!(input.dimensions(), output.dimensions());
    for (src, dst) in input
        .as_raw()
        .chunks_exact(4)
        .zip(output.as_raw().chunks_exact(4))
    {
        assert_eq!(&src[..3], &dst[..3], "RGB must be preserved");
        assert_eq!(
            dst[3],
            oracle_alpha(src[0], src[1], src[2], src[3], bt, hs),
            "alpha mismatch for {:?}",
            &src[..3]
        );
    }
}

#[test]
fn test_documented_cases() {
    let cases: [([u8; 3], u8); 3] = [
        ([255, 255, 255], 0),
        ([80, 40, 30], 100),
        ([100, 102, 101], 255),
    ];

    for (rgb, expected) in cases {
        let bitmap = Bitmap::filled(1, 1, [rgb[0], rgb[1], rgb[2], 255]).unwrap();
        let out = process(&bitmap, 10, 3).unwrap();
        assert_eq!(out.pixel(0, 0), Some([rgb[0], rgb[1], rgb[2], expected]));
    }
}

#[test]
fn test_noise_matches_oracle_for_slider_range() {
    let input = noise_bitmap(64, 48, 0x9e37_79b9);
    for bt in [1, 10, 25, 50] {
        for hs in [1, 3, 10] {
            let out = process(&input, bt, hs).unwrap();
            assert_matches_oracle(&input, &out, bt, hs);
        }
    }
}

#[test]
fn test_degenerate_parameters_match_oracle() {
    let input = noise_bitmap(32, 32, 7);
    for (bt, hs) in [(0, 0), (-40, -5), (500, 300), (i32::MAX / 2, i32::MIN / 2)] {
        let out = process(&input, bt, hs).unwrap();
        assert_matches_oracle(&input, &out, bt, hs);
    }
}

#[test]
fn test_determinism() {
    let input = portrait_bitmap(120, 90);
    let first = process(&input, 12, 4).unwrap();
    for _ in 0..3 {
        assert_eq!(process(&input, 12, 4).unwrap(), first);
    }
}

#[test]
fn test_input_is_not_mutated() {
    let input = portrait_bitmap(30, 20);
    let snapshot = input.clone();
    let _ = process(&input, 10, 3).unwrap();
    assert_eq!(input, snapshot);
}

#[test]
fn test_parallel_equals_sequential() {
    // Large enough that Auto would also pick the pool
    let input = noise_bitmap(400, 300, 42);
    let params = MattingParams::new(15, 2);

    let sequential = MattingEngine::new(params)
        .with_execution_mode(ExecutionMode::Sequential)
        .process(&input)
        .unwrap();
    let parallel = MattingEngine::new(params)
        .with_execution_mode(ExecutionMode::Parallel)
        .with_rows_per_chunk(7)
        .process(&input)
        .unwrap();

    assert!(!sequential.parallel);
    assert!(parallel.parallel);
    assert_eq!(sequential.bitmap, parallel.bitmap);
    assert_eq!(sequential.stats, parallel.stats);
    assert_eq!(parallel.stats.total(), 400 * 300);
}

#[test]
fn test_in_place_equals_copy() {
    let input = portrait_bitmap(50, 40);
    let engine = MattingEngine::new(MattingParams::default());

    let copy = engine.process(&input).unwrap();
    let mut in_place = input.clone();
    let stats = engine.process_in_place(&mut in_place).unwrap();

    assert_eq!(in_place, copy.bitmap);
    assert_eq!(stats, copy.stats);
}

#[test]
fn test_portrait_regions() {
    let input = portrait_bitmap(90, 10);
    let out = remove_background(&input, &MattingParams::default()).unwrap();

    // Backdrop column
    assert_eq!(out.pixel(0, 0).map(|p| p[3]), Some(0));
    // Strand column: variance 30 + (x + y) % 40
    let strand = out.pixel(45, 0).unwrap();
    let expected = (2 * (i32::from(strand[0]) - 30)).min(255) as u8;
    assert_eq!(strand[3], expected);
    // Grey subject column keeps its alpha
    assert_eq!(out.pixel(89, 9).map(|p| p[3]), Some(255));
}

#[test]
fn test_luminance_boundary_is_strict() {
    // Grey 220 has luminance exactly 220.0
    let grey = Bitmap::filled(1, 1, [220, 220, 220, 255]).unwrap();

    assert_eq!(process(&grey, 20, 3).unwrap().pixel(0, 0), Some([220, 220, 220, 255]));
    assert_eq!(process(&grey, 21, 3).unwrap().pixel(0, 0), Some([220, 220, 220, 0]));
}

#[test]
fn test_hair_ceiling_is_strict() {
    // Luminance exactly 150.0 with variance 72: not hair, and below every
    // background cutoff in the slider range
    let px = Bitmap::filled(1, 1, [105, 177, 129, 255]).unwrap();
    assert_eq!(process(&px, 10, 3).unwrap().pixel(0, 0), Some([105, 177, 129, 255]));
}

#[test]
fn test_hair_takes_precedence_over_background() {
    // With a huge threshold every pixel is bright enough to be background,
    // but a dark tinted pixel still gets its soft alpha
    let px = Bitmap::filled(1, 1, [80, 40, 30, 255]).unwrap();
    assert_eq!(process(&px, 1000, 3).unwrap().pixel(0, 0), Some([80, 40, 30, 100]));
}

#[test]
fn test_dimension_mismatch_is_rejected() {
    let engine = MattingEngine::new(MattingParams::default());

    let err = engine.process_raw(2, 2, &[0; 15]).unwrap_err();
    assert!(matches!(err, MattingError::InvalidBitmap(_)));

    assert!(matches!(
        engine.process_raw(0, 2, &[]),
        Err(MattingError::InvalidBitmap(_))
    ));
    assert!(matches!(
        Bitmap::new(3, 1, vec![0; 16]),
        Err(MattingError::InvalidBitmap(_))
    ));
}

#[test]
fn test_single_pixel_and_single_row() {
    let px = Bitmap::filled(1, 1, [250, 250, 250, 255]).unwrap();
    assert_eq!(process(&px, 10, 3).unwrap().pixel(0, 0), Some([250, 250, 250, 0]));

    let row = noise_bitmap(257, 1, 3);
    let out = MattingEngine::new(MattingParams::default())
        .with_execution_mode(ExecutionMode::Parallel)
        .process(&row)
        .unwrap();
    assert_matches_oracle(&row, &out.bitmap, 10, 3);
}
