//! Per-pixel matting engine
//!
//! Every pixel is classified on its own colour alone, using two cheap
//! measurements:
//!
//! - luminance `L = 0.299 r + 0.587 g + 0.114 b` (BT.601 weights, unrounded)
//! - colour variance `V = max(|r-g|, |r-b|, |g-b|)`
//!
//! A pixel is background when `L > 240 - background_threshold`, and hair when
//! `V > hair_sensitivity && L < 150`. Hair wins over background and receives
//! `alpha = min(255, 2V)`; background receives `alpha = 0`; anything else keeps
//! the alpha it came in with.
//!
//! There is no neighbourhood step. Pixels never read each other, so the buffer
//! can be split into row chunks and run on the rayon pool with no coordination
//! beyond the final join. Isolated misclassified pixels are expected output.

use crate::{
    config::{ExecutionMode, MattingConfig, MattingParams},
    error::{MattingError, Result},
    types::{validate_dimensions, Bitmap, MattingStats, CHANNELS},
};
use rayon::prelude::*;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use tracing::{debug, instrument};

/// Luminance base that `background_threshold` is subtracted from
pub const BACKGROUND_LUMINANCE_BASE: f64 = 240.0;

/// Hair pixels must be strictly darker than this
pub const HAIR_LUMINANCE_CEILING: f64 = 150.0;

const LUMA_R: f64 = 0.299;
const LUMA_G: f64 = 0.587;
const LUMA_B: f64 = 0.114;

/// Perceptual luminance of an RGB triple
#[inline]
#[must_use]
pub fn luminance(r: u8, g: u8, b: u8) -> f64 {
    LUMA_R * f64::from(r) + LUMA_G * f64::from(g) + LUMA_B * f64::from(b)
}

/// Largest pairwise channel difference
#[inline]
#[must_use]
pub fn color_variance(r: u8, g: u8, b: u8) -> i32 {
    let (r, g, b) = (i32::from(r), i32::from(g), i32::from(b));
    (r - g).abs().max((r - b).abs()).max((g - b).abs())
}

/// Outcome of classifying a single pixel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelClass {
    /// Bright, near-grey: fully transparent
    Background,
    /// Dark and tinted: soft alpha proportional to the variance
    Hair {
        /// Alpha assigned to the pixel
        alpha: u8,
    },
    /// Neither: alpha untouched
    Foreground,
}

impl PixelClass {
    /// Alpha to write, given the alpha currently stored in the pixel
    #[inline]
    #[must_use]
    pub fn resolve_alpha(self, current: u8) -> u8 {
        match self {
            Self::Background => 0,
            Self::Hair { alpha } => alpha,
            Self::Foreground => current,
        }
    }
}

/// Classify one pixel
///
/// Parameters are used as given; out-of-range values simply move the cutoffs.
#[inline]
#[must_use]
pub fn classify(r: u8, g: u8, b: u8, params: &MattingParams) -> PixelClass {
    let l = luminance(r, g, b);
    let v = color_variance(r, g, b);

    let is_background = l > params.background_cutoff();
    let is_hair = v > params.hair_sensitivity && l < HAIR_LUMINANCE_CEILING;

    if is_hair {
        PixelClass::Hair {
            alpha: (v * 2).min(i32::from(u8::MAX)) as u8,
        }
    } else if is_background {
        PixelClass::Background
    } else {
        PixelClass::Foreground
    }
}

/// Cooperative cancellation flag, checked between row chunks
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation; chunks already running finish first
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

/// Output of one engine pass
#[derive(Debug, Clone)]
pub struct MattingOutput {
    /// New bitmap with computed alpha
    pub bitmap: Bitmap,
    /// Pixel class counts
    pub stats: MattingStats,
    /// Whether the pass ran on the rayon pool
    pub parallel: bool,
}

/// Stateless matting engine
///
/// Holds only the request parameters and scheduling options; nothing is
/// carried from one call to the next.
#[derive(Debug, Clone, Copy, Default)]
pub struct MattingEngine {
    params: MattingParams,
    execution_mode: ExecutionMode,
    rows_per_chunk: usize,
}

impl MattingEngine {
    /// Engine with the given parameters and automatic scheduling
    #[must_use]
    pub fn new(params: MattingParams) -> Self {
        Self {
            params,
            execution_mode: ExecutionMode::Auto,
            rows_per_chunk: 0,
        }
    }

    /// Engine configured from a `MattingConfig`
    #[must_use]
    pub fn from_config(config: &MattingConfig) -> Self {
        Self {
            params: config.params,
            execution_mode: config.execution_mode,
            rows_per_chunk: config.rows_per_chunk,
        }
    }

    #[must_use]
    pub fn with_execution_mode(mut self, mode: ExecutionMode) -> Self {
        self.execution_mode = mode;
        self
    }

    #[must_use]
    pub fn with_rows_per_chunk(mut self, rows: usize) -> Self {
        self.rows_per_chunk = rows;
        self
    }

    #[must_use]
    pub fn params(&self) -> &MattingParams {
        &self.params
    }

    /// Copy-on-write pass: the input is left untouched
    ///
    /// # Errors
    /// - `MattingError::InvalidBitmap` if the bitmap's buffer does not match its dimensions
    pub fn process(&self, bitmap: &Bitmap) -> Result<MattingOutput> {
        self.process_with_cancellation(bitmap, &CancellationToken::new())
    }

    /// Copy-on-write pass that stops between chunks once `token` is cancelled
    ///
    /// The partially written copy is dropped on cancellation, so the caller
    /// never observes a half-processed bitmap.
    ///
    /// # Errors
    /// - `MattingError::InvalidBitmap` if the bitmap's buffer does not match its dimensions
    /// - `MattingError::Cancelled` if the token fired before the last chunk
    #[instrument(skip(self, bitmap, token), fields(width = bitmap.width(), height = bitmap.height()))]
    pub fn process_with_cancellation(
        &self,
        bitmap: &Bitmap,
        token: &CancellationToken,
    ) -> Result<MattingOutput> {
        validate_dimensions(bitmap.width(), bitmap.height(), bitmap.as_raw().len())?;

        let mut output = bitmap.clone();
        let (stats, parallel) = self.run(&mut output, Some(token))?;

        Ok(MattingOutput {
            bitmap: output,
            stats,
            parallel,
        })
    }

    /// In-place pass; the caller hands the engine exclusive write access via `&mut`
    ///
    /// Only the alpha byte of each pixel is written. Validation happens
    /// before the first write.
    ///
    /// # Errors
    /// - `MattingError::InvalidBitmap` if the bitmap's buffer does not match its dimensions
    pub fn process_in_place(&self, bitmap: &mut Bitmap) -> Result<MattingStats> {
        validate_dimensions(bitmap.width(), bitmap.height(), bitmap.as_raw().len())?;
        let (stats, _) = self.run(bitmap, None)?;
        Ok(stats)
    }

    /// Pass over a bare RGBA buffer, returning a new buffer
    ///
    /// # Errors
    /// - `MattingError::InvalidBitmap` if `data.len() != width * height * 4` or a dimension is zero
    pub fn process_raw(&self, width: u32, height: u32, data: &[u8]) -> Result<Vec<u8>> {
        validate_dimensions(width, height, data.len())?;
        let bitmap = Bitmap::new(width, height, data.to_vec())?;
        Ok(self.process(&bitmap)?.bitmap.into_raw())
    }

    fn run(
        &self,
        bitmap: &mut Bitmap,
        token: Option<&CancellationToken>,
    ) -> Result<(MattingStats, bool)> {
        let parallel = self.execution_mode.is_parallel_for(bitmap.pixel_count());
        let rows = self.chunk_rows(bitmap.height() as usize, parallel);
        let chunk_len = rows * bitmap.stride();
        let params = self.params;

        debug!(
            parallel,
            rows_per_chunk = rows,
            background_threshold = params.background_threshold,
            hair_sensitivity = params.hair_sensitivity,
            "Starting classification pass"
        );

        let process_chunk = |chunk: &mut [u8]| -> Result<MattingStats> {
            if token.is_some_and(CancellationToken::is_cancelled) {
                return Err(MattingError::Cancelled);
            }
            Ok(classify_chunk(chunk, &params))
        };

        let stats = if parallel {
            bitmap
                .as_raw_mut()
                .par_chunks_mut(chunk_len)
                .map(process_chunk)
                .try_reduce(MattingStats::default, |a, b| Ok(a.merge(b)))?
        } else {
            bitmap
                .as_raw_mut()
                .chunks_mut(chunk_len)
                .map(process_chunk)
                .try_fold(MattingStats::default(), |acc, chunk| {
                    chunk.map(|stats| acc.merge(stats))
                })?
        };

        debug!(
            background = stats.background,
            hair = stats.hair,
            foreground = stats.foreground,
            "Classification pass finished"
        );

        Ok((stats, parallel))
    }

    fn chunk_rows(&self, height: usize, parallel: bool) -> usize {
        if self.rows_per_chunk > 0 {
            return self.rows_per_chunk.min(height).max(1);
        }
        if parallel {
            // A few chunks per worker keeps the pool busy on uneven images
            let chunks = rayon::current_num_threads().max(1) * 4;
            height.div_ceil(chunks).max(1)
        } else {
            height.max(1)
        }
    }
}

/// Classify every pixel in a chunk of whole pixels, rewriting only alpha
fn classify_chunk(chunk: &mut [u8], params: &MattingParams) -> MattingStats {
    let mut stats = MattingStats::default();

    for px in chunk.chunks_exact_mut(CHANNELS) {
        let class = classify(px[0], px[1], px[2], params);
        match class {
            PixelClass::Background => stats.background += 1,
            PixelClass::Hair { .. } => stats.hair += 1,
            PixelClass::Foreground => stats.foreground += 1,
        }
        px[3] = class.resolve_alpha(px[3]);
    }

    stats
}

/// Run the engine once with raw parameters
///
/// Returns a new bitmap; `bitmap` is not modified.
///
/// # Errors
/// - `MattingError::InvalidBitmap` if the bitmap's buffer does not match its dimensions
///
/// # Examples
///
/// ```rust
/// use hairmatte::{process, Bitmap};
///
/// let white = Bitmap::filled(2, 2, [255, 255, 255, 255]).unwrap();
/// let result = process(&white, 10, 3).unwrap();
/// assert!(result.alpha_channel().all(|a| a == 0));
/// ```
pub fn process(bitmap: &Bitmap, background_threshold: i32, hair_sensitivity: i32) -> Result<Bitmap> {
    let params = MattingParams::new(background_threshold, hair_sensitivity);
    Ok(MattingEngine::new(params).process(bitmap)?.bitmap)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defaults() -> MattingParams {
        MattingParams::default()
    }

    #[test]
    fn test_luminance_and_variance() {
        assert!((luminance(255, 255, 255) - 255.0).abs() < 1e-9);
        assert!((luminance(80, 40, 30) - 50.82).abs() < 1e-9);
        assert_eq!(color_variance(80, 40, 30), 50);
        assert_eq!(color_variance(100, 102, 101), 2);
        assert_eq!(color_variance(7, 7, 7), 0);
    }

    #[test]
    fn test_white_is_background() {
        assert_eq!(classify(255, 255, 255, &defaults()), PixelClass::Background);
        assert_eq!(PixelClass::Background.resolve_alpha(255), 0);
    }

    #[test]
    fn test_hair_pixel_gets_soft_alpha() {
        let class = classify(80, 40, 30, &defaults());
        assert_eq!(class, PixelClass::Hair { alpha: 100 });
        assert_eq!(class.resolve_alpha(255), 100);
    }

    #[test]
    fn test_hair_alpha_saturates() {
        // V = 200, 2V = 400
        let class = classify(0, 200, 0, &defaults());
        assert_eq!(class, PixelClass::Hair { alpha: 255 });
        // V = 128 is the first value reaching full opacity
        assert_eq!(classify(128, 0, 0, &defaults()), PixelClass::Hair { alpha: 255 });
        assert_eq!(classify(127, 0, 0, &defaults()), PixelClass::Hair { alpha: 254 });
    }

    #[test]
    fn test_near_grey_midtone_is_foreground() {
        let class = classify(100, 102, 101, &defaults());
        assert_eq!(class, PixelClass::Foreground);
        assert_eq!(class.resolve_alpha(255), 255);
        assert_eq!(class.resolve_alpha(17), 17);
    }

    #[test]
    fn test_background_boundary_is_strict() {
        // luminance(220, 220, 220) == 220.0 exactly
        assert!((luminance(220, 220, 220) - 220.0).abs() < f64::EPSILON);
        assert_eq!(
            classify(220, 220, 220, &MattingParams::new(20, 3)),
            PixelClass::Foreground
        );
        assert_eq!(
            classify(220, 220, 220, &MattingParams::new(21, 3)),
            PixelClass::Background
        );
    }

    #[test]
    fn test_grey_background_follows_params_cutoff() {
        // Greys have V = 0, so only the cutoff decides
        for bt in [-20, 0, 1, 10, 50, 90, 300] {
            let params = MattingParams::new(bt, 3);
            for level in 0..=255u8 {
                let expected = luminance(level, level, level) > params.background_cutoff();
                assert_eq!(
                    classify(level, level, level, &params) == PixelClass::Background,
                    expected,
                    "grey {} at threshold {}",
                    level,
                    bt
                );
            }
        }
    }

    #[test]
    fn test_hair_ceiling_is_strict() {
        // luminance(105, 177, 129) == 150.0 exactly, V = 72
        assert!((luminance(105, 177, 129) - 150.0).abs() < f64::EPSILON);
        assert_eq!(classify(105, 177, 129, &defaults()), PixelClass::Foreground);
    }

    #[test]
    fn test_hair_sensitivity_is_strict() {
        // V = 3 is not > 3
        assert_eq!(classify(53, 50, 50, &MattingParams::new(10, 3)), PixelClass::Foreground);
        assert_eq!(
            classify(53, 50, 50, &MattingParams::new(10, 2)),
            PixelClass::Hair { alpha: 6 }
        );
    }

    #[test]
    fn test_degenerate_parameters() {
        // threshold 0 puts the cutoff at exactly 240
        assert_eq!(classify(240, 240, 240, &MattingParams::new(0, 3)), PixelClass::Foreground);
        assert_eq!(classify(242, 242, 242, &MattingParams::new(0, 3)), PixelClass::Background);

        // a huge threshold makes every non-hair pixel background
        assert_eq!(
            classify(0, 0, 0, &MattingParams::new(i32::MAX, 3)),
            PixelClass::Background
        );

        // negative sensitivity turns dark grey into zero-alpha hair
        assert_eq!(
            classify(10, 10, 10, &MattingParams::new(10, -1)),
            PixelClass::Hair { alpha: 0 }
        );

        // extreme negative threshold: nothing is background
        assert_eq!(
            classify(255, 255, 255, &MattingParams::new(i32::MIN, 3)),
            PixelClass::Foreground
        );
    }

    #[test]
    fn test_chunked_and_whole_agree() {
        let data: Vec<u8> = (0..(17u32 * 9 * 4)).map(|i| (i * 37 % 256) as u8).collect();
        let bitmap = Bitmap::new(17, 9, data).unwrap();

        let whole = MattingEngine::new(defaults())
            .with_execution_mode(ExecutionMode::Sequential)
            .process(&bitmap)
            .unwrap();
        let chunked = MattingEngine::new(defaults())
            .with_execution_mode(ExecutionMode::Parallel)
            .with_rows_per_chunk(2)
            .process(&bitmap)
            .unwrap();

        assert_eq!(whole.bitmap, chunked.bitmap);
        assert_eq!(whole.stats, chunked.stats);
        assert!(!whole.parallel);
        assert!(chunked.parallel);
        assert_eq!(whole.stats.total(), 17 * 9);
    }

    #[test]
    fn test_cancelled_token_stops_pass() {
        let bitmap = Bitmap::filled(4, 4, [255, 255, 255, 255]).unwrap();
        let token = CancellationToken::new();
        token.cancel();

        let result = MattingEngine::new(defaults()).process_with_cancellation(&bitmap, &token);
        assert!(matches!(result, Err(MattingError::Cancelled)));
        assert!(bitmap.is_opaque());
    }

    #[test]
    fn test_process_raw_rejects_bad_length() {
        let engine = MattingEngine::new(defaults());
        assert!(matches!(
            engine.process_raw(3, 3, &[0; 35]),
            Err(MattingError::InvalidBitmap(_))
        ));
        assert_eq!(engine.process_raw(1, 1, &[255, 255, 255, 255]).unwrap(), vec![255, 255, 255, 0]);
    }
}
