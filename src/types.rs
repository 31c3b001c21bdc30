//! Core types for matting operations

use crate::{
    config::{ExecutionMode, MattingParams, OutputFormat},
    error::{MattingError, Result},
    services::{ImageIOService, OutputFormatHandler},
};
use image::{DynamicImage, RgbaImage};
use log::info;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Bytes per RGBA pixel
pub const CHANNELS: usize = 4;

/// Check that `len` is exactly `width * height * 4` and both sides are non-zero
///
/// # Errors
/// - Zero width or height
/// - Buffer length different from `width * height * 4` (or not addressable)
pub fn validate_dimensions(width: u32, height: u32, len: usize) -> Result<()> {
    if width == 0 || height == 0 {
        return Err(MattingError::invalid_bitmap(format!(
            "dimensions must be positive, got {}x{}",
            width, height
        )));
    }

    let expected = (width as usize)
        .checked_mul(height as usize)
        .and_then(|pixels| pixels.checked_mul(CHANNELS));

    match expected {
        Some(expected) if expected == len => Ok(()),
        _ => Err(MattingError::buffer_length_mismatch(width, height, len)),
    }
}

/// Dense RGBA8 raster, row-major, no padding
///
/// The buffer length is always `width * height * 4`; every constructor checks it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitmap {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl Bitmap {
    /// Wrap an RGBA buffer
    ///
    /// # Errors
    /// - `MattingError::InvalidBitmap` when the buffer does not hold exactly `width * height` pixels
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        validate_dimensions(width, height, data.len())?;
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Bitmap where every pixel is `rgba`
    ///
    /// # Errors
    /// - `MattingError::InvalidBitmap` for zero or overflowing dimensions
    pub fn filled(width: u32, height: u32, rgba: [u8; 4]) -> Result<Self> {
        let bytes = (width as usize)
            .checked_mul(height as usize)
            .and_then(|pixels| pixels.checked_mul(CHANNELS))
            .ok_or_else(|| MattingError::buffer_length_mismatch(width, height, 0))?;
        Self::new(width, height, rgba.repeat(bytes / CHANNELS))
    }

    /// Take ownership of an `RgbaImage` without touching its alpha
    ///
    /// # Errors
    /// - `MattingError::InvalidBitmap` for an empty image
    pub fn from_rgba_image(image: RgbaImage) -> Result<Self> {
        let (width, height) = image.dimensions();
        Self::new(width, height, image.into_raw())
    }

    /// Convert any decoded image to an opaque source bitmap
    ///
    /// Alpha is forced to 255, the same as drawing the picture onto an
    /// opaque canvas before reading its pixels back.
    ///
    /// # Errors
    /// - `MattingError::InvalidBitmap` for an empty image
    pub fn opaque_from_image(image: &DynamicImage) -> Result<Self> {
        let mut rgba = image.to_rgba8();
        for pixel in rgba.pixels_mut() {
            pixel.0[3] = u8::MAX;
        }
        Self::from_rgba_image(rgba)
    }

    /// Width in pixels
    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels
    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    #[must_use]
    pub fn pixel_count(&self) -> usize {
        self.data.len() / CHANNELS
    }

    /// Row stride in bytes
    #[must_use]
    pub fn stride(&self) -> usize {
        self.width as usize * CHANNELS
    }

    /// Raw RGBA bytes
    #[must_use]
    pub fn as_raw(&self) -> &[u8] {
        &self.data
    }

    pub(crate) fn as_raw_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Consume the bitmap and return its buffer
    #[must_use]
    pub fn into_raw(self) -> Vec<u8> {
        self.data
    }

    /// RGBA value at (`x`, `y`), `None` outside the raster
    #[must_use]
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = (y as usize * self.width as usize + x as usize) * CHANNELS;
        let px = self.data.get(offset..offset + CHANNELS)?;
        Some([px[0], px[1], px[2], px[3]])
    }

    /// Iterator over alpha values in pixel order
    pub fn alpha_channel(&self) -> impl Iterator<Item = u8> + '_ {
        self.data.chunks_exact(CHANNELS).map(|px| px[3])
    }

    /// `true` when every pixel carries A = 255
    #[must_use]
    pub fn is_opaque(&self) -> bool {
        self.alpha_channel().all(|a| a == u8::MAX)
    }

    /// Convert into an `image` crate buffer for encoding and compositing
    ///
    /// # Errors
    /// - `MattingError::Processing` if the buffer cannot back an `RgbaImage`
    pub fn into_rgba_image(self) -> Result<RgbaImage> {
        RgbaImage::from_raw(self.width, self.height, self.data)
            .ok_or_else(|| MattingError::processing("Failed to create RGBA image from bitmap data"))
    }

    /// Borrowing variant of [`Bitmap::into_rgba_image`]
    ///
    /// # Errors
    /// - `MattingError::Processing` if the buffer cannot back an `RgbaImage`
    pub fn to_rgba_image(&self) -> Result<RgbaImage> {
        self.clone().into_rgba_image()
    }
}

/// Per-class pixel counts from one classification pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MattingStats {
    /// Pixels made fully transparent
    pub background: usize,
    /// Pixels given a soft alpha
    pub hair: usize,
    /// Pixels whose alpha was left untouched
    pub foreground: usize,
}

impl MattingStats {
    #[must_use]
    pub fn total(&self) -> usize {
        self.background + self.hair + self.foreground
    }

    /// Fraction of pixels classified as background
    #[must_use]
    pub fn transparent_ratio(&self) -> f64 {
        ratio(self.background, self.total())
    }

    /// Fraction of pixels classified as hair
    #[must_use]
    pub fn hair_ratio(&self) -> f64 {
        ratio(self.hair, self.total())
    }

    /// Combine counts from two disjoint regions
    #[must_use]
    pub fn merge(self, other: Self) -> Self {
        Self {
            background: self.background + other.background,
            hair: self.hair + other.hair,
            foreground: self.foreground + other.foreground,
        }
    }
}

fn ratio(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64
    }
}

/// Timing breakdown for one processing call
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingTimings {
    /// Image loading and decoding
    pub image_decode_ms: u64,

    /// The classification pass
    pub classification_ms: u64,

    /// Checkerboard preview rendering, if requested
    pub preview_ms: Option<u64>,

    /// Final image encoding (if saving to file)
    pub image_encode_ms: Option<u64>,

    /// Total end-to-end processing time
    pub total_ms: u64,
}

impl ProcessingTimings {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Time not attributed to any measured stage
    #[must_use]
    pub fn other_overhead_ms(&self) -> u64 {
        let measured = self.image_decode_ms
            + self.classification_ms
            + self.preview_ms.unwrap_or(0)
            + self.image_encode_ms.unwrap_or(0);
        self.total_ms.saturating_sub(measured)
    }

    fn pct(&self, ms: u64) -> f64 {
        if self.total_ms == 0 {
            0.0
        } else {
            ms as f64 / self.total_ms as f64 * 100.0
        }
    }
}

/// Metadata attached to a processing result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingMetadata {
    /// Parameters the engine ran with
    pub params: MattingParams,
    /// Requested scheduling mode
    pub execution_mode: ExecutionMode,
    /// Whether the pass actually ran on the thread pool
    pub parallel: bool,
    /// Stage timings
    pub timings: ProcessingTimings,
}

impl ProcessingMetadata {
    #[must_use]
    pub fn new(params: MattingParams, execution_mode: ExecutionMode) -> Self {
        Self {
            params,
            execution_mode,
            parallel: false,
            timings: ProcessingTimings::new(),
        }
    }
}

/// Result of a matting operation
#[derive(Debug, Clone)]
pub struct MattingResult {
    /// The processed image with computed alpha
    pub bitmap: Bitmap,

    /// Pixel class counts
    pub stats: MattingStats,

    /// Processing metadata
    pub metadata: ProcessingMetadata,

    /// Original input path (for logging purposes)
    pub input_path: Option<String>,
}

impl MattingResult {
    /// Create a new matting result
    #[must_use]
    pub fn new(bitmap: Bitmap, stats: MattingStats, metadata: ProcessingMetadata) -> Self {
        Self {
            bitmap,
            stats,
            metadata,
            input_path: None,
        }
    }

    /// Attach the input path used for log lines
    #[must_use]
    pub fn with_input_path<S: Into<String>>(mut self, input_path: S) -> Self {
        self.input_path = Some(input_path.into());
        self
    }

    /// Get image dimensions
    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        self.bitmap.dimensions()
    }

    /// Get detailed timing breakdown
    #[must_use]
    pub fn timings(&self) -> &ProcessingTimings {
        &self.metadata.timings
    }

    /// Get the image as raw RGBA bytes
    #[must_use]
    pub fn to_rgba_bytes(&self) -> Vec<u8> {
        self.bitmap.as_raw().to_vec()
    }

    /// Get the image as encoded bytes in the specified format
    ///
    /// # Errors
    /// - Encoder failures from the `image` crate
    pub fn to_bytes(&self, format: OutputFormat) -> Result<Vec<u8>> {
        let image = self.bitmap.to_rgba_image()?;
        OutputFormatHandler::encode(&image, format)
    }

    /// Save the result as PNG with alpha channel
    ///
    /// # Errors
    /// - File creation or PNG encoding failures
    pub fn save_png<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        self.save(path, OutputFormat::Png)
    }

    /// Save in the specified format and record the encoding time
    ///
    /// # Errors
    /// - File creation or encoding failures
    pub fn save<P: AsRef<Path>>(&mut self, path: P, format: OutputFormat) -> Result<()> {
        let path_ref = path.as_ref();
        let encode_start = instant::Instant::now();

        let image = self.bitmap.to_rgba_image()?;
        ImageIOService::save_image(&image, path_ref, format)?;

        let encode_ms = encode_start.elapsed().as_millis() as u64;
        self.metadata.timings.image_encode_ms = Some(encode_ms);

        info!(
            "Processed: {} -> {} in {:.2}s",
            self.input_path.as_deref().unwrap_or("input"),
            path_ref.display(),
            (self.metadata.timings.total_ms + encode_ms) as f64 / 1000.0
        );

        Ok(())
    }

    /// Get timing summary for display
    #[must_use]
    pub fn timing_summary(&self) -> String {
        let t = &self.metadata.timings;

        let mut summary = format!(
            "Total: {}ms | Decode: {}ms ({:.1}%) | Classify: {}ms ({:.1}%)",
            t.total_ms,
            t.image_decode_ms,
            t.pct(t.image_decode_ms),
            t.classification_ms,
            t.pct(t.classification_ms),
        );

        if let Some(preview_ms) = t.preview_ms {
            summary.push_str(&format!(" | Preview: {}ms ({:.1}%)", preview_ms, t.pct(preview_ms)));
        }

        if let Some(encode_ms) = t.image_encode_ms {
            summary.push_str(&format!(" | Encode: {}ms", encode_ms));
        }

        let other_ms = t.other_overhead_ms();
        if other_ms > 5 {
            summary.push_str(&format!(" | Other: {}ms ({:.1}%)", other_ms, t.pct(other_ms)));
        }

        summary
    }

    /// One-line summary of the classification counts
    #[must_use]
    pub fn stats_summary(&self) -> String {
        format!(
            "{} px | background: {} ({:.1}%) | hair: {} ({:.1}%) | foreground: {}",
            self.stats.total(),
            self.stats.background,
            self.stats.transparent_ratio() * 100.0,
            self.stats.hair,
            self.stats.hair_ratio() * 100.0,
            self.stats.foreground
        )
    }
}
