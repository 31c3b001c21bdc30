//! Configuration types for matting operations

use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;

/// Default background threshold (UI slider starting position)
pub const DEFAULT_BACKGROUND_THRESHOLD: i32 = 10;

/// Default hair sensitivity (UI slider starting position)
pub const DEFAULT_HAIR_SENSITIVITY: i32 = 3;

/// Range offered by the background threshold slider
pub const BACKGROUND_THRESHOLD_RANGE: RangeInclusive<i32> = 1..=50;

/// Range offered by the hair sensitivity slider
pub const HAIR_SENSITIVITY_RANGE: RangeInclusive<i32> = 1..=10;

/// Images with at least this many pixels run on the rayon pool in `Auto` mode
pub const PARALLEL_PIXEL_THRESHOLD: usize = 256 * 256;

/// Sensitivity parameters for a single matting request
///
/// The engine accepts any integer for both fields. Range restriction to the
/// slider domains is the caller's concern, see [`MattingParams::validate_ui_range`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MattingParams {
    /// Higher value treats a wider band of near-white luminance as background
    pub background_threshold: i32,
    /// Lower value lets more pixels qualify as hair
    pub hair_sensitivity: i32,
}

impl Default for MattingParams {
    fn default() -> Self {
        Self {
            background_threshold: DEFAULT_BACKGROUND_THRESHOLD,
            hair_sensitivity: DEFAULT_HAIR_SENSITIVITY,
        }
    }
}

impl MattingParams {
    /// Create parameters from raw values, without any clamping
    #[must_use]
    pub fn new(background_threshold: i32, hair_sensitivity: i32) -> Self {
        Self {
            background_threshold,
            hair_sensitivity,
        }
    }

    /// Luminance a pixel must strictly exceed to count as background
    #[must_use]
    pub fn background_cutoff(&self) -> f64 {
        crate::matting::BACKGROUND_LUMINANCE_BASE - f64::from(self.background_threshold)
    }

    /// Check both values against the slider ranges
    ///
    /// The engine never calls this; front ends that expose sliders or flags
    /// use it to reject out-of-range input before a request is built.
    ///
    /// # Errors
    /// - Background threshold outside 1-50
    /// - Hair sensitivity outside 1-10
    ///
    /// # Examples
    ///
    /// ```rust
    /// use hairmatte::MattingParams;
    ///
    /// assert!(MattingParams::default().validate_ui_range().is_ok());
    /// assert!(MattingParams::new(0, 3).validate_ui_range().is_err());
    /// ```
    pub fn validate_ui_range(&self) -> crate::Result<()> {
        if !BACKGROUND_THRESHOLD_RANGE.contains(&self.background_threshold) {
            return Err(crate::error::MattingError::config_value_error(
                "background threshold",
                self.background_threshold,
                "1-50",
                Some(DEFAULT_BACKGROUND_THRESHOLD),
            ));
        }

        if !HAIR_SENSITIVITY_RANGE.contains(&self.hair_sensitivity) {
            return Err(crate::error::MattingError::config_value_error(
                "hair sensitivity",
                self.hair_sensitivity,
                "1-10",
                Some(DEFAULT_HAIR_SENSITIVITY),
            ));
        }

        Ok(())
    }
}

/// How the per-pixel pass is scheduled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ExecutionMode {
    /// Parallel for large images, sequential otherwise
    #[default]
    Auto,
    /// Single thread, rows processed in order
    Sequential,
    /// Row chunks spread across the rayon thread pool
    Parallel,
}

impl ExecutionMode {
    /// Resolve `Auto` for an image with `pixel_count` pixels
    #[must_use]
    pub fn is_parallel_for(self, pixel_count: usize) -> bool {
        match self {
            Self::Auto => pixel_count >= PARALLEL_PIXEL_THRESHOLD,
            Self::Sequential => false,
            Self::Parallel => true,
        }
    }
}

impl std::fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::Sequential => write!(f, "sequential"),
            Self::Parallel => write!(f, "parallel"),
        }
    }
}

/// Output image format options
///
/// Only alpha-capable targets are offered; the computed alpha is the whole result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OutputFormat {
    /// PNG with alpha channel transparency
    #[default]
    Png,
    /// Lossless WebP with alpha channel transparency
    WebP,
    /// TIFF with alpha channel transparency
    Tiff,
    /// Raw RGBA8 pixel data (4 bytes per pixel, no header)
    Rgba8,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Png => write!(f, "png"),
            Self::WebP => write!(f, "webp"),
            Self::Tiff => write!(f, "tiff"),
            Self::Rgba8 => write!(f, "rgba8"),
        }
    }
}

/// Configuration for matting operations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MattingConfig {
    /// Sensitivity parameters passed to the engine
    pub params: MattingParams,

    /// Scheduling of the per-pixel pass
    pub execution_mode: ExecutionMode,

    /// Output format
    pub output_format: OutputFormat,

    /// Rows per work chunk (0 = derive from image height and thread count)
    pub rows_per_chunk: usize,

    /// Reject parameters outside the slider ranges at build time
    pub strict_ui_ranges: bool,

    /// Enable debug mode (additional logging)
    pub debug: bool,
}

impl Default for MattingConfig {
    fn default() -> Self {
        Self {
            params: MattingParams::default(),
            execution_mode: ExecutionMode::default(),
            output_format: OutputFormat::default(),
            rows_per_chunk: 0,
            strict_ui_ranges: false,
            debug: false,
        }
    }
}

impl MattingConfig {
    /// Create a new configuration builder for fluent API construction
    ///
    /// # Examples
    ///
    /// ```rust
    /// use hairmatte::{ExecutionMode, MattingConfig, OutputFormat};
    ///
    /// let config = MattingConfig::builder()
    ///     .background_threshold(25)
    ///     .hair_sensitivity(2)
    ///     .execution_mode(ExecutionMode::Parallel)
    ///     .output_format(OutputFormat::Png)
    ///     .build()
    ///     .unwrap();
    /// assert_eq!(config.params.background_threshold, 25);
    /// ```
    #[must_use]
    pub fn builder() -> MattingConfigBuilder {
        MattingConfigBuilder::default()
    }

    /// Validate the configuration
    ///
    /// Parameters are only range-checked when `strict_ui_ranges` is set.
    ///
    /// # Errors
    /// - Parameters outside the slider ranges while `strict_ui_ranges` is enabled
    pub fn validate(&self) -> crate::Result<()> {
        if self.strict_ui_ranges {
            self.params.validate_ui_range()?;
        }
        Ok(())
    }
}

/// Builder for `MattingConfig`
#[derive(Debug, Default)]
pub struct MattingConfigBuilder {
    config: MattingConfig,
}

impl MattingConfigBuilder {
    /// Set both sensitivity parameters
    #[must_use]
    pub fn params(mut self, params: MattingParams) -> Self {
        self.config.params = params;
        self
    }

    /// Set background threshold
    #[must_use]
    pub fn background_threshold(mut self, threshold: i32) -> Self {
        self.config.params.background_threshold = threshold;
        self
    }

    /// Set hair sensitivity
    #[must_use]
    pub fn hair_sensitivity(mut self, sensitivity: i32) -> Self {
        self.config.params.hair_sensitivity = sensitivity;
        self
    }

    /// Set execution mode
    #[must_use]
    pub fn execution_mode(mut self, mode: ExecutionMode) -> Self {
        self.config.execution_mode = mode;
        self
    }

    /// Set output format
    #[must_use]
    pub fn output_format(mut self, format: OutputFormat) -> Self {
        self.config.output_format = format;
        self
    }

    /// Set rows per work chunk
    #[must_use]
    pub fn rows_per_chunk(mut self, rows: usize) -> Self {
        self.config.rows_per_chunk = rows;
        self
    }

    /// Enable slider range checks at build time
    #[must_use]
    pub fn strict_ui_ranges(mut self, strict: bool) -> Self {
        self.config.strict_ui_ranges = strict;
        self
    }

    /// Enable debug mode
    #[must_use]
    pub fn debug(mut self, debug: bool) -> Self {
        self.config.debug = debug;
        self
    }

    /// Build and validate the configuration
    ///
    /// # Errors
    /// - Parameters outside the slider ranges while `strict_ui_ranges` is enabled
    pub fn build(self) -> crate::Result<MattingConfig> {
        let config = self.config;
        config.validate()?;
        Ok(config)
    }
}
