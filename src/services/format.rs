//! Output format handling service
//!
//! Maps `OutputFormat` onto encoders and file names. Every supported target
//! keeps the alpha channel.

use crate::{
    config::OutputFormat,
    error::{MattingError, Result},
};
use image::{ImageFormat, RgbaImage};
use std::io::Cursor;
use std::path::{Path, PathBuf};

/// File name offered for downloads when there is no input name to derive from
pub const DEFAULT_DOWNLOAD_NAME: &str = "removed_background.png";

/// Suffix appended to the input stem for derived output names
pub const OUTPUT_SUFFIX: &str = "_bg_removed";

/// Service for handling output format conversions
pub struct OutputFormatHandler;

impl OutputFormatHandler {
    /// Get the appropriate file extension for a given output format
    ///
    /// # Examples
    /// ```rust
    /// use hairmatte::{services::OutputFormatHandler, OutputFormat};
    ///
    /// assert_eq!(OutputFormatHandler::get_extension(OutputFormat::Png), "png");
    /// assert_eq!(OutputFormatHandler::get_extension(OutputFormat::Rgba8), "rgba8");
    /// ```
    #[must_use]
    pub fn get_extension(format: OutputFormat) -> &'static str {
        match format {
            OutputFormat::Png => "png",
            OutputFormat::WebP => "webp",
            OutputFormat::Tiff => "tiff",
            OutputFormat::Rgba8 => "rgba8",
        }
    }

    /// `image` crate format for encoded targets, `None` for raw RGBA8
    #[must_use]
    pub fn to_image_format(format: OutputFormat) -> Option<ImageFormat> {
        match format {
            OutputFormat::Png => Some(ImageFormat::Png),
            OutputFormat::WebP => Some(ImageFormat::WebP),
            OutputFormat::Tiff => Some(ImageFormat::Tiff),
            OutputFormat::Rgba8 => None,
        }
    }

    /// Guess the output format from a file extension (case-insensitive)
    #[must_use]
    pub fn from_extension(path: &Path) -> Option<OutputFormat> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "png" => Some(OutputFormat::Png),
            "webp" => Some(OutputFormat::WebP),
            "tif" | "tiff" => Some(OutputFormat::Tiff),
            "rgba" | "rgba8" | "raw" => Some(OutputFormat::Rgba8),
            _ => None,
        }
    }

    /// Encode an RGBA image into bytes of the requested format
    ///
    /// # Errors
    /// - Encoder failures from the `image` crate
    /// - `MattingError::UnsupportedFormat` when WebP support is compiled out
    pub fn encode(image: &RgbaImage, format: OutputFormat) -> Result<Vec<u8>> {
        let Some(image_format) = Self::to_image_format(format) else {
            return Ok(image.as_raw().clone());
        };

        #[cfg(not(feature = "webp-support"))]
        if image_format == ImageFormat::WebP {
            return Err(MattingError::unsupported_format(
                "WebP output requires the `webp-support` feature",
            ));
        }

        let mut buffer = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut buffer), image_format)
            .map_err(|e| {
                MattingError::processing_stage_error(
                    "encoding",
                    &format!("Failed to encode as {}: {}", format, e),
                    Some(&format!("{}x{} RGBA", image.width(), image.height())),
                )
            })?;
        Ok(buffer)
    }

    /// Derive `<stem>_bg_removed.<ext>` next to the input file
    #[must_use]
    pub fn derive_output_path(input_path: &Path, format: OutputFormat) -> PathBuf {
        let stem = input_path.file_stem().unwrap_or_default();
        let dir = input_path.parent().unwrap_or(Path::new("."));

        dir.join(format!(
            "{}{}.{}",
            stem.to_string_lossy(),
            OUTPUT_SUFFIX,
            Self::get_extension(format)
        ))
    }
}
