//! Image I/O operations service
//!
//! This module separates file I/O operations from the engine,
//! making the system more testable and maintainable.

use crate::{
    config::OutputFormat,
    error::{MattingError, Result},
    services::OutputFormatHandler,
    types::Bitmap,
};
use image::{DynamicImage, RgbaImage};
use std::path::Path;

/// Service for handling image file input/output operations
pub struct ImageIOService;

impl ImageIOService {
    /// Load an image from a file path
    ///
    /// Extension-based detection is tried first, then content sniffing.
    ///
    /// # Errors
    /// - File missing or unreadable
    /// - Content not decodable by any enabled codec
    ///
    /// # Examples
    /// ```rust,no_run
    /// use hairmatte::services::ImageIOService;
    ///
    /// let image = ImageIOService::load_image("input.jpg")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load_image<P: AsRef<Path>>(path: P) -> Result<DynamicImage> {
        let path_ref = path.as_ref();

        if !path_ref.exists() {
            return Err(MattingError::file_io_error(
                "read image file",
                path_ref,
                &std::io::Error::new(std::io::ErrorKind::NotFound, "file does not exist"),
            ));
        }

        match image::open(path_ref) {
            Ok(img) => Ok(img),
            Err(e) => {
                log::debug!(
                    "Extension-based loading failed for {}: {}. Attempting content-based detection.",
                    path_ref.display(),
                    e
                );

                let data = std::fs::read(path_ref).map_err(|io_err| {
                    MattingError::file_io_error("read image data", path_ref, &io_err)
                })?;

                image::load_from_memory(&data).map_err(|content_err| {
                    let extension = path_ref
                        .extension()
                        .and_then(|s| s.to_str())
                        .unwrap_or("unknown");

                    MattingError::processing_stage_error(
                        "image loading",
                        &format!(
                            "Failed to load image with both extension-based ({}) and content-based detection. Extension error: {}. Content error: {}",
                            extension, e, content_err
                        ),
                        Some(&format!("path: {}, size: {} bytes", path_ref.display(), data.len())),
                    )
                })
            },
        }
    }

    /// Decode an image held in memory
    ///
    /// # Errors
    /// - Empty input
    /// - Content not decodable by any enabled codec
    pub fn load_from_bytes(bytes: &[u8]) -> Result<DynamicImage> {
        if bytes.is_empty() {
            return Err(MattingError::processing_stage_error(
                "image loading",
                "no image data",
                None,
            ));
        }

        image::load_from_memory(bytes).map_err(|e| {
            MattingError::processing_stage_error(
                "image loading",
                &format!("Failed to decode image from bytes: {}", e),
                Some(&format!("{} bytes", bytes.len())),
            )
        })
    }

    /// Load a file straight into an opaque source bitmap
    ///
    /// # Errors
    /// - Any error from [`ImageIOService::load_image`]
    /// - `MattingError::InvalidBitmap` for a zero-sized image
    pub fn load_bitmap<P: AsRef<Path>>(path: P) -> Result<Bitmap> {
        let image = Self::load_image(path)?;
        Bitmap::opaque_from_image(&image)
    }

    /// Save an image to a file with the specified format
    ///
    /// Parent directories are created as needed.
    ///
    /// # Errors
    /// - Directory creation or file write failures
    /// - Encoder failures
    ///
    /// # Examples
    /// ```rust,no_run
    /// use hairmatte::{services::ImageIOService, OutputFormat};
    /// use image::RgbaImage;
    ///
    /// let image = RgbaImage::new(100, 100);
    /// ImageIOService::save_image(&image, "output.png", OutputFormat::Png)?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn save_image<P: AsRef<Path>>(
        image: &RgbaImage,
        path: P,
        format: OutputFormat,
    ) -> Result<()> {
        let path_ref = path.as_ref();
        let bytes = OutputFormatHandler::encode(image, format)?;
        Self::write_bytes(&bytes, path_ref)?;

        log::debug!("Saved {} output to {}", format, path_ref.display());
        Ok(())
    }

    /// Write already encoded bytes, creating parent directories as needed
    ///
    /// # Errors
    /// - `MattingError::Io` if the directory or file cannot be written
    pub fn write_bytes<P: AsRef<Path>>(bytes: &[u8], path: P) -> Result<()> {
        let path_ref = path.as_ref();

        if let Some(parent) = path_ref.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    MattingError::file_io_error("create output directory", parent, &e)
                })?;
            }
        }

        std::fs::write(path_ref, bytes)
            .map_err(|e| MattingError::file_io_error("write output image", path_ref, &e))
    }
}
