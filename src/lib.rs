#![allow(clippy::too_many_lines)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::unused_async)]

//! # hairmatte
//!
//! Hair-preserving background removal for photos on light backdrops.
//!
//! Every pixel is classified from its own colour: bright pixels become
//! transparent, dark pixels with a visible colour cast (hair, fur, fine
//! strands) get a partial alpha proportional to that cast, and everything
//! else keeps its alpha. There is no model and no neighbourhood pass, which
//! makes the engine deterministic and trivially parallel.
//!
//! ## Features
//!
//! - **Matting engine**: pure per-pixel classification, sequential or on the rayon pool
//! - **Format support**: PNG, JPEG, WebP, BMP and TIFF input; PNG, WebP, TIFF or raw RGBA8 output
//! - **Preview rendering**: checkerboard composite and side-by-side comparison
//! - **Async and sync APIs**: async wrappers run the engine on a blocking worker
//! - **CLI integration**: optional `hairmatte` binary (enable with `cli` feature)
//!
//! ## Quick Start
//!
//! ```rust
//! use hairmatte::{remove_background, Bitmap, MattingParams};
//!
//! let photo = Bitmap::filled(8, 8, [250, 250, 250, 255])?;
//! let matte = remove_background(&photo, &MattingParams::default())?;
//! assert!(matte.alpha_channel().all(|a| a == 0));
//! # Ok::<(), hairmatte::MattingError>(())
//! ```
//!
//! ### Async usage
//!
//! ```rust,no_run
//! use hairmatte::{remove_background_from_reader, MattingConfig};
//! use tokio::fs::File;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = MattingConfig::builder()
//!     .background_threshold(20)
//!     .hair_sensitivity(4)
//!     .build()?;
//!
//! let file = File::open("portrait.jpg").await?;
//! let mut result = remove_background_from_reader(file, &config).await?;
//! result.save_png("portrait_bg_removed.png")?;
//! # Ok(())
//! # }
//! ```
//!
//! ### Feature Flags
//!
//! - `cli` (default): command-line interface, progress spinner and tracing setup
//! - `webp-support` (default): WebP encoding and decoding
//! - `tracing-json`: JSON log output for the CLI
//!
//! ```toml
//! [dependencies]
//! hairmatte = { version = "0.1", default-features = false }
//! ```

#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod error;
pub mod matting;
pub mod preview;
pub mod processor;
pub mod services;
#[cfg(feature = "cli")]
pub mod tracing_config;
pub mod types;

// Internal imports for lib functions
use tokio::io::AsyncRead;

// Public API exports
pub use config::{
    ExecutionMode, MattingConfig, MattingConfigBuilder, MattingParams, OutputFormat,
    BACKGROUND_THRESHOLD_RANGE, DEFAULT_BACKGROUND_THRESHOLD, DEFAULT_HAIR_SENSITIVITY,
    HAIR_SENSITIVITY_RANGE,
};
pub use error::{MattingError, Result};
pub use matting::{
    classify, color_variance, luminance, process, CancellationToken, MattingEngine,
    MattingOutput, PixelClass,
};
pub use preview::{composite_over_checkerboard, side_by_side};
pub use processor::MattingProcessor;
pub use services::{
    ConsoleProgressReporter, ImageIOService, NoOpProgressReporter, OutputFormatHandler,
    ProcessingStage, ProgressReporter, ProgressTracker, ProgressUpdate,
};
pub use types::{Bitmap, MattingResult, MattingStats, ProcessingMetadata, ProcessingTimings};

#[cfg(feature = "cli")]
pub use tracing_config::{
    init_cli_tracing, init_library_tracing, spans, TracingConfig, TracingFormat,
};

/// Remove the background of a bitmap
///
/// Returns a new bitmap with the same RGB bytes and recomputed alpha. The
/// parameters are used as given; range-limiting is the caller's concern.
///
/// # Errors
/// - `MattingError::InvalidBitmap` if the bitmap's buffer does not match its dimensions
pub fn remove_background(bitmap: &Bitmap, params: &MattingParams) -> Result<Bitmap> {
    Ok(MattingEngine::new(*params).process(bitmap)?.bitmap)
}

/// Remove background from an image provided as bytes
///
/// Decoding and classification run on tokio's blocking pool.
///
/// # Examples
/// ```rust,no_run
/// use hairmatte::{remove_background_from_bytes, MattingConfig, OutputFormat};
///
/// # async fn example(upload_bytes: Vec<u8>) -> anyhow::Result<()> {
/// let config = MattingConfig::default();
/// let result = remove_background_from_bytes(&upload_bytes, &config).await?;
/// let png_bytes = result.to_bytes(OutputFormat::Png)?;
/// # Ok(())
/// # }
/// ```
pub async fn remove_background_from_bytes(
    image_bytes: &[u8],
    config: &MattingConfig,
) -> Result<MattingResult> {
    let bytes = image_bytes.to_vec();
    let config = config.clone();
    run_blocking(move || MattingProcessor::new(config)?.process_bytes(&bytes)).await
}

/// Remove background from a `DynamicImage` directly
///
/// Any alpha in `image` is discarded before classification.
///
/// # Examples
/// ```rust,no_run
/// use hairmatte::{remove_background_from_image, MattingConfig};
/// use image::DynamicImage;
///
/// # async fn example(img: DynamicImage) -> anyhow::Result<()> {
/// let mut result = remove_background_from_image(img, &MattingConfig::default()).await?;
/// result.save_png("output.png")?;
/// # Ok(())
/// # }
/// ```
pub async fn remove_background_from_image(
    image: image::DynamicImage,
    config: &MattingConfig,
) -> Result<MattingResult> {
    let config = config.clone();
    run_blocking(move || MattingProcessor::new(config)?.process_image(&image)).await
}

/// Remove background from an async reader stream
///
/// The stream is read to the end, then handled like
/// [`remove_background_from_bytes`].
///
/// # Examples
/// ```rust,no_run
/// use hairmatte::{remove_background_from_reader, MattingConfig};
/// use tokio::fs::File;
///
/// # async fn example() -> anyhow::Result<()> {
/// let file = File::open("large_image.jpg").await?;
/// let mut result = remove_background_from_reader(file, &MattingConfig::default()).await?;
/// result.save_png("output.png")?;
/// # Ok(())
/// # }
/// ```
pub async fn remove_background_from_reader<R: AsyncRead + Unpin>(
    mut reader: R,
    config: &MattingConfig,
) -> Result<MattingResult> {
    let mut buffer = Vec::new();
    tokio::io::AsyncReadExt::read_to_end(&mut reader, &mut buffer)
        .await
        .map_err(|e| MattingError::processing(format!("Failed to read from stream: {}", e)))?;

    let config = config.clone();
    run_blocking(move || MattingProcessor::new(config)?.process_bytes(&buffer)).await
}

async fn run_blocking<F>(work: F) -> Result<MattingResult>
where
    F: FnOnce() -> Result<MattingResult> + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| MattingError::processing(format!("Matting worker failed: {}", e)))?
}
