//! Service layer
//!
//! This module contains service types that separate infrastructure concerns
//! (decoding, encoding, progress) from the matting engine.

pub mod format;
pub mod io;
pub mod progress;

pub use format::{OutputFormatHandler, DEFAULT_DOWNLOAD_NAME};
pub use io::ImageIOService;
pub use progress::{
    ConsoleProgressReporter, NoOpProgressReporter, ProcessingStage, ProgressReporter,
    ProgressTracker, ProgressUpdate,
};
