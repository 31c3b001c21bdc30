//! Error types for matting operations

use thiserror::Error;

/// Result type alias for matting operations
pub type Result<T> = std::result::Result<T, MattingError>;

/// Error types for matting operations
#[derive(Error, Debug)]
pub enum MattingError {
    /// Input/output errors (file not found, permission denied, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Image decoding or encoding errors
    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    /// Bitmap dimensions and buffer length disagree
    #[error("Invalid bitmap: {0}")]
    InvalidBitmap(String),

    /// Invalid configuration or parameters
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Unsupported file format
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Failure outside the classification pass (encoding, worker join, ...)
    #[error("Processing error: {0}")]
    Processing(String),

    /// The caller cancelled the pass between two chunks
    #[error("Processing cancelled")]
    Cancelled,
}

impl MattingError {
    /// Create a new invalid bitmap error
    pub fn invalid_bitmap<S: Into<String>>(msg: S) -> Self {
        Self::InvalidBitmap(msg.into())
    }

    /// Create a new invalid configuration error
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create a new unsupported format error
    pub fn unsupported_format<S: Into<String>>(format: S) -> Self {
        Self::UnsupportedFormat(format.into())
    }

    /// Create a new processing error
    pub fn processing<S: Into<String>>(msg: S) -> Self {
        Self::Processing(msg.into())
    }

    /// Bitmap buffer length error with the expected and actual sizes
    pub fn buffer_length_mismatch(width: u32, height: u32, actual: usize) -> Self {
        let expected = u128::from(width) * u128::from(height) * 4;
        Self::InvalidBitmap(format!(
            "buffer length {} does not match {}x{}x4 = {}",
            actual, width, height, expected
        ))
    }

    /// Create file I/O error with operation context
    pub fn file_io_error<P: AsRef<std::path::Path>>(
        operation: &str,
        path: P,
        error: &std::io::Error,
    ) -> Self {
        let path_display = path.as_ref().display();
        Self::Io(std::io::Error::new(
            error.kind(),
            format!("Failed to {} '{}': {}", operation, path_display, error),
        ))
    }

    /// Create configuration error with valid ranges
    pub fn config_value_error<T: std::fmt::Display>(
        parameter: &str,
        value: T,
        valid_range: &str,
        recommended: Option<T>,
    ) -> Self {
        let recommendation = match recommended {
            Some(rec) => format!(" Recommended: {}", rec),
            None => String::new(),
        };

        Self::InvalidConfig(format!(
            "Invalid {}: {} (valid range: {}).{}",
            parameter, value, valid_range, recommendation
        ))
    }

    /// Create processing error with stage context
    pub fn processing_stage_error(stage: &str, details: &str, input_info: Option<&str>) -> Self {
        let input_context = match input_info {
            Some(info) => format!(" (input: {})", info),
            None => String::new(),
        };

        Self::Processing(format!(
            "Processing failed at stage '{}'{}: {}",
            stage, input_context, details
        ))
    }
}
