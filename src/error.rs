use std::path::PathBuf;

use thiserror::Error;

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid dimensions {width}x{height}: width and height must be positive and even")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("Buffer size mismatch: expected {expected} bytes, got {actual}")]
    BufferSize { expected: usize, actual: usize },

    #[error("Source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("Failed to write {}: {source}", .path.display())]
    SinkWriteFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AppError {
    /// Whether this error only affects a single frame or image
    ///
    /// Batch callers log and skip these instead of aborting the run.
    pub fn is_per_item(&self) -> bool {
        matches!(
            self,
            AppError::SourceUnavailable(_)
                | AppError::SinkWriteFailure { .. }
                | AppError::Image(_)
                | AppError::BufferSize { .. }
        )
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, AppError>;
