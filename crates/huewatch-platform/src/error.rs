//! Common error types for huewatch-platform.

use thiserror::Error;

/// Platform-level errors.
#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("capture failed: {0}")]
    Capture(String),
    #[error("audio error: {0}")]
    Audio(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
}

/// Result type for platform operations.
pub type PlatformResult<T> = Result<T, PlatformError>;
