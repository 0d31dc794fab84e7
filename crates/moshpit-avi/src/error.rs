//! Error types for moshpit-avi.

use std::io;
use thiserror::Error;

/// Result type for moshpit-avi operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for moshpit-avi operations.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A record grew past the scanner's limit without reaching a delimiter.
    #[error("frame record exceeds maximum size: {size} bytes (max: {max})")]
    FrameTooLarge { size: usize, max: usize },

    /// The operation was cancelled before it finished.
    #[error("operation cancelled")]
    Cancelled,

    /// The background task running the operation panicked or was aborted.
    #[error("background task failed: {0}")]
    Task(String),
}

impl Error {
    /// Create a frame-too-large error.
    pub fn frame_too_large(size: usize, max: usize) -> Self {
        Self::FrameTooLarge { size, max }
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Task(err.to_string())
    }
}
