//! Error types for moshpit-av.

use std::path::PathBuf;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while driving ffmpeg.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A required external tool is not available.
    #[error("tool not found: {tool}")]
    ToolNotFound { tool: String },

    /// An external tool failed to execute or exited unsuccessfully.
    #[error("tool execution failed: {tool}: {message}")]
    ToolFailed { tool: String, message: String },

    /// A line of tool output did not match the expected format.
    #[error("failed to parse {tool} output: {message}")]
    ParseError { tool: String, message: String },

    /// A progress line arrived before the input duration was reported.
    #[error("could not find duration of input file")]
    DurationUnknown,

    /// A scene timestamp arrived before the stream frame rate was reported.
    #[error("could not find fps value of input file")]
    FrameRateUnknown,

    /// Writing the ffmpeg log failed.
    #[error("error writing to log file {}: {source}", path.display())]
    Log {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A setting failed validation before anything was spawned.
    #[error(transparent)]
    Validation(#[from] moshpit_common::Error),

    /// Invalid input provided.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The operation was cancelled before it finished.
    #[error("operation cancelled")]
    Cancelled,

    /// The background task running the operation panicked or was aborted.
    #[error("background task failed: {0}")]
    Task(String),
}

impl Error {
    /// Create a tool not found error.
    pub fn tool_not_found(tool: impl Into<String>) -> Self {
        Self::ToolNotFound { tool: tool.into() }
    }

    /// Create a tool execution failed error.
    pub fn tool_failed(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ToolFailed {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Create a parse error.
    pub fn parse_error(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ParseError {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Create a log write error.
    pub fn log(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Log {
            path: path.into(),
            source,
        }
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Task(err.to_string())
    }
}
