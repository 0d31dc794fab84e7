//! Validation errors shared across moshpit.
//!
//! Every setting that ends up on an encoder command line is checked before a
//! process is spawned; these are the errors those checks produce.

/// Common error type for moshpit.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    /// A numeric setting fell outside its permitted range.
    #[error("{name} must be a value between {min} and {max}, got {value}")]
    OutOfRange {
        name: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    /// Invalid input was provided.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl Error {
    /// Create a new InvalidInput error.
    pub fn invalid_input<S: Into<String>>(msg: S) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create an OutOfRange error for a value that must lie in `[0, 1]`.
    pub fn out_of_unit_range(name: &'static str, value: f64) -> Self {
        Self::OutOfRange {
            name,
            value,
            min: 0.0,
            max: 1.0,
        }
    }
}

/// Result type alias using the common Error type.
pub type Result<T> = std::result::Result<T, Error>;
