//! Error types shared across the toolkit.

use thiserror::Error;

/// Toolkit-wide error type.
#[derive(Error, Debug)]
pub enum Error {
    /// Data does not satisfy a structural invariant
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Access outside the valid range
    #[error("Out of bounds: {0}")]
    OutOfBounds(String),

    /// A value of the wrong type was supplied
    #[error("Type mismatch: {0}")]
    TypeMismatch(String),
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
