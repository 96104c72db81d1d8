//! Export error types.

use thiserror::Error;

/// Errors surfaced by a grid export.
///
/// All variants abort the export; nothing is recovered internally and no
/// partial buffer is ever returned.
#[derive(Error, Debug)]
pub enum ExportError {
    /// A caller-supplied argument is malformed (missing channel, background
    /// value of the wrong type).
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The channel reports a value-type tag outside the supported registry.
    #[error("Value type tag {0} is not supported by the grid format")]
    TypeUnsupported(u32),

    /// A per-level branching exponent is outside the supported range.
    #[error("Level {level} log2dim {log2_dim} is outside [1, 8]")]
    Log2DimOutOfRange { level: u32, log2_dim: u32 },

    /// A level holds more nodes than the format can index.
    #[error("Level {level} has {count} nodes; at most 2147483647 are supported")]
    TooManyNodes { level: u32, count: usize },

    /// The root-key encoding cannot represent the coordinate range.
    #[error("Root key cannot cover the coordinate range: 32 - {total_log2_dim} > 21")]
    KeyOverflow { total_log2_dim: u32 },

    /// The allocator rejected the output buffer.
    #[error("Allocation of {0} output bytes failed")]
    AllocationFailed(usize),

    /// Cooperative cancellation was observed at a barrier.
    #[error("Export cancelled")]
    Cancelled,

    /// A node filler reported an internal fault.
    #[error("Worker failed: {0}")]
    WorkerFailed(String),
}

/// Result type alias using [`ExportError`].
pub type Result<T> = std::result::Result<T, ExportError>;
