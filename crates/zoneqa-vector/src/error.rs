//! Error types for zoneqa-vector.

use thiserror::Error;

/// Result type for zoneqa-vector operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in zoneqa-vector operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Dimension mismatch between a vector and the index.
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Expected dimensions.
        expected: usize,
        /// Actual dimensions provided.
        actual: usize,
    },

    /// Search against an index with zero rows.
    #[error("Index is empty")]
    EmptyIndex,

    /// Invalid vector (e.g., contains NaN or infinity).
    #[error("Invalid vector: {0}")]
    InvalidVector(String),

    /// Invalid argument (e.g., `k == 0`, zero dimensions).
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Persistence error (serialization, corrupt or foreign file).
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
