use thiserror::Error;

/// Errors that can occur when building, querying, tuning or benchmarking an index.
#[derive(Debug, Error)]
pub enum NnError {
    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("index is empty: call build() with a non-empty dataset first")]
    EmptyIndex,

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[cfg(feature = "serde")]
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// A specialized Result type for nearest-neighbor operations.
pub type Result<T> = std::result::Result<T, NnError>;
