//! Error types for verdict stores

use thiserror::Error;

/// Store-level errors
#[derive(Debug, Error)]
pub enum StoreError {
    /// Item not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Counters used before initialization
    #[error("Counters not initialized: {0}")]
    NotInitialized(String),

    /// Invalid key or data
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;
