//! Error types for the infraction sink

use thiserror::Error;
use verdict_store::StoreError;

/// Sink-level errors. Both side effects are attempted before any error is
/// returned; a record failure takes precedence in the reported cause.
#[derive(Debug, Error)]
pub enum SinkError {
    /// The durable record write failed
    #[error("Record write failed: {0}")]
    Record(#[from] StoreError),

    /// The notification publish failed
    #[error("Notification publish failed: {0}")]
    Publish(String),
}

/// Result type alias for sink operations
pub type SinkResult<T> = Result<T, SinkError>;
