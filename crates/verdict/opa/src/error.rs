//! Error types for the policy engine adapter

use thiserror::Error;

/// Adapter-level errors. All of these are fatal for the owning artifact
/// evaluation; none are retried automatically.
#[derive(Debug, Error)]
pub enum PolicyError {
    /// The engine failed to run or reported an error
    #[error("Policy evaluation failed: {0}")]
    Evaluation(String),

    /// The engine ran but its output could not be interpreted
    #[error("Malformed engine output: {0}")]
    MalformedOutput(String),

    /// IO error staging the document or invoking the engine
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for adapter operations
pub type Result<T> = std::result::Result<T, PolicyError>;
