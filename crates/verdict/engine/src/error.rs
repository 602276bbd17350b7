//! Error types for the evaluation orchestrator

use thiserror::Error;
use verdict_opa::PolicyError;
use verdict_sink::SinkError;
use verdict_store::StoreError;
use verdict_types::FailureCause;

/// Engine-level errors. These never cross the coordinator boundary as
/// errors: the evaluator folds them into a per-artifact failure cause.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Store error (counters, objects, records)
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Policy engine error
    #[error("Policy error: {0}")]
    Policy(#[from] PolicyError),

    /// Infraction sink error
    #[error("Sink error: {0}")]
    Sink(#[from] SinkError),

    /// Metadata resolution error
    #[error("Metadata error: {0}")]
    Metadata(String),

    /// A spawned branch task died before reaching a terminal state
    #[error("Task error: {0}")]
    Task(String),
}

impl EngineError {
    /// Fold an engine error into the per-artifact failure taxonomy: engine
    /// failures are policy-evaluation failures, everything else is
    /// infrastructure.
    pub fn into_cause(self) -> FailureCause {
        match self {
            EngineError::Policy(e) => FailureCause::PolicyEvaluation(e.to_string()),
            other => FailureCause::Infra(other.to_string()),
        }
    }
}

/// Result type alias for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_errors_map_to_policy_cause() {
        let error = EngineError::Policy(PolicyError::Evaluation("exit status 2".into()));
        assert!(matches!(
            error.into_cause(),
            FailureCause::PolicyEvaluation(_)
        ));
    }

    #[test]
    fn test_store_errors_map_to_infra_cause() {
        let error = EngineError::Store(StoreError::NotFound("templates/a.json".into()));
        assert!(matches!(error.into_cause(), FailureCause::Infra(_)));
    }
}
