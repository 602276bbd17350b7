//! Evaluation outcomes: per-item results, per-artifact status, and the
//! aggregate report returned to the caller.

use crate::ids::RunId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single policy violation identified for one resource within an artifact.
///
/// Immutable once produced by the policy evaluator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Infraction {
    /// The offending resource (typically a property path or logical id)
    pub resource: String,

    /// Why the rule denied it
    pub reason: String,

    /// The evaluator's allow verdict for the rule that produced this
    #[serde(default)]
    pub allow: bool,
}

impl Infraction {
    pub fn new(resource: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            reason: reason.into(),
            allow: false,
        }
    }
}

/// One rule-package outcome within an artifact evaluation.
///
/// `index` is the item's 0-based position in the parallel fan-out. Indices
/// are unique within one artifact evaluation but branches complete in
/// arbitrary order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyResultItem {
    pub index: usize,
    pub package: String,
    pub allow: bool,
    pub infractions: Vec<Infraction>,
}

impl PolicyResultItem {
    /// Whether this item carries any infractions. The protocol branches on
    /// infraction presence, not on the `allow` flag.
    pub fn has_infractions(&self) -> bool {
        !self.infractions.is_empty()
    }
}

/// Why an artifact evaluation ended in failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureCause {
    /// Terminal denied outcome: the artifact violated policy. Not an
    /// infrastructure error.
    InfractionsExist,

    /// The policy evaluator failed to run or returned unparseable output
    PolicyEvaluation(String),

    /// The evaluation did not reach a terminal state within the
    /// coordinator's bound
    Timeout,

    /// A store, sink, or task failure unrelated to policy
    Infra(String),
}

impl FailureCause {
    /// True for the policy-denied outcome, false for infrastructure causes.
    pub fn is_policy_denial(&self) -> bool {
        matches!(self, FailureCause::InfractionsExist)
    }
}

impl fmt::Display for FailureCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureCause::InfractionsExist => write!(f, "InfractionsExist"),
            FailureCause::PolicyEvaluation(msg) => write!(f, "PolicyEvaluation: {}", msg),
            FailureCause::Timeout => write!(f, "Timeout"),
            FailureCause::Infra(msg) => write!(f, "Infra: {}", msg),
        }
    }
}

/// Lifecycle of one artifact evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArtifactStatus {
    Running,
    Succeeded,
    Failed(FailureCause),
}

impl ArtifactStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ArtifactStatus::Running)
    }

    pub fn is_succeeded(&self) -> bool {
        matches!(self, ArtifactStatus::Succeeded)
    }
}

/// One inner-evaluator execution: which artifact, under which run, and how
/// it ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactEvaluation {
    pub run_id: RunId,
    pub artifact_key: String,
    pub status: ArtifactStatus,
}

impl ArtifactEvaluation {
    pub fn running(run_id: RunId, artifact_key: impl Into<String>) -> Self {
        Self {
            run_id,
            artifact_key: artifact_key.into(),
            status: ArtifactStatus::Running,
        }
    }

    pub fn succeeded(run_id: RunId, artifact_key: impl Into<String>) -> Self {
        Self {
            run_id,
            artifact_key: artifact_key.into(),
            status: ArtifactStatus::Succeeded,
        }
    }

    pub fn failed(run_id: RunId, artifact_key: impl Into<String>, cause: FailureCause) -> Self {
        Self {
            run_id,
            artifact_key: artifact_key.into(),
            status: ArtifactStatus::Failed(cause),
        }
    }

    /// The failure cause, if this evaluation failed.
    pub fn cause(&self) -> Option<&FailureCause> {
        match &self.status {
            ArtifactStatus::Failed(cause) => Some(cause),
            _ => None,
        }
    }
}

/// Aggregate result of one run: per-artifact detail plus the overall verdict.
///
/// Always enumerates every artifact, so a caller can distinguish "this
/// artifact violated policy" from "this artifact's evaluation infrastructure
/// failed".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub run_id: RunId,
    pub per_artifact: Vec<ArtifactEvaluation>,
    pub all_succeeded: bool,
}

impl EvaluationReport {
    pub fn new(run_id: RunId, per_artifact: Vec<ArtifactEvaluation>) -> Self {
        let all_succeeded = per_artifact.iter().all(|e| e.status.is_succeeded());
        Self {
            run_id,
            per_artifact,
            all_succeeded,
        }
    }

    /// Artifacts that ended in the policy-denied outcome.
    pub fn denied_count(&self) -> usize {
        self.per_artifact
            .iter()
            .filter(|e| e.cause().is_some_and(|c| c.is_policy_denial()))
            .count()
    }

    /// Artifacts that failed for non-policy reasons (evaluator errors,
    /// timeouts, store failures).
    pub fn infra_failure_count(&self) -> usize {
        self.per_artifact
            .iter()
            .filter(|e| e.cause().is_some_and(|c| !c.is_policy_denial()))
            .count()
    }
}
