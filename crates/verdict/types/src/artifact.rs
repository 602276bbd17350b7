//! Evaluation requests and the artifacts they reference

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Location of one document to evaluate: a named store plus a key within it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArtifactRef {
    /// Name of the object store holding the document
    pub store: String,

    /// Key of the document within the store
    pub key: String,
}

impl ArtifactRef {
    pub fn new(store: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            store: store.into(),
            key: key.into(),
        }
    }
}

impl fmt::Display for ArtifactRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.store, self.key)
    }
}

/// Ownership metadata for the consumer submitting a run.
///
/// Stamped onto every infraction record and notification so downstream
/// consumers (dashboards, alerting) can attribute a violation without a
/// second lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumerMetadata {
    #[serde(default)]
    pub business_unit: String,

    #[serde(default)]
    pub billing_code: String,

    #[serde(default)]
    pub target_environment: String,

    #[serde(default)]
    pub owner_name: String,

    #[serde(default)]
    pub owner_email: String,
}

/// Caller context for one evaluation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestContext {
    /// Identity of the requester (pipeline, user, service)
    pub requester: String,

    /// When the request was submitted
    pub requested_at: DateTime<Utc>,
}

impl RequestContext {
    pub fn new(requester: impl Into<String>) -> Self {
        Self {
            requester: requester.into(),
            requested_at: Utc::now(),
        }
    }
}

/// One client call: the set of artifacts to evaluate, who is asking, and the
/// ownership metadata to attach to any infractions found.
///
/// Immutable for the duration of a run; owned by the coordinator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationRequest {
    pub artifacts: Vec<ArtifactRef>,
    pub consumer_metadata: ConsumerMetadata,
    pub context: RequestContext,
}

impl EvaluationRequest {
    pub fn new(
        artifacts: Vec<ArtifactRef>,
        consumer_metadata: ConsumerMetadata,
        context: RequestContext,
    ) -> Self {
        Self {
            artifacts,
            consumer_metadata,
            context,
        }
    }
}
