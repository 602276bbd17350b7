//! Durable rows written during a run: the completion counters and the
//! infraction records.

use crate::artifact::ConsumerMetadata;
use crate::evaluation::Infraction;
use crate::ids::RunId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The per-(run, artifact) counter row driving completion detection.
///
/// `highest_index_seen` is a monotonic maximum over the 0-based branch
/// indices processed so far, seeded to -1 so it is well-defined for an empty
/// fan-out. `allowed_count` counts branches whose item carried no
/// infractions. `expected_total` is written once at initialization and holds
/// the number of branches the fan-out will run; the pass/fail decision
/// compares `allowed_count` against it rather than inferring completion from
/// the max index observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionCounters {
    pub highest_index_seen: i64,
    pub allowed_count: i64,
    pub expected_total: i64,
}

impl CompletionCounters {
    /// Fresh counters for a fan-out of `expected_total` branches.
    pub fn new(expected_total: i64) -> Self {
        Self {
            highest_index_seen: -1,
            allowed_count: 0,
            expected_total,
        }
    }

    /// Whether the max-index watermark matches a dense, zero-based index
    /// space that has fully drained. Diagnostic only; not the decision rule.
    pub fn watermark_complete(&self) -> bool {
        self.highest_index_seen == self.expected_total - 1
    }

    /// The decision rule: every expected branch contributed an allowed item.
    pub fn all_allowed(&self) -> bool {
        self.allowed_count == self.expected_total
    }
}

/// One persisted infraction, keyed by run and by
/// `artifact#resource#reason`, written exactly once per distinct key.
///
/// Never deleted by this subsystem; retention is an external concern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InfractionRecord {
    pub run_id: RunId,
    pub artifact_key: String,
    pub resource: String,
    pub reason: String,
    pub allow: bool,
    pub metadata: ConsumerMetadata,
    pub recorded_at: DateTime<Utc>,
}

impl InfractionRecord {
    pub fn new(
        run_id: RunId,
        artifact_key: impl Into<String>,
        infraction: &Infraction,
        metadata: ConsumerMetadata,
    ) -> Self {
        Self {
            run_id,
            artifact_key: artifact_key.into(),
            resource: infraction.resource.clone(),
            reason: infraction.reason.clone(),
            allow: infraction.allow,
            metadata,
            recorded_at: Utc::now(),
        }
    }

    /// Partition key: all records of one run share it.
    pub fn partition_key(&self) -> String {
        self.run_id.to_string()
    }

    /// Sort key: unique per distinct infraction within a run, which is what
    /// makes the write idempotent.
    pub fn sort_key(&self) -> String {
        format!("{}#{}#{}", self.artifact_key, self.resource, self.reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_counters() {
        let counters = CompletionCounters::new(3);
        assert_eq!(counters.highest_index_seen, -1);
        assert_eq!(counters.allowed_count, 0);
        assert!(!counters.watermark_complete());
        assert!(!counters.all_allowed());
    }

    #[test]
    fn test_all_allow_convention() {
        // Three all-allow items settle at (2, 3); the decision compares the
        // allowed count to the expected total, so this is a pass.
        let counters = CompletionCounters {
            highest_index_seen: 2,
            allowed_count: 3,
            expected_total: 3,
        };
        assert!(counters.watermark_complete());
        assert!(counters.all_allowed());
    }

    #[test]
    fn test_empty_fanout_is_allowed() {
        let counters = CompletionCounters::new(0);
        assert!(counters.watermark_complete());
        assert!(counters.all_allowed());
    }

    #[test]
    fn test_record_keys() {
        let run_id = RunId::generate();
        let infraction = Infraction::new("QueueA", "missing dead-letter queue");
        let record = InfractionRecord::new(
            run_id.clone(),
            "app.template.json",
            &infraction,
            ConsumerMetadata::default(),
        );
        assert_eq!(record.partition_key(), run_id.to_string());
        assert_eq!(
            record.sort_key(),
            "app.template.json#QueueA#missing dead-letter queue"
        );
    }
}
