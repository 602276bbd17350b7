//! Infraction record store.
//!
//! One row per distinct (run, artifact#resource#reason). Upserts with the
//! same key land on the same row, which is what makes a retried branch
//! harmless.

use crate::error::StoreResult;
use async_trait::async_trait;
use dashmap::DashMap;
use verdict_types::{InfractionRecord, RunId};

/// Persistence for infraction rows.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Create or replace the row for this record's key.
    async fn upsert(&self, record: InfractionRecord) -> StoreResult<()>;

    /// All records of one run, ordered by sort key.
    async fn for_run(&self, run_id: &RunId) -> StoreResult<Vec<InfractionRecord>>;
}

/// In-memory record store.
pub struct InMemoryRecordStore {
    rows: DashMap<(String, String), InfractionRecord>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self {
            rows: DashMap::new(),
        }
    }

    /// Total rows across all runs.
    pub fn total_count(&self) -> usize {
        self.rows.len()
    }
}

impl Default for InMemoryRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn upsert(&self, record: InfractionRecord) -> StoreResult<()> {
        self.rows
            .insert((record.partition_key(), record.sort_key()), record);
        Ok(())
    }

    async fn for_run(&self, run_id: &RunId) -> StoreResult<Vec<InfractionRecord>> {
        let pk = run_id.to_string();
        let mut records: Vec<InfractionRecord> = self
            .rows
            .iter()
            .filter(|entry| entry.key().0 == pk)
            .map(|entry| entry.value().clone())
            .collect();
        records.sort_by_key(|r| r.sort_key());
        Ok(records)
    }
}
