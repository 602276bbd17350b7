//! Keyed counters with conditional, compare-and-update numeric writes.
//!
//! One counter row exists per (run, artifact) pair. Up to N concurrent
//! branches mutate it: the max-index write is a compare-and-set where losing
//! the race is the expected outcome for any branch whose index is not the
//! current maximum; the allowed-count write is a commutative increment.

use crate::error::{StoreError, StoreResult};
use async_trait::async_trait;
use dashmap::DashMap;
use verdict_types::{CompletionCounters, RunId};

/// Names of the counters kept per (run, artifact).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Counter {
    /// Monotonic maximum of the branch indices processed so far
    HighestIndexSeen,

    /// Count of branches whose item carried no infractions
    AllowedCount,
}

/// Durable counter store for the completion-detection protocol.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Seed the counter row for one (run, artifact): `highest_index_seen`
    /// to -1, `allowed_count` to 0, and the expected branch total. This is
    /// the single unconditional write in the protocol and happens-before
    /// any branch write.
    async fn init_counters(
        &self,
        run_id: &RunId,
        artifact_key: &str,
        expected_total: i64,
    ) -> StoreResult<()>;

    /// Set `counter` to `value` only if `value` is strictly greater than the
    /// stored value. Returns whether the write applied. A `false` return is
    /// a lost race, not an error.
    async fn conditional_max(
        &self,
        run_id: &RunId,
        artifact_key: &str,
        counter: Counter,
        value: i64,
    ) -> StoreResult<bool>;

    /// Unconditionally add `delta` to `counter`.
    async fn increment(
        &self,
        run_id: &RunId,
        artifact_key: &str,
        counter: Counter,
        delta: i64,
    ) -> StoreResult<()>;

    /// Read the counter row back. Called once, after the fan-out joins.
    async fn read(&self, run_id: &RunId, artifact_key: &str) -> StoreResult<CompletionCounters>;
}

type CounterKey = (String, String);

fn counter_key(run_id: &RunId, artifact_key: &str) -> CounterKey {
    (run_id.to_string(), artifact_key.to_string())
}

/// In-memory counter store.
///
/// Mutations hold the map's per-key guard for the duration of the update, so
/// the conditional-max is atomic with respect to concurrent writers of the
/// same (run, artifact) row.
pub struct InMemoryCounterStore {
    rows: DashMap<CounterKey, CompletionCounters>,
}

impl InMemoryCounterStore {
    pub fn new() -> Self {
        Self {
            rows: DashMap::new(),
        }
    }

    fn field_mut(row: &mut CompletionCounters, counter: Counter) -> &mut i64 {
        match counter {
            Counter::HighestIndexSeen => &mut row.highest_index_seen,
            Counter::AllowedCount => &mut row.allowed_count,
        }
    }
}

impl Default for InMemoryCounterStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CounterStore for InMemoryCounterStore {
    async fn init_counters(
        &self,
        run_id: &RunId,
        artifact_key: &str,
        expected_total: i64,
    ) -> StoreResult<()> {
        self.rows.insert(
            counter_key(run_id, artifact_key),
            CompletionCounters::new(expected_total),
        );
        Ok(())
    }

    async fn conditional_max(
        &self,
        run_id: &RunId,
        artifact_key: &str,
        counter: Counter,
        value: i64,
    ) -> StoreResult<bool> {
        let key = counter_key(run_id, artifact_key);
        let mut row = self
            .rows
            .get_mut(&key)
            .ok_or_else(|| StoreError::NotInitialized(format!("{}/{}", key.0, key.1)))?;

        let field = Self::field_mut(&mut row, counter);
        if value > *field {
            *field = value;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    async fn increment(
        &self,
        run_id: &RunId,
        artifact_key: &str,
        counter: Counter,
        delta: i64,
    ) -> StoreResult<()> {
        let key = counter_key(run_id, artifact_key);
        let mut row = self
            .rows
            .get_mut(&key)
            .ok_or_else(|| StoreError::NotInitialized(format!("{}/{}", key.0, key.1)))?;

        *Self::field_mut(&mut row, counter) += delta;
        Ok(())
    }

    async fn read(&self, run_id: &RunId, artifact_key: &str) -> StoreResult<CompletionCounters> {
        let key = counter_key(run_id, artifact_key);
        self.rows
            .get(&key)
            .map(|row| *row)
            .ok_or_else(|| StoreError::NotInitialized(format!("{}/{}", key.0, key.1)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_init_and_read() {
        let store = InMemoryCounterStore::new();
        let run_id = RunId::generate();

        store.init_counters(&run_id, "a.json", 5).await.unwrap();

        let counters = store.read(&run_id, "a.json").await.unwrap();
        assert_eq!(counters.highest_index_seen, -1);
        assert_eq!(counters.allowed_count, 0);
        assert_eq!(counters.expected_total, 5);
    }

    #[tokio::test]
    async fn test_read_before_init() {
        let store = InMemoryCounterStore::new();
        let run_id = RunId::generate();

        let result = store.read(&run_id, "a.json").await;
        assert!(matches!(result, Err(StoreError::NotInitialized(_))));
    }

    #[tokio::test]
    async fn test_conditional_max_is_monotonic() {
        let store = InMemoryCounterStore::new();
        let run_id = RunId::generate();
        store.init_counters(&run_id, "a.json", 3).await.unwrap();

        let applied = store
            .conditional_max(&run_id, "a.json", Counter::HighestIndexSeen, 2)
            .await
            .unwrap();
        assert!(applied);

        // A lower index loses the race and leaves the maximum untouched.
        let applied = store
            .conditional_max(&run_id, "a.json", Counter::HighestIndexSeen, 0)
            .await
            .unwrap();
        assert!(!applied);

        // Equal values lose too: the condition is strictly-greater.
        let applied = store
            .conditional_max(&run_id, "a.json", Counter::HighestIndexSeen, 2)
            .await
            .unwrap();
        assert!(!applied);

        let counters = store.read(&run_id, "a.json").await.unwrap();
        assert_eq!(counters.highest_index_seen, 2);
    }

    #[tokio::test]
    async fn test_increment() {
        let store = InMemoryCounterStore::new();
        let run_id = RunId::generate();
        store.init_counters(&run_id, "a.json", 2).await.unwrap();

        store
            .increment(&run_id, "a.json", Counter::AllowedCount, 1)
            .await
            .unwrap();
        store
            .increment(&run_id, "a.json", Counter::AllowedCount, 1)
            .await
            .unwrap();

        let counters = store.read(&run_id, "a.json").await.unwrap();
        assert_eq!(counters.allowed_count, 2);
    }

    #[tokio::test]
    async fn test_rows_are_isolated_per_artifact() {
        let store = InMemoryCounterStore::new();
        let run_id = RunId::generate();
        store.init_counters(&run_id, "a.json", 1).await.unwrap();
        store.init_counters(&run_id, "b.json", 1).await.unwrap();

        store
            .conditional_max(&run_id, "a.json", Counter::HighestIndexSeen, 0)
            .await
            .unwrap();

        assert_eq!(
            store.read(&run_id, "a.json").await.unwrap().highest_index_seen,
            0
        );
        assert_eq!(
            store.read(&run_id, "b.json").await.unwrap().highest_index_seen,
            -1
        );
    }

    #[tokio::test]
    async fn test_reinit_resets_row() {
        let store = InMemoryCounterStore::new();
        let run_id = RunId::generate();
        store.init_counters(&run_id, "a.json", 2).await.unwrap();
        store
            .increment(&run_id, "a.json", Counter::AllowedCount, 2)
            .await
            .unwrap();

        store.init_counters(&run_id, "a.json", 4).await.unwrap();
        let counters = store.read(&run_id, "a.json").await.unwrap();
        assert_eq!(counters.allowed_count, 0);
        assert_eq!(counters.expected_total, 4);
    }

    #[tokio::test]
    async fn test_concurrent_writers_settle_on_max() {
        let store = Arc::new(InMemoryCounterStore::new());
        let run_id = RunId::generate();
        let n = 64usize;
        store
            .init_counters(&run_id, "a.json", n as i64)
            .await
            .unwrap();

        let mut handles = Vec::with_capacity(n);
        for index in 0..n {
            let store = Arc::clone(&store);
            let run_id = run_id.clone();
            handles.push(tokio::spawn(async move {
                store
                    .conditional_max(&run_id, "a.json", Counter::HighestIndexSeen, index as i64)
                    .await
                    .unwrap();
                store
                    .increment(&run_id, "a.json", Counter::AllowedCount, 1)
                    .await
                    .unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let counters = store.read(&run_id, "a.json").await.unwrap();
        assert_eq!(counters.highest_index_seen, n as i64 - 1);
        assert_eq!(counters.allowed_count, n as i64);
    }

    fn order_and_flags() -> impl Strategy<Value = (Vec<usize>, Vec<bool>)> {
        prop::collection::vec(any::<bool>(), 1..16).prop_flat_map(|flags| {
            let order: Vec<usize> = (0..flags.len()).collect();
            (Just(order).prop_shuffle(), Just(flags))
        })
    }

    proptest! {
        // Any completion order of the branches settles on the same final
        // counter pair as running them in index order.
        #[test]
        fn prop_counter_writes_commute((order, flags) in order_and_flags()) {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .build()
                .unwrap();
            runtime.block_on(async {
                let store = InMemoryCounterStore::new();
                let run_id = RunId::generate();
                let n = flags.len() as i64;
                store.init_counters(&run_id, "a.json", n).await.unwrap();

                for &index in &order {
                    store
                        .conditional_max(
                            &run_id,
                            "a.json",
                            Counter::HighestIndexSeen,
                            index as i64,
                        )
                        .await
                        .unwrap();
                    if flags[index] {
                        store
                            .increment(&run_id, "a.json", Counter::AllowedCount, 1)
                            .await
                            .unwrap();
                    }
                }

                let counters = store.read(&run_id, "a.json").await.unwrap();
                let allowed = flags.iter().filter(|&&f| f).count() as i64;
                assert_eq!(counters.highest_index_seen, n - 1);
                assert_eq!(counters.allowed_count, allowed);
            });
        }
    }
}
