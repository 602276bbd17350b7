//! Verdict durable stores
//!
//! Three small store seams, each an explicit trait so tests can inject an
//! in-memory fake with the same contract:
//!
//! - [`CounterStore`]: keyed numeric counters with a conditional-max
//!   compare-and-set, the heart of the completion-detection protocol
//! - [`ObjectStore`]: byte documents by (store, key)
//! - [`RecordStore`]: infraction rows, idempotent by (run, sort key)
//!
//! The in-memory implementations guarantee per-key atomicity for the
//! conditional-max; everything else they persist is commutative or
//! idempotent and needs nothing stronger.

pub mod counters;
pub mod error;
pub mod objects;
pub mod records;

pub use counters::{Counter, CounterStore, InMemoryCounterStore};
pub use error::{StoreError, StoreResult};
pub use objects::{InMemoryObjectStore, LocalObjectStore, ObjectStore};
pub use records::{InMemoryRecordStore, RecordStore};
