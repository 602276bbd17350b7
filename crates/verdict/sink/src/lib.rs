//! Verdict infraction sink
//!
//! Every infraction found during a run produces two side effects: a durable
//! record, idempotent on `(run, artifact#resource#reason)`, and a
//! notification event delivered at-least-once to a generic bus for
//! downstream consumers (dashboards, alerting). The sink performs both,
//! independently; it never aggregates — how many records exist under a run
//! id *is* the aggregate.

pub mod error;
pub mod event;
pub mod sink;

pub use error::{SinkError, SinkResult};
pub use event::{EventBus, InMemoryEventBus, InfractionEvent};
pub use sink::InfractionSink;
