//! Infraction notification events and the bus they are published to.

use crate::error::SinkResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::info;
use verdict_types::{ConsumerMetadata, InfractionRecord, RunId};

/// One notification per infraction, delivered at-least-once. Carries the
/// full payload plus the run id so consumers need no second lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InfractionEvent {
    pub run_id: RunId,
    pub artifact_key: String,
    pub resource: String,
    pub reason: String,
    pub allow: bool,
    pub metadata: ConsumerMetadata,
    pub timestamp: DateTime<Utc>,
}

impl From<&InfractionRecord> for InfractionEvent {
    fn from(record: &InfractionRecord) -> Self {
        Self {
            run_id: record.run_id.clone(),
            artifact_key: record.artifact_key.clone(),
            resource: record.resource.clone(),
            reason: record.reason.clone(),
            allow: record.allow,
            metadata: record.metadata.clone(),
            timestamp: record.recorded_at,
        }
    }
}

/// Generic event bus seam. Delivery is at-least-once; consumers must
/// tolerate duplicates.
#[async_trait]
pub trait EventBus: Send + Sync {
    async fn publish(&self, event: InfractionEvent) -> SinkResult<()>;
}

/// In-memory bus: appends events and logs them. Duplicates are kept, which
/// is exactly what an at-least-once consumer has to live with.
pub struct InMemoryEventBus {
    events: RwLock<Vec<InfractionEvent>>,
}

impl InMemoryEventBus {
    pub fn new() -> Self {
        Self {
            events: RwLock::new(Vec::new()),
        }
    }

    /// Snapshot of everything published so far.
    pub async fn published(&self) -> Vec<InfractionEvent> {
        self.events.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.events.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.events.read().await.is_empty()
    }
}

impl Default for InMemoryEventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventBus for InMemoryEventBus {
    async fn publish(&self, event: InfractionEvent) -> SinkResult<()> {
        info!(
            run_id = %event.run_id,
            artifact = %event.artifact_key,
            resource = %event.resource,
            reason = %event.reason,
            "Infraction event published"
        );
        self.events.write().await.push(event);
        Ok(())
    }
}

/// Bus that always fails, for exercising the sink's independence of its two
/// side effects.
#[cfg(test)]
pub(crate) struct FailingEventBus;

#[cfg(test)]
#[async_trait]
impl EventBus for FailingEventBus {
    async fn publish(&self, _event: InfractionEvent) -> SinkResult<()> {
        Err(crate::error::SinkError::Publish(
            "bus unavailable".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use verdict_types::Infraction;

    fn event() -> InfractionEvent {
        let record = InfractionRecord::new(
            RunId::generate(),
            "a.json",
            &Infraction::new("QueueA", "no dlq"),
            ConsumerMetadata::default(),
        );
        InfractionEvent::from(&record)
    }

    #[tokio::test]
    async fn test_publish_appends() {
        let bus = InMemoryEventBus::new();
        assert!(bus.is_empty().await);

        bus.publish(event()).await.unwrap();
        bus.publish(event()).await.unwrap();

        assert_eq!(bus.len().await, 2);
    }

    #[tokio::test]
    async fn test_event_mirrors_record() {
        let record = InfractionRecord::new(
            RunId::generate(),
            "a.json",
            &Infraction::new("QueueA", "no dlq"),
            ConsumerMetadata {
                business_unit: "payments".into(),
                ..ConsumerMetadata::default()
            },
        );
        let event = InfractionEvent::from(&record);
        assert_eq!(event.run_id, record.run_id);
        assert_eq!(event.resource, "QueueA");
        assert_eq!(event.metadata.business_unit, "payments");
        assert_eq!(event.timestamp, record.recorded_at);
    }

    #[test]
    fn test_event_serializes() {
        let json = serde_json::to_string(&event()).unwrap();
        let back: InfractionEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back.reason, "no dlq");
    }
}
