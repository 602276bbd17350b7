//! The sink itself: one durable record plus one notification per call.

use crate::error::{SinkError, SinkResult};
use crate::event::{EventBus, InfractionEvent};
use std::sync::Arc;
use tracing::{debug, warn};
use verdict_store::RecordStore;
use verdict_types::{ConsumerMetadata, Infraction, InfractionRecord, RunId};

/// Persists and publishes infractions.
///
/// `record` is idempotent on `(run, artifact#resource#reason)`: calling it
/// twice with the same payload leaves one stored row, while the bus may see
/// the event more than once. The two side effects are attempted
/// independently; a failure in one never suppresses the other.
pub struct InfractionSink {
    records: Arc<dyn RecordStore>,
    bus: Arc<dyn EventBus>,
}

impl InfractionSink {
    pub fn new(records: Arc<dyn RecordStore>, bus: Arc<dyn EventBus>) -> Self {
        Self { records, bus }
    }

    pub async fn record(
        &self,
        run_id: &RunId,
        artifact_key: &str,
        infraction: &Infraction,
        metadata: &ConsumerMetadata,
    ) -> SinkResult<()> {
        let record =
            InfractionRecord::new(run_id.clone(), artifact_key, infraction, metadata.clone());
        let event = InfractionEvent::from(&record);
        let sort_key = record.sort_key();

        let stored = self.records.upsert(record).await;
        let published = self.bus.publish(event).await;

        match (&stored, &published) {
            (Ok(()), Ok(())) => {
                debug!(
                    run_id = %run_id,
                    key = %sort_key,
                    "Infraction recorded and published"
                );
            }
            (Err(e), _) => {
                warn!(run_id = %run_id, key = %sort_key, error = %e, "Infraction record write failed");
            }
            (_, Err(e)) => {
                warn!(run_id = %run_id, key = %sort_key, error = %e, "Infraction publish failed");
            }
        }

        stored.map_err(SinkError::from)?;
        published
    }
}
