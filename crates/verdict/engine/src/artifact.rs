//! Per-artifact evaluation and the completion-detection protocol.
//!
//! One evaluation runs the policy engine once, then fans out one branch per
//! rule-package result. Branches complete in arbitrary order and may be
//! re-executed, so every write they perform is either a compare-and-set
//! (the max-index watermark) or commutative/idempotent (the allowed-count
//! increment, the keyed infraction upserts). After all branches join, a
//! single counter read decides the outcome: the artifact passes iff every
//! expected branch contributed an allowed item.

use crate::error::{EngineError, EngineResult};
use crate::metadata::{MetadataResolver, PassthroughResolver};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use verdict_opa::{gather_results, PolicyEvaluator, RuleBundleRef};
use verdict_sink::InfractionSink;
use verdict_store::{Counter, CounterStore, ObjectStore};
use verdict_types::{
    ArtifactEvaluation, ArtifactRef, CompletionCounters, ConsumerMetadata, PolicyResultItem, RunId,
};

/// Evaluates one artifact under one run.
pub struct ArtifactEvaluator {
    objects: Arc<dyn ObjectStore>,
    policy: Arc<dyn PolicyEvaluator>,
    counters: Arc<dyn CounterStore>,
    sink: Arc<InfractionSink>,
    resolver: Arc<dyn MetadataResolver>,
    bundle: RuleBundleRef,
}

impl ArtifactEvaluator {
    pub fn new(
        objects: Arc<dyn ObjectStore>,
        policy: Arc<dyn PolicyEvaluator>,
        counters: Arc<dyn CounterStore>,
        sink: Arc<InfractionSink>,
        bundle: RuleBundleRef,
    ) -> Self {
        Self {
            objects,
            policy,
            counters,
            sink,
            resolver: Arc::new(PassthroughResolver),
            bundle,
        }
    }

    /// Replace the default pass-through metadata resolver.
    pub fn with_resolver(mut self, resolver: Arc<dyn MetadataResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    /// Run one artifact to a terminal status. Never returns an error: every
    /// failure is folded into the evaluation's failure cause, attributed to
    /// this artifact alone.
    pub async fn evaluate(
        &self,
        run_id: &RunId,
        artifact: &ArtifactRef,
        request_metadata: &ConsumerMetadata,
    ) -> ArtifactEvaluation {
        debug!(run_id = %run_id, artifact = %artifact, "Starting artifact evaluation");

        match self.run(run_id, artifact, request_metadata).await {
            Ok(counters) => {
                if !counters.watermark_complete() {
                    // The max-index heuristic assumes a dense, zero-based
                    // index space; the explicit expected total still decides.
                    warn!(
                        run_id = %run_id,
                        artifact = %artifact,
                        highest_index_seen = counters.highest_index_seen,
                        expected_total = counters.expected_total,
                        "Max-index watermark does not match expected total"
                    );
                }

                if counters.all_allowed() {
                    info!(
                        run_id = %run_id,
                        artifact = %artifact,
                        packages = counters.expected_total,
                        "Artifact passed policy evaluation"
                    );
                    ArtifactEvaluation::succeeded(run_id.clone(), artifact.key.clone())
                } else {
                    info!(
                        run_id = %run_id,
                        artifact = %artifact,
                        allowed = counters.allowed_count,
                        expected = counters.expected_total,
                        "Artifact denied: infractions exist"
                    );
                    ArtifactEvaluation::failed(
                        run_id.clone(),
                        artifact.key.clone(),
                        verdict_types::FailureCause::InfractionsExist,
                    )
                }
            }
            Err(error) => {
                warn!(
                    run_id = %run_id,
                    artifact = %artifact,
                    error = %error,
                    "Artifact evaluation failed"
                );
                ArtifactEvaluation::failed(run_id.clone(), artifact.key.clone(), error.into_cause())
            }
        }
    }

    async fn run(
        &self,
        run_id: &RunId,
        artifact: &ArtifactRef,
        request_metadata: &ConsumerMetadata,
    ) -> EngineResult<CompletionCounters> {
        let document = self.objects.get(artifact).await?;
        let metadata = self.resolver.resolve(artifact, request_metadata).await?;

        let results = self.policy.evaluate(&document, &self.bundle).await?;
        let items = gather_results(&results);
        let expected_total = items.len() as i64;

        // The one unconditional counter write; happens-before every branch.
        self.counters
            .init_counters(run_id, &artifact.key, expected_total)
            .await?;

        let mut branches: Vec<JoinHandle<EngineResult<()>>> = Vec::with_capacity(items.len());
        for item in items {
            let counters = Arc::clone(&self.counters);
            let sink = Arc::clone(&self.sink);
            let run_id = run_id.clone();
            let artifact_key = artifact.key.clone();
            let metadata = metadata.clone();
            branches.push(tokio::spawn(async move {
                run_branch(counters, sink, run_id, artifact_key, item, metadata).await
            }));
        }

        // Join semantics: every branch reaches a terminal state before any
        // error is surfaced.
        let mut first_error: Option<EngineError> = None;
        for branch in branches {
            match branch.await {
                Ok(Ok(())) => {}
                Ok(Err(error)) => {
                    if first_error.is_none() {
                        first_error = Some(error);
                    }
                }
                Err(join_error) => {
                    if first_error.is_none() {
                        first_error = Some(EngineError::Task(join_error.to_string()));
                    }
                }
            }
        }
        if let Some(error) = first_error {
            return Err(error);
        }

        Ok(self.counters.read(run_id, &artifact.key).await?)
    }
}

/// One fan-out branch. Independently scheduled, no ordering relative to
/// siblings, safe to re-execute.
async fn run_branch(
    counters: Arc<dyn CounterStore>,
    sink: Arc<InfractionSink>,
    run_id: RunId,
    artifact_key: String,
    item: PolicyResultItem,
    metadata: ConsumerMetadata,
) -> EngineResult<()> {
    let applied = counters
        .conditional_max(
            &run_id,
            &artifact_key,
            Counter::HighestIndexSeen,
            item.index as i64,
        )
        .await?;
    if !applied {
        // Losing the race is the expected outcome for any branch whose
        // index is not the current maximum.
        debug!(
            run_id = %run_id,
            artifact = %artifact_key,
            index = item.index,
            "Max-index write lost the race"
        );
    }

    if !item.has_infractions() {
        counters
            .increment(&run_id, &artifact_key, Counter::AllowedCount, 1)
            .await?;
        return Ok(());
    }

    // Second-level fan-out: one keyed, idempotent write per infraction. No
    // completion counter of its own.
    let mut writes: Vec<JoinHandle<Result<(), verdict_sink::SinkError>>> =
        Vec::with_capacity(item.infractions.len());
    for infraction in item.infractions {
        let sink = Arc::clone(&sink);
        let run_id = run_id.clone();
        let artifact_key = artifact_key.clone();
        let metadata = metadata.clone();
        writes.push(tokio::spawn(async move {
            sink.record(&run_id, &artifact_key, &infraction, &metadata)
                .await
        }));
    }

    let mut first_error: Option<EngineError> = None;
    for write in writes {
        match write.await {
            Ok(Ok(())) => {}
            Ok(Err(error)) => {
                if first_error.is_none() {
                    first_error = Some(error.into());
                }
            }
            Err(join_error) => {
                if first_error.is_none() {
                    first_error = Some(EngineError::Task(join_error.to_string()));
                }
            }
        }
    }
    match first_error {
        Some(error) => Err(error),
        None => Ok(()),
    }
}
