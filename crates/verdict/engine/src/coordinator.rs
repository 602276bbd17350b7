//! The outer coordinator: one run per request, one evaluator task per
//! artifact, a bounded wait per task, and an aggregate report.

use crate::artifact::ArtifactEvaluator;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{error, info, warn};
use verdict_store::ObjectStore;
use verdict_types::{
    ArtifactEvaluation, ArtifactRef, EvaluationReport, EvaluationRequest, FailureCause, RunId,
};

/// Store name under which run reports are persisted.
const REPORT_STORE: &str = "reports";

const DEFAULT_ARTIFACT_TIMEOUT: Duration = Duration::from_secs(300);

/// Fans one evaluation request out over its artifacts and aggregates the
/// per-artifact outcomes.
///
/// Failed artifacts are never retried and never abort their siblings; a
/// timeout marks that artifact alone as failed. The report always carries
/// per-artifact detail so callers can tell a policy denial from an
/// infrastructure failure.
pub struct Coordinator {
    artifacts: Arc<ArtifactEvaluator>,
    artifact_timeout: Duration,
    report_store: Option<Arc<dyn ObjectStore>>,
}

impl Coordinator {
    pub fn new(artifacts: Arc<ArtifactEvaluator>) -> Self {
        Self {
            artifacts,
            artifact_timeout: DEFAULT_ARTIFACT_TIMEOUT,
            report_store: None,
        }
    }

    /// Bound each artifact evaluation to the given duration.
    pub fn with_artifact_timeout(mut self, bound: Duration) -> Self {
        self.artifact_timeout = bound;
        self
    }

    /// Persist each finished report as JSON under `reports/<run-uuid>.json`.
    pub fn with_report_store(mut self, store: Arc<dyn ObjectStore>) -> Self {
        self.report_store = Some(store);
        self
    }

    /// Evaluate every artifact in the request and produce the aggregate
    /// report. The request is owned for the duration of the run.
    pub async fn evaluate(&self, request: EvaluationRequest) -> EvaluationReport {
        let run_id = RunId::generate();
        info!(
            run_id = %run_id,
            requester = %request.context.requester,
            artifacts = request.artifacts.len(),
            "Evaluation run started"
        );

        let mut dispatched = Vec::with_capacity(request.artifacts.len());
        for artifact in &request.artifacts {
            dispatched.push((
                artifact.key.clone(),
                self.dispatch(&run_id, artifact, &request),
            ));
        }

        let mut per_artifact = Vec::with_capacity(dispatched.len());
        for (artifact_key, handle) in dispatched {
            let evaluation = match handle.await {
                Ok(evaluation) => evaluation,
                Err(join_error) => ArtifactEvaluation::failed(
                    run_id.clone(),
                    artifact_key,
                    FailureCause::Infra(format!("evaluation task died: {}", join_error)),
                ),
            };
            per_artifact.push(evaluation);
        }

        let report = EvaluationReport::new(run_id, per_artifact);
        self.log_outcome(&report);

        if let Some(store) = &self.report_store {
            persist_report(store.as_ref(), &report).await;
        }

        report
    }

    fn dispatch(
        &self,
        run_id: &RunId,
        artifact: &ArtifactRef,
        request: &EvaluationRequest,
    ) -> tokio::task::JoinHandle<ArtifactEvaluation> {
        let evaluator = Arc::clone(&self.artifacts);
        let bound = self.artifact_timeout;
        let run_id = run_id.clone();
        let artifact = artifact.clone();
        let metadata = request.consumer_metadata.clone();

        tokio::spawn(async move {
            match timeout(bound, evaluator.evaluate(&run_id, &artifact, &metadata)).await {
                Ok(evaluation) => evaluation,
                Err(_) => {
                    // The artifact is failed; siblings keep running and any
                    // partial counters for it are not trusted.
                    warn!(
                        run_id = %run_id,
                        artifact = %artifact,
                        bound_secs = bound.as_secs(),
                        "Artifact evaluation timed out"
                    );
                    ArtifactEvaluation::failed(run_id, artifact.key, FailureCause::Timeout)
                }
            }
        })
    }

    fn log_outcome(&self, report: &EvaluationReport) {
        let denied = report.denied_count();
        let infra = report.infra_failure_count();
        if report.all_succeeded {
            info!(
                run_id = %report.run_id,
                artifacts = report.per_artifact.len(),
                "Evaluation run passed"
            );
        } else if infra > 0 {
            warn!(
                run_id = %report.run_id,
                denied,
                infra,
                "Evaluation run failed with infrastructure failures"
            );
        } else {
            warn!(
                run_id = %report.run_id,
                denied,
                "Evaluation run denied by policy"
            );
        }
    }
}

async fn persist_report(store: &dyn ObjectStore, report: &EvaluationReport) {
    let target = ArtifactRef::new(
        REPORT_STORE,
        format!("{}.json", report.run_id.as_uuid()),
    );
    match serde_json::to_vec_pretty(report) {
        Ok(bytes) => {
            if let Err(e) = store.put(&target, bytes).await {
                error!(run_id = %report.run_id, error = %e, "Failed to persist run report");
            }
        }
        Err(e) => {
            error!(run_id = %report.run_id, error = %e, "Failed to serialize run report");
        }
    }
}
