//! Verdict CLI - evaluate infrastructure-as-code artifacts against a policy
//! rule bundle
//!
//! `verdict evaluate` stages a local directory of artifact documents into
//! the object store, fans an evaluation run out over them, prints the
//! aggregate report as JSON, and exits non-zero unless every artifact
//! passed. The final log line distinguishes "artifact violated policy" from
//! "evaluation infrastructure failed".

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use verdict_engine::{ArtifactEvaluator, Coordinator};
use verdict_opa::{PolicyEvaluator, RuleBundleRef, SubprocessEvaluator};
use verdict_sink::{EventBus, InMemoryEventBus, InfractionSink};
use verdict_store::{
    CounterStore, InMemoryCounterStore, InMemoryObjectStore, InMemoryRecordStore,
    LocalObjectStore, ObjectStore, RecordStore,
};
use verdict_types::{ArtifactRef, ConsumerMetadata, EvaluationRequest, RequestContext};

mod config;

use config::VerdictConfig;

/// Store name under which staged artifact documents live.
const ARTIFACT_STORE: &str = "artifacts";

/// Verdict CLI
#[derive(Parser)]
#[command(name = "verdict")]
#[command(about = "Policy evaluation broker for infrastructure-as-code artifacts", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "VERDICT_CONFIG")]
    config: Option<String>,

    /// Log level
    #[arg(long, env = "VERDICT_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Enable JSON logging
    #[arg(long, env = "VERDICT_LOG_JSON")]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Stage a directory of artifact documents and evaluate them
    Evaluate {
        /// Directory of artifact documents to evaluate
        #[arg(long)]
        artifacts_dir: PathBuf,

        /// Rule bundle location handed to the policy engine
        #[arg(long)]
        bundle: String,

        /// Policy engine binary (overrides configuration)
        #[arg(long)]
        engine_bin: Option<String>,

        /// Per-artifact timeout in seconds (overrides configuration)
        #[arg(long)]
        timeout_secs: Option<u64>,

        /// JSON file with consumer metadata to stamp on infractions
        #[arg(long)]
        metadata: Option<PathBuf>,

        /// Root directory for a filesystem object store; defaults to
        /// in-memory staging
        #[arg(long)]
        store_root: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    // Initialize tracing
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| cli.log_level.clone().into());

    if cli.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    let mut config = VerdictConfig::load(cli.config.as_deref())
        .context("failed to load configuration")?;

    match cli.command {
        Commands::Evaluate {
            artifacts_dir,
            bundle,
            engine_bin,
            timeout_secs,
            metadata,
            store_root,
        } => {
            // Override with CLI args
            if let Some(binary) = engine_bin {
                config.engine.binary = binary;
            }
            if let Some(secs) = timeout_secs {
                config.run.artifact_timeout_secs = secs;
            }

            evaluate(config, artifacts_dir, bundle, metadata, store_root).await
        }
    }
}

async fn evaluate(
    config: VerdictConfig,
    artifacts_dir: PathBuf,
    bundle: String,
    metadata_path: Option<PathBuf>,
    store_root: Option<PathBuf>,
) -> anyhow::Result<ExitCode> {
    let objects: Arc<dyn ObjectStore> = match store_root {
        Some(root) => Arc::new(LocalObjectStore::new(root)),
        None => Arc::new(InMemoryObjectStore::new()),
    };

    let artifacts = stage_artifacts(objects.as_ref(), &artifacts_dir).await?;
    anyhow::ensure!(
        !artifacts.is_empty(),
        "no artifact documents found in {}",
        artifacts_dir.display()
    );
    info!(staged = artifacts.len(), "Artifacts staged");

    let consumer_metadata = match metadata_path {
        Some(path) => {
            let bytes = tokio::fs::read(&path)
                .await
                .with_context(|| format!("failed to read metadata file {}", path.display()))?;
            serde_json::from_slice(&bytes)
                .with_context(|| format!("invalid metadata file {}", path.display()))?
        }
        None => ConsumerMetadata::default(),
    };

    let records = Arc::new(InMemoryRecordStore::new());
    let sink = Arc::new(InfractionSink::new(
        Arc::clone(&records) as Arc<dyn RecordStore>,
        Arc::new(InMemoryEventBus::new()) as Arc<dyn EventBus>,
    ));
    let policy: Arc<dyn PolicyEvaluator> = Arc::new(
        SubprocessEvaluator::new(&config.engine.binary).with_query(config.engine.query.clone()),
    );
    let evaluator = ArtifactEvaluator::new(
        Arc::clone(&objects),
        policy,
        Arc::new(InMemoryCounterStore::new()) as Arc<dyn CounterStore>,
        sink,
        RuleBundleRef::new(bundle),
    );
    let coordinator = Coordinator::new(Arc::new(evaluator))
        .with_artifact_timeout(Duration::from_secs(config.run.artifact_timeout_secs))
        .with_report_store(Arc::clone(&objects));

    let request = EvaluationRequest::new(
        artifacts,
        consumer_metadata,
        RequestContext::new("verdict-cli"),
    );
    let report = coordinator.evaluate(request).await;

    println!("{}", serde_json::to_string_pretty(&report)?);

    for record in records.for_run(&report.run_id).await? {
        warn!(
            artifact = %record.artifact_key,
            resource = %record.resource,
            reason = %record.reason,
            "Infraction"
        );
    }

    if report.all_succeeded {
        info!(run_id = %report.run_id, "All artifacts passed policy evaluation");
        Ok(ExitCode::SUCCESS)
    } else if report.infra_failure_count() > 0 {
        error!(
            run_id = %report.run_id,
            failures = report.infra_failure_count(),
            "Evaluation infrastructure failed; policy verdict unknown for some artifacts"
        );
        Ok(ExitCode::FAILURE)
    } else {
        warn!(
            run_id = %report.run_id,
            denied = report.denied_count(),
            "Policy infractions exist"
        );
        Ok(ExitCode::FAILURE)
    }
}

/// Walk the top level of `dir` and stage every file into the object store.
async fn stage_artifacts(
    objects: &dyn ObjectStore,
    dir: &PathBuf,
) -> anyhow::Result<Vec<ArtifactRef>> {
    let mut staged = Vec::new();
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .with_context(|| format!("failed to read artifacts directory {}", dir.display()))?;

    while let Some(entry) = entries.next_entry().await? {
        if !entry.file_type().await?.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        let bytes = tokio::fs::read(entry.path()).await?;
        let target = ArtifactRef::new(ARTIFACT_STORE, &name);
        objects.put(&target, bytes).await?;
        staged.push(target);
    }

    staged.sort_by(|a, b| a.key.cmp(&b.key));
    Ok(staged)
}
