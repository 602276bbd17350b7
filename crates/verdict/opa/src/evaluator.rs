//! The evaluation seam: one trait, one subprocess-backed engine, one canned
//! engine for tests.

use crate::error::{PolicyError, Result};
use crate::result::{PolicyResultSet, RuleBundleRef};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::process::Command;
use tracing::debug;

/// Opaque rule-evaluation capability.
///
/// One call per artifact evaluation: synchronous from the caller's point of
/// view, no partial results, no retries at this layer.
#[async_trait]
pub trait PolicyEvaluator: Send + Sync {
    async fn evaluate(&self, document: &[u8], bundle: &RuleBundleRef) -> Result<PolicyResultSet>;
}

/// Engine adapter that shells out to an OPA-style binary.
///
/// The document is staged to a temporary file and the engine invoked as
/// `<binary> eval --format json --input <doc> --data <bundle> <query>`. The
/// engine's JSON result is unwrapped to the package map.
pub struct SubprocessEvaluator {
    binary: PathBuf,
    query: String,
}

impl SubprocessEvaluator {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            query: "data".to_string(),
        }
    }

    /// Override the query evaluated against the bundle (default `data`).
    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = query.into();
        self
    }
}

#[async_trait]
impl PolicyEvaluator for SubprocessEvaluator {
    async fn evaluate(&self, document: &[u8], bundle: &RuleBundleRef) -> Result<PolicyResultSet> {
        let staged = tempfile::NamedTempFile::new()?;
        tokio::fs::write(staged.path(), document).await?;

        debug!(
            engine = %self.binary.display(),
            bundle = %bundle,
            "Invoking policy engine"
        );

        let output = Command::new(&self.binary)
            .arg("eval")
            .arg("--format")
            .arg("json")
            .arg("--input")
            .arg(staged.path())
            .arg("--data")
            .arg(&bundle.location)
            .arg(&self.query)
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(PolicyError::Evaluation(format!(
                "engine exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_engine_output(&stdout)
    }
}

#[derive(Deserialize)]
struct EngineOutput {
    #[serde(default)]
    result: Vec<EngineResult>,
}

#[derive(Deserialize)]
struct EngineResult {
    #[serde(default)]
    expressions: Vec<EngineExpression>,
}

#[derive(Deserialize)]
struct EngineExpression {
    value: serde_json::Value,
}

/// Unwrap the engine's `--format json` envelope down to the package map.
pub(crate) fn parse_engine_output(stdout: &str) -> Result<PolicyResultSet> {
    let envelope: EngineOutput = serde_json::from_str(stdout)
        .map_err(|e| PolicyError::MalformedOutput(format!("not engine JSON: {}", e)))?;

    let value = envelope
        .result
        .into_iter()
        .next()
        .and_then(|r| r.expressions.into_iter().next())
        .map(|e| e.value)
        .ok_or_else(|| PolicyError::MalformedOutput("empty engine result".to_string()))?;

    serde_json::from_value(value)
        .map_err(|e| PolicyError::MalformedOutput(format!("unexpected package shape: {}", e)))
}

/// Canned evaluator for tests: results keyed by exact document bytes, with
/// an optional fallback and an optional forced failure.
#[derive(Default)]
pub struct StaticEvaluator {
    by_document: HashMap<Vec<u8>, PolicyResultSet>,
    fallback: Option<PolicyResultSet>,
    fail_with: Option<String>,
}

impl StaticEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the result set returned for an exact document.
    pub fn with_result(mut self, document: impl Into<Vec<u8>>, results: PolicyResultSet) -> Self {
        self.by_document.insert(document.into(), results);
        self
    }

    /// Result set returned for any unregistered document.
    pub fn with_fallback(mut self, results: PolicyResultSet) -> Self {
        self.fallback = Some(results);
        self
    }

    /// An evaluator that always fails, for exercising the fatal path.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            fail_with: Some(message.into()),
            ..Self::default()
        }
    }
}

#[async_trait]
impl PolicyEvaluator for StaticEvaluator {
    async fn evaluate(&self, document: &[u8], _bundle: &RuleBundleRef) -> Result<PolicyResultSet> {
        if let Some(message) = &self.fail_with {
            return Err(PolicyError::Evaluation(message.clone()));
        }
        self.by_document
            .get(document)
            .or(self.fallback.as_ref())
            .cloned()
            .ok_or_else(|| PolicyError::Evaluation("no canned result for document".to_string()))
    }
}
