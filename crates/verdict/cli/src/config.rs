//! Configuration for the verdict CLI

use serde::{Deserialize, Serialize};

/// Main CLI configuration: defaults, overridden by an optional file, then
/// by `VERDICT_*` environment variables, then by command-line flags.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VerdictConfig {
    /// Policy engine configuration
    #[serde(default)]
    pub engine: EngineConfig,

    /// Run configuration
    #[serde(default)]
    pub run: RunConfig,
}

/// Policy engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Engine binary invoked per artifact
    #[serde(default = "default_engine_binary")]
    pub binary: String,

    /// Query evaluated against the rule bundle
    #[serde(default = "default_engine_query")]
    pub query: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            binary: default_engine_binary(),
            query: default_engine_query(),
        }
    }
}

/// Run configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Bounded wait per artifact evaluation, in seconds
    #[serde(default = "default_artifact_timeout")]
    pub artifact_timeout_secs: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            artifact_timeout_secs: default_artifact_timeout(),
        }
    }
}

// Default value helpers
fn default_engine_binary() -> String {
    "opa".to_string()
}

fn default_engine_query() -> String {
    "data".to_string()
}

fn default_artifact_timeout() -> u64 {
    300
}

impl VerdictConfig {
    /// Load configuration from file
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();

        // Add default configuration
        builder = builder.add_source(config::Config::try_from(&VerdictConfig::default())?);

        // Add file configuration if provided
        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        // Add environment variables with VERDICT_ prefix
        builder = builder.add_source(
            config::Environment::with_prefix("VERDICT")
                .separator("_")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }
}
