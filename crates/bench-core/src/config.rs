use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::BenchError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub scenario: ScenarioConfig,
    pub run: RunConfig,
    pub target: TargetConfig,
}

impl Config {
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Checked once before any batch is scheduled; violations are fatal.
    pub fn validate(&self) -> Result<(), BenchError> {
        if self.target.uri.trim().is_empty() {
            return Err(BenchError::Setup("target.uri must not be empty".into()));
        }
        if self.run.batch_size == 0 {
            return Err(BenchError::Setup("run.batch_size must be positive".into()));
        }
        if self.run.max_concurrent == 0 {
            return Err(BenchError::Setup(
                "run.max_concurrent must be positive".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioConfig {
    /// Deterministic seed for reproducible payload generation
    pub seed: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Records per request body
    pub batch_size: u32,
    /// Number of batches in one run (zero is a valid empty run)
    pub total_batches: u32,
    /// Maximum concurrent in-flight batches
    pub max_concurrent: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Endpoint the batches are POSTed to
    pub uri: String,
    /// Optional per-batch deadline in milliseconds
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}
