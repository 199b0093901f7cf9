//! Run configuration, loadable from JSON and overridable from the CLI.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Options for [`SystemTelemetry`](crate::telemetry::SystemTelemetry).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Fold every visible process's `/proc/<pid>/stat` into the snapshot.
    pub process_fingerprint: bool,
    /// Read GPU temperature when a GPU sensor exists.
    pub gpu: bool,
    /// Window over which instantaneous CPU load is sampled.
    pub cpu_sample_ms: u64,
    /// Upper bound on one telemetry query; unbounded when `None`.
    pub timeout_ms: Option<u64>,
}

impl TelemetryConfig {
    pub fn cpu_sample_interval(&self) -> Duration {
        Duration::from_millis(self.cpu_sample_ms)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            process_fingerprint: true,
            gpu: true,
            cpu_sample_ms: 100,
            timeout_ms: None,
        }
    }
}

/// Everything one `generate` run needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub lineage_count: usize,
    pub rounds_per_lineage: usize,
    pub output_path: PathBuf,
    /// Non-secret domain-separation label appended to every seed.
    pub personalization_tag: Option<String>,
    /// Worker threads; one per CPU when `None`.
    pub workers: Option<usize>,
    pub telemetry: TelemetryConfig,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            lineage_count: 500,
            rounds_per_lineage: 10,
            output_path: PathBuf::from("random_bits.bin"),
            personalization_tag: None,
            workers: None,
            telemetry: TelemetryConfig::default(),
        }
    }
}

impl RunConfig {
    /// Load a JSON config file. Missing fields take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.workers == Some(0) {
            return Err(Error::Config("workers must be at least 1".to_string()));
        }
        if self.telemetry.cpu_sample_ms == 0 {
            return Err(Error::Config("cpu_sample_ms must be at least 1".to_string()));
        }
        if self.telemetry.timeout_ms == Some(0) {
            return Err(Error::Config("timeout_ms must be at least 1".to_string()));
        }
        Ok(())
    }
}
