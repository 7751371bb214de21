use std::path::{Path, PathBuf};

use chrono::Duration;
use chrono_tz::Tz;
use serde::Deserialize;

use crate::error::{PipelineError, Result};

/// Explicit pipeline configuration, loaded once in the binary and passed into
/// the orchestrator. No module-level state: everything the pipeline needs to
/// know travels through this value.
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Root directory holding `to_process/` and `processed/`.
    pub data_root: PathBuf,

    /// The fixed civil time zone all filename- and CSV-embedded timestamps
    /// are expressed in.
    pub timezone: Tz,

    /// Firmware version the test benches flash for internal debugging. Runs
    /// reporting it are never trustworthy results.
    #[serde(default = "default_debug_firmware")]
    pub debug_firmware: String,

    /// Burn-in runs shorter than this did not complete.
    #[serde(default = "default_min_duration_minutes")]
    pub min_duration_minutes: i64,

    /// Rows per bulk insert into test_data.
    #[serde(default = "default_insert_batch_size")]
    pub insert_batch_size: usize,
}

fn default_debug_firmware() -> String {
    "1.11.11".to_string()
}

fn default_min_duration_minutes() -> i64 {
    120
}

fn default_insert_batch_size() -> usize {
    500
}

impl PipelineConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|err| {
            PipelineError::Config(format!("cannot read {}: {err}", path.display()))
        })?;
        toml::from_str(&raw)
            .map_err(|err| PipelineError::Config(format!("cannot parse {}: {err}", path.display())))
    }

    pub fn min_duration(&self) -> Duration {
        Duration::minutes(self.min_duration_minutes)
    }

    pub fn pending_results_dir(&self) -> PathBuf {
        self.data_root.join("to_process").join("results")
    }

    pub fn pending_data_dir(&self) -> PathBuf {
        self.data_root.join("to_process").join("tests")
    }

    pub fn processed_results_dir(&self) -> PathBuf {
        self.data_root.join("processed").join("results")
    }

    pub fn processed_data_dir(&self) -> PathBuf {
        self.data_root.join("processed").join("tests")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_config_with_defaults() {
        let config: PipelineConfig = toml::from_str(
            r#"
            data_root = "/var/lib/burnin"
            timezone = "America/New_York"
            "#,
        )
        .expect("config parse failed");

        assert_eq!(config.timezone, chrono_tz::America::New_York);
        assert_eq!(config.debug_firmware, "1.11.11");
        assert_eq!(config.min_duration_minutes, 120);
        assert_eq!(config.insert_batch_size, 500);
        assert_eq!(
            config.pending_results_dir(),
            PathBuf::from("/var/lib/burnin/to_process/results")
        );
        assert_eq!(
            config.processed_data_dir(),
            PathBuf::from("/var/lib/burnin/processed/tests")
        );
    }

    #[test]
    fn rejects_unknown_timezone() {
        let parsed = toml::from_str::<PipelineConfig>(
            r#"
            data_root = "/var/lib/burnin"
            timezone = "Mars/Olympus_Mons"
            "#,
        );
        assert!(parsed.is_err());
    }
}
