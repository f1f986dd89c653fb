//! PipelineConfig - Config Loader output
//!
//! Describes the storage namespace, watchdog tuning and sink routing.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use validator::Validate;

/// Config version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// Complete pipeline configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct PipelineConfig {
    /// Config version
    #[serde(default)]
    pub version: ConfigVersion,

    /// Persisted key-value store settings
    #[serde(default)]
    #[validate(nested)]
    pub storage: StorageConfig,

    /// Stuck-UI watchdog settings
    #[serde(default)]
    #[validate(nested)]
    pub watchdog: WatchdogConfig,

    /// Output routing
    #[serde(default)]
    #[validate(nested)]
    pub sinks: Vec<SinkConfig>,
}

/// Key-value store settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct StorageConfig {
    /// Namespace prepended to every key (`"<prefix>_<key>"`)
    #[serde(default = "default_storage_prefix")]
    #[validate(length(min = 1))]
    pub prefix: String,

    /// JSON file backing the store; in-memory when absent
    #[serde(default)]
    pub path: Option<PathBuf>,
}

fn default_storage_prefix() -> String {
    "eventpipe".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            prefix: default_storage_prefix(),
            path: None,
        }
    }
}

/// Stuck-UI watchdog settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct WatchdogConfig {
    /// How long a fired watchdog waits for recovery
    #[serde(default = "default_correction_window_ms")]
    #[validate(range(min = 1))]
    pub correction_window_ms: u64,

    /// Event emitted when a screen failed to progress in time
    #[serde(default = "default_stuck_event")]
    #[validate(length(min = 1))]
    pub stuck_event: String,

    /// Event emitted when a stuck screen later recovered
    #[serde(default = "default_corrected_event")]
    #[validate(length(min = 1))]
    pub corrected_event: String,
}

fn default_correction_window_ms() -> u64 {
    30_000
}

fn default_stuck_event() -> String {
    "ui_stuck".to_string()
}

fn default_corrected_event() -> String {
    "ui_stuck_corrected".to_string()
}

impl WatchdogConfig {
    pub fn correction_window(&self) -> Duration {
        Duration::from_millis(self.correction_window_ms)
    }
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            correction_window_ms: default_correction_window_ms(),
            stuck_event: default_stuck_event(),
            corrected_event: default_corrected_event(),
        }
    }
}

/// Sink configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SinkConfig {
    /// Sink name (unique)
    #[validate(length(min = 1))]
    pub name: String,

    /// Sink type
    pub sink_type: SinkType,

    /// Type-specific parameters
    #[serde(default)]
    pub params: HashMap<String, String>,
}

/// Sink type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkType {
    /// Structured log lines via tracing
    Log,
    /// JSON datagrams to a debug collector
    Udp,
    /// In-memory recording (tests, replay inspection)
    Memory,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.storage.prefix, "eventpipe");
        assert_eq!(config.watchdog.correction_window(), Duration::from_secs(30));
        assert_eq!(config.watchdog.stuck_event, "ui_stuck");
        assert!(config.sinks.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_derive_rejects_empty_prefix() {
        let mut config = PipelineConfig::default();
        config.storage.prefix.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_derive_rejects_zero_window() {
        let mut config = PipelineConfig::default();
        config.watchdog.correction_window_ms = 0;
        assert!(config.validate().is_err());
    }
}
