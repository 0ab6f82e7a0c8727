//! Orchestrator configuration.

use serde::{Deserialize, Serialize};

/// Configuration for the poll loop and the worker pool it feeds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Enable/disable the poll loop.
    /// When disabled the server only serves its status API.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Idle sleep between polls that found no work (milliseconds).
    /// A poll that found work is followed immediately by another.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// Concurrent device sessions (worker tasks).
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,
}

fn default_enabled() -> bool {
    true
}

fn default_poll_interval() -> u64 {
    10_000 // 10 seconds
}

fn default_max_workers() -> usize {
    5
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            poll_interval_ms: default_poll_interval(),
            max_workers: default_max_workers(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = OrchestratorConfig::default();
        assert!(config.enabled);
        assert_eq!(config.poll_interval_ms, 10_000);
        assert_eq!(config.max_workers, 5);
    }

    #[test]
    fn test_deserialize_partial() {
        let toml = r#"
            max_workers = 2
        "#;
        let config: OrchestratorConfig = toml::from_str(toml).unwrap();
        assert!(config.enabled);
        assert_eq!(config.poll_interval_ms, 10_000);
        assert_eq!(config.max_workers, 2);
    }

    #[test]
    fn test_deserialize_full() {
        let toml = r#"
            enabled = false
            poll_interval_ms = 500
            max_workers = 8
        "#;
        let config: OrchestratorConfig = toml::from_str(toml).unwrap();
        assert!(!config.enabled);
        assert_eq!(config.poll_interval_ms, 500);
        assert_eq!(config.max_workers, 8);
    }
}
