//! Scheduler configuration.
//!
//! Every field has a serde default, so an empty JSON object is a valid
//! config. `VERK_WORKER_THREADS` and `VERK_DIAGNOSTICS_ADDR` override the
//! parsed values when [`SchedulerConfig::with_env_overrides`] is applied.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SchedError};

/// Scheduler configuration, typically parsed from JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Worker threads for the parallel set. 0 = available parallelism.
    #[serde(default = "default_worker_threads")]
    pub worker_threads: usize,
    /// Prefix for worker thread names (`<prefix>-<index>`).
    #[serde(default = "default_thread_name_prefix")]
    pub thread_name_prefix: String,
    /// Where to send diagnostics snapshots. `None` disables sending.
    #[serde(default)]
    pub diagnostics_addr: Option<String>,
}

fn default_worker_threads() -> usize { 0 }
fn default_thread_name_prefix() -> String { "verk-worker".to_string() }

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            worker_threads: default_worker_threads(),
            thread_name_prefix: default_thread_name_prefix(),
            diagnostics_addr: None,
        }
    }
}

impl SchedulerConfig {
    /// Parse a JSON document and validate it.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `VERK_*` environment overrides on top of this config.
    pub fn with_env_overrides(mut self) -> Result<Self> {
        if let Ok(raw) = std::env::var("VERK_WORKER_THREADS") {
            self.worker_threads = raw.trim().parse().map_err(|_| {
                SchedError::Config(format!("VERK_WORKER_THREADS is not a number: {raw:?}"))
            })?;
        }
        if let Ok(addr) = std::env::var("VERK_DIAGNOSTICS_ADDR") {
            self.diagnostics_addr = Some(addr);
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if self.thread_name_prefix.trim().is_empty() {
            return Err(SchedError::Config(
                "thread_name_prefix must not be empty".to_string(),
            ));
        }
        if let Some(addr) = &self.diagnostics_addr {
            if addr.parse::<std::net::SocketAddr>().is_err() {
                return Err(SchedError::Config(format!(
                    "diagnostics_addr is not a socket address: {addr:?}"
                )));
            }
        }
        Ok(())
    }

    /// Resolve worker thread count (0 means use available parallelism).
    pub fn resolved_worker_threads(&self) -> usize {
        if self.worker_threads == 0 {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4)
        } else {
            self.worker_threads
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_json_uses_defaults() {
        let config = SchedulerConfig::from_json_str("{}").unwrap();
        assert_eq!(config, SchedulerConfig::default());
        assert_eq!(config.thread_name_prefix, "verk-worker");
    }

    #[test]
    fn resolved_worker_threads() {
        let mut config = SchedulerConfig::default();
        assert!(config.resolved_worker_threads() > 0);

        config.worker_threads = 3;
        assert_eq!(config.resolved_worker_threads(), 3);
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(matches!(
            SchedulerConfig::from_json_str(r#"{"thread_name_prefix": " "}"#),
            Err(SchedError::Config(_))
        ));
        assert!(matches!(
            SchedulerConfig::from_json_str(r#"{"diagnostics_addr": "nowhere"}"#),
            Err(SchedError::Config(_))
        ));
        assert!(matches!(
            SchedulerConfig::from_json_str(r#"{"worker_threads": "many"}"#),
            Err(SchedError::ConfigParse(_))
        ));
    }

    #[test]
    fn full_document_parses() {
        let config = SchedulerConfig::from_json_str(
            r#"{"worker_threads": 2, "thread_name_prefix": "sim", "diagnostics_addr": "127.0.0.1:9300"}"#,
        )
        .unwrap();
        assert_eq!(config.worker_threads, 2);
        assert_eq!(config.thread_name_prefix, "sim");
        assert_eq!(config.diagnostics_addr.as_deref(), Some("127.0.0.1:9300"));
    }
}
