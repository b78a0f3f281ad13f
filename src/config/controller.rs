//! # Controller Configuration
//!
//! Controller-level settings loaded from environment variables.

use crate::constants::{
    DEFAULT_ERROR_REQUEUE_INTERVAL_SECS, DEFAULT_MAX_CONCURRENT_RECONCILES, DEFAULT_METRICS_PORT,
    DEFAULT_REQUEUE_INTERVAL_SECS,
};
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "plain" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown log format: {other}")),
        }
    }
}

/// Controller-level configuration
///
/// All settings have defaults and can be overridden via environment variables.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Requeue interval after a completed reconciliation (seconds)
    pub requeue_interval_secs: u64,
    /// Requeue interval after a failed reconciliation (seconds)
    pub error_requeue_interval_secs: u64,
    /// Port of the metrics and probe server
    pub metrics_port: u16,
    /// Maximum number of BMCSecrets reconciled at the same time
    pub max_concurrent_reconciles: u16,
    pub log_format: LogFormat,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            requeue_interval_secs: DEFAULT_REQUEUE_INTERVAL_SECS,
            error_requeue_interval_secs: DEFAULT_ERROR_REQUEUE_INTERVAL_SECS,
            metrics_port: DEFAULT_METRICS_PORT,
            max_concurrent_reconciles: DEFAULT_MAX_CONCURRENT_RECONCILES,
            log_format: LogFormat::Text,
        }
    }
}

impl ControllerConfig {
    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        Self {
            requeue_interval_secs: env_var_or_default(
                "REQUEUE_INTERVAL_SECS",
                DEFAULT_REQUEUE_INTERVAL_SECS,
            ),
            error_requeue_interval_secs: env_var_or_default(
                "ERROR_REQUEUE_INTERVAL_SECS",
                DEFAULT_ERROR_REQUEUE_INTERVAL_SECS,
            ),
            metrics_port: env_var_or_default("METRICS_PORT", DEFAULT_METRICS_PORT),
            max_concurrent_reconciles: env_var_or_default(
                "MAX_CONCURRENT_RECONCILES",
                DEFAULT_MAX_CONCURRENT_RECONCILES,
            ),
            log_format: env_var_or_default("LOG_FORMAT", LogFormat::Text),
        }
    }

    pub fn requeue_interval(&self) -> Duration {
        Duration::from_secs(self.requeue_interval_secs)
    }

    pub fn error_requeue_interval(&self) -> Duration {
        Duration::from_secs(self.error_requeue_interval_secs)
    }
}

/// Read environment variable or return default
fn env_var_or_default<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
