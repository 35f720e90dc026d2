//! Operator runtime configuration
//!
//! Every setting can be given as a command line flag or an environment
//! variable; unset values fall back to the defaults below.

use std::time::Duration;

use clap::{Parser, ValueEnum};

/// Log output format
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// One JSON object per line
    #[default]
    Json,
    /// Human readable text
    Text,
}

/// Configuration for the operator process
#[derive(Parser, Clone, Debug)]
#[command(name = "pretzelai-operator", version, about, long_about = None)]
pub struct OperatorConfig {
    /// Port serving /metrics, /healthz and /readyz
    #[arg(long, env = "PRETZELAI_METRICS_PORT", default_value_t = 8080)]
    pub metrics_port: u16,

    /// Field manager recorded on every write
    #[arg(long, env = "PRETZELAI_FIELD_MANAGER", default_value = "pretzelai-operator")]
    pub field_manager: String,

    /// Seconds between periodic passes of a converged object
    #[arg(long, env = "PRETZELAI_REQUEUE_SECS", default_value_t = 30)]
    pub requeue_secs: u64,

    /// Seconds before re-running a pass that hit a version conflict
    #[arg(long, env = "PRETZELAI_CONFLICT_REQUEUE_SECS", default_value_t = 1)]
    pub conflict_requeue_secs: u64,

    /// Seconds before retrying a pass that failed against the API server
    #[arg(long, env = "PRETZELAI_ERROR_REQUEUE_SECS", default_value_t = 30)]
    pub error_requeue_secs: u64,

    /// Seconds before retrying an object whose spec failed validation
    #[arg(long, env = "PRETZELAI_VALIDATION_REQUEUE_SECS", default_value_t = 300)]
    pub validation_requeue_secs: u64,

    /// Deadline for a single reconcile pass
    #[arg(long, env = "PRETZELAI_PASS_TIMEOUT_SECS", default_value_t = 60)]
    pub pass_timeout_secs: u64,

    /// Log output format
    #[arg(long, env = "PRETZELAI_LOG_FORMAT", value_enum, default_value_t = LogFormat::Json)]
    pub log_format: LogFormat,
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            metrics_port: 8080,
            field_manager: "pretzelai-operator".to_string(),
            requeue_secs: 30,
            conflict_requeue_secs: 1,
            error_requeue_secs: 30,
            validation_requeue_secs: 300,
            pass_timeout_secs: 60,
            log_format: LogFormat::Json,
        }
    }
}

impl OperatorConfig {
    pub fn requeue_interval(&self) -> Duration {
        Duration::from_secs(self.requeue_secs)
    }

    pub fn conflict_requeue(&self) -> Duration {
        Duration::from_secs(self.conflict_requeue_secs)
    }

    pub fn error_requeue(&self) -> Duration {
        Duration::from_secs(self.error_requeue_secs)
    }

    pub fn validation_requeue(&self) -> Duration {
        Duration::from_secs(self.validation_requeue_secs)
    }

    pub fn pass_timeout(&self) -> Duration {
        Duration::from_secs(self.pass_timeout_secs)
    }
}
