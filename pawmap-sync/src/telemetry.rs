//! Logging setup for binaries embedding the sync core
//!
//! Filter comes from `RUST_LOG`, falling back to `LOG_LEVEL`, then `info`.
//! `LOG_FORMAT=json` switches to JSON lines.

use std::env;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Human,
    Json,
}

impl LogFormat {
    fn from_env_value(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "json" => LogFormat::Json,
            _ => LogFormat::Human,
        }
    }
}

/// Telemetry configuration
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Primary log filter (RUST_LOG env var)
    pub log_filter: String,
    /// Fallback level if RUST_LOG is not set
    pub default_level: String,
    pub log_format: LogFormat,
}

impl TelemetryConfig {
    /// Build from the environment, with `level` as the last fallback
    pub fn from_env(level: Option<&str>) -> Self {
        let log_filter = env::var("RUST_LOG").unwrap_or_default();
        let default_level = env::var("LOG_LEVEL")
            .ok()
            .filter(|l| !l.trim().is_empty())
            .or_else(|| level.map(str::to_string))
            .unwrap_or_else(|| "info".to_string());

        Self {
            log_filter,
            default_level,
            log_format: LogFormat::from_env_value(&env::var("LOG_FORMAT").unwrap_or_default()),
        }
    }

    fn filter_directive(&self) -> &str {
        if self.log_filter.trim().is_empty() {
            &self.default_level
        } else {
            &self.log_filter
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self::from_env(None)
    }
}

/// Install the global subscriber. Safe to call more than once.
pub fn init_logging(config: &TelemetryConfig) {
    if tracing::dispatcher::has_been_set() {
        tracing::debug!("tracing subscriber already initialized, skipping");
        return;
    }

    let filter = EnvFilter::try_new(config.filter_directive())
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let fmt_layer = match config.log_format {
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .boxed(),
        LogFormat::Human => tracing_subscriber::fmt::layer()
            .compact()
            .with_writer(std::io::stderr)
            .boxed(),
    };

    // try_init: another thread (or a test harness) may have won the race
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init();
}
