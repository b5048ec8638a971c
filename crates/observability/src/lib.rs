//! Tracing/logging setup shared by binaries and test harnesses.

pub mod config;
pub mod subscriber;

pub use config::{ConfigError, LogFormat, ObservabilityConfig};

/// Initialize process-wide logging from the environment.
///
/// Falls back to defaults (with a warning) when the environment is malformed.
/// Safe to call multiple times; subsequent calls are no-ops.
pub fn init() {
    match ObservabilityConfig::from_env() {
        Ok(config) => subscriber::init(&config),
        Err(err) => {
            subscriber::init(&ObservabilityConfig::default());
            tracing::warn!(error = %err, "invalid logging configuration; using defaults");
        }
    }
}

/// Initialize process-wide logging from an explicit configuration.
pub fn init_with(config: &ObservabilityConfig) {
    subscriber::init(config);
}
