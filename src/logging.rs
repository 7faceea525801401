//! Tracing setup for diagnostic logging

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Filter used when `RUST_LOG` is unset (e.g. "info", "rfm_dashboard=debug")
    pub filter: String,
    /// Emit JSON lines instead of plain text
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            json: false,
        }
    }
}

impl LoggingConfig {
    /// Config derived from the CLI flags
    pub fn from_flags(verbose: bool, json: bool) -> Self {
        let filter = if verbose { "debug" } else { "info" };
        Self {
            filter: filter.to_string(),
            json,
        }
    }
}

/// Install the global subscriber; logs go to stderr so the report on stdout stays clean
pub fn init_tracing(config: &LoggingConfig) {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(env_filter);
    let result = if config.json {
        registry
            .with(fmt::layer().json().with_target(true).with_writer(std::io::stderr))
            .try_init()
    } else {
        registry
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .try_init()
    };

    if result.is_ok() {
        tracing::debug!(filter = %config.filter, json = config.json, "tracing initialized");
    }
}
