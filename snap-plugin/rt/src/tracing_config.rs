//! Tracing setup for plugin processes.
//!
//! Logs always go to stderr: stdout carries the preamble read by the host.

use tracing_subscriber::{EnvFilter, prelude::*};

/// Configuration for tracing initialization
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Default log level filter, used when `RUST_LOG` is not set
    pub default_log_level: String,

    /// Whether to emit ANSI colors
    pub ansi: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            default_log_level: "info,snap_plugin_rt=debug".to_string(),
            ansi: false,
        }
    }
}

impl TracingConfig {
    /// Set the default log level
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.default_log_level = level.into();
        self
    }

    pub fn with_ansi(mut self, ansi: bool) -> Self {
        self.ansi = ansi;
        self
    }
}

/// Installs the global subscriber. Returns `false` if one was already set.
pub fn initialize_tracing(config: TracingConfig) -> bool {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.default_log_level));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .with_ansi(config.ansi);

    let installed = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .is_ok();

    if installed {
        tracing::info!("Tracing initialized - logs to stderr");
    }
    installed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_overrides_defaults() {
        let config = TracingConfig::default()
            .with_log_level("warn")
            .with_ansi(true);
        assert_eq!(config.default_log_level, "warn");
        assert!(config.ansi);
    }

    #[test]
    fn second_initialization_is_refused() {
        initialize_tracing(TracingConfig::default());
        assert!(!initialize_tracing(TracingConfig::default()));
    }
}
