use crate::liveness::PingSettings;
use crate::stream::{BufferLimits, FlushFailurePolicy};
use serde::{Deserialize, Serialize};
use snap_plugin_error::{PluginError, Result};
use std::fs;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct StreamConfig {
    /// Metrics per outbound batch until the host negotiates a value (0 sends
    /// every call immediately)
    pub max_metrics_buffer: usize,

    /// Maximum age of buffered metrics until the host negotiates a value
    #[serde(with = "humantime_serde")]
    pub max_collect_duration: Duration,

    /// Consecutive failed writes after which a stream is abandoned. Unset
    /// keeps streaming regardless.
    pub flush_failure_limit: Option<u32>,
}

impl Default for StreamConfig {
    fn default() -> Self {
        let limits = BufferLimits::default();
        Self {
            max_metrics_buffer: limits.max_metrics_buffer,
            max_collect_duration: limits.max_collect_duration,
            flush_failure_limit: None,
        }
    }
}

impl StreamConfig {
    pub fn limits(&self) -> BufferLimits {
        BufferLimits {
            max_metrics_buffer: self.max_metrics_buffer,
            max_collect_duration: self.max_collect_duration,
        }
    }

    pub fn flush_failure_policy(&self) -> FlushFailurePolicy {
        FlushFailurePolicy {
            limit: self.flush_failure_limit,
        }
    }
}

/// Runtime settings of a plugin process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct RuntimeConfig {
    /// Heartbeat watchdog
    pub ping: PingSettings,

    /// Default buffering of streaming collectors
    pub stream: StreamConfig,

    /// Address the RPC server binds to, reported in the preamble
    pub listen_address: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            ping: PingSettings::default(),
            stream: StreamConfig::default(),
            listen_address: String::from("127.0.0.1:0"),
        }
    }
}

impl RuntimeConfig {
    pub fn from_yaml_str(contents: &str) -> Result<Self> {
        let config: RuntimeConfig = serde_yaml::from_str(contents)
            .map_err(|e| PluginError::Config(format!("invalid YAML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML file
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)?;
        Self::from_yaml_str(&contents)
            .map_err(|e| PluginError::Config(format!("{}: {}", path.display(), e)))
    }

    pub fn validate(&self) -> Result<()> {
        if self.ping.timeout.is_zero() {
            return Err(PluginError::Config(
                "ping.timeout must be greater than 0".to_string(),
            ));
        }

        if self.ping.limit == 0 {
            return Err(PluginError::Config(
                "ping.limit must be greater than 0".to_string(),
            ));
        }

        if self.stream.flush_failure_limit == Some(0) {
            return Err(PluginError::Config(
                "stream.flush_failure_limit must be greater than 0".to_string(),
            ));
        }

        if self.listen_address.is_empty() {
            return Err(PluginError::Config(
                "listen_address must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_document_uses_defaults() {
        let config = RuntimeConfig::from_yaml_str("{}").unwrap();
        assert_eq!(config, RuntimeConfig::default());
        assert_eq!(config.ping.timeout, Duration::from_millis(1500));
        assert_eq!(config.ping.limit, 3);
        assert_eq!(config.stream.limits(), BufferLimits::default());
        assert_eq!(config.stream.flush_failure_policy(), FlushFailurePolicy::tolerate());
    }

    #[test]
    fn parses_partial_sections() {
        let yaml = r#"
ping:
  timeout: 2s
stream:
  max_metrics_buffer: 100
  max_collect_duration: 30s
  flush_failure_limit: 5
listen_address: "127.0.0.1:9997"
"#;
        let config = RuntimeConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.ping.timeout, Duration::from_secs(2));
        assert_eq!(config.ping.limit, 3);
        assert_eq!(config.stream.max_metrics_buffer, 100);
        assert_eq!(config.stream.max_collect_duration, Duration::from_secs(30));
        assert_eq!(
            config.stream.flush_failure_policy(),
            FlushFailurePolicy::abort_after(5)
        );
        assert_eq!(config.listen_address, "127.0.0.1:9997");
    }

    #[test]
    fn rejects_unknown_keys() {
        let err = RuntimeConfig::from_yaml_str("ping:\n  interval: 1s\n").unwrap_err();
        assert!(matches!(err, PluginError::Config(_)));
    }

    #[test]
    fn rejects_invalid_values() {
        assert!(RuntimeConfig::from_yaml_str("ping:\n  limit: 0\n").is_err());
        assert!(RuntimeConfig::from_yaml_str("ping:\n  timeout: 0s\n").is_err());
        assert!(RuntimeConfig::from_yaml_str("stream:\n  flush_failure_limit: 0\n").is_err());
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "ping:\n  limit: 5").unwrap();

        let config = RuntimeConfig::from_yaml_file(file.path()).unwrap();
        assert_eq!(config.ping.limit, 5);

        let missing = file.path().with_extension("missing");
        assert!(matches!(
            RuntimeConfig::from_yaml_file(missing),
            Err(PluginError::Io(_))
        ));
    }
}
