//! Configuration schema definitions.
//!
//! All sections default sensibly, so an empty file (or no file) is valid.

use super::error::{ConfigError, ConfigResult};
use crate::backend::BackendKind;
use crate::enumerator::PipePair;
use crate::port::loopback::DEFAULT_MAX_CHUNK;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Payload the transfer scenario sends by default.
pub const DEFAULT_PAYLOAD: &str = "This is a test string!";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Timing and payload of the verifiers
    pub harness: HarnessConfig,
    /// Which devices to test
    pub devices: DevicesConfig,
    /// In-process backend settings
    pub loopback: LoopbackConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Config {
    /// Reject values the harness cannot run with.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.harness.read_timeout_ms == 0 {
            return Err(ConfigError::validation(
                "harness.read_timeout_ms",
                "must be greater than zero",
            ));
        }
        if self.harness.poll_interval_ms == 0 {
            return Err(ConfigError::validation(
                "harness.poll_interval_ms",
                "must be greater than zero",
            ));
        }
        if self.harness.poll_interval_ms > self.harness.read_timeout_ms {
            return Err(ConfigError::validation(
                "harness.poll_interval_ms",
                "must not exceed harness.read_timeout_ms",
            ));
        }
        if self.harness.payload.is_empty() {
            return Err(ConfigError::validation("harness.payload", "must not be empty"));
        }
        if let Some(pair) = &self.devices.pipe_devs {
            pair.validate()
                .map_err(|message| ConfigError::validation("devices.pipe_devs", message))?;
        }
        if self.loopback.max_chunk == 0 {
            return Err(ConfigError::validation(
                "loopback.max_chunk",
                "must be greater than zero",
            ));
        }
        if self.loopback.paths[0] == self.loopback.paths[1] {
            return Err(ConfigError::validation(
                "loopback.paths",
                "the two ends need distinct paths",
            ));
        }
        Ok(())
    }
}

/// Verifier settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// How long a transfer may take before it counts as a timeout
    pub read_timeout_ms: u64,
    /// Granularity of each blocking read
    pub poll_interval_ms: u64,
    /// Payload sent by the transfer scenario
    pub payload: String,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            read_timeout_ms: 2000,
            poll_interval_ms: 50,
            payload: DEFAULT_PAYLOAD.to_string(),
        }
    }
}

impl HarnessConfig {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Device selection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DevicesConfig {
    /// Backend: "serialsim" or "loopback"
    pub backend: BackendKind,
    /// Explicit linked pair; the backend's default pair otherwise
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pipe_devs: Option<PipePair>,
    /// Require the simulator even for scenarios that could run without it
    pub require_simulation: bool,
}

/// In-process backend settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopbackConfig {
    /// Device paths of the two ends
    pub paths: [String; 2],
    /// Largest chunk a single read returns
    pub max_chunk: usize,
}

impl Default for LoopbackConfig {
    fn default() -> Self {
        Self {
            paths: ["loop0a".to_string(), "loop0b".to_string()],
            max_chunk: DEFAULT_MAX_CHUNK,
        }
    }
}

/// Logging configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset
    pub level: String,
    /// Log format: "json", "pretty", "compact"
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            format: LogFormat::Compact,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// JSON format
    Json,
    /// Pretty format with colors
    Pretty,
    /// Compact format
    #[default]
    Compact,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "pretty" => Ok(Self::Pretty),
            "compact" => Ok(Self::Compact),
            other => Err(format!("unknown log format '{other}'")),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json => f.write_str("json"),
            Self::Pretty => f.write_str("pretty"),
            Self::Compact => f.write_str("compact"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.harness.read_timeout(), Duration::from_secs(2));
        assert_eq!(config.harness.payload, DEFAULT_PAYLOAD);
        assert_eq!(config.devices.backend, BackendKind::Serialsim);
        assert!(config.devices.pipe_devs.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[harness]"));
        assert!(toml_str.contains("[devices]"));
    }

    #[test]
    fn test_config_deserialization() {
        let toml_str = r#"
            [harness]
            read_timeout_ms = 500

            [devices]
            backend = "loopback"
            pipe_devs = ["/dev/pts/3", "/dev/pts/4"]
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.harness.read_timeout_ms, 500);
        assert_eq!(config.devices.backend, BackendKind::Loopback);
        let pair = config.devices.pipe_devs.unwrap();
        assert_eq!(pair.a, "/dev/pts/3");
        assert_eq!(pair.b, "/dev/pts/4");
        // Defaults should still work
        assert_eq!(config.harness.poll_interval_ms, 50);
    }

    #[test]
    fn test_validation_rejects_bad_timing() {
        let mut config = Config::default();
        config.harness.poll_interval_ms = 5000;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("harness.poll_interval_ms"));

        let mut config = Config::default();
        config.loopback.max_chunk = 0;
        assert!(config.validate().is_err());
    }
}
