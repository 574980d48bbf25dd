//! Errors raised while loading, checking or writing the harness configuration.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    /// The harness config file exists but could not be read.
    #[error("cannot read harness config '{path}': {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("harness config is not valid TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("cannot render harness config as TOML: {0}")]
    SerializeError(#[from] toml::ser::Error),

    #[error("cannot write harness config '{path}': {source}")]
    WriteError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A `[harness]`, `[devices]`, `[loopback]` or `[logging]` value is out of range.
    /// `key` is the dotted name, e.g. `harness.read_timeout_ms`.
    #[error("bad value for {key}: {message}")]
    ValidationError { key: String, message: String },

    /// A `SERIALDEV_HARNESS_*` or `GENSIO_TEST_PIPE_DEVS` override did not parse.
    #[error("bad override in ${var}: {message}")]
    EnvParseError { var: String, message: String },
}

impl ConfigError {
    pub fn validation<K: Into<String>, M: Into<String>>(key: K, message: M) -> Self {
        Self::ValidationError {
            key: key.into(),
            message: message.into(),
        }
    }

    pub fn env_parse<V: Into<String>, M: Into<String>>(var: V, message: M) -> Self {
        Self::EnvParseError {
            var: var.into(),
            message: message.into(),
        }
    }
}

pub type ConfigResult<T> = Result<T, ConfigError>;
