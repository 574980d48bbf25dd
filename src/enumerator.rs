//! Discovery of the linked device pair a scenario runs on.

use crate::backend::DeviceBackend;
use crate::error::{HarnessError, HarnessResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info};

/// Two device paths wired to each other.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "[String; 2]", into = "[String; 2]")]
pub struct PipePair {
    pub a: String,
    pub b: String,
}

impl PipePair {
    pub fn new(a: impl Into<String>, b: impl Into<String>) -> Self {
        Self {
            a: a.into(),
            b: b.into(),
        }
    }

    /// Both paths present and distinct.
    pub fn validate(&self) -> Result<(), String> {
        if self.a.is_empty() || self.b.is_empty() {
            return Err("both device paths must be set".to_string());
        }
        if self.a == self.b {
            return Err(format!("'{}' cannot be linked to itself", self.a));
        }
        Ok(())
    }
}

impl From<[String; 2]> for PipePair {
    fn from([a, b]: [String; 2]) -> Self {
        Self { a, b }
    }
}

impl From<PipePair> for [String; 2] {
    fn from(pair: PipePair) -> Self {
        [pair.a, pair.b]
    }
}

impl From<(String, String)> for PipePair {
    fn from((a, b): (String, String)) -> Self {
        Self { a, b }
    }
}

/// Parses `<path-a>:<path-b>`.
impl FromStr for PipePair {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (a, b) = s
            .split_once(':')
            .ok_or_else(|| format!("expected '<dev-a>:<dev-b>', got '{s}'"))?;
        let pair = Self::new(a.trim(), b.trim());
        pair.validate()?;
        Ok(pair)
    }
}

impl fmt::Display for PipePair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.a, self.b)
    }
}

/// Finds the device pair and checks the simulator before anything is opened.
#[derive(Debug, Clone)]
pub struct DeviceEnumerator {
    backend: Arc<dyn DeviceBackend>,
    configured: Option<PipePair>,
}

impl DeviceEnumerator {
    pub fn new(backend: Arc<dyn DeviceBackend>) -> Self {
        Self {
            backend,
            configured: None,
        }
    }

    /// Use `pair` instead of the backend's default pair.
    pub fn with_pipe_pair(mut self, pair: Option<PipePair>) -> Self {
        self.configured = pair;
        self
    }

    pub fn backend(&self) -> &Arc<dyn DeviceBackend> {
        &self.backend
    }

    /// Locate the linked pair.
    ///
    /// With `require_simulation`, the backend must report the simulator as
    /// present. Fails with `EnvironmentUnavailable` when anything is missing;
    /// performs no other side effects.
    pub fn discover_pipe_pair(&self, require_simulation: bool) -> HarnessResult<PipePair> {
        if require_simulation && !self.backend.is_available() {
            return Err(HarnessError::EnvironmentUnavailable(format!(
                "{} simulation backend is not available",
                self.backend.name()
            )));
        }

        let pair = match &self.configured {
            Some(pair) => pair.clone(),
            None => self
                .backend
                .default_pipe_pair()
                .map(PipePair::from)
                .ok_or_else(|| {
                    HarnessError::EnvironmentUnavailable(format!(
                        "{} backend has no pipe pair and none is configured",
                        self.backend.name()
                    ))
                })?,
        };

        for path in [&pair.a, &pair.b] {
            if !self.backend.device_exists(path) {
                debug!(path = %path, backend = self.backend.name(), "device missing");
                return Err(HarnessError::EnvironmentUnavailable(format!(
                    "pipe device {path} not found"
                )));
            }
        }

        info!(pair = %pair, backend = self.backend.name(), "using pipe pair");
        Ok(pair)
    }
}
