//! Scenario-level errors.
//!
//! Every variant carries enough context (the actor, what was expected and
//! what actually happened) to diagnose a failure without re-running.

use crate::connection::ConnectionError;
use crate::port::PortError;
use std::time::Duration;
use thiserror::Error;

/// A specialized `Result` type for harness operations.
pub type HarnessResult<T> = Result<T, HarnessError>;

#[derive(Debug, Error)]
pub enum HarnessError {
    /// The simulation backend or the device pair is missing.
    #[error("test environment unavailable: {0}")]
    EnvironmentUnavailable(String),

    /// The descriptor could not be parsed. No channel was opened.
    #[error("invalid connection string '{input}': {source}")]
    InvalidConnectionString {
        input: String,
        #[source]
        source: ConnectionError,
    },

    /// The backend failed to open a channel.
    #[error("unable to allocate '{connection}': {source}")]
    Allocation {
        connection: String,
        #[source]
        source: PortError,
    },

    /// The endpoint was used after it was closed.
    #[error("{endpoint}: endpoint is not open")]
    NotOpen { endpoint: String },

    /// The received bytes differ from what was sent.
    #[error("{actor}: data mismatch at byte {offset}, expected '{expected}', got '{actual}'")]
    TransferMismatch {
        actor: String,
        offset: usize,
        expected: String,
        actual: String,
    },

    /// Fewer bytes than expected arrived before the deadline.
    #[error("{actor}: timed out after {timeout:?} with {received} of {expected} bytes received")]
    TransferTimeout {
        actor: String,
        expected: usize,
        received: usize,
        timeout: Duration,
    },

    /// The advertised RS-485 state is not the expected one.
    #[error("{actor}: RS485 was not '{expected}', it was '{actual}'")]
    ConfigMismatch {
        actor: String,
        expected: String,
        actual: String,
    },

    /// A channel operation failed mid-scenario.
    #[error("{actor}: {source}")]
    Port {
        actor: String,
        #[source]
        source: PortError,
    },

    /// The verification closure panicked. Both endpoints were still closed.
    #[error("verifier panicked: {0}")]
    VerifierPanicked(String),
}

impl HarnessError {
    /// Wrap a channel error with the endpoint it happened on.
    pub fn port(actor: impl Into<String>, source: PortError) -> Self {
        Self::Port {
            actor: actor.into(),
            source,
        }
    }

    /// True when the scenario could not start rather than failed.
    pub fn is_skip(&self) -> bool {
        matches!(self, Self::EnvironmentUnavailable(_))
    }
}
