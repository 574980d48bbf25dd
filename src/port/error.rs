//! Channel-level error types.
//!
//! Kept separate from the scenario-level `HarnessError` so the port layer
//! does not depend on harness semantics.

use thiserror::Error;

/// Errors that can occur while opening or driving a channel.
#[derive(Debug, Error)]
pub enum PortError {
    /// The device path does not exist.
    #[error("Serial device not found: {0}")]
    NotFound(String),

    /// An I/O error occurred during channel operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Line configuration failed.
    #[error("Configuration error: {0}")]
    Config(String),

    /// No data arrived within the read timeout.
    #[error("Operation timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// The device is already held by another endpoint.
    #[error("Device is already open: {0}")]
    AlreadyOpen(String),

    /// The channel has been closed.
    #[error("Channel is not open")]
    NotOpen,

    /// No open channel carries this remote identifier.
    #[error("Unknown remote identifier: {0}")]
    UnknownRemote(String),

    /// The backend cannot perform this operation on this platform.
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    /// A serialport-specific error occurred.
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),
}

impl PortError {
    /// Create a NotFound error from a device path.
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound(path.into())
    }

    /// Create a Config error from a message.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a Timeout error from a duration.
    pub fn timeout(duration: std::time::Duration) -> Self {
        Self::Timeout(duration)
    }

    /// True when the error only means "no data yet".
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Timeout(_) => true,
            Self::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::WouldBlock
                    | std::io::ErrorKind::Interrupted
            ),
            _ => false,
        }
    }
}
