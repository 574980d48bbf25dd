//! Device backends.
//!
//! A backend is the external collaborator the harness tests against: it opens
//! channels from connection strings and answers the out-of-band simulation
//! queries (is the simulator present, what RS-485 state does a peer advertise).
//!
//! ```text
//! Endpoint ──> DeviceBackend ─┬─> SerialSimBackend ──> /dev/ttyPipe* + serialsim ioctls
//!                             └─> LoopbackBackend  ──> in-process LoopbackPipe
//! ```

pub mod loopback;
pub mod serialsim;

pub use loopback::LoopbackBackend;
pub use serialsim::SerialSimBackend;

use crate::config::Config;
use crate::connection::ConnectionString;
use crate::port::{PortError, SerialPortAdapter};
use crate::rs485::Rs485Config;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Channel primitive plus simulation queries.
pub trait DeviceBackend: Send + Sync + fmt::Debug {
    /// Short name used in logs and reports.
    fn name(&self) -> &'static str;

    /// Whether the simulation backend is present.
    fn is_available(&self) -> bool;

    /// The linked device pair this backend provides when none is configured.
    fn default_pipe_pair(&self) -> Option<(String, String)>;

    /// Whether a device path can be opened through this backend.
    fn device_exists(&self, path: &str) -> bool;

    /// Open a channel.
    fn open(&self, conn: &ConnectionString) -> Result<Box<dyn SerialPortAdapter>, PortError>;

    /// RS-485 state advertised by the peer of the channel identified by `remote_id`.
    fn remote_rs485(&self, remote_id: &str) -> Result<Rs485Config, PortError>;
}

/// Which backend to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// The `serialsim` kernel module.
    #[default]
    Serialsim,
    /// In-process linked pipe.
    Loopback,
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "serialsim" => Ok(Self::Serialsim),
            "loopback" => Ok(Self::Loopback),
            other => Err(format!(
                "unknown backend '{other}', expected 'serialsim' or 'loopback'"
            )),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Serialsim => f.write_str("serialsim"),
            Self::Loopback => f.write_str("loopback"),
        }
    }
}

/// Build the backend selected by `config`.
pub fn create_backend(config: &Config) -> Arc<dyn DeviceBackend> {
    match config.devices.backend {
        BackendKind::Serialsim => Arc::new(SerialSimBackend::new()),
        BackendKind::Loopback => Arc::new(LoopbackBackend::from_config(&config.loopback)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_kind_parse() {
        assert_eq!("loopback".parse(), Ok(BackendKind::Loopback));
        assert_eq!("SerialSim".parse(), Ok(BackendKind::Serialsim));
        assert!("socat".parse::<BackendKind>().is_err());
        assert_eq!(BackendKind::Loopback.to_string(), "loopback");
    }

    #[test]
    fn test_create_backend_follows_config() {
        let mut config = Config::default();
        config.devices.backend = BackendKind::Loopback;
        let backend = create_backend(&config);
        assert_eq!(backend.name(), "loopback");
        assert!(backend.is_available());
    }
}
