//! `serialsim` kernel-module backend.
//!
//! serialsim creates linked tty pairs (`/dev/ttyPipeA<n>` ↔ `/dev/ttyPipeB<n>`)
//! and lets either end read the other's line state through private ioctls.
//! Remote identifiers are the file descriptors of the open ttys.

use super::DeviceBackend;
use crate::connection::ConnectionString;
use crate::port::{PortError, SerialPortAdapter, SyncSerialPort};
use crate::rs485::Rs485Config;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// First pipe pair the module creates.
pub const DEFAULT_PIPE_PAIR: (&str, &str) = ("/dev/ttyPipeA0", "/dev/ttyPipeB0");

/// Present while the module is loaded.
const MODULE_PATH: &str = "/sys/module/serialsim";

#[derive(Debug, Clone)]
pub struct SerialSimBackend {
    module_path: PathBuf,
}

impl SerialSimBackend {
    pub fn new() -> Self {
        Self {
            module_path: PathBuf::from(MODULE_PATH),
        }
    }

    /// Look for the module marker somewhere else, e.g. in a container's sysfs mount.
    pub fn with_module_path(module_path: impl Into<PathBuf>) -> Self {
        Self {
            module_path: module_path.into(),
        }
    }
}

impl Default for SerialSimBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceBackend for SerialSimBackend {
    fn name(&self) -> &'static str {
        "serialsim"
    }

    fn is_available(&self) -> bool {
        let present = cfg!(target_os = "linux") && self.module_path.exists();
        if !present {
            debug!(path = %self.module_path.display(), "serialsim module not loaded");
        }
        present
    }

    fn default_pipe_pair(&self) -> Option<(String, String)> {
        Some((DEFAULT_PIPE_PAIR.0.to_string(), DEFAULT_PIPE_PAIR.1.to_string()))
    }

    fn device_exists(&self, path: &str) -> bool {
        Path::new(path).exists()
    }

    fn open(&self, conn: &ConnectionString) -> Result<Box<dyn SerialPortAdapter>, PortError> {
        let mut port = SyncSerialPort::open(conn.path(), conn.port_configuration())?;
        if let Some(rs485) = conn.rs485() {
            if let Err(e) = port.set_rs485(&rs485) {
                warn!(path = conn.path(), error = %e, "failed to apply rs485");
                return Err(e);
            }
        }
        Ok(Box::new(port))
    }

    #[cfg(target_os = "linux")]
    fn remote_rs485(&self, remote_id: &str) -> Result<Rs485Config, PortError> {
        let fd = remote_id
            .parse::<std::os::unix::io::RawFd>()
            .map_err(|_| PortError::UnknownRemote(remote_id.to_string()))?;
        crate::port::sync_port::remote_rs485(fd)
    }

    #[cfg(not(target_os = "linux"))]
    fn remote_rs485(&self, _remote_id: &str) -> Result<Rs485Config, PortError> {
        Err(PortError::Unsupported("serialsim requires Linux".into()))
    }
}
