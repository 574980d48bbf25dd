//! In-process backend built on [`LoopbackPipe`].

use super::DeviceBackend;
use crate::config::LoopbackConfig;
use crate::connection::ConnectionString;
use crate::port::{LoopbackPipe, PortConfiguration, PortError, SerialPortAdapter};
use crate::rs485::Rs485Config;

/// Default device paths of the loopback pair.
pub const DEFAULT_LOOPBACK_PAIR: (&str, &str) = ("loop0a", "loop0b");

/// Backend serving one linked pair from memory.
#[derive(Debug, Clone)]
pub struct LoopbackBackend {
    pipe: LoopbackPipe,
    available: bool,
}

impl LoopbackBackend {
    pub fn new(pipe: LoopbackPipe) -> Self {
        Self {
            pipe,
            available: true,
        }
    }

    pub fn from_config(config: &LoopbackConfig) -> Self {
        let pipe = LoopbackPipe::new(&config.paths[0], &config.paths[1])
            .with_max_chunk(config.max_chunk);
        Self::new(pipe)
    }

    /// A backend that reports the simulator as absent.
    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::default()
        }
    }

    /// The pipe behind this backend, for fault injection and inspection.
    pub fn pipe(&self) -> &LoopbackPipe {
        &self.pipe
    }
}

impl Default for LoopbackBackend {
    fn default() -> Self {
        Self::new(LoopbackPipe::new(
            DEFAULT_LOOPBACK_PAIR.0,
            DEFAULT_LOOPBACK_PAIR.1,
        ))
    }
}

impl DeviceBackend for LoopbackBackend {
    fn name(&self) -> &'static str {
        "loopback"
    }

    fn is_available(&self) -> bool {
        self.available
    }

    fn default_pipe_pair(&self) -> Option<(String, String)> {
        let (a, b) = self.pipe.paths();
        Some((a.to_string(), b.to_string()))
    }

    fn device_exists(&self, path: &str) -> bool {
        self.pipe.contains(path)
    }

    fn open(&self, conn: &ConnectionString) -> Result<Box<dyn SerialPortAdapter>, PortError> {
        let port = self.pipe.open(
            conn.path(),
            conn.rs485(),
            PortConfiguration::default().timeout,
        )?;
        Ok(Box::new(port))
    }

    fn remote_rs485(&self, remote_id: &str) -> Result<Rs485Config, PortError> {
        self.pipe.remote_rs485(remote_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_unknown_path() {
        let backend = LoopbackBackend::default();
        let conn: ConnectionString = "serialdev,/dev/ttyS9,9600".parse().unwrap();
        assert!(matches!(backend.open(&conn), Err(PortError::NotFound(_))));
        assert_eq!(backend.pipe().open_count(), 0);
    }

    #[test]
    fn test_open_applies_rs485() {
        let backend = LoopbackBackend::default();
        let conn: ConnectionString = "serialdev,loop0a,9600N81,LOCAL,rs485=103:495"
            .parse()
            .unwrap();
        let _port = backend.open(&conn).unwrap();
        assert_eq!(
            backend.pipe().rs485("loop0a"),
            Some(Rs485Config::enabled(103, 495))
        );
    }

    #[test]
    fn test_from_config() {
        let config = LoopbackConfig {
            paths: ["pa".into(), "pb".into()],
            max_chunk: 2,
        };
        let backend = LoopbackBackend::from_config(&config);
        assert!(backend.device_exists("pa"));
        assert!(!backend.device_exists("loop0a"));
    }
}
