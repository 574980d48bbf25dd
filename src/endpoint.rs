//! One opened side of the channel pair under test.

use crate::backend::DeviceBackend;
use crate::connection::ConnectionString;
use crate::error::{HarnessError, HarnessResult};
use crate::port::SerialPortAdapter;
use std::time::Duration;
use tracing::{debug, info};

/// An open channel plus the descriptor it was opened from.
///
/// Closing is idempotent and also happens on drop. Every operation after
/// close fails with [`HarnessError::NotOpen`].
#[derive(Debug)]
pub struct Endpoint {
    connection: ConnectionString,
    channel: Option<Box<dyn SerialPortAdapter>>,
}

impl Endpoint {
    /// Parse `connection` and open it through `backend`.
    pub fn open(backend: &dyn DeviceBackend, connection: &str) -> HarnessResult<Self> {
        let parsed = connection
            .parse::<ConnectionString>()
            .map_err(|source| HarnessError::InvalidConnectionString {
                input: connection.to_string(),
                source,
            })?;
        Self::open_with(backend, parsed)
    }

    /// Open an already parsed descriptor.
    pub fn open_with(
        backend: &dyn DeviceBackend,
        connection: ConnectionString,
    ) -> HarnessResult<Self> {
        let channel = backend
            .open(&connection)
            .map_err(|source| HarnessError::Allocation {
                connection: connection.to_string(),
                source,
            })?;
        info!(%connection, backend = backend.name(), "endpoint open");

        Ok(Self {
            connection,
            channel: Some(channel),
        })
    }

    pub fn connection(&self) -> &ConnectionString {
        &self.connection
    }

    /// Device path, used as the actor name in reports.
    pub fn name(&self) -> &str {
        self.connection.path()
    }

    pub fn is_open(&self) -> bool {
        self.channel.is_some()
    }

    fn channel(&mut self) -> HarnessResult<&mut Box<dyn SerialPortAdapter>> {
        let endpoint = self.connection.path();
        self.channel.as_mut().ok_or_else(|| HarnessError::NotOpen {
            endpoint: endpoint.to_string(),
        })
    }

    /// Identifier the peer side can use to query this channel.
    pub fn remote_id(&self) -> HarnessResult<String> {
        self.channel
            .as_ref()
            .map(|channel| channel.remote_id())
            .ok_or_else(|| HarnessError::NotOpen {
                endpoint: self.name().to_string(),
            })
    }

    /// Write some of `data`, returning how much was accepted.
    ///
    /// Returns `Ok(0)` when the channel could not take anything in time.
    pub fn write(&mut self, data: &[u8]) -> HarnessResult<usize> {
        let channel = self.channel()?;
        match channel.write_bytes(data) {
            Ok(n) => Ok(n),
            Err(e) if e.is_timeout() => Ok(0),
            Err(e) => Err(HarnessError::port(channel.name(), e)),
        }
    }

    /// Read whatever arrives within the read timeout.
    ///
    /// Returns `Ok(0)` when nothing arrived in time.
    pub fn read(&mut self, buffer: &mut [u8]) -> HarnessResult<usize> {
        let channel = self.channel()?;
        match channel.read_bytes(buffer) {
            Ok(n) => Ok(n),
            Err(e) if e.is_timeout() => Ok(0),
            Err(e) => Err(HarnessError::port(channel.name(), e)),
        }
    }

    pub fn set_timeout(&mut self, timeout: Duration) -> HarnessResult<()> {
        let channel = self.channel()?;
        channel
            .set_timeout(timeout)
            .map_err(|e| HarnessError::port(channel.name(), e))
    }

    /// Drop anything already buffered in either direction.
    pub fn clear(&mut self) -> HarnessResult<()> {
        let channel = self.channel()?;
        channel
            .clear_buffers()
            .map_err(|e| HarnessError::port(channel.name(), e))
    }

    /// Release the channel. Later calls do nothing.
    pub fn close(&mut self) {
        if let Some(channel) = self.channel.take() {
            debug!(endpoint = channel.name(), "closing endpoint");
            drop(channel);
        }
    }
}

impl Drop for Endpoint {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::LoopbackBackend;

    #[test]
    fn test_open_close_roundtrip() {
        let backend = LoopbackBackend::default();
        let mut endpoint = Endpoint::open(&backend, "serialdev,loop0a,9600").unwrap();
        assert!(endpoint.is_open());
        assert_eq!(backend.pipe().open_count(), 1);

        endpoint.close();
        assert!(!endpoint.is_open());
        assert_eq!(backend.pipe().open_count(), 0);
    }

    #[test]
    fn test_close_is_idempotent() {
        let backend = LoopbackBackend::default();
        let mut endpoint = Endpoint::open(&backend, "serialdev,loop0a,9600").unwrap();
        endpoint.close();
        endpoint.close();
        assert_eq!(backend.pipe().open_count(), 0);

        // The device can be opened again after the double close.
        let _again = Endpoint::open(&backend, "serialdev,loop0a,9600").unwrap();
    }

    #[test]
    fn test_use_after_close() {
        let backend = LoopbackBackend::default();
        let mut endpoint = Endpoint::open(&backend, "serialdev,loop0a,9600").unwrap();
        endpoint.close();

        assert!(matches!(
            endpoint.remote_id(),
            Err(HarnessError::NotOpen { .. })
        ));
        assert!(matches!(
            endpoint.write(b"x"),
            Err(HarnessError::NotOpen { .. })
        ));
        let mut buffer = [0u8; 4];
        assert!(matches!(
            endpoint.read(&mut buffer),
            Err(HarnessError::NotOpen { .. })
        ));
    }

    #[test]
    fn test_invalid_connection_string() {
        let backend = LoopbackBackend::default();
        let err = Endpoint::open(&backend, "serialdev,loop0a,96O0").unwrap_err();
        assert!(matches!(err, HarnessError::InvalidConnectionString { .. }));
        assert_eq!(backend.pipe().open_count(), 0);
    }

    #[test]
    fn test_allocation_error() {
        let backend = LoopbackBackend::default();
        let _held = Endpoint::open(&backend, "serialdev,loop0a,9600").unwrap();
        let err = Endpoint::open(&backend, "serialdev,loop0a,9600").unwrap_err();
        assert!(matches!(err, HarnessError::Allocation { .. }));
    }

    #[test]
    fn test_read_timeout_returns_zero() {
        let backend = LoopbackBackend::default();
        let mut endpoint = Endpoint::open(&backend, "serialdev,loop0b,9600").unwrap();
        endpoint.set_timeout(Duration::from_millis(5)).unwrap();
        let mut buffer = [0u8; 4];
        assert_eq!(endpoint.read(&mut buffer).unwrap(), 0);
    }
}
