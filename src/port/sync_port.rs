//! Real tty channel.
//!
//! Wraps the `serialport` crate's `SerialPort` trait with our own
//! `SerialPortAdapter`, and carries the RS-485 ioctls that the `serialsim`
//! kernel module answers.

use super::error::PortError;
use super::traits::{PortConfiguration, SerialPortAdapter};
use crate::rs485::Rs485Config;
use std::io::{Read, Write};
use std::time::Duration;
use tracing::debug;

/// `TIOCSRS485`, set the RS-485 state of a tty.
#[cfg(target_os = "linux")]
const TIOCSRS485: u32 = 0x542f;

/// `TIOCSERGREMRS485`, read the RS-485 state of the other end of a serialsim pipe.
#[cfg(target_os = "linux")]
const TIOCSERGREMRS485: u32 = 0x54eb;

/// Kernel `struct serial_rs485`.
#[cfg(target_os = "linux")]
#[repr(C)]
#[derive(Debug, Default)]
struct SerialRs485 {
    flags: u32,
    delay_rts_before_send: u32,
    delay_rts_after_send: u32,
    padding: [u32; 5],
}

/// Blocking tty channel wrapping `serialport::SerialPort`.
pub struct SyncSerialPort {
    port: Box<dyn serialport::SerialPort>,
    name: String,
    #[cfg(unix)]
    fd: std::os::unix::io::RawFd,
}

impl SyncSerialPort {
    /// Open a tty with the given line settings.
    ///
    /// # Example
    /// ```no_run
    /// use serialdev_harness::port::{PortConfiguration, SyncSerialPort};
    ///
    /// let port = SyncSerialPort::open("/dev/ttyPipeA0", PortConfiguration::default())?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn open(path: &str, config: PortConfiguration) -> Result<Self, PortError> {
        let builder = serialport::new(path, config.baud_rate)
            .data_bits(config.data_bits.into())
            .flow_control(config.flow_control.into())
            .parity(config.parity.into())
            .stop_bits(config.stop_bits.into())
            .timeout(config.timeout);

        let map_open_error = |e: serialport::Error| match e.kind() {
            serialport::ErrorKind::NoDevice => PortError::not_found(path),
            serialport::ErrorKind::InvalidInput => PortError::config(e.to_string()),
            serialport::ErrorKind::Io(std::io::ErrorKind::NotFound) => PortError::not_found(path),
            _ => PortError::Serial(e),
        };

        #[cfg(unix)]
        {
            use std::os::unix::io::AsRawFd;

            // serialport always opens ttys with CLOCAL set, so LOCAL needs no extra work.
            let native = builder.open_native().map_err(map_open_error)?;
            let fd = native.as_raw_fd();
            debug!(path, fd, local = config.local, "opened tty");
            Ok(Self {
                port: Box::new(native),
                name: path.to_string(),
                fd,
            })
        }

        #[cfg(not(unix))]
        {
            let port = builder.open().map_err(map_open_error)?;
            debug!(path, "opened tty");
            Ok(Self {
                port,
                name: path.to_string(),
            })
        }
    }

    /// Apply an RS-485 configuration to this tty.
    #[cfg(target_os = "linux")]
    pub fn set_rs485(&mut self, config: &Rs485Config) -> Result<(), PortError> {
        let mut raw = SerialRs485 {
            flags: config.flags(),
            delay_rts_before_send: config.delay_before_send,
            delay_rts_after_send: config.delay_after_send,
            ..Default::default()
        };
        // SAFETY: `raw` is a properly laid out `struct serial_rs485` that
        // outlives the call, and `self.fd` is owned by `self.port`.
        let rv = unsafe { libc::ioctl(self.fd, TIOCSRS485 as _, &mut raw as *mut SerialRs485) };
        if rv < 0 {
            return Err(PortError::Io(std::io::Error::last_os_error()));
        }
        debug!(path = %self.name, rs485 = %config, "applied rs485");
        Ok(())
    }

    #[cfg(not(target_os = "linux"))]
    pub fn set_rs485(&mut self, _config: &Rs485Config) -> Result<(), PortError> {
        Err(PortError::Unsupported("rs485 requires Linux".into()))
    }
}

/// Read the RS-485 state of the serialsim peer of the tty open on `fd`.
#[cfg(target_os = "linux")]
pub fn remote_rs485(fd: std::os::unix::io::RawFd) -> Result<Rs485Config, PortError> {
    let mut raw = SerialRs485::default();
    // SAFETY: the kernel fills at most `size_of::<SerialRs485>()` bytes.
    let rv = unsafe { libc::ioctl(fd, TIOCSERGREMRS485 as _, &mut raw as *mut SerialRs485) };
    if rv < 0 {
        return Err(PortError::Io(std::io::Error::last_os_error()));
    }
    Ok(Rs485Config::from_raw(
        raw.flags,
        raw.delay_rts_before_send,
        raw.delay_rts_after_send,
    ))
}

impl SerialPortAdapter for SyncSerialPort {
    fn write_bytes(&mut self, data: &[u8]) -> Result<usize, PortError> {
        self.port.write(data).map_err(PortError::Io)
    }

    fn read_bytes(&mut self, buffer: &mut [u8]) -> Result<usize, PortError> {
        self.port.read(buffer).map_err(PortError::Io)
    }

    fn name(&self) -> &str {
        &self.name
    }

    #[cfg(unix)]
    fn remote_id(&self) -> String {
        self.fd.to_string()
    }

    #[cfg(not(unix))]
    fn remote_id(&self) -> String {
        self.name.clone()
    }

    fn set_timeout(&mut self, timeout: Duration) -> Result<(), PortError> {
        self.port.set_timeout(timeout).map_err(PortError::Serial)
    }

    fn clear_buffers(&mut self) -> Result<(), PortError> {
        self.port
            .clear(serialport::ClearBuffer::All)
            .map_err(PortError::Serial)
    }

    fn bytes_to_read(&self) -> Option<usize> {
        self.port.bytes_to_read().ok().map(|n| n as usize)
    }
}

impl Drop for SyncSerialPort {
    fn drop(&mut self) {
        debug!(path = %self.name, "closing tty");
    }
}

impl std::fmt::Debug for SyncSerialPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncSerialPort")
            .field("name", &self.name)
            .field("baud_rate", &self.port.baud_rate().ok())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_not_found() {
        let result = SyncSerialPort::open("/dev/nonexistent_pipe_12345", PortConfiguration::default());

        match result {
            Err(PortError::NotFound(name)) => assert!(name.contains("nonexistent")),
            Err(PortError::Serial(_)) | Err(PortError::Io(_)) => {}
            other => panic!("Expected open failure, got: {:?}", other),
        }
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_serial_rs485_layout() {
        assert_eq!(std::mem::size_of::<SerialRs485>(), 32);
    }
}
