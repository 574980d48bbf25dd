//! In-process linked channel pair.
//!
//! A `LoopbackPipe` behaves like a null-modem pair of ttys: bytes written on
//! one side are readable on the other, reads hand data out in chunks no
//! larger than `max_chunk`, and each side remembers the RS-485 configuration
//! it was opened with so the peer can query it. One-shot faults can be
//! injected to exercise the verifiers' failure paths.

use super::error::PortError;
use super::traits::SerialPortAdapter;
use crate::rs485::Rs485Config;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// Default largest chunk a single read returns.
pub const DEFAULT_MAX_CHUNK: usize = 7;

/// A fault applied to the next write on either side, then cleared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Invert the byte at `offset` of the next write.
    Corrupt { offset: usize },
    /// Lose the last `count` bytes of the next write.
    Truncate { count: usize },
    /// Lose the next write entirely.
    Stall,
}

#[derive(Debug, Default)]
struct Side {
    inbound: VecDeque<u8>,
    /// Set while the side is open.
    remote_id: Option<String>,
    rs485: Rs485Config,
}

#[derive(Debug)]
struct PipeState {
    sides: [Side; 2],
    max_chunk: usize,
    fault: Option<Fault>,
}

#[derive(Debug)]
struct PipeShared {
    state: Mutex<PipeState>,
    readable: Condvar,
}

/// Two linked device paths.
///
/// # Example
/// ```
/// use serialdev_harness::port::{LoopbackPipe, SerialPortAdapter};
/// use std::time::Duration;
///
/// let pipe = LoopbackPipe::new("loop0a", "loop0b");
/// let mut a = pipe.open("loop0a", None, Duration::from_millis(10)).unwrap();
/// let mut b = pipe.open("loop0b", None, Duration::from_millis(10)).unwrap();
///
/// a.write_bytes(b"Hi").unwrap();
/// let mut buffer = [0u8; 8];
/// let n = b.read_bytes(&mut buffer).unwrap();
/// assert_eq!(&buffer[..n], b"Hi");
/// ```
#[derive(Debug, Clone)]
pub struct LoopbackPipe {
    paths: [String; 2],
    shared: Arc<PipeShared>,
}

impl LoopbackPipe {
    /// Create a pipe whose two ends are addressed by `path_a` and `path_b`.
    pub fn new(path_a: impl Into<String>, path_b: impl Into<String>) -> Self {
        Self {
            paths: [path_a.into(), path_b.into()],
            shared: Arc::new(PipeShared {
                state: Mutex::new(PipeState {
                    sides: [Side::default(), Side::default()],
                    max_chunk: DEFAULT_MAX_CHUNK,
                    fault: None,
                }),
                readable: Condvar::new(),
            }),
        }
    }

    /// Limit how many bytes a single read hands out. Zero is treated as one.
    pub fn with_max_chunk(self, max_chunk: usize) -> Self {
        self.shared.state.lock().max_chunk = max_chunk.max(1);
        self
    }

    /// The two device paths.
    pub fn paths(&self) -> (&str, &str) {
        (&self.paths[0], &self.paths[1])
    }

    /// Whether `path` names one end of this pipe.
    pub fn contains(&self, path: &str) -> bool {
        self.side_of(path).is_some()
    }

    fn side_of(&self, path: &str) -> Option<usize> {
        self.paths.iter().position(|p| p == path)
    }

    /// Open one end.
    ///
    /// An `rs485` of `None` leaves the side's previous RS-485 state alone,
    /// the way a tty keeps its settings between opens.
    pub fn open(
        &self,
        path: &str,
        rs485: Option<Rs485Config>,
        timeout: Duration,
    ) -> Result<LoopbackPort, PortError> {
        let side = self.side_of(path).ok_or_else(|| PortError::not_found(path))?;
        let mut state = self.shared.state.lock();
        let entry = &mut state.sides[side];
        if entry.remote_id.is_some() {
            return Err(PortError::AlreadyOpen(path.to_string()));
        }

        let remote_id = uuid::Uuid::new_v4().to_string();
        entry.remote_id = Some(remote_id.clone());
        entry.inbound.clear();
        if let Some(rs485) = rs485 {
            entry.rs485 = rs485;
        }
        debug!(path, %remote_id, "opened loopback side");

        Ok(LoopbackPort {
            path: path.to_string(),
            side,
            shared: Arc::clone(&self.shared),
            timeout,
            remote_id,
        })
    }

    /// Whether the end at `path` is currently open.
    pub fn is_open(&self, path: &str) -> bool {
        self.side_of(path)
            .map(|side| self.shared.state.lock().sides[side].remote_id.is_some())
            .unwrap_or(false)
    }

    /// Number of ends currently open.
    pub fn open_count(&self) -> usize {
        let state = self.shared.state.lock();
        state.sides.iter().filter(|s| s.remote_id.is_some()).count()
    }

    /// RS-485 state of the end at `path`.
    pub fn rs485(&self, path: &str) -> Option<Rs485Config> {
        self.side_of(path)
            .map(|side| self.shared.state.lock().sides[side].rs485)
    }

    /// Arm a one-shot fault for the next write on either end.
    pub fn inject_fault(&self, fault: Fault) {
        self.shared.state.lock().fault = Some(fault);
    }

    /// RS-485 state of the peer of the end identified by `remote_id`.
    pub fn remote_rs485(&self, remote_id: &str) -> Result<Rs485Config, PortError> {
        let state = self.shared.state.lock();
        let side = state
            .sides
            .iter()
            .position(|s| s.remote_id.as_deref() == Some(remote_id))
            .ok_or_else(|| PortError::UnknownRemote(remote_id.to_string()))?;
        Ok(state.sides[1 - side].rs485)
    }
}

/// One open end of a [`LoopbackPipe`].
pub struct LoopbackPort {
    path: String,
    side: usize,
    shared: Arc<PipeShared>,
    timeout: Duration,
    remote_id: String,
}

impl SerialPortAdapter for LoopbackPort {
    fn write_bytes(&mut self, data: &[u8]) -> Result<usize, PortError> {
        let mut state = self.shared.state.lock();

        let mut delivered = data.to_vec();
        match state.fault.take() {
            Some(Fault::Corrupt { offset }) => {
                if let Some(byte) = delivered.get_mut(offset) {
                    *byte = !*byte;
                }
            }
            Some(Fault::Truncate { count }) => {
                delivered.truncate(delivered.len().saturating_sub(count));
            }
            Some(Fault::Stall) => delivered.clear(),
            None => {}
        }

        let peer = &mut state.sides[1 - self.side];
        // Nobody listening on the far end: the bytes fall on the floor.
        if peer.remote_id.is_some() {
            peer.inbound.extend(delivered);
            self.shared.readable.notify_all();
        }

        Ok(data.len())
    }

    fn read_bytes(&mut self, buffer: &mut [u8]) -> Result<usize, PortError> {
        if buffer.is_empty() {
            return Ok(0);
        }

        let deadline = Instant::now() + self.timeout;
        let mut state = self.shared.state.lock();
        while state.sides[self.side].inbound.is_empty() {
            if self
                .shared
                .readable
                .wait_until(&mut state, deadline)
                .timed_out()
                && state.sides[self.side].inbound.is_empty()
            {
                return Err(PortError::timeout(self.timeout));
            }
        }

        let max_chunk = state.max_chunk;
        let inbound = &mut state.sides[self.side].inbound;
        let n = buffer.len().min(max_chunk).min(inbound.len());
        for (slot, byte) in buffer.iter_mut().zip(inbound.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    fn name(&self) -> &str {
        &self.path
    }

    fn remote_id(&self) -> String {
        self.remote_id.clone()
    }

    fn set_timeout(&mut self, timeout: Duration) -> Result<(), PortError> {
        self.timeout = timeout;
        Ok(())
    }

    fn clear_buffers(&mut self) -> Result<(), PortError> {
        self.shared.state.lock().sides[self.side].inbound.clear();
        Ok(())
    }

    fn bytes_to_read(&self) -> Option<usize> {
        Some(self.shared.state.lock().sides[self.side].inbound.len())
    }
}

impl Drop for LoopbackPort {
    fn drop(&mut self) {
        let mut state = self.shared.state.lock();
        let side = &mut state.sides[self.side];
        side.remote_id = None;
        side.inbound.clear();
        debug!(path = %self.path, "closed loopback side");
    }
}

impl std::fmt::Debug for LoopbackPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoopbackPort")
            .field("path", &self.path)
            .field("remote_id", &self.remote_id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TICK: Duration = Duration::from_millis(20);

    fn pair(pipe: &LoopbackPipe) -> (LoopbackPort, LoopbackPort) {
        let a = pipe.open("loop0a", None, TICK).unwrap();
        let b = pipe.open("loop0b", None, TICK).unwrap();
        (a, b)
    }

    #[test]
    fn test_write_then_read_across() {
        let pipe = LoopbackPipe::new("loop0a", "loop0b").with_max_chunk(64);
        let (mut a, mut b) = pair(&pipe);

        assert_eq!(a.write_bytes(b"Hello").unwrap(), 5);
        let mut buffer = [0u8; 10];
        let n = b.read_bytes(&mut buffer).unwrap();
        assert_eq!(&buffer[..n], b"Hello");
    }

    #[test]
    fn test_reads_are_chunked() {
        let pipe = LoopbackPipe::new("loop0a", "loop0b").with_max_chunk(3);
        let (mut a, mut b) = pair(&pipe);
        a.write_bytes(b"Hello, World!").unwrap();

        let mut buffer = [0u8; 32];
        let n = b.read_bytes(&mut buffer).unwrap();
        assert_eq!(&buffer[..n], b"Hel");
        assert_eq!(b.bytes_to_read(), Some(10));
    }

    #[test]
    fn test_empty_read_times_out() {
        let pipe = LoopbackPipe::new("loop0a", "loop0b");
        let (_a, mut b) = pair(&pipe);

        let mut buffer = [0u8; 4];
        let err = b.read_bytes(&mut buffer).unwrap_err();
        assert!(err.is_timeout());
    }

    #[test]
    fn test_double_open_rejected() {
        let pipe = LoopbackPipe::new("loop0a", "loop0b");
        let _a = pipe.open("loop0a", None, TICK).unwrap();
        assert!(matches!(
            pipe.open("loop0a", None, TICK),
            Err(PortError::AlreadyOpen(_))
        ));
        assert!(matches!(
            pipe.open("loop9", None, TICK),
            Err(PortError::NotFound(_))
        ));
    }

    #[test]
    fn test_drop_releases_side() {
        let pipe = LoopbackPipe::new("loop0a", "loop0b");
        {
            let (_a, _b) = pair(&pipe);
            assert_eq!(pipe.open_count(), 2);
        }
        assert_eq!(pipe.open_count(), 0);
        assert!(!pipe.is_open("loop0a"));
    }

    #[test]
    fn test_remote_rs485_reports_peer() {
        let pipe = LoopbackPipe::new("loop0a", "loop0b");
        let _a = pipe
            .open("loop0a", Some(Rs485Config::enabled(103, 495)), TICK)
            .unwrap();
        let b = pipe.open("loop0b", None, TICK).unwrap();

        let config = pipe.remote_rs485(&b.remote_id()).unwrap();
        assert_eq!(config.status(), "103 495 enabled");
        assert!(matches!(
            pipe.remote_rs485("nope"),
            Err(PortError::UnknownRemote(_))
        ));
    }

    #[test]
    fn test_corrupt_fault_is_one_shot() {
        let pipe = LoopbackPipe::new("loop0a", "loop0b").with_max_chunk(64);
        let (mut a, mut b) = pair(&pipe);
        pipe.inject_fault(Fault::Corrupt { offset: 1 });

        a.write_bytes(b"abc").unwrap();
        a.write_bytes(b"abc").unwrap();
        let mut buffer = [0u8; 16];
        let n = b.read_bytes(&mut buffer).unwrap();
        assert_eq!(&buffer[..n], &[b'a', !b'b', b'c', b'a', b'b', b'c']);
    }

    #[test]
    fn test_clear_buffers() {
        let pipe = LoopbackPipe::new("loop0a", "loop0b");
        let (mut a, mut b) = pair(&pipe);
        a.write_bytes(b"Should be cleared").unwrap();

        b.clear_buffers().unwrap();
        assert_eq!(b.bytes_to_read(), Some(0));
    }
}
