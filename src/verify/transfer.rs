//! Byte-exact data transfer between two endpoints.

use crate::endpoint::Endpoint;
use crate::error::{HarnessError, HarnessResult};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// How long a transfer may take when no timeout is configured.
pub const DEFAULT_TRANSFER_TIMEOUT: Duration = Duration::from_secs(2);

/// Granularity of each blocking read.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Timing for a transfer check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferCheck {
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for TransferCheck {
    fn default() -> Self {
        Self::new(DEFAULT_TRANSFER_TIMEOUT)
    }
}

impl TransferCheck {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            poll_interval: DEFAULT_POLL_INTERVAL.min(timeout),
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval.min(self.timeout);
        self
    }

    /// Send `payload` from `sender` and require it, byte for byte, at `receiver`.
    pub fn run(
        &self,
        sender: &mut Endpoint,
        receiver: &mut Endpoint,
        payload: &[u8],
    ) -> HarnessResult<()> {
        let deadline = Instant::now() + self.timeout;
        let actor = format!("{} -> {}", sender.name(), receiver.name());
        let timed_out = |received: usize| HarnessError::TransferTimeout {
            actor: actor.clone(),
            expected: payload.len(),
            received,
            timeout: self.timeout,
        };

        // Only bytes sent from here on count toward the check.
        receiver.clear()?;

        let mut written = 0;
        while written < payload.len() {
            let n = sender.write(&payload[written..])?;
            written += n;
            if n == 0 && Instant::now() >= deadline {
                return Err(timed_out(0));
            }
        }
        debug!(actor = %actor, bytes = written, "payload written");

        receiver.set_timeout(self.poll_interval)?;
        let mut received = Vec::with_capacity(payload.len());
        let mut buffer = vec![0u8; payload.len()];
        while received.len() < payload.len() {
            let want = payload.len() - received.len();
            let n = receiver.read(&mut buffer[..want])?;
            received.extend_from_slice(&buffer[..n]);
            if n > 0 {
                debug!(actor = %actor, chunk = n, total = received.len(), "read chunk");
            }
            if received.len() < payload.len() && Instant::now() >= deadline {
                return Err(timed_out(received.len()));
            }
        }

        if let Some(offset) = first_difference(payload, &received) {
            return Err(HarnessError::TransferMismatch {
                actor,
                offset,
                expected: printable(payload),
                actual: printable(&received),
            });
        }

        info!(actor = %actor, bytes = payload.len(), "transfer verified");
        Ok(())
    }
}

/// Write `payload` on `io1` and require it byte-exact on `io2` within `timeout`.
pub fn verify_transfer(
    io1: &mut Endpoint,
    io2: &mut Endpoint,
    payload: &[u8],
    timeout: Duration,
) -> HarnessResult<()> {
    TransferCheck::new(timeout).run(io1, io2, payload)
}

/// [`verify_transfer`] in both directions, `io1` to `io2` first.
pub fn verify_exchange(
    io1: &mut Endpoint,
    io2: &mut Endpoint,
    payload: &[u8],
    timeout: Duration,
) -> HarnessResult<()> {
    let check = TransferCheck::new(timeout);
    check.run(io1, io2, payload)?;
    check.run(io2, io1, payload)
}

fn first_difference(expected: &[u8], actual: &[u8]) -> Option<usize> {
    expected
        .iter()
        .zip(actual)
        .position(|(a, b)| a != b)
        .or_else(|| (expected.len() != actual.len()).then(|| expected.len().min(actual.len())))
}

fn printable(bytes: &[u8]) -> String {
    bytes.escape_ascii().to_string()
}
