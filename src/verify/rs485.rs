//! RS-485 configuration as seen from the peer.

use crate::backend::DeviceBackend;
use crate::endpoint::Endpoint;
use crate::error::{HarnessError, HarnessResult};
use tracing::info;

/// Ask the backend which RS-485 state is advertised to `peer`, and require it
/// to format exactly as `expected` (`"<pre> <post> <enabled|disabled>"`).
pub fn verify_rs485(
    backend: &dyn DeviceBackend,
    peer: &Endpoint,
    expected: &str,
) -> HarnessResult<()> {
    let remote_id = peer.remote_id()?;
    let actual = backend
        .remote_rs485(&remote_id)
        .map_err(|e| HarnessError::port(peer.name(), e))?
        .status();

    if actual != expected {
        return Err(HarnessError::ConfigMismatch {
            actor: format!("test rs485: {}", peer.name()),
            expected: expected.to_string(),
            actual,
        });
    }

    info!(endpoint = peer.name(), rs485 = %actual, "rs485 verified");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::LoopbackBackend;

    #[test]
    fn test_peer_sees_configured_delays() {
        let backend = LoopbackBackend::default();
        let _io1 =
            Endpoint::open(&backend, "serialdev,loop0a,9600N81,LOCAL,rs485=103:495").unwrap();
        let io2 = Endpoint::open(&backend, "serialdev,loop0b,9600N81").unwrap();

        verify_rs485(&backend, &io2, "103 495 enabled").unwrap();
    }

    #[test]
    fn test_mismatch_reports_both_values() {
        let backend = LoopbackBackend::default();
        let _io1 = Endpoint::open(&backend, "serialdev,loop0a,9600N81").unwrap();
        let io2 = Endpoint::open(&backend, "serialdev,loop0b,9600N81").unwrap();

        match verify_rs485(&backend, &io2, "103 495 enabled") {
            Err(HarnessError::ConfigMismatch {
                expected, actual, ..
            }) => {
                assert_eq!(expected, "103 495 enabled");
                assert_eq!(actual, "0 0 disabled");
            }
            other => panic!("expected mismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_closed_peer_is_not_open() {
        let backend = LoopbackBackend::default();
        let mut io2 = Endpoint::open(&backend, "serialdev,loop0b,9600N81").unwrap();
        io2.close();
        assert!(matches!(
            verify_rs485(&backend, &io2, "0 0 disabled"),
            Err(HarnessError::NotOpen { .. })
        ));
    }
}
