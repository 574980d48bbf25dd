//! Channel layer.
//!
//! The `SerialPortAdapter` trait is the channel primitive every endpoint is
//! built on. `SyncSerialPort` drives real ttys, `LoopbackPipe` links two
//! channels in memory.

pub mod error;
pub mod loopback;
pub mod sync_port;
pub mod traits;

pub use error::PortError;
pub use loopback::{Fault, LoopbackPipe, LoopbackPort};
pub use sync_port::SyncSerialPort;
pub use traits::*;
