//! Conformance harness for linked serial endpoints.
//!
//! Opens two `serialdev` endpoints that are wired to each other (a serialsim
//! pipe pair, or an in-process loopback), checks that data crosses unchanged
//! and that RS-485 settings made on one end are visible from the other, and
//! always closes both endpoints afterwards.
//!
//! # Modules
//!
//! - `connection`: `serialdev,...` connection strings
//! - `rs485`: RS-485 line configuration and its status string
//! - `port`: channel primitive (real ttys and loopback pipes)
//! - `backend`: device backends and simulation queries
//! - `endpoint`: one opened side of the pair
//! - `enumerator`: pipe-pair discovery
//! - `harness`: scenario runner with guaranteed release
//! - `verify`: transfer and RS-485 checks
//! - `scenarios`: the built-in scenarios
//! - `config`: configuration management with TOML support
//! - `logging`: tracing subscriber setup
//!
//! # Example
//!
//! ```
//! use serialdev_harness::backend::LoopbackBackend;
//! use serialdev_harness::harness::HarnessRunner;
//! use std::sync::Arc;
//!
//! let runner = HarnessRunner::new(Arc::new(LoopbackBackend::default()));
//! runner
//!     .exchange("serialdev,loop0a,9600", "serialdev,loop0b,9600", b"This is a test string!")
//!     .unwrap();
//! ```

pub mod backend;
pub mod config;
pub mod connection;
pub mod endpoint;
pub mod enumerator;
pub mod error;
pub mod harness;
pub mod logging;
pub mod port;
pub mod rs485;
pub mod scenarios;
pub mod verify;

// Re-export commonly used types for convenience
pub use backend::{create_backend, BackendKind, DeviceBackend, LoopbackBackend, SerialSimBackend};
pub use config::{Config, ConfigError, ConfigLoader, ConfigResult};
pub use connection::{ConnectionError, ConnectionString, SerialFormat};
pub use endpoint::Endpoint;
pub use enumerator::{DeviceEnumerator, PipePair};
pub use error::{HarnessError, HarnessResult};
pub use harness::{Check, HarnessRunner, Scenario, ScenarioReport, Status};
pub use port::{PortError, SerialPortAdapter};
pub use rs485::Rs485Config;
pub use scenarios::BuiltinScenario;
pub use verify::{verify_exchange, verify_rs485, verify_transfer};
