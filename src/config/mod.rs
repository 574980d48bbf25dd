//! Configuration module.
//!
//! TOML-based configuration with environment variable overrides.
//!
//! # Configuration Resolution
//!
//! 1. `SERIALDEV_HARNESS_CONFIG` environment variable (explicit path)
//! 2. `./serialdev-harness.toml` (current directory)
//! 3. The platform config directory (`~/.config/serialdev-harness/` on Linux)
//! 4. Built-in defaults (no file required)
//!
//! # Environment Overrides
//!
//! The pattern is `SERIALDEV_HARNESS_<SECTION>_<KEY>`:
//! - `SERIALDEV_HARNESS_HARNESS_READ_TIMEOUT_MS=5000`
//! - `SERIALDEV_HARNESS_DEVICES_BACKEND=loopback`
//! - `SERIALDEV_HARNESS_DEVICES_PIPE_DEVS=/dev/pts/3:/dev/pts/4`
//!
//! `GENSIO_TEST_PIPE_DEVS` is also accepted for the pipe pair.
//!
//! # Example
//!
//! ```rust,no_run
//! use serialdev_harness::config::ConfigLoader;
//!
//! let loader = ConfigLoader::load()?;
//! println!("Read timeout: {:?}", loader.config().harness.read_timeout());
//! # Ok::<(), serialdev_harness::config::ConfigError>(())
//! ```

mod error;
mod loader;
mod schema;

pub use error::{ConfigError, ConfigResult};
pub use loader::{
    apply_env_overrides, get_default_config_dir, get_default_config_path, resolve_config_path,
    ConfigLoader,
};
pub use schema::{
    Config, DevicesConfig, HarnessConfig, LogFormat, LoggingConfig, LoopbackConfig,
    DEFAULT_PAYLOAD,
};
