//! Configuration loader with file resolution and environment override support.

use super::error::{ConfigError, ConfigResult};
use super::schema::Config;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Environment variable prefix for overrides
const ENV_PREFIX: &str = "SERIALDEV_HARNESS";

/// Config file name
const CONFIG_FILE_NAME: &str = "serialdev-harness.toml";

/// Environment variable for explicit config path
const CONFIG_PATH_ENV: &str = "SERIALDEV_HARNESS_CONFIG";

/// Pipe pair variable understood by older test setups
const LEGACY_PIPE_DEVS_ENV: &str = "GENSIO_TEST_PIPE_DEVS";

/// Configuration loader with resolution and override logic.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    /// Resolved config file path (if any)
    pub config_path: Option<PathBuf>,
    /// The loaded configuration
    pub config: Config,
}

impl ConfigLoader {
    /// Load configuration using standard resolution order.
    ///
    /// Resolution priority (highest to lowest):
    /// 1. `SERIALDEV_HARNESS_CONFIG` environment variable (explicit path)
    /// 2. `./serialdev-harness.toml` (current directory)
    /// 3. The platform config directory (`~/.config/serialdev-harness/` on Linux)
    /// 4. Built-in defaults (no file required)
    ///
    /// Environment variables override file values.
    pub fn load() -> ConfigResult<Self> {
        let config_path = resolve_config_path();

        let mut config = match config_path {
            Some(ref path) => load_from_file(path)?,
            None => Config::default(),
        };

        apply_env_overrides(&mut config, env_lookup)?;
        config.validate()?;

        Ok(Self {
            config_path,
            config,
        })
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref().to_path_buf();
        let mut config = load_from_file(&path)?;
        apply_env_overrides(&mut config, env_lookup)?;
        config.validate()?;

        Ok(Self {
            config_path: Some(path),
            config,
        })
    }

    /// Create a loader with default configuration (no file).
    pub fn with_defaults() -> Self {
        Self {
            config_path: None,
            config: Config::default(),
        }
    }

    /// Get the loaded configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get a mutable reference to the configuration.
    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    /// Consume the loader and return the configuration.
    pub fn into_config(self) -> Config {
        self.config
    }

    /// Render the effective configuration as TOML.
    pub fn to_toml(&self) -> ConfigResult<String> {
        Ok(toml::to_string_pretty(&self.config)?)
    }

    /// Save the current configuration to a specific file.
    pub fn save_to(&self, path: impl AsRef<Path>) -> ConfigResult<()> {
        save_to_file(&self.config, path.as_ref())
    }
}

/// Resolve the configuration file path using standard locations.
pub fn resolve_config_path() -> Option<PathBuf> {
    // 1. Explicit environment variable
    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        let path = PathBuf::from(path);
        if path.exists() {
            return Some(path);
        }
    }

    // 2. Current directory
    let cwd_config = PathBuf::from(CONFIG_FILE_NAME);
    if cwd_config.exists() {
        return Some(cwd_config);
    }

    // 3. Platform config directory
    get_default_config_path().filter(|path| path.exists())
}

/// Get the default config directory for creating new config files.
pub fn get_default_config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "serialdev-harness")
        .map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the default config file path for creating new config files.
pub fn get_default_config_path() -> Option<PathBuf> {
    get_default_config_dir().map(|d| d.join(CONFIG_FILE_NAME))
}

/// Load configuration from a file.
fn load_from_file(path: &Path) -> ConfigResult<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.to_path_buf(),
        source: e,
    })?;

    toml::from_str(&content).map_err(ConfigError::ParseError)
}

/// Save configuration to a file.
fn save_to_file(config: &Config, path: &Path) -> ConfigResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ConfigError::WriteError {
            path: path.to_path_buf(),
            source: e,
        })?;
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|e| ConfigError::WriteError {
        path: path.to_path_buf(),
        source: e,
    })
}

fn env_lookup(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

fn parse_var<T: FromStr>(var: &str, value: &str, what: &str) -> ConfigResult<T> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::env_parse(var, format!("Invalid {what}: '{value}'")))
}

/// Apply environment variable overrides to the configuration.
///
/// Variables follow the pattern `SERIALDEV_HARNESS_<SECTION>_<KEY>`, e.g.
/// - `SERIALDEV_HARNESS_HARNESS_READ_TIMEOUT_MS=5000`
/// - `SERIALDEV_HARNESS_DEVICES_BACKEND=loopback`
/// - `SERIALDEV_HARNESS_DEVICES_PIPE_DEVS=/dev/pts/3:/dev/pts/4`
///
/// `GENSIO_TEST_PIPE_DEVS` is honoured as a fallback for the pipe pair.
pub fn apply_env_overrides<F>(config: &mut Config, lookup: F) -> ConfigResult<()>
where
    F: Fn(&str) -> Option<String>,
{
    let var = |key: &str| format!("{ENV_PREFIX}_{key}");

    // Harness overrides
    let name = var("HARNESS_READ_TIMEOUT_MS");
    if let Some(val) = lookup(&name) {
        config.harness.read_timeout_ms = parse_var(&name, &val, "timeout")?;
    }
    let name = var("HARNESS_POLL_INTERVAL_MS");
    if let Some(val) = lookup(&name) {
        config.harness.poll_interval_ms = parse_var(&name, &val, "interval")?;
    }
    if let Some(val) = lookup(&var("HARNESS_PAYLOAD")) {
        config.harness.payload = val;
    }

    // Device overrides
    let name = var("DEVICES_BACKEND");
    if let Some(val) = lookup(&name) {
        config.devices.backend = val
            .parse()
            .map_err(|message: String| ConfigError::env_parse(&name, message))?;
    }
    let name = var("DEVICES_PIPE_DEVS");
    let pipe_devs = lookup(&name).map(|val| (name.clone(), val)).or_else(|| {
        lookup(LEGACY_PIPE_DEVS_ENV).map(|val| (LEGACY_PIPE_DEVS_ENV.to_string(), val))
    });
    if let Some((name, val)) = pipe_devs {
        config.devices.pipe_devs = Some(
            val.parse()
                .map_err(|message: String| ConfigError::env_parse(name, message))?,
        );
    }
    if let Some(val) = lookup(&var("DEVICES_REQUIRE_SIMULATION")) {
        config.devices.require_simulation = val.eq_ignore_ascii_case("true") || val == "1";
    }

    // Loopback overrides
    let name = var("LOOPBACK_MAX_CHUNK");
    if let Some(val) = lookup(&name) {
        config.loopback.max_chunk = parse_var(&name, &val, "chunk size")?;
    }

    // Logging overrides
    if let Some(val) = lookup(&var("LOGGING_LEVEL")) {
        config.logging.level = val;
    }
    let name = var("LOGGING_FORMAT");
    if let Some(val) = lookup(&name) {
        config.logging.format = val
            .parse()
            .map_err(|message: String| ConfigError::env_parse(&name, message))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BackendKind;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_default_loader() {
        let loader = ConfigLoader::with_defaults();
        assert_eq!(loader.config().harness.read_timeout_ms, 2000);
        assert!(loader.config_path.is_none());
    }

    #[test]
    fn test_env_override() {
        let mut config = Config::default();
        apply_env_overrides(
            &mut config,
            lookup_from(&[
                ("SERIALDEV_HARNESS_HARNESS_READ_TIMEOUT_MS", "9999"),
                ("SERIALDEV_HARNESS_DEVICES_BACKEND", "loopback"),
                ("SERIALDEV_HARNESS_DEVICES_REQUIRE_SIMULATION", "1"),
            ]),
        )
        .unwrap();

        assert_eq!(config.harness.read_timeout_ms, 9999);
        assert_eq!(config.devices.backend, BackendKind::Loopback);
        assert!(config.devices.require_simulation);
    }

    #[test]
    fn test_legacy_pipe_devs_env() {
        let mut config = Config::default();
        apply_env_overrides(
            &mut config,
            lookup_from(&[("GENSIO_TEST_PIPE_DEVS", "/dev/ttyPipeA1:/dev/ttyPipeB1")]),
        )
        .unwrap();

        let pair = config.devices.pipe_devs.unwrap();
        assert_eq!(pair.a, "/dev/ttyPipeA1");
        assert_eq!(pair.b, "/dev/ttyPipeB1");
    }

    #[test]
    fn test_prefixed_pipe_devs_win_over_legacy() {
        let mut config = Config::default();
        apply_env_overrides(
            &mut config,
            lookup_from(&[
                ("GENSIO_TEST_PIPE_DEVS", "/dev/old0:/dev/old1"),
                ("SERIALDEV_HARNESS_DEVICES_PIPE_DEVS", "/dev/new0:/dev/new1"),
            ]),
        )
        .unwrap();
        assert_eq!(config.devices.pipe_devs.unwrap().a, "/dev/new0");
    }

    #[test]
    fn test_bad_env_value_is_reported() {
        let mut config = Config::default();
        let err = apply_env_overrides(
            &mut config,
            lookup_from(&[("SERIALDEV_HARNESS_LOOPBACK_MAX_CHUNK", "lots")]),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::EnvParseError { .. }));
        assert!(err.to_string().contains("SERIALDEV_HARNESS_LOOPBACK_MAX_CHUNK"));
    }
}
