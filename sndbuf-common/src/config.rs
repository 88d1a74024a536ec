//! Configuration file discovery and loading
//!
//! Config file resolution follows a fixed priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. Per-user config file (`<config_dir>/<app>/config.toml`) if it exists
//! 4. No file: compiled defaults are used
//!
//! A missing config file is never fatal. A config file that exists but
//! cannot be parsed is an error, since silently ignoring it would hide typos.

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl LoggingConfig {
    /// Build an `EnvFilter`-style directive scoping the level to one crate.
    ///
    /// `LoggingConfig { level: "debug" }.directive_for("sndbuf_ap")` yields
    /// `"sndbuf_ap=debug"`.
    pub fn directive_for(&self, crate_name: &str) -> String {
        format!("{}={}", crate_name, self.level)
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Compiled defaults for the current platform
#[derive(Debug, Clone)]
pub struct CompiledDefaults {
    /// Per-user config file location, if the platform has a config dir
    pub config_file: Option<PathBuf>,
}

impl CompiledDefaults {
    /// Defaults for `app_name` on the platform this binary was built for.
    pub fn for_current_platform(app_name: &str) -> Self {
        Self {
            config_file: dirs::config_dir().map(|d| d.join(app_name).join("config.toml")),
        }
    }
}

/// Resolves which config file (if any) should be loaded.
#[derive(Debug, Clone)]
pub struct ConfigResolver {
    app_name: String,
    env_var: String,
}

impl ConfigResolver {
    /// Create a resolver for `app_name`.
    ///
    /// The environment variable consulted is the upper-cased app name with
    /// `-` replaced by `_`, suffixed by `_CONFIG` (`sndbuf` -> `SNDBUF_CONFIG`).
    pub fn new(app_name: &str) -> Self {
        let env_var = format!("{}_CONFIG", app_name.to_uppercase().replace('-', "_"));
        Self {
            app_name: app_name.to_string(),
            env_var,
        }
    }

    /// Name of the environment variable this resolver reads.
    pub fn env_var(&self) -> &str {
        &self.env_var
    }

    /// Resolve the config file path.
    ///
    /// CLI and environment paths are returned even when the file does not
    /// exist; `load_toml_config` then falls back to defaults with a warning.
    pub fn resolve(&self, cli_arg: Option<&Path>) -> Option<PathBuf> {
        // Priority 1: Command-line argument
        if let Some(path) = cli_arg {
            debug!("Config file from command line: {}", path.display());
            return Some(path.to_path_buf());
        }

        // Priority 2: Environment variable
        if let Ok(path) = std::env::var(&self.env_var) {
            if !path.is_empty() {
                debug!("Config file from {}: {}", self.env_var, path);
                return Some(PathBuf::from(path));
            }
        }

        // Priority 3: Per-user config file, only if present
        let defaults = CompiledDefaults::for_current_platform(&self.app_name);
        match defaults.config_file {
            Some(path) if path.exists() => {
                debug!("Config file from user config dir: {}", path.display());
                Some(path)
            }
            _ => None,
        }
    }
}

/// Load a TOML config file into `T`.
///
/// - `None` path: defaults
/// - path that does not exist: defaults, with a warning
/// - path that exists but does not parse: `Error::ConfigParse`
pub fn load_toml_config<T>(path: Option<&Path>) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    let Some(path) = path else {
        debug!("No config file, using compiled defaults");
        return Ok(T::default());
    };

    if !path.exists() {
        warn!(
            "Config file {} not found, using compiled defaults",
            path.display()
        );
        return Ok(T::default());
    }

    let content = std::fs::read_to_string(path)?;
    let config = toml::from_str::<T>(&content).map_err(|e| Error::ConfigParse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    info!("Loaded config file {}", path.display());
    Ok(config)
}

/// Resolve a required path following the standard priority order:
/// command line, then config file value, then environment variable.
pub fn resolve_required_path(
    what: &str,
    cli_arg: Option<PathBuf>,
    config_value: Option<PathBuf>,
    env_var_name: &str,
) -> Result<PathBuf> {
    if let Some(path) = cli_arg {
        return Ok(path);
    }

    if let Some(path) = config_value {
        return Ok(path);
    }

    if let Ok(path) = std::env::var(env_var_name) {
        if !path.is_empty() {
            return Ok(PathBuf::from(path));
        }
    }

    Err(Error::Missing(format!(
        "{} (pass it on the command line, set it in the config file, or set {})",
        what, env_var_name
    )))
}
