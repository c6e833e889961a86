//! Configuration loading and root folder resolution

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Environment variable overriding the preference root folder
pub const ROOT_FOLDER_ENV: &str = "HYAWAY_ROOT_FOLDER";

/// Default capacity of the in-process broadcast channel
pub const DEFAULT_BROADCAST_CAPACITY: usize = 64;

/// Contents of `config.toml`
///
/// Every field is optional; absent fields fall back to compiled defaults.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct TomlConfig {
    /// Directory holding persisted preference stores
    pub root_folder: Option<PathBuf>,
    /// Log level used when `RUST_LOG` is not set (e.g. "info", "debug")
    pub log_level: Option<String>,
    /// Capacity of the cross-tab broadcast channel
    pub broadcast_capacity: Option<usize>,
}

impl TomlConfig {
    /// Load the platform config file, or defaults if none exists
    ///
    /// A missing file is not an error (logged at WARN). A file that exists but
    /// does not parse is `Error::Config`.
    pub fn load() -> Result<Self> {
        match config_file_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            Some(path) => {
                warn!("No config file at {}, using defaults", path.display());
                Ok(Self::default())
            }
            None => {
                warn!("Could not determine config directory, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Load configuration from an explicit TOML file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: TomlConfig = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;

        if config.broadcast_capacity == Some(0) {
            return Err(Error::Config(format!(
                "{}: broadcast_capacity must be at least 1",
                path.display()
            )));
        }

        debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Log level to use, defaulting to "info"
    pub fn log_level(&self) -> &str {
        self.log_level.as_deref().unwrap_or("info")
    }

    /// Broadcast channel capacity, defaulting to [`DEFAULT_BROADCAST_CAPACITY`]
    pub fn broadcast_capacity(&self) -> usize {
        self.broadcast_capacity.unwrap_or(DEFAULT_BROADCAST_CAPACITY)
    }
}

/// Root folder resolution in priority order:
/// 1. Command-line argument (highest priority)
/// 2. Environment variable
/// 3. TOML config file
/// 4. OS-dependent compiled default (fallback)
#[derive(Debug, Clone)]
pub struct RootFolderResolver {
    env_var_name: String,
    cli_arg: Option<PathBuf>,
    config_value: Option<PathBuf>,
}

impl RootFolderResolver {
    pub fn new(env_var_name: impl Into<String>) -> Self {
        Self {
            env_var_name: env_var_name.into(),
            cli_arg: None,
            config_value: None,
        }
    }

    pub fn with_cli_arg(mut self, path: Option<PathBuf>) -> Self {
        self.cli_arg = path;
        self
    }

    pub fn with_config(mut self, config: &TomlConfig) -> Self {
        self.config_value = config.root_folder.clone();
        self
    }

    pub fn resolve(&self) -> PathBuf {
        if let Some(path) = &self.cli_arg {
            return path.clone();
        }

        if let Ok(path) = std::env::var(&self.env_var_name) {
            if !path.is_empty() {
                return PathBuf::from(path);
            }
        }

        if let Some(path) = &self.config_value {
            return path.clone();
        }

        default_root_folder()
    }
}

/// Platform config file location (`<config dir>/hyaway/config.toml`)
pub fn config_file_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("hyaway").join("config.toml"))
}

/// Get OS-dependent default root folder path
pub fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("hyaway"))
        .unwrap_or_else(|| PathBuf::from("./hyaway_data"))
}
