//! Configuration loading and management
//!
//! Handles parsing of `.trk.toml` configuration files.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Error, Result};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Storage configuration
    #[serde(default)]
    pub storage: StorageConfig,

    /// Task id configuration
    #[serde(default)]
    pub ids: IdConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage: StorageConfig::default(),
            ids: IdConfig::default(),
        }
    }
}

/// Storage-related configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Name of the tracker data directory
    #[serde(default = "default_dir")]
    pub dir: String,

    /// Lock acquisition timeout in milliseconds
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,
}

fn default_dir() -> String {
    ".trk".to_string()
}

fn default_lock_timeout_ms() -> u64 {
    5000
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            dir: default_dir(),
            lock_timeout_ms: default_lock_timeout_ms(),
        }
    }
}

/// Task id configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdConfig {
    /// Prefix for generated task ids
    #[serde(default = "default_prefix")]
    pub prefix: String,
}

fn default_prefix() -> String {
    "tk".to_string()
}

impl Default for IdConfig {
    fn default() -> Self {
        Self {
            prefix: default_prefix(),
        }
    }
}

/// Configuration file name
pub const CONFIG_FILE: &str = ".trk.toml";

impl Config {
    /// Load configuration from `.trk.toml` in the given root directory.
    ///
    /// A missing file yields the defaults; a malformed file is an error.
    pub fn load_from_root(root: &Path) -> Result<Config> {
        let path = root.join(CONFIG_FILE);
        if !path.exists() {
            return Ok(Config::default());
        }

        let contents = std::fs::read_to_string(&path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.storage.dir.trim().is_empty() {
            return Err(Error::InvalidConfig(
                "storage.dir must not be empty".to_string(),
            ));
        }
        if self.ids.prefix.trim().is_empty() {
            return Err(Error::InvalidConfig(
                "ids.prefix must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_yields_defaults() {
        let temp = TempDir::new().unwrap();
        let config = Config::load_from_root(temp.path()).unwrap();
        assert_eq!(config.storage.dir, ".trk");
        assert_eq!(config.storage.lock_timeout_ms, 5000);
        assert_eq!(config.ids.prefix, "tk");
    }

    #[test]
    fn partial_file_fills_defaults() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join(CONFIG_FILE),
            "[ids]\nprefix = \"job\"\n",
        )
        .unwrap();

        let config = Config::load_from_root(temp.path()).unwrap();
        assert_eq!(config.ids.prefix, "job");
        assert_eq!(config.storage.dir, ".trk");
    }

    #[test]
    fn empty_prefix_rejected() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join(CONFIG_FILE), "[ids]\nprefix = \"\"\n").unwrap();

        let result = Config::load_from_root(temp.path());
        assert!(matches!(result, Err(Error::InvalidConfig(_))));
    }
}
