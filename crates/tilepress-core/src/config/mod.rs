//! Configuration management for tilepress.
//!
//! Configuration is loaded from a platform config directory with sensible
//! defaults; every section can be omitted. Paths in `[general]` support
//! `~` expansion.

mod types;
mod validate;

pub use types::*;

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Root configuration structure for tilepress.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Editing surface settings
    pub editor: EditorConfig,

    /// Working copy generation settings
    pub working_copy: WorkingCopyConfig,

    /// Preview and print artifact settings
    pub export: ExportConfig,

    /// Filter bake settings
    pub compositor: CompositorConfig,

    /// Photo switch crossfade settings
    pub crossfade: CrossfadeConfig,

    /// Working copy resolution retry settings
    pub resolve: ResolveConfig,

    /// Logging settings
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// Returns default configuration if the file doesn't exist.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default config file path.
    ///
    /// Uses platform-appropriate directories:
    /// - macOS: ~/Library/Application Support/com.tilepress.tilepress/config.toml
    /// - Linux: ~/.config/tilepress/config.toml
    /// - Windows: C:\Users\<User>\AppData\Roaming\tilepress\config\config.toml
    ///
    /// Falls back to ~/.tilepress/config.toml if directory detection fails.
    pub fn default_path() -> PathBuf {
        directories::ProjectDirs::from("com", "tilepress", "tilepress")
            .map(|dirs| dirs.config_dir().to_path_buf().join("config.toml"))
            .unwrap_or_else(|| {
                let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
                PathBuf::from(home).join(".tilepress").join("config.toml")
            })
    }

    /// Get the resolved workspace directory path (with ~ expansion).
    pub fn work_dir(&self) -> PathBuf {
        let path_str = self.general.work_dir.to_string_lossy();
        let expanded = shellexpand::tilde(&path_str);
        PathBuf::from(expanded.into_owned())
    }

    /// Directory for finished preview and print artifacts.
    pub fn artifact_dir(&self) -> PathBuf {
        self.work_dir().join("artifacts")
    }

    /// Directory for working copies and intermediate bakes.
    pub fn scratch_dir(&self) -> PathBuf {
        self.work_dir().join("scratch")
    }

    /// Serialize the config to a pretty TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::ValidationError(e.to_string()))
    }
}
