//! Configuration module

use crate::archive::{Format, Options};
use crate::level::UNSPECIFIED_LEVEL;
use crate::{Error, Result};
use dirs::config_dir;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Archive settings
    #[serde(default)]
    pub archive: ArchiveConfig,
}

/// Archive configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveConfig {
    /// Archive format
    pub format: Format,
    /// Compression level on the codec's standard scale, negative for the default
    pub compression_level: i32,
    /// Leave symlinks out of created archives
    pub skip_symlinks: bool,
    /// Directory entry names are made relative to
    pub root: PathBuf,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            format: Format::default(),
            compression_level: UNSPECIFIED_LEVEL,
            skip_symlinks: false,
            root: PathBuf::from("."),
        }
    }
}

impl ArchiveConfig {
    /// Construction options for [`crate::archive::from_format`]
    pub fn options(&self) -> Options {
        Options {
            compression_level: self.compression_level,
            skip_symlinks: self.skip_symlinks,
        }
    }
}

impl Config {
    /// Default configuration file location
    pub fn default_path() -> Result<PathBuf> {
        config_dir()
            .map(|dir| dir.join("cachepack").join("config.toml"))
            .ok_or_else(|| Error::Config("Cannot determine config directory".to_string()))
    }

    /// Load from the default location, falling back to defaults when absent
    pub fn load() -> Result<Self> {
        let path = Self::default_path()?;
        if path.exists() {
            Self::load_from(&path)
        } else {
            debug!("No config file at {:?}, using defaults", path);
            Ok(Self::default())
        }
    }

    /// Load from a specific file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config = Self::parse(&content)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        debug!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Parse TOML text
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(e.to_string()))
    }

    /// Render as TOML text
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))
    }

    /// Save to a specific file, creating parent directories
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.to_toml()?)?;
        Ok(())
    }
}
