//! Configuration management for the CLI

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// CLI configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Config {
    /// Snapshot table
    pub table: Option<String>,
    /// AWS region
    pub region: Option<String>,
    /// CMDB web service base URL
    pub cmdb_url: Option<String>,
    /// JSON file with the CMDB service credentials
    pub cmdb_credentials: Option<PathBuf>,
}

impl Config {
    /// Load configuration from file
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&config_path).context("Failed to read config file")?;

        serde_json::from_str(&content).context("Failed to parse config file")
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<PathBuf> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let content = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(&config_path, content).context("Failed to write config file")?;

        Ok(config_path)
    }

    /// Overlay every value set in `other`
    pub fn merge(&mut self, other: Config) {
        if other.table.is_some() {
            self.table = other.table;
        }
        if other.region.is_some() {
            self.region = other.region;
        }
        if other.cmdb_url.is_some() {
            self.cmdb_url = other.cmdb_url;
        }
        if other.cmdb_credentials.is_some() {
            self.cmdb_credentials = other.cmdb_credentials;
        }
    }

    /// Get the configuration file path
    pub fn config_path() -> Result<PathBuf> {
        let dir = dirs_next::config_dir().context("Could not determine config directory")?;
        Ok(dir.join("invctl").join("config.json"))
    }
}
