//! Configuration management
//!
//! A small TOML file under the platform config directory. Everything has a
//! working default; the file exists so deployments can pin a different
//! model or point the transport at a test endpoint.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::live::transport::{DEFAULT_MODEL, LIVE_ENDPOINT};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Live session settings
    #[serde(default)]
    pub live: LiveSettings,
}

/// Settings for the live voice session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiveSettings {
    /// Conversational-audio model id
    #[serde(default = "default_model")]
    pub model: String,
    /// WebSocket endpoint (API key appended at connect time)
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
}

impl Default for LiveSettings {
    fn default() -> Self {
        Self {
            model: default_model(),
            endpoint: default_endpoint(),
        }
    }
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_endpoint() -> String {
    LIVE_ENDPOINT.to_string()
}

impl Config {
    /// Load configuration from the default path, creating it with defaults
    /// on first run.
    pub fn load() -> Result<Self> {
        let path = config_path()?;
        if path.exists() {
            Self::load_from(&path)
        } else {
            let config = Config::default();
            config.save()?;
            Ok(config)
        }
    }

    /// Load configuration from an explicit path
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).context("failed to read config file")?;
        let config: Config = toml::from_str(&contents).context("failed to parse config file")?;
        Ok(config)
    }

    /// Save configuration to the default path
    pub fn save(&self) -> Result<()> {
        let path = config_path()?;
        let parent = path.parent().context("config path has no parent")?;
        std::fs::create_dir_all(parent).context("failed to create config directory")?;

        let contents = toml::to_string_pretty(self).context("failed to serialize config")?;
        std::fs::write(&path, contents).context("failed to write config file")?;
        Ok(())
    }
}

/// Get the configuration file path
pub fn config_path() -> Result<PathBuf> {
    let base = directories::ProjectDirs::from("com", "woosh-live", "woosh-live")
        .context("failed to resolve project directories")?;
    Ok(base.config_dir().join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.live.model, DEFAULT_MODEL);
        assert_eq!(config.live.endpoint, LIVE_ENDPOINT);
    }

    #[test]
    fn test_missing_sections_use_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.live.model, DEFAULT_MODEL);

        let config: Config = toml::from_str("[live]\nmodel = \"custom-model\"\n").unwrap();
        assert_eq!(config.live.model, "custom-model");
        assert_eq!(config.live.endpoint, LIVE_ENDPOINT);
    }

    #[test]
    fn test_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = Config::default();
        config.live.model = "pinned-model".to_string();
        std::fs::write(&path, toml::to_string_pretty(&config).unwrap()).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.live.model, "pinned-model");
        assert_eq!(loaded.live.endpoint, LIVE_ENDPOINT);
    }
}
