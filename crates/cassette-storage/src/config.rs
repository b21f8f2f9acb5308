//! File-based persister configuration loading

use cassette_core::{Error, PersisterConfig, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Configuration file format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// JSON format
    Json,
    /// YAML format
    Yaml,
    /// TOML format
    Toml,
}

impl ConfigFormat {
    /// Detect config format from file extension
    pub fn detect(path: &Path) -> Self {
        match path.extension().and_then(|s| s.to_str()) {
            Some("yaml") | Some("yml") => ConfigFormat::Yaml,
            Some("toml") => ConfigFormat::Toml,
            _ => ConfigFormat::Json,
        }
    }
}

/// Loads a [`PersisterConfig`] (or any serde type) from a file
pub struct FileConfigLoader {
    path: PathBuf,
    format: ConfigFormat,
}

impl FileConfigLoader {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref().to_path_buf();
        let format = ConfigFormat::detect(&path);
        Self { path, format }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> ConfigFormat {
        self.format
    }

    fn read_file(&self) -> Result<String> {
        std::fs::read_to_string(&self.path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::Config(format!("{} not found", self.path.display()))
            } else {
                Error::Io(e)
            }
        })
    }

    /// Parse config based on format
    pub fn parse<T>(&self, content: &str) -> Result<T>
    where
        T: for<'de> Deserialize<'de>,
    {
        match self.format {
            ConfigFormat::Json => serde_json::from_str(content)
                .map_err(|e| Error::Config(format!("JSON parse error: {}", e))),
            ConfigFormat::Yaml => serde_yaml::from_str(content)
                .map_err(|e| Error::Config(format!("YAML parse error: {}", e))),
            ConfigFormat::Toml => toml::from_str(content)
                .map_err(|e| Error::Config(format!("TOML parse error: {}", e))),
        }
    }

    /// Serialize config based on format
    pub fn serialize<T>(&self, value: &T) -> Result<String>
    where
        T: Serialize,
    {
        match self.format {
            ConfigFormat::Json => serde_json::to_string_pretty(value)
                .map_err(|e| Error::Config(format!("JSON serialize error: {}", e))),
            ConfigFormat::Yaml => serde_yaml::to_string(value)
                .map_err(|e| Error::Config(format!("YAML serialize error: {}", e))),
            ConfigFormat::Toml => toml::to_string_pretty(value)
                .map_err(|e| Error::Config(format!("TOML serialize error: {}", e))),
        }
    }

    /// Load and validate the persister configuration
    pub fn load(&self) -> Result<PersisterConfig> {
        let content = self.read_file()?;
        let config: PersisterConfig = self.parse(&content)?;
        config.validate()?;

        tracing::debug!(
            path = %self.path.display(),
            record_failed_requests = config.record_failed_requests,
            "Loaded persister configuration"
        );
        Ok(config)
    }

    /// Write a configuration in this loader's format
    pub fn save(&self, config: &PersisterConfig) -> Result<()> {
        config.validate()?;
        let content = self.serialize(config)?;
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, content)?;
        Ok(())
    }
}
