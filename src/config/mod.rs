//! Configuration management for emuctl
//!
//! Handles loading and saving the YAML configuration file. Every field has a
//! default, so a missing file or a partial file is fine.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    pub drivers: DriversConfig,
    pub bridge: BridgeConfig,
    pub library: LibraryConfig,
    pub logging: LoggingConfig,
}

/// GPU driver channel and platform constraints
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DriversConfig {
    /// Default driver channel (GitHub repository URL)
    pub channel: String,
    /// GitHub API base URL
    pub github_api: String,
    /// Platform API level compared against a package's `minApi`
    pub platform_api: u32,
}

impl Default for DriversConfig {
    fn default() -> Self {
        Self {
            channel: default_channel(),
            github_api: crate::drivers::fetch::GITHUB_API.to_string(),
            platform_api: 34,
        }
    }
}

/// Native engine bridge configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub custom_driver_loading: bool,
    /// Engine native library directory, defaults to the data `lib` directory
    #[serde(skip_serializing_if = "Option::is_none")]
    pub native_lib_dir: Option<PathBuf>,
    /// Settings document path, defaults to `settings.json` in the data directory
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settings_document: Option<PathBuf>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            custom_driver_loading: true,
            native_lib_dir: None,
            settings_document: None,
        }
    }
}

/// Development library installation
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LibraryConfig {
    pub file_name: String,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            file_name: "librpcsx-dev.so".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Write a daily rolling log file in the logs directory
    pub file: bool,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            file: true,
            json: false,
        }
    }
}

fn default_channel() -> String {
    "https://github.com/K11MCH1/AdrenoToolsDrivers".to_string()
}

impl AppConfig {
    /// Load configuration from file with validation
    pub async fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: AppConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse YAML config: {}", path.display()))?;

        config.validate()?;
        Ok(config)
    }

    /// Load the file when it exists, defaults otherwise
    pub async fn load_or_default(path: &Path) -> Result<Self> {
        if fs::try_exists(path).await.unwrap_or(false) {
            Self::load(path).await
        } else {
            debug!("No config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Save configuration to file
    pub async fn save(&self, path: &Path) -> Result<()> {
        let yaml = serde_yaml::to_string(self).context("Failed to serialize config to YAML")?;

        fs::write(path, yaml)
            .await
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Validate configuration for correctness and consistency
    pub fn validate(&self) -> Result<()> {
        crate::drivers::fetch::parse_repo_url(&self.drivers.channel)
            .with_context(|| format!("Invalid drivers.channel '{}'", self.drivers.channel))?;

        if !self.drivers.github_api.starts_with("http") {
            anyhow::bail!("drivers.github_api must be an http(s) URL");
        }

        let file_name = &self.library.file_name;
        if file_name.is_empty() || file_name.contains(['/', '\\']) {
            anyhow::bail!("library.file_name must be a plain file name");
        }

        Ok(())
    }
}
