//! Application wiring: paths, configuration, preferences, bridge and registry

use crate::bridge::{ConsoleBridge, NativeBridge};
use crate::config::AppConfig;
use crate::drivers::fetch::ReleaseFetcher;
use crate::drivers::{download, DriverRegistry, RegistryConfig};
use crate::library::LibraryInstaller;
use crate::paths::AppPaths;
use crate::prefs::{keys, Preferences};
use crate::settings::SettingsTree;
use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Everything a front-end command needs
pub struct App {
    pub paths: AppPaths,
    pub config: AppConfig,
    pub prefs: Preferences,
    pub bridge: Arc<dyn NativeBridge>,
    pub registry: DriverRegistry,
    pub http: reqwest::Client,
}

impl App {
    /// Open the application with the console bridge
    pub async fn open(paths: AppPaths, config: AppConfig) -> Result<Self> {
        let document = config
            .bridge
            .settings_document
            .clone()
            .unwrap_or_else(|| paths.settings_document.clone());
        let bridge = ConsoleBridge::open(
            document,
            paths.keys_dir.clone(),
            config.bridge.custom_driver_loading,
        )
        .context("Failed to open the engine bridge")?;

        Self::with_bridge(paths, config, Arc::new(bridge))
    }

    /// Open the application over an existing bridge
    pub fn with_bridge(
        paths: AppPaths,
        config: AppConfig,
        bridge: Arc<dyn NativeBridge>,
    ) -> Result<Self> {
        paths.ensure_directories()?;

        let prefs = Preferences::open(paths.sled_db_path()).with_context(|| {
            format!(
                "Failed to open preferences at {}",
                paths.sled_db_path().display()
            )
        })?;

        let registry_config = RegistryConfig {
            drivers_dir: paths.drivers_dir.clone(),
            cache_dir: paths.cache_dir.clone(),
            native_lib_dir: config
                .bridge
                .native_lib_dir
                .clone()
                .unwrap_or_else(|| paths.lib_dir.clone()),
            platform_api: config.drivers.platform_api,
        };
        let registry = DriverRegistry::new(registry_config, bridge.clone(), prefs.clone())
            .context("Failed to open the driver registry")?;

        let http = download::http_client().context("Failed to build the HTTP client")?;

        info!("📂 Data directory: {}", paths.base_dir().display());
        Ok(Self {
            paths,
            config,
            prefs,
            bridge,
            registry,
            http,
        })
    }

    /// Driver channel in use, the configured default unless overridden
    pub fn channel(&self) -> String {
        self.prefs
            .string(keys::GPU_DRIVER_CHANNEL, &self.config.drivers.channel)
    }

    pub fn release_fetcher(&self) -> ReleaseFetcher {
        ReleaseFetcher::new(self.http.clone(), self.config.drivers.github_api.clone())
    }

    pub fn settings(&self) -> Result<SettingsTree> {
        SettingsTree::load(self.bridge.clone()).context("Failed to load engine settings")
    }

    pub fn library_installer(&self) -> LibraryInstaller {
        LibraryInstaller::new(
            self.paths.lib_dir.clone(),
            self.config.library.file_name.clone(),
            self.bridge.clone(),
        )
    }

    /// Install a license key for the game at `game_path`
    pub fn install_key(&self, key_path: &Path, game_path: &str) -> bool {
        debug!("Installing key {} for {}", key_path.display(), game_path);
        self.bridge.install_key(key_path, game_path)
    }

    /// Flush preferences to disk
    pub fn shutdown(&self) -> Result<()> {
        self.prefs.sync().context("Failed to flush preferences")
    }
}
