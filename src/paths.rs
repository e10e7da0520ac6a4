//! Application path management for portable and installed modes.
//!
//! ## Mode Detection
//!
//! - **Portable mode**: If a `.portable` marker file exists next to the
//!   executable, all data files are stored in the same directory.
//! - **Installed mode** (default): Data is stored in the platform data
//!   directory (`~/.local/share/emuctl`, `%APPDATA%\emuctl`, ...).
//!
//! `--data-dir` overrides both.

use std::path::{Path, PathBuf};
use tracing::debug;

/// Application name used for directories in installed mode
const APP_NAME: &str = "emuctl";

/// Application paths for config, drivers, state, and logs.
#[derive(Debug, Clone)]
pub struct AppPaths {
    /// Path to the configuration file
    pub config: PathBuf,
    /// Installed GPU driver packages, one subdirectory each
    pub drivers_dir: PathBuf,
    /// Spooled and downloaded archives
    pub cache_dir: PathBuf,
    /// Path to the state directory (sled database)
    pub state_dir: PathBuf,
    pub logs_dir: PathBuf,
    /// Development engine library
    pub lib_dir: PathBuf,
    pub keys_dir: PathBuf,
    /// Settings document kept by the console bridge
    pub settings_document: PathBuf,
    /// Whether running in portable mode (data next to exe)
    pub is_portable: bool,
}

impl AppPaths {
    /// Detect the appropriate paths based on environment.
    ///
    /// Note: This is called before logging is initialized.
    pub fn detect() -> Self {
        let exe_dir = std::env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
            .unwrap_or_else(|| PathBuf::from("."));

        if exe_dir.join(".portable").exists() {
            #[cfg(debug_assertions)]
            eprintln!("[paths] Running in PORTABLE mode (.portable marker found)");
            return Self::from_base(&exe_dir, true);
        }

        let app_data = dirs::data_dir()
            .unwrap_or_else(|| {
                eprintln!("[paths] WARNING: no platform data directory, falling back to exe dir");
                exe_dir.clone()
            })
            .join(APP_NAME);

        #[cfg(debug_assertions)]
        eprintln!(
            "[paths] Running in INSTALLED mode (data dir: {})",
            app_data.display()
        );

        Self::from_base(&app_data, false)
    }

    /// Paths for an explicit data directory, falling back to detection.
    ///
    /// An explicit directory is never reported as portable.
    pub fn resolve(data_dir: Option<&Path>) -> Self {
        match data_dir {
            Some(dir) => Self::from_base(dir, false),
            None => Self::detect(),
        }
    }

    /// Lay every path out below `base`
    pub fn from_base(base: &Path, is_portable: bool) -> Self {
        Self {
            config: base.join("config.yaml"),
            drivers_dir: base.join("gpu_drivers"),
            cache_dir: base.join("cache"),
            state_dir: base.join("state"),
            logs_dir: base.join("logs"),
            lib_dir: base.join("lib"),
            keys_dir: base.join("keys"),
            settings_document: base.join("settings.json"),
            is_portable,
        }
    }

    /// Get the base directory (for displaying in logs)
    pub fn base_dir(&self) -> PathBuf {
        self.config
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Ensure all required directories exist.
    pub fn ensure_directories(&self) -> anyhow::Result<()> {
        use anyhow::Context;

        for dir in [
            &self.drivers_dir,
            &self.cache_dir,
            &self.state_dir,
            &self.logs_dir,
            &self.lib_dir,
            &self.keys_dir,
        ] {
            if !dir.exists() {
                debug!("Creating directory: {}", dir.display());
                std::fs::create_dir_all(dir)
                    .with_context(|| format!("Failed to create {}", dir.display()))?;
            }
        }
        Ok(())
    }

    /// Get the sled database path (within state_dir)
    pub fn sled_db_path(&self) -> PathBuf {
        self.state_dir.join("sled")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_below_base() {
        let paths = AppPaths::from_base(Path::new("/data/emuctl"), false);

        assert!(!paths.is_portable);
        assert_eq!(paths.config, PathBuf::from("/data/emuctl/config.yaml"));
        assert_eq!(paths.sled_db_path(), PathBuf::from("/data/emuctl/state/sled"));
        assert_eq!(paths.base_dir(), PathBuf::from("/data/emuctl"));
    }

    #[test]
    fn test_data_dir_override_is_not_portable() {
        let paths = AppPaths::resolve(Some(Path::new("/srv/emuctl")));

        assert!(!paths.is_portable);
        assert_eq!(paths.base_dir(), PathBuf::from("/srv/emuctl"));
    }

    #[test]
    fn test_ensure_directories() {
        let temp = tempfile::tempdir().unwrap();
        let paths = AppPaths::from_base(temp.path(), true);

        paths.ensure_directories().unwrap();

        assert!(paths.drivers_dir.is_dir());
        assert!(paths.cache_dir.is_dir());
        assert!(paths.keys_dir.is_dir());
        // The config file is optional
        assert!(!paths.config.exists());
    }
}
