//! GPU driver registry
//!
//! Installed drivers live in one subdirectory each below the drivers directory,
//! described by their `meta.json`. The built-in system driver is always listed
//! and can never be deleted. Selection goes through the native bridge first and
//! is only persisted once the engine accepted the driver.

pub mod download;
pub mod fetch;
pub mod install;
pub mod metadata;

use crate::bridge::NativeBridge;
use crate::prefs::{keys, PrefValue, Preferences, PrefsError};
use std::collections::BTreeMap;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

pub use install::{InstallResult, PlatformSupport};
pub use metadata::{DriverLocation, DriverMetadata, PackageManifest, DEFAULT_DRIVER_NAME};

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("the default driver cannot be deleted")]
    DefaultNotDeletable,
    #[error("driver not found: {0}")]
    NotFound(String),
    #[error("the engine refused to load driver '{label}'")]
    LoadRejected { label: String },
    #[error("driver storage error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Prefs(#[from] PrefsError),
}

/// Filesystem layout and platform constraints of a registry
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    pub drivers_dir: PathBuf,
    /// Spool area for archives being installed
    pub cache_dir: PathBuf,
    /// Directory holding the engine's native libraries
    pub native_lib_dir: PathBuf,
    pub platform_api: u32,
}

/// Installed driver set plus the persisted selection
#[derive(Clone)]
pub struct DriverRegistry {
    inner: Arc<RegistryInner>,
}

struct RegistryInner {
    config: RegistryConfig,
    bridge: Arc<dyn NativeBridge>,
    prefs: Preferences,
    installing: AtomicBool,
    spool_seq: AtomicU64,
}

/// Clears the installing flag when dropped
struct InstallGuard<'a>(&'a AtomicBool);

impl<'a> InstallGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InstallGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl DriverRegistry {
    pub fn new(
        config: RegistryConfig,
        bridge: Arc<dyn NativeBridge>,
        prefs: Preferences,
    ) -> Result<Self, DriverError> {
        std::fs::create_dir_all(&config.drivers_dir)?;
        std::fs::create_dir_all(&config.cache_dir)?;

        Ok(Self {
            inner: Arc::new(RegistryInner {
                config,
                bridge,
                prefs,
                installing: AtomicBool::new(false),
                spool_seq: AtomicU64::new(0),
            }),
        })
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.inner.config
    }

    pub fn prefs(&self) -> &Preferences {
        &self.inner.prefs
    }

    /// All drivers, the system driver first
    pub fn list_drivers(&self) -> BTreeMap<DriverLocation, DriverMetadata> {
        let mut drivers = BTreeMap::new();
        drivers.insert(DriverLocation::System, DriverMetadata::system());

        let entries = match std::fs::read_dir(&self.inner.config.drivers_dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(
                    "Cannot read drivers directory {}: {}",
                    self.inner.config.drivers_dir.display(),
                    e
                );
                return drivers;
            }
        };

        for entry in entries.flatten() {
            let path = entry.path();
            let hidden = entry.file_name().to_string_lossy().starts_with('.');
            if hidden || !path.is_dir() {
                continue;
            }

            match DriverMetadata::read_from_dir(&path) {
                Ok(meta) => {
                    drivers.insert(DriverLocation::Installed(path), meta);
                }
                Err(e) => warn!("Skipping driver directory {}: {:#}", path.display(), e),
            }
        }

        debug!("Found {} driver(s)", drivers.len());
        drivers
    }

    /// Look a driver up by label, name or directory name (case-insensitive)
    pub fn find(&self, query: &str) -> Option<(DriverLocation, DriverMetadata)> {
        let query = query.trim();
        self.list_drivers().into_iter().find(|(location, meta)| {
            let dir_matches = location
                .dir()
                .and_then(Path::file_name)
                .map(|name| name.to_string_lossy().eq_ignore_ascii_case(query))
                .unwrap_or(false);
            dir_matches
                || meta.label.eq_ignore_ascii_case(query)
                || meta.name.eq_ignore_ascii_case(query)
        })
    }

    pub fn is_installing(&self) -> bool {
        self.inner.installing.load(Ordering::Acquire)
    }

    fn platform(&self) -> PlatformSupport {
        PlatformSupport {
            custom_driver_loading: self.inner.bridge.supports_custom_driver_loading(),
            api_level: self.inner.config.platform_api,
        }
    }

    fn spool_path(&self) -> PathBuf {
        let seq = self.inner.spool_seq.fetch_add(1, Ordering::Relaxed);
        self.inner
            .config
            .cache_dir
            .join(format!("incoming-{}-{}.zip", std::process::id(), seq))
    }

    /// Install a driver package read from `reader`
    ///
    /// The stream is spooled into the cache directory first; the spooled copy is
    /// removed whatever the outcome.
    pub fn install<R: Read>(&self, mut reader: R) -> InstallResult {
        let Some(_guard) = InstallGuard::acquire(&self.inner.installing) else {
            return InstallResult::Busy;
        };

        let spool = self.spool_path();
        let spooled = std::fs::File::create(&spool)
            .and_then(|mut file| std::io::copy(&mut reader, &mut file));

        let result = match spooled {
            Ok(bytes) => {
                debug!("Spooled {} bytes to {}", bytes, spool.display());
                self.install_locked(&spool)
            }
            Err(e) => InstallResult::IoFailure(e.to_string()),
        };

        if let Err(e) = std::fs::remove_file(&spool) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("Failed to remove spooled archive {}: {}", spool.display(), e);
            }
        }
        result
    }

    /// Install a driver package from a file on disk
    pub fn install_file(&self, archive: &Path) -> InstallResult {
        let Some(_guard) = InstallGuard::acquire(&self.inner.installing) else {
            return InstallResult::Busy;
        };
        self.install_locked(archive)
    }

    /// [`install_file`](Self::install_file) on the blocking pool
    pub async fn install_async(&self, archive: PathBuf) -> InstallResult {
        let registry = self.clone();
        match tokio::task::spawn_blocking(move || registry.install_file(&archive)).await {
            Ok(result) => result,
            Err(e) => InstallResult::IoFailure(format!("install task failed: {}", e)),
        }
    }

    fn install_locked(&self, archive: &Path) -> InstallResult {
        info!("📦 Installing driver from {}", archive.display());
        let result =
            install::install_package(archive, &self.inner.config.drivers_dir, self.platform());
        if !result.is_success() {
            warn!("{}", result);
        }
        result
    }

    fn metadata_for(&self, location: &DriverLocation) -> Result<DriverMetadata, DriverError> {
        match location {
            DriverLocation::System => Ok(DriverMetadata::system()),
            DriverLocation::Installed(dir) => DriverMetadata::read_from_dir(dir)
                .map_err(|e| DriverError::NotFound(format!("{} ({:#})", dir.display(), e))),
        }
    }

    /// Load a driver through the engine and persist the selection
    ///
    /// Nothing is persisted when the engine refuses the driver.
    pub fn select(&self, location: &DriverLocation) -> Result<(), DriverError> {
        let meta = self.metadata_for(location)?;
        let path = location.native_path();

        let accepted = self.inner.bridge.set_custom_driver(
            &path,
            &meta.library_name,
            &self.inner.config.native_lib_dir,
        );
        if !accepted {
            warn!("Engine rejected driver '{}'", meta.label);
            return Err(DriverError::LoadRejected { label: meta.label });
        }

        let prefs = &self.inner.prefs;
        prefs.set_many(vec![
            (keys::SELECTED_GPU_DRIVER, PrefValue::from(meta.label.as_str())),
            (keys::GPU_DRIVER_PATH, PrefValue::from(path)),
            (keys::GPU_DRIVER_NAME, PrefValue::from(meta.library_name.as_str())),
        ])?;
        prefs.sync()?;

        info!("✅ Selected driver '{}'", meta.label);
        Ok(())
    }

    /// Label of the selected driver
    pub fn selected(&self) -> String {
        self.inner
            .prefs
            .string(keys::SELECTED_GPU_DRIVER, DEFAULT_DRIVER_NAME)
    }

    /// Location of the selected driver, from the persisted path
    pub fn selected_location(&self) -> DriverLocation {
        match self.inner.prefs.get(keys::GPU_DRIVER_PATH) {
            Some(PrefValue::String(path)) if !path.is_empty() => {
                DriverLocation::Installed(PathBuf::from(path))
            }
            _ => DriverLocation::System,
        }
    }

    /// Re-apply the persisted selection at startup
    ///
    /// Falls back to the system driver when the selected package is gone or
    /// the engine no longer accepts it.
    pub fn restore_selection(&self) -> Result<String, DriverError> {
        let location = self.selected_location();
        if location != DriverLocation::System {
            match self.select(&location) {
                Ok(()) => return Ok(self.selected()),
                Err(e) => warn!("Cannot restore driver {}: {}, using default", location, e),
            }
        }
        self.select(&DriverLocation::System)?;
        Ok(self.selected())
    }

    pub fn can_delete(&self, location: &DriverLocation) -> bool {
        self.list_drivers()
            .get(location)
            .map(|meta| !meta.is_default())
            .unwrap_or(false)
    }

    /// Remove an installed driver
    ///
    /// Only directories listed below the drivers directory are removed.
    /// Deleting the selected driver switches the selection back to the system driver.
    pub fn delete(&self, location: &DriverLocation) -> Result<(), DriverError> {
        let dir = match location {
            DriverLocation::System => return Err(DriverError::DefaultNotDeletable),
            DriverLocation::Installed(dir) => dir,
        };
        let meta = self
            .list_drivers()
            .remove(location)
            .ok_or_else(|| DriverError::NotFound(dir.display().to_string()))?;
        if meta.is_default() {
            return Err(DriverError::DefaultNotDeletable);
        }

        let was_selected = self.selected_location() == *location;
        std::fs::remove_dir_all(dir)?;
        info!("🗑️  Deleted driver {}", dir.display());

        if was_selected {
            if let Err(e) = self.select(&DriverLocation::System) {
                warn!("Failed to switch back to the default driver: {}", e);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::install::build_package;
    use super::*;
    use crate::bridge::recording::RecordingBridge;
    use tempfile::TempDir;

    fn package(name: &str, version: &str) -> Vec<u8> {
        let meta = format!(
            r#"{{"name":"{}","description":"test","packageVersion":"{}","libraryName":"vulkan.test.so"}}"#,
            name, version
        );
        build_package(&[("meta.json", meta.as_bytes()), ("vulkan.test.so", b"\x7fELF")])
    }

    fn setup() -> (TempDir, Arc<RecordingBridge>, DriverRegistry) {
        let temp = TempDir::new().unwrap();
        let bridge = Arc::new(RecordingBridge::new());
        let prefs = Preferences::open(temp.path().join("state")).unwrap();
        let config = RegistryConfig {
            drivers_dir: temp.path().join("drivers"),
            cache_dir: temp.path().join("cache"),
            native_lib_dir: temp.path().join("lib"),
            platform_api: 33,
        };
        let registry = DriverRegistry::new(config, bridge.clone(), prefs).unwrap();
        (temp, bridge, registry)
    }

    fn installed(registry: &DriverRegistry, label: &str) -> DriverLocation {
        registry
            .list_drivers()
            .into_iter()
            .find(|(_, meta)| meta.label == label)
            .map(|(location, _)| location)
            .unwrap()
    }

    #[test]
    fn test_default_always_listed() {
        let (_temp, _bridge, registry) = setup();
        let drivers = registry.list_drivers();
        assert_eq!(drivers.len(), 1);
        assert!(drivers[&DriverLocation::System].is_default());
        assert_eq!(registry.selected(), DEFAULT_DRIVER_NAME);
    }

    #[test]
    fn test_install_lists_driver_and_cleans_spool() {
        let (_temp, _bridge, registry) = setup();

        let result = registry.install(package("Turnip", "1.0").as_slice());
        assert_eq!(result, InstallResult::Success);
        assert!(!registry.is_installing());

        let drivers = registry.list_drivers();
        assert_eq!(drivers.len(), 2);
        assert!(drivers.values().any(|meta| meta.label == "Turnip (1.0)"));

        let cache = &registry.config().cache_dir;
        assert_eq!(std::fs::read_dir(cache).unwrap().count(), 0);

        // Failed installs clean up too
        let result = registry.install(&b"garbage"[..]);
        assert_eq!(result, InstallResult::InvalidArchive);
        assert_eq!(std::fs::read_dir(cache).unwrap().count(), 0);
    }

    #[test]
    fn test_broken_package_dirs_are_skipped() {
        let (_temp, _bridge, registry) = setup();
        let drivers_dir = registry.config().drivers_dir.clone();
        std::fs::create_dir_all(drivers_dir.join("broken")).unwrap();
        std::fs::write(drivers_dir.join("broken/meta.json"), "{").unwrap();
        std::fs::create_dir_all(drivers_dir.join(".staging-x")).unwrap();

        assert_eq!(registry.list_drivers().len(), 1);
    }

    #[test]
    fn test_busy_while_installing() {
        let (_temp, _bridge, registry) = setup();
        let _guard = InstallGuard::acquire(&registry.inner.installing).unwrap();

        assert!(registry.is_installing());
        assert_eq!(
            registry.install(package("A", "1").as_slice()),
            InstallResult::Busy
        );
        assert_eq!(registry.list_drivers().len(), 1);
    }

    #[test]
    fn test_unsupported_when_bridge_cannot_load_custom_drivers() {
        let (_temp, bridge, registry) = setup();
        bridge.custom_drivers.store(false, Ordering::SeqCst);
        assert_eq!(
            registry.install(package("A", "1").as_slice()),
            InstallResult::Unsupported
        );
    }

    #[test]
    fn test_select_persists_on_success() {
        let (_temp, bridge, registry) = setup();
        registry.install(package("Turnip", "2.0").as_slice());
        let location = installed(&registry, "Turnip (2.0)");

        registry.select(&location).unwrap();

        assert_eq!(registry.selected(), "Turnip (2.0)");
        assert_eq!(registry.selected_location(), location);
        assert_eq!(
            registry.prefs().string(keys::GPU_DRIVER_NAME, ""),
            "vulkan.test.so"
        );
        let calls = bridge.driver_calls.lock();
        assert_eq!(calls.last().unwrap().0, location.native_path());
    }

    #[test]
    fn test_rejected_select_keeps_previous_selection() {
        let (_temp, bridge, registry) = setup();
        registry.install(package("Turnip", "2.0").as_slice());
        let location = installed(&registry, "Turnip (2.0)");

        bridge.reject_drivers();
        let err = registry.select(&location).unwrap_err();
        assert!(matches!(err, DriverError::LoadRejected { .. }));
        assert_eq!(registry.selected(), DEFAULT_DRIVER_NAME);
        assert!(!registry.prefs().contains(keys::GPU_DRIVER_PATH));
    }

    #[test]
    fn test_default_cannot_be_deleted() {
        let (_temp, _bridge, registry) = setup();
        assert!(!registry.can_delete(&DriverLocation::System));
        assert!(matches!(
            registry.delete(&DriverLocation::System),
            Err(DriverError::DefaultNotDeletable)
        ));
    }

    #[test]
    fn test_deleting_selected_driver_reselects_default() {
        let (_temp, bridge, registry) = setup();
        registry.install(package("Turnip", "3.0").as_slice());
        let location = installed(&registry, "Turnip (3.0)");
        registry.select(&location).unwrap();

        assert!(registry.can_delete(&location));
        registry.delete(&location).unwrap();

        assert_eq!(registry.list_drivers().len(), 1);
        assert_eq!(registry.selected(), DEFAULT_DRIVER_NAME);
        assert_eq!(registry.selected_location(), DriverLocation::System);
        assert_eq!(bridge.driver_calls.lock().last().unwrap().0, "");
    }

    #[test]
    fn test_delete_refuses_dirs_outside_drivers_dir() {
        let (temp, _bridge, registry) = setup();
        let outside = temp.path().join("outside");
        std::fs::create_dir_all(&outside).unwrap();
        std::fs::write(outside.join("keep.txt"), "data").unwrap();
        let location = DriverLocation::Installed(outside.clone());

        assert!(!registry.can_delete(&location));
        assert!(matches!(
            registry.delete(&location),
            Err(DriverError::NotFound(_))
        ));
        assert!(outside.join("keep.txt").exists());

        // Same for a path that escapes through `..`
        let escaping = DriverLocation::Installed(registry.config().drivers_dir.join("../outside"));
        assert!(matches!(
            registry.delete(&escaping),
            Err(DriverError::NotFound(_))
        ));
        assert!(outside.exists());
    }

    #[test]
    fn test_unreadable_package_is_not_deletable() {
        let (_temp, _bridge, registry) = setup();
        let broken = registry.config().drivers_dir.join("broken");
        std::fs::create_dir_all(&broken).unwrap();
        std::fs::write(broken.join("meta.json"), "{").unwrap();
        let location = DriverLocation::Installed(broken.clone());

        assert!(!registry.can_delete(&location));
        assert!(registry.delete(&location).is_err());
        assert!(broken.exists());
    }

    #[test]
    fn test_delete_removes_only_that_driver() {
        let (_temp, _bridge, registry) = setup();
        for version in ["1.0", "2.0", "3.0"] {
            assert_eq!(
                registry.install(package("Turnip", version).as_slice()),
                InstallResult::Success
            );
        }
        let first = installed(&registry, "Turnip (1.0)");
        let second = installed(&registry, "Turnip (2.0)");
        let third = installed(&registry, "Turnip (3.0)");

        registry.delete(&second).unwrap();

        let remaining: Vec<DriverLocation> = registry.list_drivers().into_keys().collect();
        let mut expected = vec![DriverLocation::System, first, third];
        expected.sort();
        assert_eq!(remaining, expected);
    }

    #[test]
    fn test_restore_falls_back_when_package_is_gone() {
        let (_temp, _bridge, registry) = setup();
        registry.install(package("Turnip", "4.0").as_slice());
        let location = installed(&registry, "Turnip (4.0)");
        registry.select(&location).unwrap();

        std::fs::remove_dir_all(location.dir().unwrap()).unwrap();

        assert_eq!(registry.restore_selection().unwrap(), DEFAULT_DRIVER_NAME);
    }

    #[test]
    fn test_find_by_label_or_dir() {
        let (_temp, _bridge, registry) = setup();
        registry.install(package("Turnip", "5.0").as_slice());

        assert!(registry.find("turnip (5.0)").is_some());
        assert!(registry.find("Turnip-5.0").is_some());
        assert_eq!(registry.find("default").unwrap().0, DriverLocation::System);
        assert!(registry.find("missing").is_none());
    }

    #[tokio::test]
    async fn test_install_async() {
        let (temp, _bridge, registry) = setup();
        let archive = temp.path().join("pkg.zip");
        std::fs::write(&archive, package("Async", "1")).unwrap();

        let result = registry.install_async(archive.clone()).await;
        assert_eq!(result, InstallResult::Success);
        // Caller-provided archives are left alone
        assert!(archive.exists());
    }
}
