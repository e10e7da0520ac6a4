//! Scriptable bridge for unit tests

use super::NativeBridge;
use parking_lot::Mutex;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

/// Records every call and answers from configurable flags
pub(crate) struct RecordingBridge {
    pub accept_driver: AtomicBool,
    pub accept_settings: AtomicBool,
    pub custom_drivers: AtomicBool,
    pub snapshot: Mutex<Option<String>>,
    pub library_version: Mutex<Option<String>>,
    pub driver_calls: Mutex<Vec<(String, String)>>,
    pub settings_calls: Mutex<Vec<(String, String)>>,
}

impl RecordingBridge {
    pub fn new() -> Self {
        Self {
            accept_driver: AtomicBool::new(true),
            accept_settings: AtomicBool::new(true),
            custom_drivers: AtomicBool::new(true),
            snapshot: Mutex::new(None),
            library_version: Mutex::new(None),
            driver_calls: Mutex::new(Vec::new()),
            settings_calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_snapshot(snapshot: &str) -> Self {
        let bridge = Self::new();
        *bridge.snapshot.lock() = Some(snapshot.to_string());
        bridge
    }

    pub fn reject_drivers(&self) {
        self.accept_driver.store(false, Ordering::SeqCst);
    }

    pub fn reject_settings(&self, reject: bool) {
        self.accept_settings.store(!reject, Ordering::SeqCst);
    }
}

impl NativeBridge for RecordingBridge {
    fn set_custom_driver(&self, path: &str, library_name: &str, _native_lib_dir: &Path) -> bool {
        self.driver_calls
            .lock()
            .push((path.to_string(), library_name.to_string()));
        self.accept_driver.load(Ordering::SeqCst)
    }

    fn settings_set(&self, path: &str, json_value: &str) -> bool {
        self.settings_calls
            .lock()
            .push((path.to_string(), json_value.to_string()));
        self.accept_settings.load(Ordering::SeqCst)
    }

    fn settings_get(&self) -> Option<String> {
        self.snapshot.lock().clone()
    }

    fn get_library_version(&self, _path: &Path) -> Option<String> {
        self.library_version.lock().clone()
    }

    fn install_key(&self, _key_path: &Path, _game_path: &str) -> bool {
        true
    }

    fn supports_custom_driver_loading(&self) -> bool {
        self.custom_drivers.load(Ordering::SeqCst)
    }
}
