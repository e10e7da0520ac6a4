//! Native engine bridge
//!
//! Every call into the emulator engine goes through [`NativeBridge`]. Calls are
//! synchronous and report success as a plain boolean, mirroring the engine ABI.

use std::path::Path;
use thiserror::Error;

pub mod console;

#[cfg(test)]
pub(crate) mod recording;

pub use console::ConsoleBridge;

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("failed to read settings document {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("settings document {path} is not valid JSON: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Boundary into the emulator engine
///
/// Note: implementations are shared as `Arc<dyn NativeBridge>` and must use
/// interior mutability for any state they keep.
pub trait NativeBridge: Send + Sync {
    /// Load a GPU driver. `path` is the package directory, or `""` for the system driver.
    fn set_custom_driver(&self, path: &str, library_name: &str, native_lib_dir: &Path) -> bool;

    /// Assign a JSON-encoded value to the setting at the `@@`-encoded `path`
    fn settings_set(&self, path: &str, json_value: &str) -> bool;

    /// Full settings document snapshot
    fn settings_get(&self) -> Option<String>;

    /// Version of an engine library, `None` if the file is not a usable library
    fn get_library_version(&self, path: &Path) -> Option<String>;

    /// Install a license key for the game at `game_path`
    fn install_key(&self, key_path: &Path, game_path: &str) -> bool;

    fn supports_custom_driver_loading(&self) -> bool;
}
