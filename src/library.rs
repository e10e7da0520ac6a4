//! Development engine library installation

use crate::bridge::NativeBridge;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum LibraryError {
    #[error("failed to copy {path}: {source}")]
    Copy {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{0} is not a usable engine library")]
    NotALibrary(String),
}

/// Copies a development build of the engine library into the data directory
pub struct LibraryInstaller {
    lib_dir: PathBuf,
    file_name: String,
    bridge: Arc<dyn NativeBridge>,
}

impl LibraryInstaller {
    pub fn new(lib_dir: PathBuf, file_name: impl Into<String>, bridge: Arc<dyn NativeBridge>) -> Self {
        Self {
            lib_dir,
            file_name: file_name.into(),
            bridge,
        }
    }

    pub fn target(&self) -> PathBuf {
        self.lib_dir.join(&self.file_name)
    }

    /// Install `source` as the development library and return its version
    ///
    /// Replaces any previous copy. The copy is removed again when the engine
    /// cannot read a version from it.
    pub fn install(&self, source: &Path) -> Result<String, LibraryError> {
        let target = self.target();
        let copy_error = |source: std::io::Error| LibraryError::Copy {
            path: target.display().to_string(),
            source,
        };

        std::fs::create_dir_all(&self.lib_dir).map_err(copy_error)?;
        std::fs::copy(source, &target).map_err(copy_error)?;

        match self.bridge.get_library_version(&target) {
            Some(version) => {
                info!("Installed engine library {} ({})", target.display(), version);
                Ok(version)
            }
            None => {
                if let Err(e) = std::fs::remove_file(&target) {
                    warn!("Failed to remove rejected library {}: {}", target.display(), e);
                }
                Err(LibraryError::NotALibrary(source.display().to_string()))
            }
        }
    }
}
