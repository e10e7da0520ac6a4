//! Driver package installation from zip archives

use super::metadata::{DriverMetadata, PackageManifest, METADATA_FILE};
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use tracing::{debug, info, warn};
use zip::result::ZipError;
use zip::ZipArchive;

/// Outcome of a driver installation attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallResult {
    Success,
    /// Not a zip archive, unsafe entry names, or the declared library is missing
    InvalidArchive,
    MissingMetadata,
    InvalidMetadata,
    /// Custom drivers cannot be loaded, or the package needs a newer platform
    Unsupported,
    AlreadyInstalled,
    /// Another installation is running on the same registry
    Busy,
    IoFailure(String),
}

impl InstallResult {
    pub fn is_success(&self) -> bool {
        matches!(self, InstallResult::Success)
    }
}

impl std::fmt::Display for InstallResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InstallResult::Success => write!(f, "Driver installed successfully"),
            InstallResult::InvalidArchive => {
                write!(f, "Failed to install the driver: invalid driver archive")
            }
            InstallResult::MissingMetadata => write!(
                f,
                "Failed to install the driver: the archive has no {}",
                METADATA_FILE
            ),
            InstallResult::InvalidMetadata => write!(
                f,
                "Failed to install the driver: {} is invalid",
                METADATA_FILE
            ),
            InstallResult::Unsupported => write!(
                f,
                "Failed to install the driver: custom drivers are not supported on this device"
            ),
            InstallResult::AlreadyInstalled => {
                write!(f, "Failed to install the driver: it is already installed")
            }
            InstallResult::Busy => write!(f, "Another driver installation is in progress"),
            InstallResult::IoFailure(reason) => {
                write!(f, "Failed to install the driver: {}", reason)
            }
        }
    }
}

/// Installation constraints of the running platform
#[derive(Debug, Clone, Copy)]
pub struct PlatformSupport {
    pub custom_driver_loading: bool,
    pub api_level: u32,
}

fn read_manifest<R: Read + io::Seek>(
    archive: &mut ZipArchive<R>,
) -> Result<PackageManifest, InstallResult> {
    let mut text = String::new();
    match archive.by_name(METADATA_FILE) {
        Ok(mut entry) => {
            if let Err(e) = entry.read_to_string(&mut text) {
                warn!("Unreadable {}: {}", METADATA_FILE, e);
                return Err(InstallResult::InvalidMetadata);
            }
        }
        Err(ZipError::FileNotFound) => return Err(InstallResult::MissingMetadata),
        Err(e) => {
            warn!("Failed to open {}: {}", METADATA_FILE, e);
            return Err(InstallResult::InvalidArchive);
        }
    }

    let manifest: PackageManifest = serde_json::from_str(&text).map_err(|e| {
        warn!("Failed to parse {}: {}", METADATA_FILE, e);
        InstallResult::InvalidMetadata
    })?;

    if let Some(problem) = manifest.problem() {
        warn!("Rejected {}: {}", METADATA_FILE, problem);
        return Err(InstallResult::InvalidMetadata);
    }
    Ok(manifest)
}

/// Extract every entry below `staging`, refusing names that escape it
fn extract_all<R: Read + io::Seek>(
    archive: &mut ZipArchive<R>,
    staging: &Path,
) -> Result<(), InstallResult> {
    for index in 0..archive.len() {
        let mut entry = archive.by_index(index).map_err(|e| {
            warn!("Corrupt archive entry #{}: {}", index, e);
            InstallResult::InvalidArchive
        })?;

        let Some(relative) = entry.enclosed_name() else {
            warn!("Archive entry escapes the package: {}", entry.name());
            return Err(InstallResult::InvalidArchive);
        };
        let target = staging.join(relative);

        let io_failure = |e: io::Error| InstallResult::IoFailure(e.to_string());
        if entry.is_dir() {
            std::fs::create_dir_all(&target).map_err(io_failure)?;
            continue;
        }

        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent).map_err(io_failure)?;
        }
        let mut out = File::create(&target).map_err(io_failure)?;
        io::copy(&mut entry, &mut out).map_err(|e| {
            // Corrupt deflate data surfaces as an io::Error while copying
            if e.kind() == io::ErrorKind::InvalidData {
                InstallResult::InvalidArchive
            } else {
                io_failure(e)
            }
        })?;
    }
    Ok(())
}

/// Validate the archive at `archive_path` and extract it into a new
/// subdirectory of `drivers_dir`.
pub fn install_package(
    archive_path: &Path,
    drivers_dir: &Path,
    platform: PlatformSupport,
) -> InstallResult {
    if !platform.custom_driver_loading {
        return InstallResult::Unsupported;
    }

    let file = match File::open(archive_path) {
        Ok(file) => file,
        Err(e) => return InstallResult::IoFailure(e.to_string()),
    };

    let mut archive = match ZipArchive::new(file) {
        Ok(archive) => archive,
        Err(e) => {
            warn!("Not a driver archive ({}): {}", archive_path.display(), e);
            return InstallResult::InvalidArchive;
        }
    };

    let manifest = match read_manifest(&mut archive) {
        Ok(manifest) => manifest,
        Err(result) => return result,
    };

    if let Some(min_api) = manifest.min_api {
        if min_api > platform.api_level {
            warn!(
                "Driver '{}' needs API level {}, platform has {}",
                manifest.name, min_api, platform.api_level
            );
            return InstallResult::Unsupported;
        }
    }

    if archive.by_name(&manifest.library_name).is_err() {
        warn!(
            "Driver '{}' does not contain its library {}",
            manifest.name, manifest.library_name
        );
        return InstallResult::InvalidArchive;
    }

    let metadata = DriverMetadata::from_manifest(manifest);
    let dir_name = metadata.install_dir_name();
    let target = drivers_dir.join(&dir_name);
    if target.exists() {
        return InstallResult::AlreadyInstalled;
    }

    // Extract next to the target so the final rename stays on one filesystem
    let staging = drivers_dir.join(format!(".staging-{}", dir_name));
    if staging.exists() {
        if let Err(e) = std::fs::remove_dir_all(&staging) {
            return InstallResult::IoFailure(e.to_string());
        }
    }
    if let Err(e) = std::fs::create_dir_all(&staging) {
        return InstallResult::IoFailure(e.to_string());
    }

    if let Err(result) = extract_all(&mut archive, &staging) {
        if let Err(e) = std::fs::remove_dir_all(&staging) {
            warn!("Failed to clean up {}: {}", staging.display(), e);
        }
        return result;
    }

    if let Err(e) = std::fs::rename(&staging, &target) {
        let _ = std::fs::remove_dir_all(&staging);
        return InstallResult::IoFailure(e.to_string());
    }

    info!("Installed driver '{}' into {}", metadata.label, target.display());
    debug!("Driver library: {}", metadata.library_name);
    InstallResult::Success
}

/// Zip archive builder for tests
#[cfg(test)]
pub(crate) fn build_package(entries: &[(&str, &[u8])]) -> Vec<u8> {
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    let mut writer = zip::ZipWriter::new(io::Cursor::new(Vec::new()));
    for (name, data) in entries {
        writer.start_file(*name, SimpleFileOptions::default()).unwrap();
        writer.write_all(data).unwrap();
    }
    writer.finish().unwrap().into_inner()
}
