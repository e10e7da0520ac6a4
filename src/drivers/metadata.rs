//! Driver package metadata (`meta.json`)

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Name and label of the built-in system driver
pub const DEFAULT_DRIVER_NAME: &str = "Default";

/// Metadata file at the root of every driver package
pub const METADATA_FILE: &str = "meta.json";

/// `meta.json` as shipped in driver packages
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageManifest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_version: Option<u32>,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub driver_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_api: Option<u32>,
    pub library_name: String,
}

impl PackageManifest {
    /// Reason the manifest cannot describe an installable driver, if any
    pub fn problem(&self) -> Option<&'static str> {
        if self.name.trim().is_empty() {
            Some("driver name is empty")
        } else if self.name == DEFAULT_DRIVER_NAME {
            Some("driver name is reserved")
        } else if self.library_name.trim().is_empty() {
            Some("library name is empty")
        } else if self.library_name.contains(['/', '\\']) {
            Some("library name must be a file name")
        } else {
            None
        }
    }
}

/// Metadata shown for a driver entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverMetadata {
    pub label: String,
    pub description: String,
    pub library_name: String,
    /// Identity marker; [`DEFAULT_DRIVER_NAME`] for the system driver
    pub name: String,
    pub author: Option<String>,
    pub vendor: Option<String>,
    pub driver_version: Option<String>,
    pub package_version: Option<String>,
    pub min_api: Option<u32>,
}

impl DriverMetadata {
    /// The system driver entry
    pub fn system() -> Self {
        Self {
            label: DEFAULT_DRIVER_NAME.to_string(),
            description: "System GPU driver".to_string(),
            library_name: String::new(),
            name: DEFAULT_DRIVER_NAME.to_string(),
            author: None,
            vendor: None,
            driver_version: None,
            package_version: None,
            min_api: None,
        }
    }

    pub fn from_manifest(manifest: PackageManifest) -> Self {
        let label = match &manifest.package_version {
            Some(version) if !version.is_empty() => format!("{} ({})", manifest.name, version),
            _ => manifest.name.clone(),
        };

        Self {
            label,
            description: manifest.description,
            library_name: manifest.library_name,
            name: manifest.name,
            author: manifest.author,
            vendor: manifest.vendor,
            driver_version: manifest.driver_version,
            package_version: manifest.package_version,
            min_api: manifest.min_api,
        }
    }

    /// Read `meta.json` from an installed package directory
    pub fn read_from_dir(dir: &Path) -> anyhow::Result<Self> {
        use anyhow::Context;

        let path = dir.join(METADATA_FILE);
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let manifest: PackageManifest = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(Self::from_manifest(manifest))
    }

    pub fn is_default(&self) -> bool {
        self.name == DEFAULT_DRIVER_NAME
    }

    /// Directory name used when installing this package
    pub fn install_dir_name(&self) -> String {
        let raw = match &self.package_version {
            Some(version) if !version.is_empty() => format!("{}-{}", self.name, version),
            _ => self.name.clone(),
        };
        sanitize_file_name(&raw)
    }
}

/// Replace characters that are unsafe in file names
pub fn sanitize_file_name(raw: &str) -> String {
    let cleaned: String = raw
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.').to_string();
    if cleaned.is_empty() {
        "driver".to_string()
    } else {
        cleaned
    }
}

/// Where a driver entry lives
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DriverLocation {
    /// Built-in system driver
    System,
    /// Installed package directory
    Installed(PathBuf),
}

impl DriverLocation {
    /// Path handed to the engine (`""` for the system driver)
    pub fn native_path(&self) -> String {
        match self {
            DriverLocation::System => String::new(),
            DriverLocation::Installed(dir) => dir.to_string_lossy().into_owned(),
        }
    }

    pub fn dir(&self) -> Option<&Path> {
        match self {
            DriverLocation::System => None,
            DriverLocation::Installed(dir) => Some(dir),
        }
    }
}

impl std::fmt::Display for DriverLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DriverLocation::System => write!(f, "<system>"),
            DriverLocation::Installed(dir) => write!(f, "{}", dir.display()),
        }
    }
}
