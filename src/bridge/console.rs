//! Console bridge - document-backed engine stand-in that logs every call
//!
//! This is useful for:
//! - Running the CLI without the native engine library
//! - Exercising driver selection and settings sync end to end
//! - Inspecting exactly which values the front-end sends to the engine
//!
//! Settings live in a JSON document on disk. Writes are validated the way the
//! engine validates them (type, enum variants, numeric bounds) and rejected
//! otherwise.

use super::{BridgeError, NativeBridge};
use crate::settings::{SettingLeaf, SettingPath, SettingValue};
use parking_lot::RwLock;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info, warn};

/// Marker searched in library files to report their version
const VERSION_MARKER: &[u8] = b"EMU_VERSION=";
const ELF_MAGIC: &[u8] = b"\x7fELF";

pub struct ConsoleBridge {
    /// Where the settings document is persisted (`None` keeps it in memory)
    document_path: Option<PathBuf>,
    document: RwLock<Value>,
    keys_dir: PathBuf,
    custom_driver_loading: bool,
    /// Native path of the loaded driver ("" for the system driver)
    active_driver: RwLock<Option<String>>,
    call_count: AtomicU64,
}

impl ConsoleBridge {
    /// Open the settings document at `document_path`, creating it from
    /// [`default_document`](Self::default_document) when missing
    pub fn open(
        document_path: impl Into<PathBuf>,
        keys_dir: impl Into<PathBuf>,
        custom_driver_loading: bool,
    ) -> Result<Self, BridgeError> {
        let document_path = document_path.into();

        let document = if document_path.exists() {
            let text = std::fs::read_to_string(&document_path).map_err(|source| {
                BridgeError::Read {
                    path: document_path.display().to_string(),
                    source,
                }
            })?;
            serde_json::from_str(&text).map_err(|source| BridgeError::Parse {
                path: document_path.display().to_string(),
                source,
            })?
        } else {
            info!(
                "No settings document at {}, starting from defaults",
                document_path.display()
            );
            Self::default_document()
        };

        let bridge = Self {
            document_path: Some(document_path),
            document: RwLock::new(document),
            keys_dir: keys_dir.into(),
            custom_driver_loading,
            active_driver: RwLock::new(None),
            call_count: AtomicU64::new(0),
        };
        bridge.persist(&bridge.document.read());
        Ok(bridge)
    }

    /// Bridge over an in-memory document
    pub fn in_memory(document: Value, keys_dir: impl Into<PathBuf>) -> Self {
        Self {
            document_path: None,
            document: RwLock::new(document),
            keys_dir: keys_dir.into(),
            custom_driver_loading: true,
            active_driver: RwLock::new(None),
            call_count: AtomicU64::new(0),
        }
    }

    /// Settings document used when none exists yet
    pub fn default_document() -> Value {
        json!({
            "Core": {
                "PPU Decoder": {
                    "type": "enum",
                    "value": "LLVM Recompiler",
                    "default": "LLVM Recompiler",
                    "variants": ["Interpreter", "LLVM Recompiler"]
                },
                "SPU Threads": {
                    "type": "uint", "value": "0", "default": "0", "min": "0", "max": "6"
                },
                "Accurate DFMA": { "type": "bool", "value": true, "default": true }
            },
            "Video": {
                "Renderer": {
                    "type": "enum",
                    "value": "Vulkan",
                    "default": "Vulkan",
                    "variants": ["Vulkan", "Null"]
                },
                "Resolution Scale": {
                    "type": "int", "value": "100", "default": "100", "min": "50", "max": "800"
                },
                "Write Color Buffers": { "type": "bool", "value": false, "default": false },
                "Vblank Frequency": {
                    "type": "float", "value": "60", "default": "60", "min": "30", "max": "120"
                }
            },
            "Audio": {
                "Master Volume": {
                    "type": "float", "value": "100", "default": "100", "min": "0", "max": "200"
                },
                "Enable Buffering": { "type": "bool", "value": true, "default": true }
            }
        })
    }

    /// Native path of the driver loaded by the last accepted `set_custom_driver`
    pub fn active_driver(&self) -> Option<String> {
        self.active_driver.read().clone()
    }

    pub fn call_count(&self) -> u64 {
        self.call_count.load(Ordering::Relaxed)
    }

    fn record_call(&self) -> u64 {
        self.call_count.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn persist(&self, document: &Value) {
        let Some(path) = &self.document_path else {
            return;
        };

        let result = serde_json::to_string_pretty(document)
            .map_err(|e| e.to_string())
            .and_then(|text| std::fs::write(path, text).map_err(|e| e.to_string()));
        if let Err(e) = result {
            warn!("Failed to persist settings document {}: {}", path.display(), e);
        }
    }
}

/// Interpret an engine-encoded value for `leaf`'s type
fn value_for_leaf(leaf: &SettingLeaf, encoded: &Value) -> Option<SettingValue> {
    match (leaf, encoded) {
        (SettingLeaf::Bool { .. }, Value::Bool(b)) => Some(SettingValue::Bool(*b)),
        (SettingLeaf::Enum { .. }, Value::String(s)) => Some(SettingValue::Enum(s.clone())),
        (SettingLeaf::Int { .. }, Value::Number(n)) => n.as_i64().map(SettingValue::Int),
        (SettingLeaf::Float { .. }, Value::Number(n)) => n.as_f64().map(SettingValue::Float),
        _ => None,
    }
}

/// Extract a printable version string following [`VERSION_MARKER`]
fn find_version(bytes: &[u8]) -> Option<String> {
    let start = bytes
        .windows(VERSION_MARKER.len())
        .position(|w| w == VERSION_MARKER)?
        + VERSION_MARKER.len();
    let version: String = bytes[start..]
        .iter()
        .take_while(|b| b.is_ascii_graphic())
        .map(|b| *b as char)
        .collect();
    (!version.is_empty()).then_some(version)
}

impl NativeBridge for ConsoleBridge {
    fn set_custom_driver(&self, path: &str, library_name: &str, native_lib_dir: &Path) -> bool {
        let call = self.record_call();
        info!(
            "🔌 [#{}] set_custom_driver(path={:?}, library={:?}, native_lib_dir={})",
            call,
            path,
            library_name,
            native_lib_dir.display()
        );

        let accepted = if path.is_empty() {
            true
        } else if !self.custom_driver_loading {
            warn!("Custom driver loading is disabled");
            false
        } else {
            let library = Path::new(path).join(library_name);
            let present = library.is_file();
            if !present {
                warn!("Driver library not found: {}", library.display());
            }
            present
        };

        if accepted {
            *self.active_driver.write() = Some(path.to_string());
        }
        accepted
    }

    fn settings_set(&self, path: &str, json_value: &str) -> bool {
        let call = self.record_call();
        info!("⚙️  [#{}] settings_set({}, {})", call, path, json_value);

        let Ok(encoded) = serde_json::from_str::<Value>(json_value) else {
            warn!("Value for {} is not valid JSON: {}", path, json_value);
            return false;
        };

        let setting_path = SettingPath::parse(path);
        let mut document = self.document.write();

        let mut node = &mut *document;
        for key in setting_path.segments() {
            match node.get_mut(key.as_str()) {
                Some(child) => node = child,
                None => {
                    warn!("Unknown setting {}", path);
                    return false;
                }
            }
        }

        let Some(obj) = node.as_object_mut() else {
            return false;
        };
        let Some(type_name) = obj.get("type").and_then(Value::as_str).map(str::to_string) else {
            warn!("{} is not a setting", path);
            return false;
        };

        let mut leaf = match SettingLeaf::from_object(&type_name, obj, &setting_path) {
            Ok(leaf) => leaf,
            Err(reason) => {
                warn!("Malformed setting {}: {}", path, reason);
                return false;
            }
        };

        let Some(value) = value_for_leaf(&leaf, &encoded) else {
            warn!("{} does not accept {}", path, json_value);
            return false;
        };
        if let Err(e) = leaf.validate(&setting_path, &value) {
            warn!("Rejected: {}", e);
            return false;
        }

        leaf.apply(value);
        leaf.write_value(obj);
        debug!("Setting {} stored", path);

        self.persist(&document);
        true
    }

    fn settings_get(&self) -> Option<String> {
        let call = self.record_call();
        debug!("[#{}] settings_get()", call);
        serde_json::to_string(&*self.document.read()).ok()
    }

    fn get_library_version(&self, path: &Path) -> Option<String> {
        let call = self.record_call();
        info!("[#{}] get_library_version({})", call, path.display());

        let bytes = std::fs::read(path).ok()?;
        if !bytes.starts_with(ELF_MAGIC) {
            return None;
        }
        Some(find_version(&bytes).unwrap_or_else(|| "unknown".to_string()))
    }

    fn install_key(&self, key_path: &Path, game_path: &str) -> bool {
        let call = self.record_call();
        info!(
            "🔑 [#{}] install_key({}, game={})",
            call,
            key_path.display(),
            game_path
        );

        let Ok(meta) = std::fs::metadata(key_path) else {
            warn!("Key file not found: {}", key_path.display());
            return false;
        };
        if !meta.is_file() || meta.len() == 0 {
            return false;
        }
        let Some(file_name) = key_path.file_name() else {
            return false;
        };

        let game_dir = Path::new(game_path)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "global".to_string());
        let target_dir = self.keys_dir.join(game_dir);

        let result = std::fs::create_dir_all(&target_dir)
            .and_then(|_| std::fs::copy(key_path, target_dir.join(file_name)));
        match result {
            Ok(_) => true,
            Err(e) => {
                warn!("Failed to store key: {}", e);
                false
            }
        }
    }

    fn supports_custom_driver_loading(&self) -> bool {
        self.custom_driver_loading
    }
}
