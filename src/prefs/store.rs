//! Preferences store backed by sled
//!
//! Values are cached in memory and written through to sled on every change,
//! so a crash never loses an acknowledged write.

use super::types::PrefValue;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Prefix for preference keys in the sled database
const PREF_PREFIX: &str = "pref:";

#[derive(Debug, Error)]
pub enum PrefsError {
    #[error("preference storage error: {0}")]
    Storage(#[from] sled::Error),
    #[error("failed to encode preference: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("preference '{0}' must be a finite number")]
    NonFinite(String),
}

/// Serialized preference for persistence
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredPref {
    value: PrefValue,
    /// Milliseconds since epoch of the last write
    updated_at: i64,
}

struct PrefsInner {
    values: RwLock<HashMap<String, PrefValue>>,
    db: sled::Db,
}

/// Handle to the persisted preference store
///
/// Cheap to clone; all clones share the same cache and database.
#[derive(Clone)]
pub struct Preferences {
    inner: Arc<PrefsInner>,
}

impl Preferences {
    /// Open (or create) the preference database at `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self, PrefsError> {
        let path = path.as_ref();
        let db = sled::open(path)?;
        info!("Preferences opened at: {}", path.display());
        Ok(Self::new(db))
    }

    /// In-memory store that is discarded on drop
    pub fn temporary() -> Result<Self, PrefsError> {
        let db = sled::Config::new().temporary(true).open()?;
        Ok(Self::new(db))
    }

    /// Wrap an already opened sled database and load persisted values
    pub fn new(db: sled::Db) -> Self {
        let prefs = Self {
            inner: Arc::new(PrefsInner {
                values: RwLock::new(HashMap::new()),
                db,
            }),
        };

        prefs.load_from_db();
        prefs
    }

    fn load_from_db(&self) {
        let mut values = self.inner.values.write();

        for result in self.inner.db.scan_prefix(PREF_PREFIX) {
            match result {
                Ok((key, value)) => {
                    let Ok(key_str) = std::str::from_utf8(&key) else {
                        continue;
                    };
                    let name = key_str.strip_prefix(PREF_PREFIX).unwrap_or(key_str);

                    match serde_json::from_slice::<StoredPref>(&value) {
                        Ok(entry) => {
                            values.insert(name.to_string(), entry.value);
                        }
                        Err(e) => warn!("Ignoring unreadable preference '{}': {}", name, e),
                    }
                }
                Err(e) => warn!("Failed to read preference from sled: {}", e),
            }
        }

        debug!("Loaded {} preference(s)", values.len());
    }

    pub fn contains(&self, key: &str) -> bool {
        self.inner.values.read().contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<PrefValue> {
        self.inner.values.read().get(key).cloned()
    }

    fn encode_entry(key: &str, value: &PrefValue) -> Result<Vec<u8>, PrefsError> {
        // serde_json writes NaN and infinities as null, which cannot be read back
        if let PrefValue::Float(f) = value {
            if !f.is_finite() {
                return Err(PrefsError::NonFinite(key.to_string()));
            }
        }
        let entry = StoredPref {
            value: value.clone(),
            updated_at: chrono::Utc::now().timestamp_millis(),
        };
        Ok(serde_json::to_vec(&entry)?)
    }

    /// Set or remove (`None`) a preference
    pub fn set(&self, key: &str, value: Option<PrefValue>) -> Result<(), PrefsError> {
        let db_key = format!("{}{}", PREF_PREFIX, key);

        match value {
            None => {
                self.inner.db.remove(db_key.as_bytes())?;
                self.inner.values.write().remove(key);
                debug!("Preference removed: {}", key);
            }
            Some(value) => {
                let encoded = Self::encode_entry(key, &value)?;
                self.inner.db.insert(db_key.as_bytes(), encoded)?;
                debug!("Preference set: {} = {}", key, value);
                self.inner.values.write().insert(key.to_string(), value);
            }
        }

        Ok(())
    }

    /// Write several preferences in one atomic batch
    ///
    /// Either every value is stored or none is; the cache is only updated after
    /// the batch was applied.
    pub fn set_many(&self, entries: Vec<(&str, PrefValue)>) -> Result<(), PrefsError> {
        let mut batch = sled::Batch::default();
        for (key, value) in &entries {
            let encoded = Self::encode_entry(key, value)?;
            batch.insert(format!("{}{}", PREF_PREFIX, key).as_bytes(), encoded);
        }
        self.inner.db.apply_batch(batch)?;

        let mut values = self.inner.values.write();
        for (key, value) in entries {
            debug!("Preference set: {} = {}", key, value);
            values.insert(key.to_string(), value);
        }
        Ok(())
    }

    pub fn set_value(&self, key: &str, value: impl Into<PrefValue>) -> Result<(), PrefsError> {
        self.set(key, Some(value.into()))
    }

    pub fn remove(&self, key: &str) -> Result<(), PrefsError> {
        self.set(key, None)
    }

    /// Typed read: returns `def` when absent or stored with another type
    fn typed<T>(&self, key: &str, def: T, extract: impl FnOnce(&PrefValue) -> Option<T>) -> T {
        match self.inner.values.read().get(key) {
            None => def,
            Some(value) => match extract(value) {
                Some(v) => v,
                None => {
                    warn!(
                        "Preference '{}' has type {}, using default",
                        key,
                        value.type_name()
                    );
                    def
                }
            },
        }
    }

    pub fn string(&self, key: &str, def: &str) -> String {
        self.typed(key, def.to_string(), |v| v.as_str().map(str::to_string))
    }

    pub fn boolean(&self, key: &str, def: bool) -> bool {
        self.typed(key, def, PrefValue::as_bool)
    }

    pub fn int(&self, key: &str, def: i32) -> i32 {
        self.typed(key, def, PrefValue::as_int)
    }

    pub fn long(&self, key: &str, def: i64) -> i64 {
        self.typed(key, def, PrefValue::as_long)
    }

    pub fn float(&self, key: &str, def: f32) -> f32 {
        self.typed(key, def, PrefValue::as_float)
    }

    /// Snapshot of all preferences, sorted by key
    pub fn all(&self) -> BTreeMap<String, PrefValue> {
        self.inner
            .values
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Flush pending writes to disk
    pub fn sync(&self) -> Result<(), PrefsError> {
        self.inner.db.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prefs::keys;
    use tempfile::tempdir;

    #[test]
    fn test_set_and_get() {
        let prefs = Preferences::temporary().unwrap();

        prefs.set_value(keys::SELECTED_GPU_DRIVER, "Turnip").unwrap();
        prefs.set_value(keys::HAPTIC_FEEDBACK, false).unwrap();

        assert_eq!(prefs.string(keys::SELECTED_GPU_DRIVER, "Default"), "Turnip");
        assert!(!prefs.boolean(keys::HAPTIC_FEEDBACK, true));
        assert_eq!(prefs.int("missing", 7), 7);
    }

    #[test]
    fn test_remove_with_none() {
        let prefs = Preferences::temporary().unwrap();

        prefs.set_value("volume", 0.5f32).unwrap();
        assert!(prefs.contains("volume"));

        prefs.set("volume", None).unwrap();
        assert!(!prefs.contains("volume"));
        assert_eq!(prefs.float("volume", 1.0), 1.0);
    }

    #[test]
    fn test_type_mismatch_returns_default() {
        let prefs = Preferences::temporary().unwrap();

        prefs.set_value(keys::HAPTIC_FEEDBACK, "yes").unwrap();
        assert!(prefs.boolean(keys::HAPTIC_FEEDBACK, true));
        assert_eq!(prefs.long(keys::HAPTIC_FEEDBACK, 3), 3);
    }

    #[test]
    fn test_non_finite_float_is_rejected() {
        let temp = tempdir().unwrap();
        let db_path = temp.path().join("prefs.sled");

        {
            let prefs = Preferences::open(&db_path).unwrap();
            for value in [f32::NAN, f32::INFINITY, f32::NEG_INFINITY] {
                let err = prefs.set("volume", Some(PrefValue::Float(value))).unwrap_err();
                assert!(matches!(err, PrefsError::NonFinite(_)));
            }
            assert!(!prefs.contains("volume"));

            prefs.set_value("volume", 0.25f32).unwrap();
            prefs.sync().unwrap();
        }

        let prefs = Preferences::open(&db_path).unwrap();
        assert_eq!(prefs.float("volume", 1.0), 0.25);
    }

    #[test]
    fn test_set_many_is_all_or_nothing() {
        let prefs = Preferences::temporary().unwrap();
        prefs.set_value(keys::SELECTED_GPU_DRIVER, "Old").unwrap();

        let err = prefs
            .set_many(vec![
                (keys::SELECTED_GPU_DRIVER, PrefValue::from("New")),
                ("volume", PrefValue::Float(f32::NAN)),
            ])
            .unwrap_err();
        assert!(matches!(err, PrefsError::NonFinite(_)));
        assert_eq!(prefs.string(keys::SELECTED_GPU_DRIVER, ""), "Old");
        assert!(!prefs.contains("volume"));

        prefs
            .set_many(vec![
                (keys::SELECTED_GPU_DRIVER, PrefValue::from("New")),
                (keys::GPU_DRIVER_NAME, PrefValue::from("vulkan.so")),
            ])
            .unwrap();
        assert_eq!(prefs.string(keys::SELECTED_GPU_DRIVER, ""), "New");
        assert_eq!(prefs.string(keys::GPU_DRIVER_NAME, ""), "vulkan.so");
    }

    #[test]
    fn test_persistence_across_restarts() {
        let temp = tempdir().unwrap();
        let db_path = temp.path().join("prefs.sled");

        {
            let prefs = Preferences::open(&db_path).unwrap();
            prefs.set_value(keys::GPU_DRIVER_NAME, "vulkan.ad07xx.so").unwrap();
            prefs.set_value("boot_count", 12i64).unwrap();
            prefs.sync().unwrap();
        }

        {
            let prefs = Preferences::open(&db_path).unwrap();
            assert_eq!(prefs.string(keys::GPU_DRIVER_NAME, ""), "vulkan.ad07xx.so");
            assert_eq!(prefs.long("boot_count", 0), 12);
            assert_eq!(prefs.all().len(), 2);
        }
    }
}
