//! Key/value settings with persistence and change notification.
//!
//! Keys are slash-separated strings such as `ssl`, `login/auto_login` or
//! `auth/username`. Values are JSON, so any serde type can be stored.
//! Writing a value equal to the caller's default removes the key, which
//! keeps files small and lets a lower [`MixedSettings`] layer show through.

use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::error::StoreError;
use crate::persistence::{default_settings_path, save_json, site_settings_path};

fn decode_or<T: DeserializeOwned>(key: &str, value: Option<Value>, default: T) -> T {
    let Some(value) = value else {
        return default;
    };
    serde_json::from_value(value).unwrap_or_else(|e| {
        warn!(key, error = %e, "Stored setting has unexpected type, using default");
        default
    })
}

// ============================================================================
// Settings Store
// ============================================================================

/// Persistent key/value settings store with change notifications.
pub struct SettingsStore {
    values: RwLock<BTreeMap<String, Value>>,
    path: Option<PathBuf>,
    dirty: AtomicBool,
    notify: watch::Sender<u64>,
}

impl SettingsStore {
    fn with_values(values: BTreeMap<String, Value>, path: Option<PathBuf>) -> Self {
        let (notify, _) = watch::channel(0);
        Self {
            values: RwLock::new(values),
            path,
            dirty: AtomicBool::new(false),
            notify,
        }
    }

    /// Creates an empty store that never touches disk.
    pub fn in_memory() -> Self {
        Self::with_values(BTreeMap::new(), None)
    }

    /// Creates an empty store backed by `path`.
    ///
    /// Nothing is read; see [`SettingsStore::load`].
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_values(BTreeMap::new(), Some(path.into()))
    }

    /// Loads the shared profile settings from the default path.
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but cannot be parsed.
    pub async fn load_default() -> Result<Self, StoreError> {
        Self::load(default_settings_path()).await
    }

    /// Loads the settings of one site from the default location.
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but cannot be parsed.
    pub async fn load_site(site: &str) -> Result<Self, StoreError> {
        Self::load(site_settings_path(site)).await
    }

    /// Loads settings from a path. A missing file yields an empty store.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or is not a JSON object.
    pub async fn load(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let values = match tokio::fs::read_to_string(&path).await {
            Ok(content) => {
                info!(path = %path.display(), "Loading settings");
                match serde_json::from_str::<Value>(&content)? {
                    Value::Object(map) => map.into_iter().collect(),
                    _ => {
                        return Err(StoreError::NotAnObject {
                            path: path.display().to_string(),
                        });
                    }
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "Settings file not found, starting empty");
                BTreeMap::new()
            }
            Err(e) => return Err(e.into()),
        };

        Ok(Self::with_values(values, Some(path)))
    }

    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<String, Value>> {
        self.values.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<String, Value>> {
        self.values.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Backing file, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Returns the raw JSON value stored under `key`.
    pub fn get_value(&self, key: &str) -> Option<Value> {
        self.read().get(key).cloned()
    }

    /// Returns the value under `key`, or `default` if absent.
    ///
    /// A stored value of the wrong shape also yields `default`.
    pub fn get<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        decode_or(key, self.get_value(key), default)
    }

    /// Returns true if `key` is stored.
    pub fn contains(&self, key: &str) -> bool {
        self.read().contains_key(key)
    }

    /// Stores `value` under `key`, or removes the key when it equals `default`.
    ///
    /// # Errors
    ///
    /// Returns error if `value` cannot be serialized.
    pub fn set<T: Serialize + PartialEq>(&self, key: &str, value: &T, default: &T) -> Result<(), StoreError> {
        if value == default {
            self.remove(key);
            return Ok(());
        }
        self.set_value(key, serde_json::to_value(value)?);
        Ok(())
    }

    /// Stores a raw JSON value.
    pub fn set_value(&self, key: &str, value: Value) {
        let previous = self.write().insert(key.to_string(), value.clone());
        if previous.as_ref() != Some(&value) {
            debug!(key, "Setting changed");
            self.mark_changed();
        }
    }

    /// Removes `key`, returning true if it was stored.
    pub fn remove(&self, key: &str) -> bool {
        let removed = self.write().remove(key).is_some();
        if removed {
            debug!(key, "Setting removed");
            self.mark_changed();
        }
        removed
    }

    /// Stored keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        self.read().keys().cloned().collect()
    }

    /// Returns true if changes have not been written yet.
    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    /// Writes pending changes to the backing file.
    ///
    /// In-memory stores and clean stores are left alone.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be written.
    pub async fn sync(&self) -> Result<(), StoreError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if !self.dirty.swap(false, Ordering::AcqRel) {
            return Ok(());
        }

        let snapshot: Map<String, Value> = self
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        if let Err(e) = save_json(path, &snapshot).await {
            self.dirty.store(true, Ordering::Release);
            return Err(e);
        }
        info!(path = %path.display(), keys = snapshot.len(), "Settings saved");
        Ok(())
    }

    /// Subscribes to changes. The value is a change counter.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.notify.subscribe()
    }

    fn mark_changed(&self) {
        self.dirty.store(true, Ordering::Release);
        self.notify.send_modify(|version| *version += 1);
    }
}

impl std::fmt::Debug for SettingsStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SettingsStore")
            .field("path", &self.path)
            .field("keys", &self.read().len())
            .field("dirty", &self.is_dirty())
            .finish()
    }
}

// ============================================================================
// Mixed Settings
// ============================================================================

/// Layered settings: reads fall through the layers, writes hit the first.
///
/// A site typically layers its own store over the shared profile store,
/// so a profile-wide `ssl` can be overridden per site.
#[derive(Debug, Clone)]
pub struct MixedSettings {
    layers: Vec<Arc<SettingsStore>>,
}

impl MixedSettings {
    /// Creates layered settings, most specific layer first.
    ///
    /// # Errors
    ///
    /// Returns error if `layers` is empty.
    pub fn new(layers: Vec<Arc<SettingsStore>>) -> Result<Self, StoreError> {
        if layers.is_empty() {
            return Err(StoreError::Config("mixed settings need at least one layer".into()));
        }
        Ok(Self { layers })
    }

    /// Single in-memory layer.
    pub fn in_memory() -> Self {
        Self {
            layers: vec![Arc::new(SettingsStore::in_memory())],
        }
    }

    /// Adds a fallback layer below the existing ones.
    pub fn with_fallback(mut self, layer: Arc<SettingsStore>) -> Self {
        self.layers.push(layer);
        self
    }

    /// The layer that receives writes.
    pub fn primary(&self) -> &Arc<SettingsStore> {
        &self.layers[0]
    }

    /// All layers, most specific first.
    pub fn layers(&self) -> &[Arc<SettingsStore>] {
        &self.layers
    }

    /// Returns the first stored value for `key` across the layers.
    pub fn get_value(&self, key: &str) -> Option<Value> {
        self.layers.iter().find_map(|layer| layer.get_value(key))
    }

    /// Returns the value under `key`, or `default` if no layer stores it.
    pub fn get<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        decode_or(key, self.get_value(key), default)
    }

    /// Returns true if any layer stores `key`.
    pub fn contains(&self, key: &str) -> bool {
        self.layers.iter().any(|layer| layer.contains(key))
    }

    /// Writes to the primary layer. See [`SettingsStore::set`].
    ///
    /// # Errors
    ///
    /// Returns error if `value` cannot be serialized.
    pub fn set<T: Serialize + PartialEq>(&self, key: &str, value: &T, default: &T) -> Result<(), StoreError> {
        self.primary().set(key, value, default)
    }

    /// Removes `key` from the primary layer.
    pub fn remove(&self, key: &str) -> bool {
        self.primary().remove(key)
    }

    /// Writes pending changes of every layer.
    ///
    /// # Errors
    ///
    /// Returns the first write error; later layers are still attempted.
    pub async fn sync(&self) -> Result<(), StoreError> {
        let mut first_error = None;
        for layer in &self.layers {
            if let Err(e) = layer.sync().await {
                warn!(error = %e, "Failed to sync settings layer");
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Subscribes to changes of the primary layer.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.primary().subscribe()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_returns_default_when_absent() {
        let store = SettingsStore::in_memory();
        assert!(store.get("ssl", true));
        assert_eq!(store.get("login/timeout", 30_u64), 30);
    }

    #[test]
    fn test_set_and_get_roundtrip() {
        let store = SettingsStore::in_memory();
        store.set("auth/username", &"alice".to_string(), &String::new()).unwrap();
        assert_eq!(store.get("auth/username", String::new()), "alice");
        assert!(store.is_dirty());
    }

    #[test]
    fn test_set_to_default_removes_key() {
        let store = SettingsStore::in_memory();
        store.set("ssl", &false, &true).unwrap();
        assert!(store.contains("ssl"));

        store.set("ssl", &true, &true).unwrap();
        assert!(!store.contains("ssl"));
        assert!(store.get("ssl", true));
    }

    #[test]
    fn test_wrong_type_falls_back_to_default() {
        let store = SettingsStore::in_memory();
        store.set_value("ssl", Value::String("yes".into()));
        assert!(!store.get("ssl", false));
    }

    #[test]
    fn test_subscribe_sees_changes() {
        let store = SettingsStore::in_memory();
        let rx = store.subscribe();

        store.set_value("a", Value::from(1));
        store.set_value("a", Value::from(1));
        store.remove("a");
        store.remove("a");

        // one insert and one removal
        assert_eq!(*rx.borrow(), 2);
    }

    #[tokio::test]
    async fn test_sync_writes_and_reloads() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("sites").join("booru.json");

        let store = SettingsStore::load(&path).await.unwrap();
        assert!(store.keys().is_empty());
        store.set("ssl", &false, &true).unwrap();
        store.sync().await.unwrap();
        assert!(!store.is_dirty());

        let reloaded = SettingsStore::load(&path).await.unwrap();
        assert!(!reloaded.get("ssl", true));
    }

    #[tokio::test]
    async fn test_sync_in_memory_is_noop() {
        let store = SettingsStore::in_memory();
        store.set_value("a", Value::from(1));
        store.sync().await.unwrap();
        assert!(store.path().is_none());
    }

    #[tokio::test]
    async fn test_load_rejects_non_object() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("bad.json");
        tokio::fs::write(&path, "[1, 2]").await.unwrap();

        let err = SettingsStore::load(&path).await.unwrap_err();
        assert!(matches!(err, StoreError::NotAnObject { .. }));
    }

    #[test]
    fn test_mixed_reads_fall_through() {
        let site = Arc::new(SettingsStore::in_memory());
        let profile = Arc::new(SettingsStore::in_memory());
        profile.set_value("ssl", Value::Bool(false));
        profile.set_value("login/auto_login", Value::Bool(false));
        site.set_value("ssl", Value::Bool(true));

        let mixed = MixedSettings::new(vec![site, Arc::clone(&profile)]).unwrap();
        assert!(mixed.get("ssl", false));
        assert!(!mixed.get("login/auto_login", true));
        assert!(mixed.contains("login/auto_login"));
    }

    #[test]
    fn test_mixed_writes_hit_primary() {
        let profile = Arc::new(SettingsStore::in_memory());
        let mixed = MixedSettings::in_memory().with_fallback(Arc::clone(&profile));

        mixed.set("ssl", &false, &true).unwrap();
        assert!(mixed.primary().contains("ssl"));
        assert!(!profile.contains("ssl"));
        assert_eq!(mixed.layers().len(), 2);
    }

    #[test]
    fn test_mixed_requires_a_layer() {
        assert!(MixedSettings::new(Vec::new()).is_err());
    }
}
