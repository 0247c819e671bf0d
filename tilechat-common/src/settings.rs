//! Persisted user preferences.
//!
//! The only persisted state is the dark-mode flag. It is stored under the
//! `darkMode` key as the strings `"true"`/`"false"` in an injected
//! [`KeyValueStore`], so the UI never touches the filesystem directly.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::{ChatError, Result};

const DARK_MODE_KEY: &str = "darkMode";

/// Minimal string key-value storage, modelled on browser local storage.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
}

/// User-facing settings loaded from a [`KeyValueStore`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Settings {
    pub dark_mode: bool,
}

impl Settings {
    /// Load settings; a missing or unrecognised value means light mode.
    pub fn load(store: &dyn KeyValueStore) -> Result<Self> {
        let dark_mode = store.get(DARK_MODE_KEY)?.as_deref() == Some("true");
        Ok(Self { dark_mode })
    }

    pub fn save(&self, store: &dyn KeyValueStore) -> Result<()> {
        store.set(DARK_MODE_KEY, if self.dark_mode { "true" } else { "false" })
    }

    /// Flip the theme and persist the new value.
    pub fn toggle_theme(&mut self, store: &dyn KeyValueStore) -> Result<bool> {
        self.dark_mode = !self.dark_mode;
        self.save(store)?;
        tracing::info!(dark_mode = self.dark_mode, "theme toggled");
        Ok(self.dark_mode)
    }
}

/// In-process store, used by tests and when no data directory is available.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| ChatError::Storage("memory store poisoned".into()))?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| ChatError::Storage("memory store poisoned".into()))?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Store backed by a single JSON object file, rewritten on every `set`.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_map(&self) -> Result<BTreeMap<String, String>> {
        match std::fs::read_to_string(&self.path) {
            Ok(raw) if raw.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(raw) => serde_json::from_str(&raw).map_err(|e| {
                ChatError::Storage(format!("{} is not valid JSON: {e}", self.path.display()))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(ChatError::Storage(format!(
                "failed to read {}: {e}",
                self.path.display()
            ))),
        }
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let _guard = self
            .lock
            .lock()
            .map_err(|_| ChatError::Storage("settings lock poisoned".into()))?;
        Ok(self.read_map()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let _guard = self
            .lock
            .lock()
            .map_err(|_| ChatError::Storage("settings lock poisoned".into()))?;
        let mut map = self.read_map()?;
        map.insert(key.to_string(), value.to_string());

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                ChatError::Storage(format!("failed to create {}: {e}", parent.display()))
            })?;
        }
        let raw = serde_json::to_string_pretty(&map)
            .map_err(|e| ChatError::Storage(format!("failed to encode settings: {e}")))?;
        std::fs::write(&self.path, raw).map_err(|e| {
            ChatError::Storage(format!("failed to write {}: {e}", self.path.display()))
        })
    }
}
