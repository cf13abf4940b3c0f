//! Read-only access to the key-value slot holding the serialized manifest
//!
//! The manifest is produced and written by something else (a build step, a
//! page script). This crate only ever reads it back by key.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use tracing::debug;

use crate::errors::{ManifestError, ManifestResult};

/// A key-value slot the manifest can be read from
pub trait ManifestStore: Send + Sync {
    /// Raw value stored under `key`, if any
    fn get_item(&self, key: &str) -> ManifestResult<Option<String>>;
}

/// In-memory store, useful for embedding and tests
#[derive(Debug, Default)]
pub struct MemoryStore {
    items: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store with a single item
    pub fn with_item(key: impl Into<String>, value: impl Into<String>) -> Self {
        let store = Self::new();
        store.set_item(key, value);
        store
    }

    /// Write an item; this is the producer side and not used by the prefetcher
    pub fn set_item(&self, key: impl Into<String>, value: impl Into<String>) {
        let mut items = self.items.write().unwrap_or_else(|e| e.into_inner());
        items.insert(key.into(), value.into());
    }
}

impl ManifestStore for MemoryStore {
    fn get_item(&self, key: &str) -> ManifestResult<Option<String>> {
        let items = self.items.read().unwrap_or_else(|e| e.into_inner());
        Ok(items.get(key).cloned())
    }
}

/// Directory-backed store: one file per key
#[derive(Debug, Clone)]
pub struct DirectoryStore {
    root: PathBuf,
}

impl DirectoryStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File that holds the value for `key`
    pub fn path_for(&self, key: &str) -> ManifestResult<PathBuf> {
        let is_plain = !key.is_empty()
            && key != "."
            && key != ".."
            && !key.contains(['/', '\\', '\0']);
        if !is_plain {
            return Err(ManifestError::InvalidKey {
                key: key.to_string(),
            });
        }
        Ok(self.root.join(key))
    }
}

impl ManifestStore for DirectoryStore {
    fn get_item(&self, key: &str) -> ManifestResult<Option<String>> {
        let path = self.path_for(key)?;
        match std::fs::read_to_string(&path) {
            Ok(content) => {
                debug!("Read {} bytes for key '{}' from {}", content.len(), key, path.display());
                Ok(Some(content))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(ManifestError::Io { path, source }),
        }
    }
}
