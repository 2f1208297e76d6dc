// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Durable key-value storage for the session token, user snapshot, and
//! locale preference.

use crate::error::{ClientError, Result};
use dashmap::DashMap;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

/// Storage key names.
pub mod keys {
    pub const TOKEN: &str = "jallai_token";
    pub const USER: &str = "jallai_user";
    pub const LANGUAGE: &str = "jallai_language";
    pub const COUNTRY: &str = "jallai_country";
}

/// Minimal string key-value store.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;

    /// Write several entries; file-backed stores persist once.
    fn set_many(&self, entries: &[(&str, &str)]) -> Result<()> {
        for (key, value) in entries {
            self.set(key, value)?;
        }
        Ok(())
    }

    /// Remove several entries; file-backed stores persist once.
    fn remove_many(&self, keys: &[&str]) -> Result<()> {
        for key in keys {
            self.remove(key)?;
        }
        Ok(())
    }
}

/// In-memory store, lost on exit.
#[derive(Default)]
pub struct MemoryStore {
    entries: DashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).map(|v| v.value().clone())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }
}

/// Store persisted as a single JSON object on disk.
///
/// The whole map is rewritten through a temp file and rename on every
/// mutation, so a crash never leaves a half-written file behind. Mutations
/// hold `writer` from the in-memory change through the rename, so the file
/// always ends up matching the last change made.
pub struct FileStore {
    path: PathBuf,
    entries: DashMap<String, String>,
    writer: Mutex<()>,
}

impl FileStore {
    /// Open (or lazily create) the store at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let entries = DashMap::new();

        match fs::read_to_string(&path) {
            Ok(raw) if !raw.trim().is_empty() => {
                let map: BTreeMap<String, String> = serde_json::from_str(&raw).map_err(|e| {
                    ClientError::Storage(format!("Corrupt store {}: {}", path.display(), e))
                })?;
                for (k, v) in map {
                    entries.insert(k, v);
                }
            }
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(ClientError::Storage(format!(
                    "Failed to read {}: {}",
                    path.display(),
                    e
                )))
            }
        }

        tracing::debug!(path = %path.display(), entries = entries.len(), "Opened file store");
        Ok(Self {
            path,
            entries,
            writer: Mutex::new(()),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, ()>> {
        self.writer
            .lock()
            .map_err(|_| ClientError::Storage("Store writer poisoned".to_string()))
    }

    /// Write the current map to disk. The caller holds the writer lock.
    fn persist(&self, _writer: &MutexGuard<'_, ()>) -> Result<()> {
        let snapshot: BTreeMap<String, String> = self
            .entries
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();
        let json = serde_json::to_string_pretty(&snapshot)
            .map_err(|e| ClientError::Storage(e.to_string()))?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| ClientError::Storage(e.to_string()))?;
            }
        }

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(|e| ClientError::Storage(e.to_string()))?;
        fs::rename(&tmp, &self.path).map_err(|e| ClientError::Storage(e.to_string()))?;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).map(|v| v.value().clone())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let writer = self.lock()?;
        self.entries.insert(key.to_string(), value.to_string());
        self.persist(&writer)
    }

    fn remove(&self, key: &str) -> Result<()> {
        let writer = self.lock()?;
        if self.entries.remove(key).is_some() {
            self.persist(&writer)?;
        }
        Ok(())
    }

    fn set_many(&self, entries: &[(&str, &str)]) -> Result<()> {
        let writer = self.lock()?;
        for (key, value) in entries {
            self.entries.insert(key.to_string(), value.to_string());
        }
        self.persist(&writer)
    }

    fn remove_many(&self, keys: &[&str]) -> Result<()> {
        let writer = self.lock()?;
        let mut changed = false;
        for key in keys {
            changed |= self.entries.remove(*key).is_some();
        }
        if changed {
            self.persist(&writer)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("store.json");

        let store = FileStore::open(&path).unwrap();
        store
            .set_many(&[(keys::TOKEN, "abc"), (keys::LANGUAGE, "en")])
            .unwrap();
        store.remove(keys::LANGUAGE).unwrap();
        drop(store);

        let reopened = FileStore::open(&path).unwrap();
        assert_eq!(reopened.get(keys::TOKEN).as_deref(), Some("abc"));
        assert_eq!(reopened.get(keys::LANGUAGE), None);
    }

    #[test]
    fn test_file_store_concurrent_writes_match_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        let store = FileStore::open(&path).unwrap();
        store.set(keys::TOKEN, "abc").unwrap();

        std::thread::scope(|scope| {
            for i in 0..8 {
                let store = &store;
                scope.spawn(move || {
                    for j in 0..10 {
                        store.set(&format!("key-{}-{}", i, j), "v").unwrap();
                    }
                });
            }
            scope.spawn(|| store.remove_many(&[keys::TOKEN, keys::USER]).unwrap());
        });

        let reopened = FileStore::open(&path).unwrap();
        assert_eq!(reopened.get(keys::TOKEN), None);
        for i in 0..8 {
            for j in 0..10 {
                assert_eq!(reopened.get(&format!("key-{}-{}", i, j)).as_deref(), Some("v"));
            }
        }
    }

    #[test]
    fn test_file_store_rejects_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        fs::write(&path, "not json").unwrap();

        assert!(matches!(FileStore::open(&path), Err(ClientError::Storage(_))));
    }

    #[test]
    fn test_memory_store_remove_many() {
        let store = MemoryStore::new();
        store.set(keys::TOKEN, "t").unwrap();
        store.set(keys::USER, "{}").unwrap();
        store.remove_many(&[keys::TOKEN, keys::USER]).unwrap();
        assert!(store.get(keys::TOKEN).is_none());
        assert!(store.get(keys::USER).is_none());
    }
}
