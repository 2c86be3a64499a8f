//! Durable credential persistence.
//!
//! The session store is a flat key/value map over a fixed set of keys. The
//! file-backed store survives restarts; the memory store is for embedding
//! and tests. Reading a key that was never written is not an error.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use parking_lot::Mutex;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreKey {
    /// Raw access token
    AuthToken,
    /// Raw renewal token
    RefreshToken,
    /// Display name of the logged-in user
    Username,
    /// JSON snapshot of the last fetched profile
    CurrentUser,
}

impl StoreKey {
    pub const ALL: [StoreKey; 4] = [
        StoreKey::AuthToken,
        StoreKey::RefreshToken,
        StoreKey::Username,
        StoreKey::CurrentUser,
    ];

    /// Persisted key name
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreKey::AuthToken => "authToken",
            StoreKey::RefreshToken => "refreshToken",
            StoreKey::Username => "username",
            StoreKey::CurrentUser => "currentUser",
        }
    }
}

pub trait SessionStore: Send + Sync {
    fn put(&self, key: StoreKey, value: &str) -> Result<()>;

    /// Read a key. Unreadable storage is reported as absent.
    fn get(&self, key: StoreKey) -> Option<String>;

    fn clear(&self, key: StoreKey) -> Result<()>;

    fn clear_all(&self) -> Result<()>;
}

/// In-process store. Lost on restart.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<StoreKey, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemoryStore {
    fn put(&self, key: StoreKey, value: &str) -> Result<()> {
        self.entries.lock().insert(key, value.to_string());
        Ok(())
    }

    fn get(&self, key: StoreKey) -> Option<String> {
        self.entries.lock().get(&key).cloned()
    }

    fn clear(&self, key: StoreKey) -> Result<()> {
        self.entries.lock().remove(&key);
        Ok(())
    }

    fn clear_all(&self) -> Result<()> {
        self.entries.lock().clear();
        Ok(())
    }
}

/// JSON file store, one object holding every key.
///
/// Each write rewrites the whole file through a temporary sibling and a
/// rename, so a crash never leaves a half-written session behind.
pub struct FileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_entries(&self) -> Result<BTreeMap<String, String>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let contents = std::fs::read_to_string(&self.path)
            .context("Failed to read session file")?;
        if contents.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&contents).context("Failed to parse session file")
    }

    fn write_entries(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        if entries.is_empty() {
            return self.remove_file();
        }
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .context("Failed to create session directory")?;
        }
        let tmp = self.path.with_extension("json.tmp");
        let contents = serde_json::to_string_pretty(entries)?;
        std::fs::write(&tmp, contents).context("Failed to write session file")?;
        std::fs::rename(&tmp, &self.path).context("Failed to replace session file")?;
        Ok(())
    }

    fn remove_file(&self) -> Result<()> {
        if self.path.exists() {
            std::fs::remove_file(&self.path).context("Failed to remove session file")?;
        }
        Ok(())
    }

    fn update(&self, f: impl FnOnce(&mut BTreeMap<String, String>)) -> Result<()> {
        let _guard = self.lock.lock();
        let mut entries = self.read_entries().unwrap_or_else(|e| {
            warn!(error = %e, path = %self.path.display(), "Discarding unreadable session file");
            BTreeMap::new()
        });
        f(&mut entries);
        self.write_entries(&entries)
    }
}

impl SessionStore for FileStore {
    fn put(&self, key: StoreKey, value: &str) -> Result<()> {
        self.update(|entries| {
            entries.insert(key.as_str().to_string(), value.to_string());
        })
    }

    fn get(&self, key: StoreKey) -> Option<String> {
        let _guard = self.lock.lock();
        match self.read_entries() {
            Ok(mut entries) => entries.remove(key.as_str()),
            Err(e) => {
                warn!(error = %e, key = key.as_str(), "Session file unreadable, treating key as absent");
                None
            }
        }
    }

    fn clear(&self, key: StoreKey) -> Result<()> {
        self.update(|entries| {
            entries.remove(key.as_str());
        })
    }

    fn clear_all(&self) -> Result<()> {
        let _guard = self.lock.lock();
        debug!(path = %self.path.display(), "Clearing session file");
        self.remove_file()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn exercise(store: &dyn SessionStore) {
        assert_eq!(store.get(StoreKey::AuthToken), None);

        store.put(StoreKey::AuthToken, "t1").unwrap();
        store.put(StoreKey::RefreshToken, "r1").unwrap();
        store.put(StoreKey::AuthToken, "t2").unwrap();
        assert_eq!(store.get(StoreKey::AuthToken).as_deref(), Some("t2"));
        assert_eq!(store.get(StoreKey::RefreshToken).as_deref(), Some("r1"));

        store.clear(StoreKey::RefreshToken).unwrap();
        assert_eq!(store.get(StoreKey::RefreshToken), None);
        // Clearing an absent key is fine
        store.clear(StoreKey::Username).unwrap();

        store.put(StoreKey::Username, "Awa").unwrap();
        store.clear_all().unwrap();
        for key in StoreKey::ALL {
            assert_eq!(store.get(key), None);
        }
    }

    #[test]
    fn test_memory_store_operations() {
        exercise(&MemoryStore::new());
    }

    #[test]
    fn test_file_store_operations() {
        let dir = TempDir::new().unwrap();
        exercise(&FileStore::new(dir.path().join("nested").join("session.json")));
    }

    #[test]
    fn test_file_store_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("session.json");

        let store = FileStore::new(&path);
        store.put(StoreKey::AuthToken, "t1").unwrap();
        store.put(StoreKey::CurrentUser, r#"{"id":1}"#).unwrap();
        drop(store);

        let reopened = FileStore::new(&path);
        assert_eq!(reopened.path(), path.as_path());
        assert_eq!(reopened.get(StoreKey::AuthToken).as_deref(), Some("t1"));
        assert_eq!(reopened.get(StoreKey::CurrentUser).as_deref(), Some(r#"{"id":1}"#));

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"authToken\""));
    }

    #[test]
    fn test_file_store_corrupt_file_reads_as_absent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, "not json").unwrap();

        let store = FileStore::new(&path);
        assert_eq!(store.get(StoreKey::AuthToken), None);

        // Writing recovers the file
        store.put(StoreKey::AuthToken, "t1").unwrap();
        assert_eq!(store.get(StoreKey::AuthToken).as_deref(), Some("t1"));
    }

    #[test]
    fn test_file_store_clear_all_removes_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("session.json");
        let store = FileStore::new(&path);
        store.put(StoreKey::AuthToken, "t1").unwrap();
        assert!(path.exists());
        store.clear_all().unwrap();
        assert!(!path.exists());
        store.clear_all().unwrap();
    }
}
