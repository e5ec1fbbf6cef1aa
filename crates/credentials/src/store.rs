use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;

/// Well-known key the access token is persisted under.
pub const DEFAULT_CREDENTIAL_KEY: &str = "poi_navigator.access_token";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("key-value storage unavailable")]
    StorageUnavailable,
    #[error("key-value storage corrupt: {0}")]
    Corrupt(String),
    #[error("key-value storage error: {0}")]
    Io(String),
}

/// Minimal string key-value capability.
///
/// Methods take `&self`: browser storage and files are shared resources, so
/// backends use interior mutability where they need it.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
    /// Returns `true` if a value was removed.
    fn remove(&self, key: &str) -> Result<bool, StoreError>;
}

/// Process-local store. Clones share the same entries, which lets tests
/// simulate a restart by handing a clone to a fresh owner.
#[derive(Debug, Default, Clone)]
pub struct InMemoryStore {
    entries: Arc<Mutex<BTreeMap<String, String>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl KeyValueStore for InMemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.entries.lock().remove(key).is_some())
    }
}

#[cfg(not(target_arch = "wasm32"))]
pub use file::FileStore;

#[cfg(not(target_arch = "wasm32"))]
mod file {
    use std::collections::BTreeMap;
    use std::io::Write;
    use std::path::PathBuf;

    use parking_lot::Mutex;

    use super::{KeyValueStore, StoreError};

    /// JSON object on disk, one string value per key.
    ///
    /// Writes go through a temp file in the same directory and are renamed into
    /// place, so a crash never leaves a half-written document behind.
    #[derive(Debug)]
    pub struct FileStore {
        path: PathBuf,
        // Serializes read-modify-write cycles within this process.
        lock: Mutex<()>,
    }

    impl FileStore {
        pub fn new(path: impl Into<PathBuf>) -> Self {
            Self {
                path: path.into(),
                lock: Mutex::new(()),
            }
        }

        fn load(&self) -> Result<BTreeMap<String, String>, StoreError> {
            let raw = match std::fs::read_to_string(&self.path) {
                Ok(raw) => raw,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
                Err(e) => return Err(StoreError::Io(format!("read {:?}: {e}", self.path))),
            };
            if raw.trim().is_empty() {
                return Ok(BTreeMap::new());
            }
            serde_json::from_str(&raw).map_err(|e| StoreError::Corrupt(e.to_string()))
        }

        fn save(&self, entries: &BTreeMap<String, String>) -> Result<(), StoreError> {
            let dir = match self.path.parent() {
                Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
                _ => PathBuf::from("."),
            };
            std::fs::create_dir_all(&dir)
                .map_err(|e| StoreError::Io(format!("create {dir:?}: {e}")))?;

            let raw = serde_json::to_string_pretty(entries)
                .map_err(|e| StoreError::Io(e.to_string()))?;
            let mut tmp = tempfile::NamedTempFile::new_in(&dir)
                .map_err(|e| StoreError::Io(format!("temp file in {dir:?}: {e}")))?;
            tmp.write_all(raw.as_bytes())
                .map_err(|e| StoreError::Io(e.to_string()))?;
            tmp.persist(&self.path)
                .map_err(|e| StoreError::Io(format!("persist {:?}: {e}", self.path)))?;
            Ok(())
        }
    }

    impl KeyValueStore for FileStore {
        fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
            let _guard = self.lock.lock();
            Ok(self.load()?.remove(key))
        }

        fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
            let _guard = self.lock.lock();
            let mut entries = self.load()?;
            entries.insert(key.to_string(), value.to_string());
            self.save(&entries)
        }

        fn remove(&self, key: &str) -> Result<bool, StoreError> {
            let _guard = self.lock.lock();
            let mut entries = self.load()?;
            let existed = entries.remove(key).is_some();
            if existed {
                self.save(&entries)?;
            }
            Ok(existed)
        }
    }
}

/// A store bound to one key: the only persisted state the navigator owns.
#[derive(Clone)]
pub struct ScopedStore {
    store: Arc<dyn KeyValueStore>,
    key: String,
}

impl ScopedStore {
    pub fn new(store: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }

    pub fn with_default_key(store: Arc<dyn KeyValueStore>) -> Self {
        Self::new(store, DEFAULT_CREDENTIAL_KEY)
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn get(&self) -> Result<Option<String>, StoreError> {
        self.store.get(&self.key)
    }

    pub fn set(&self, value: &str) -> Result<(), StoreError> {
        self.store.set(&self.key, value)
    }

    pub fn remove(&self) -> Result<bool, StoreError> {
        self.store.remove(&self.key)
    }
}

impl std::fmt::Debug for ScopedStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopedStore").field("key", &self.key).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn in_memory_clones_share_entries() {
        let a = InMemoryStore::new();
        let b = a.clone();
        a.set("k", "v").unwrap();
        assert_eq!(b.get("k").unwrap(), Some("v".to_string()));
        assert!(b.remove("k").unwrap());
        assert!(!a.remove("k").unwrap());
        assert!(a.is_empty());
    }

    #[test]
    fn scoped_store_touches_only_its_key() {
        let backing = InMemoryStore::new();
        backing.set("other", "keep").unwrap();
        let scoped = ScopedStore::with_default_key(Arc::new(backing.clone()));

        assert_eq!(scoped.get().unwrap(), None);
        scoped.set("pk.abc").unwrap();
        assert_eq!(
            backing.get(DEFAULT_CREDENTIAL_KEY).unwrap(),
            Some("pk.abc".to_string())
        );
        assert!(scoped.remove().unwrap());
        assert_eq!(backing.get("other").unwrap(), Some("keep".to_string()));
        assert_eq!(backing.len(), 1);
    }

    #[cfg(not(target_arch = "wasm32"))]
    #[test]
    fn file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("store.json");

        let store = FileStore::new(&path);
        assert_eq!(store.get("token").unwrap(), None);
        store.set("token", "pk.123").unwrap();
        store.set("other", "x").unwrap();

        let reopened = FileStore::new(&path);
        assert_eq!(reopened.get("token").unwrap(), Some("pk.123".to_string()));
        assert!(reopened.remove("token").unwrap());
        assert!(!reopened.remove("token").unwrap());
        assert_eq!(store.get("other").unwrap(), Some("x".to_string()));
    }

    #[cfg(not(target_arch = "wasm32"))]
    #[test]
    fn file_store_reports_corrupt_documents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        std::fs::write(&path, "not json").unwrap();
        let store = FileStore::new(&path);
        assert!(matches!(store.get("token"), Err(StoreError::Corrupt(_))));
    }
}
