//! Durable string key/value backends
//!
//! The store only needs four primitives from its backing substrate. All take
//! `&self` so a backend can be shared (via `Rc`) between several store
//! handles, the way browser tabs share one LocalStorage.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("storage quota exceeded: {needed} bytes needed, {limit} allowed")]
    QuotaExceeded { needed: usize, limit: usize },
    #[error("storage I/O failed: {0}")]
    Io(#[from] io::Error),
    #[error("storage file is not a valid key/value map: {0}")]
    Corrupt(#[from] serde_json::Error),
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Minimal durable key/value substrate
pub trait Backend {
    fn get(&self, key: &str) -> Result<Option<String>, BackendError>;

    /// Insert or overwrite a value
    fn set(&self, key: &str, value: &str) -> Result<(), BackendError>;

    /// Remove a value; removing an absent key is not an error
    fn remove(&self, key: &str) -> Result<(), BackendError>;

    /// Every stored key, in whatever order the backend enumerates them
    fn keys(&self) -> Result<Vec<String>, BackendError>;
}

impl<B: Backend + ?Sized> Backend for Rc<B> {
    fn get(&self, key: &str) -> Result<Option<String>, BackendError> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), BackendError> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), BackendError> {
        (**self).remove(key)
    }

    fn keys(&self) -> Result<Vec<String>, BackendError> {
        (**self).keys()
    }
}

/// In-memory backend with an optional byte quota
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: RefCell<HashMap<String, String>>,
    quota: Option<usize>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject writes once keys plus values would exceed `bytes`
    pub fn with_quota(bytes: usize) -> Self {
        Self {
            entries: RefCell::default(),
            quota: Some(bytes),
        }
    }

    /// Bytes currently used by keys and values
    pub fn usage(&self) -> usize {
        self.entries
            .borrow()
            .iter()
            .map(|(k, v)| k.len() + v.len())
            .sum()
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

impl Backend for MemoryBackend {
    fn get(&self, key: &str) -> Result<Option<String>, BackendError> {
        Ok(self.entries.borrow().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), BackendError> {
        if let Some(limit) = self.quota {
            let replaced = self
                .entries
                .borrow()
                .get(key)
                .map(|old| key.len() + old.len())
                .unwrap_or(0);
            let needed = self.usage() - replaced + key.len() + value.len();
            if needed > limit {
                return Err(BackendError::QuotaExceeded { needed, limit });
            }
        }
        self.entries
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), BackendError> {
        self.entries.borrow_mut().remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, BackendError> {
        Ok(self.entries.borrow().keys().cloned().collect())
    }
}

/// Single JSON file holding every key
///
/// The whole map is read on open and rewritten on every mutation
/// (write to a sibling temp file, then rename over the original).
#[derive(Debug)]
pub struct FileBackend {
    path: PathBuf,
    entries: RefCell<BTreeMap<String, String>>,
}

impl FileBackend {
    /// Open (or lazily create) the store file at `path`
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, BackendError> {
        let path = path.into();
        let entries = match fs::read_to_string(&path) {
            Ok(text) if text.trim().is_empty() => BTreeMap::new(),
            Ok(text) => serde_json::from_str(&text)?,
            Err(err) if err.kind() == io::ErrorKind::NotFound => BTreeMap::new(),
            Err(err) => return Err(err.into()),
        };
        log::info!("Opened store file {} ({} keys)", path.display(), entries.len());
        Ok(Self {
            path,
            entries: RefCell::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Persist `next`, then adopt it as the in-memory state
    fn commit(&self, next: BTreeMap<String, String>) -> Result<(), BackendError> {
        let json = serde_json::to_string_pretty(&next)?;
        let tmp = self.path.with_extension("tmp");
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;
        *self.entries.borrow_mut() = next;
        Ok(())
    }
}

impl Backend for FileBackend {
    fn get(&self, key: &str) -> Result<Option<String>, BackendError> {
        Ok(self.entries.borrow().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), BackendError> {
        let mut next = self.entries.borrow().clone();
        next.insert(key.to_string(), value.to_string());
        self.commit(next)
    }

    fn remove(&self, key: &str) -> Result<(), BackendError> {
        if !self.entries.borrow().contains_key(key) {
            return Ok(());
        }
        let mut next = self.entries.borrow().clone();
        next.remove(key);
        self.commit(next)
    }

    fn keys(&self) -> Result<Vec<String>, BackendError> {
        Ok(self.entries.borrow().keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_set_get_remove() {
        let backend = MemoryBackend::new();
        assert_eq!(backend.get("a").unwrap(), None);

        backend.set("a", "1").unwrap();
        backend.set("a", "2").unwrap();
        assert_eq!(backend.get("a").unwrap().as_deref(), Some("2"));
        assert_eq!(backend.len(), 1);

        backend.remove("a").unwrap();
        backend.remove("a").unwrap();
        assert!(backend.is_empty());
    }

    #[test]
    fn test_memory_quota() {
        let backend = MemoryBackend::with_quota(10);
        backend.set("k", "12345").unwrap();
        // Overwriting counts only the new value
        backend.set("k", "123456789").unwrap();

        match backend.set("other", "xx") {
            Err(BackendError::QuotaExceeded { needed, limit }) => {
                assert_eq!(limit, 10);
                assert_eq!(needed, 17);
            }
            other => panic!("expected quota error, got {:?}", other),
        }
        assert_eq!(backend.get("other").unwrap(), None);
    }

    #[test]
    fn test_shared_through_rc() {
        let backend = Rc::new(MemoryBackend::new());
        let other = Rc::clone(&backend);
        backend.set("shared", "yes").unwrap();
        assert_eq!(other.get("shared").unwrap().as_deref(), Some("yes"));
    }

    #[test]
    fn test_file_backend_persists_across_opens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");

        let backend = FileBackend::open(&path).unwrap();
        backend.set("kpi_targets", r#"{"version":"1.0.0"}"#).unwrap();
        backend.set("kpi_goals", "[]").unwrap();
        backend.remove("kpi_goals").unwrap();
        drop(backend);

        let reopened = FileBackend::open(&path).unwrap();
        assert_eq!(reopened.keys().unwrap(), vec!["kpi_targets".to_string()]);
        assert_eq!(
            reopened.get("kpi_targets").unwrap().as_deref(),
            Some(r#"{"version":"1.0.0"}"#)
        );
        assert!(!path.with_extension("tmp").exists());
    }

    #[test]
    fn test_file_backend_rejects_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        fs::write(&path, "{not json").unwrap();

        assert!(matches!(FileBackend::open(&path), Err(BackendError::Corrupt(_))));
    }

    #[test]
    fn test_file_backend_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("store.json");

        let backend = FileBackend::open(&path).unwrap();
        backend.set("a", "1").unwrap();
        assert!(path.exists());
    }
}
