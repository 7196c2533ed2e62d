//! Session-scoped key/value storage for draft snapshots.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::StorageError;
use crate::model::safe_name;

/// Session used when none is given, shared by every process.
pub const DEFAULT_SESSION: &str = "default";

/// String key/value storage scoped to one session.
pub trait DraftStorage: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
    /// Removing a missing key is not an error.
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// In-process storage; lives as long as the value.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl DraftStorage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entries().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.entries().remove(key);
        Ok(())
    }
}

/// A session id no other session uses.
pub fn new_session_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// One JSON file per key under `<root>/sessions/<session>/`.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    /// Storage for an explicit session id, or [`DEFAULT_SESSION`] when `None`.
    pub fn for_session(root: &Path, session: Option<&str>) -> Self {
        let session = session
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_SESSION);
        let dir = root.join("sessions").join(safe_name(session));
        tracing::debug!("draft storage dir={}", dir.display());
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", safe_name(key)))
    }
}

impl DraftStorage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        match std::fs::read_to_string(self.path_for(key)) {
            Ok(s) => Ok(Some(s)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        std::fs::create_dir_all(&self.dir)?;
        // Readers never observe a partially written snapshot.
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, value)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        match std::fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exercise(storage: &dyn DraftStorage) {
        assert_eq!(storage.get("k").expect("get"), None);
        storage.set("k", "v1").expect("set");
        storage.set("k", "v2").expect("set");
        assert_eq!(storage.get("k").expect("get").as_deref(), Some("v2"));
        storage.remove("k").expect("remove");
        storage.remove("k").expect("remove twice");
        assert_eq!(storage.get("k").expect("get"), None);
    }

    #[test]
    fn memory_storage_contract() {
        exercise(&MemoryStorage::new());
    }

    #[test]
    fn file_storage_contract() {
        let root = tempfile::tempdir().expect("tempdir");
        let storage = FileStorage::for_session(root.path(), Some("s1"));
        exercise(&storage);
        assert!(storage.dir().starts_with(root.path()));
    }

    #[test]
    fn file_sessions_are_isolated() {
        let root = tempfile::tempdir().expect("tempdir");
        let a = FileStorage::for_session(root.path(), Some("a"));
        let b = FileStorage::for_session(root.path(), Some("b"));
        a.set("agent-draft:create", "{}").expect("set");
        assert_eq!(b.get("agent-draft:create").expect("get"), None);
        let same = FileStorage::for_session(root.path(), Some("a"));
        assert_eq!(same.get("agent-draft:create").expect("get").as_deref(), Some("{}"));
        let id = new_session_id();
        let minted = FileStorage::for_session(root.path(), Some(&id));
        assert_ne!(minted.dir(), a.dir());
        assert!(minted.dir().ends_with(&id));
    }

    #[test]
    fn unnamed_sessions_share_the_default_dir() {
        let root = tempfile::tempdir().expect("tempdir");
        let first = FileStorage::for_session(root.path(), None);
        first.set("agent-draft:create", "{\"description\":\"x\"}").expect("set");
        let second = FileStorage::for_session(root.path(), None);
        assert_eq!(
            second.get("agent-draft:create").expect("get").as_deref(),
            Some("{\"description\":\"x\"}")
        );
        assert_eq!(second.dir(), FileStorage::for_session(root.path(), Some(" ")).dir());
        assert!(second.dir().ends_with(DEFAULT_SESSION));
        assert_eq!(std::fs::read_dir(root.path().join("sessions")).expect("ls").count(), 1);
    }
}
