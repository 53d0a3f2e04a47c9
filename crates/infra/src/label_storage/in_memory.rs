use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};

use super::{LabelStorage, StorageError, sanitize_key};

/// In-memory blob store. Writes and removals can be made to fail on demand.
#[derive(Debug, Default)]
pub struct InMemoryLabelStorage {
    blobs: RwLock<HashMap<String, Vec<u8>>>,
    fail_writes: AtomicBool,
    fail_removes: AtomicBool,
}

impl InMemoryLabelStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_removes(&self, fail: bool) {
        self.fail_removes.store(fail, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.blobs.read().map(|b| b.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn poisoned() -> StorageError {
        StorageError::Unavailable("lock poisoned".to_string())
    }
}

impl LabelStorage for InMemoryLabelStorage {
    fn write(&self, key: &str, bytes: &[u8]) -> Result<(), StorageError> {
        let key = sanitize_key(key)?;
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable(format!("write of '{key}' refused")));
        }
        self.blobs
            .write()
            .map_err(|_| Self::poisoned())?
            .insert(key, bytes.to_vec());
        Ok(())
    }

    fn read(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let key = sanitize_key(key)?;
        Ok(self
            .blobs
            .read()
            .map_err(|_| Self::poisoned())?
            .get(&key)
            .cloned())
    }

    fn exists(&self, key: &str) -> Result<bool, StorageError> {
        let key = sanitize_key(key)?;
        Ok(self
            .blobs
            .read()
            .map_err(|_| Self::poisoned())?
            .contains_key(&key))
    }

    fn remove(&self, key: &str) -> Result<bool, StorageError> {
        let key = sanitize_key(key)?;
        if self.fail_removes.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable(format!("removal of '{key}' refused")));
        }
        Ok(self
            .blobs
            .write()
            .map_err(|_| Self::poisoned())?
            .remove(&key)
            .is_some())
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        Ok(PathBuf::from(format!("memory/{}.pdf", sanitize_key(key)?)))
    }
}
