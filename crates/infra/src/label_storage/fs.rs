use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::{LabelStorage, StorageError, sanitize_key};

/// Label PDFs stored as `<root>/<sanitized key>.pdf`.
#[derive(Debug, Clone)]
pub struct FsLabelStorage {
    root: PathBuf,
}

impl FsLabelStorage {
    /// Create the root directory if needed.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|source| StorageError::Io {
            key: root.display().to_string(),
            source,
        })?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn io(key: &str, source: std::io::Error) -> StorageError {
        StorageError::Io {
            key: key.to_string(),
            source,
        }
    }
}

impl LabelStorage for FsLabelStorage {
    fn write(&self, key: &str, bytes: &[u8]) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        // Write beside the target and rename so readers never see partial files.
        let staging = path.with_extension("pdf.partial");
        fs::write(&staging, bytes).map_err(|e| Self::io(key, e))?;
        fs::rename(&staging, &path).map_err(|e| Self::io(key, e))?;
        debug!(key, path = %path.display(), size = bytes.len(), "label blob written");
        Ok(())
    }

    fn read(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let path = self.path_for(key)?;
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Self::io(key, e)),
        }
    }

    fn exists(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self.path_for(key)?.is_file())
    }

    fn remove(&self, key: &str) -> Result<bool, StorageError> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(Self::io(key, e)),
        }
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        Ok(self.root.join(format!("{}.pdf", sanitize_key(key)?)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn write_read_remove() {
        let dir = TempDir::new().unwrap();
        let storage = FsLabelStorage::new(dir.path().join("labels")).unwrap();

        assert_eq!(storage.read("abc").unwrap(), None);
        storage.write("abc", b"%PDF-1.4").unwrap();
        assert!(storage.exists("abc").unwrap());
        assert_eq!(storage.read("abc").unwrap().as_deref(), Some(&b"%PDF-1.4"[..]));
        assert_eq!(
            storage.path_for("abc").unwrap(),
            dir.path().join("labels").join("abc.pdf")
        );

        assert!(storage.remove("abc").unwrap());
        assert!(!storage.remove("abc").unwrap());
        assert!(!storage.exists("abc").unwrap());
    }

    #[test]
    fn rewriting_a_key_replaces_the_blob() {
        let dir = TempDir::new().unwrap();
        let storage = FsLabelStorage::new(dir.path()).unwrap();

        storage.write("k", b"one").unwrap();
        storage.write("k", b"two").unwrap();

        assert_eq!(storage.read("k").unwrap().as_deref(), Some(&b"two"[..]));
        assert!(!dir.path().join("k.pdf.partial").exists());
    }

    #[test]
    fn traversal_keys_stay_under_root() {
        let dir = TempDir::new().unwrap();
        let storage = FsLabelStorage::new(dir.path()).unwrap();
        let path = storage.path_for("../outside").unwrap();
        assert!(path.starts_with(dir.path()));
    }

    #[test]
    fn keys_differing_only_in_punctuation_keep_separate_blobs() {
        let dir = TempDir::new().unwrap();
        let storage = FsLabelStorage::new(dir.path()).unwrap();

        storage.write("ES.1", b"one").unwrap();
        storage.write("ES/1", b"two").unwrap();

        assert_ne!(storage.path_for("ES.1").unwrap(), storage.path_for("ES/1").unwrap());
        assert_eq!(storage.read("ES.1").unwrap().as_deref(), Some(&b"one"[..]));
        assert_eq!(storage.read("ES/1").unwrap().as_deref(), Some(&b"two"[..]));
    }
}
