//! Content-addressed label blob storage.
//!
//! Keys are opaque strings (UUIDs or carrier package ids). A key always maps to
//! the same location, so rewriting a key with the same bytes is idempotent.

pub mod fs;
pub mod in_memory;

use std::path::PathBuf;

use thiserror::Error;

pub use fs::FsLabelStorage;
pub use in_memory::InMemoryLabelStorage;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("invalid storage key '{0}'")]
    InvalidKey(String),

    #[error("i/o failure for label '{key}': {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("label storage unavailable: {0}")]
    Unavailable(String),
}

pub trait LabelStorage: Send + Sync {
    fn write(&self, key: &str, bytes: &[u8]) -> Result<(), StorageError>;

    /// `None` when no blob exists under `key`.
    fn read(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;

    fn exists(&self, key: &str) -> Result<bool, StorageError>;

    /// `false` when there was nothing to remove.
    fn remove(&self, key: &str) -> Result<bool, StorageError>;

    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError>;
}

/// Map a key onto a safe file stem. ASCII alphanumerics and `-` are kept;
/// every other byte, `_` included, becomes `_XX` (upper-case hex), so distinct
/// keys never share a file. Surrounding blanks are not part of a key.
pub fn sanitize_key(key: &str) -> Result<String, StorageError> {
    let trimmed = key.trim();
    if trimmed.is_empty() {
        return Err(StorageError::InvalidKey(key.to_string()));
    }
    let mut stem = String::with_capacity(trimmed.len());
    for byte in trimmed.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' {
            stem.push(char::from(byte));
        } else {
            stem.push_str(&format!("_{byte:02X}"));
        }
    }
    Ok(stem)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitized_keys_cannot_escape_the_root() {
        assert_eq!(
            sanitize_key("../../etc/passwd").unwrap(),
            "_2E_2E_2F_2E_2E_2Fetc_2Fpasswd"
        );
        assert_eq!(
            sanitize_key(" 0190f1c2-7b3a-7c4d-9e5f-0123456789ab ").unwrap(),
            "0190f1c2-7b3a-7c4d-9e5f-0123456789ab"
        );
        assert!(matches!(sanitize_key("   "), Err(StorageError::InvalidKey(_))));
    }

    #[test]
    fn punctuation_variants_get_their_own_stem() {
        let stems = ["ES.1", "ES/1", "ES_1", "ES_2E1", "ES 1", "ESñ1"]
            .map(|key| sanitize_key(key).unwrap());
        for (i, a) in stems.iter().enumerate() {
            for b in &stems[i + 1..] {
                assert_ne!(a, b);
            }
        }
        assert_eq!(stems[0], "ES_2E1");
        assert_eq!(stems[2], "ES_5F1");
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn distinct_keys_map_to_distinct_stems(a in "[ -~]{1,24}", b in "[ -~]{1,24}") {
                prop_assume!(!a.trim().is_empty() && !b.trim().is_empty());
                prop_assume!(a.trim() != b.trim());
                prop_assert_ne!(sanitize_key(&a).unwrap(), sanitize_key(&b).unwrap());
            }

            #[test]
            fn stems_are_plain_file_names(key in "\\PC{1,24}") {
                prop_assume!(!key.trim().is_empty());
                let stem = sanitize_key(&key).unwrap();
                prop_assert!(stem.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_'));
            }
        }
    }
}
