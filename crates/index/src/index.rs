//! Last-synced state of every file, persisted next to the synced directory

use crate::atomic::atomic_write;
use std::collections::btree_map;
use std::path::{Path, PathBuf};
use surf_core::{FileInfoMap, FileRecord};
use tracing::debug;

/// File name of the index inside the base directory
pub const INDEX_FILE_NAME: &str = ".surf-index";

/// Index file header: magic "SRFI" followed by a format byte
const MAGIC: [u8; 4] = *b"SRFI";
const FORMAT_V1: u8 = 1;

/// Errors loading or saving the local index
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("failed to access index {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("index {path} is corrupt: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    #[error("index {path} has unsupported format version {version}")]
    UnsupportedFormat { path: PathBuf, version: u8 },
}

/// Mapping filename -> record as of the last completed sync
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalIndex {
    records: FileInfoMap,
}

impl LocalIndex {
    /// Create an empty index
    pub fn new() -> Self {
        Self::default()
    }

    /// Path of the index file for a base directory
    pub fn path_in(base_dir: &Path) -> PathBuf {
        base_dir.join(INDEX_FILE_NAME)
    }

    /// Load the index for `base_dir`; a missing file yields an empty index
    pub fn load(base_dir: &Path) -> Result<Self, IndexError> {
        let path = Self::path_in(base_dir);
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no local index yet");
                return Ok(Self::new());
            }
            Err(source) => return Err(IndexError::Io { path, source }),
        };

        if bytes.len() < MAGIC.len() + 1 || bytes[..MAGIC.len()] != MAGIC {
            return Err(IndexError::Corrupt {
                path,
                reason: "missing header".to_string(),
            });
        }
        let version = bytes[MAGIC.len()];
        if version != FORMAT_V1 {
            return Err(IndexError::UnsupportedFormat { path, version });
        }

        let records: FileInfoMap = bincode::deserialize(&bytes[MAGIC.len() + 1..])
            .map_err(|e| IndexError::Corrupt {
                path: path.clone(),
                reason: e.to_string(),
            })?;

        debug!(path = %path.display(), files = records.len(), "loaded local index");
        Ok(Self { records })
    }

    /// Persist the index into `base_dir` atomically
    pub fn save(&self, base_dir: &Path) -> Result<(), IndexError> {
        let path = Self::path_in(base_dir);
        let body = bincode::serialize(&self.records).map_err(|e| IndexError::Corrupt {
            path: path.clone(),
            reason: e.to_string(),
        })?;

        let mut bytes = Vec::with_capacity(MAGIC.len() + 1 + body.len());
        bytes.extend_from_slice(&MAGIC);
        bytes.push(FORMAT_V1);
        bytes.extend_from_slice(&body);

        atomic_write(&path, &bytes).map_err(|source| IndexError::Io {
            path: path.clone(),
            source,
        })?;
        debug!(path = %path.display(), files = self.records.len(), "saved local index");
        Ok(())
    }

    pub fn get(&self, filename: &str) -> Option<&FileRecord> {
        self.records.get(filename)
    }

    pub fn get_mut(&mut self, filename: &str) -> Option<&mut FileRecord> {
        self.records.get_mut(filename)
    }

    pub fn contains(&self, filename: &str) -> bool {
        self.records.contains_key(filename)
    }

    /// Insert or replace a record, keyed by its filename
    pub fn insert(&mut self, record: FileRecord) -> Option<FileRecord> {
        self.records.insert(record.filename.clone(), record)
    }

    pub fn remove(&mut self, filename: &str) -> Option<FileRecord> {
        self.records.remove(filename)
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, FileRecord> {
        self.records.iter()
    }

    pub fn records(&self) -> &FileInfoMap {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl From<FileInfoMap> for LocalIndex {
    fn from(records: FileInfoMap) -> Self {
        Self { records }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use surf_core::hash_bytes;

    #[test]
    fn test_missing_index_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let index = LocalIndex::load(dir.path()).unwrap();
        assert!(index.is_empty());
    }

    #[test]
    fn test_save_load_preserves_records() {
        let dir = tempfile::tempdir().unwrap();
        let mut index = LocalIndex::new();
        index.insert(FileRecord::new(
            "notes/a.txt",
            3,
            vec![hash_bytes(b"one"), hash_bytes(b"two"), hash_bytes(b"one")],
        ));
        index.insert(FileRecord::tombstone("gone.txt", 7));
        index.insert(FileRecord::new("empty.txt", 1, vec![]));
        index.insert(FileRecord::new("conflicted.txt", -1, vec![hash_bytes(b"c")]));

        index.save(dir.path()).unwrap();
        let loaded = LocalIndex::load(dir.path()).unwrap();
        assert_eq!(loaded, index);
        assert!(loaded.get("gone.txt").unwrap().is_tombstone());
        assert!(!loaded.get("empty.txt").unwrap().is_tombstone());
    }

    #[test]
    fn test_corrupt_index_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(LocalIndex::path_in(dir.path()), b"not an index").unwrap();
        assert!(matches!(
            LocalIndex::load(dir.path()),
            Err(IndexError::Corrupt { .. })
        ));
    }

    #[test]
    fn test_future_format_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut bytes = MAGIC.to_vec();
        bytes.push(9);
        std::fs::write(LocalIndex::path_in(dir.path()), bytes).unwrap();
        assert!(matches!(
            LocalIndex::load(dir.path()),
            Err(IndexError::UnsupportedFormat { version: 9, .. })
        ));
    }

    #[test]
    fn test_save_into_missing_dir_fails() {
        let dir = tempfile::tempdir().unwrap();
        let index = LocalIndex::new();
        assert!(matches!(
            index.save(&dir.path().join("nope")),
            Err(IndexError::Io { .. })
        ));
    }
}
