//! Moving one file's content between the base directory and the block store

use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use surf_core::{read_blocks, Block, Digest, FileRecord};
use surf_index::atomic_write;
use surf_store::{BlockStore, MetaStore};
use tracing::debug;

use crate::error::TransferError;
use crate::scan::local_path;

/// Local effect of applying a remote record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Written,
    Removed,
}

/// Make the local file match `remote`
///
/// Blocks are fetched in list order and checked against their digests
/// before the file is replaced atomically. A tombstone removes the file;
/// a file that is already gone counts as removed.
pub async fn download(
    base_dir: &Path,
    blocks: &dyn BlockStore,
    remote: &FileRecord,
) -> Result<Applied, TransferError> {
    let path = target_path(base_dir, &remote.filename)?;

    if remote.is_tombstone() {
        return match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(Applied::Removed),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Applied::Removed),
            Err(e) => Err(TransferError::io(path, e)),
        };
    }

    let digests = remote.blocks.digests();
    let mut content = Vec::new();
    for (index, digest) in digests.iter().enumerate() {
        let block = blocks.get_block(digest).await?;
        if block.digest() != *digest {
            return Err(TransferError::CorruptBlock {
                filename: remote.filename.clone(),
                index,
            });
        }
        content.extend_from_slice(&block.data);
    }
    debug!(file = %remote.filename, blocks = digests.len(), bytes = content.len(), "reassembled file");

    blocking(move || {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| TransferError::io(parent, e))?;
        }
        atomic_write(&path, &content).map_err(|e| TransferError::io(&path, e))
    })
    .await?;

    Ok(Applied::Written)
}

/// Push `record` to the remote and return the version the metadata service answered
///
/// Live files are re-read first; if their blocks no longer match the record
/// the upload is abandoned. Only blocks the store lacks are sent, and all of
/// them land before the metadata update is offered.
pub async fn upload(
    base_dir: &Path,
    blocks: &dyn BlockStore,
    meta: &dyn MetaStore,
    record: FileRecord,
    block_size: usize,
) -> Result<i64, TransferError> {
    if !record.is_tombstone() {
        let path = target_path(base_dir, &record.filename)?;
        let current =
            blocking(move || read_blocks(&path, block_size).map_err(|e| TransferError::io(&path, e)))
                .await?;

        let current_digests: Vec<Digest> = current.iter().map(Block::digest).collect();
        if current_digests != record.blocks.digests() {
            return Err(TransferError::ChangedDuringSync(record.filename.clone()));
        }

        let missing = missing_blocks(blocks, current).await?;
        debug!(file = %record.filename, missing = missing.len(), "uploading blocks");
        for block in missing {
            let digest = block.digest();
            if !blocks.put_block(block).await? {
                return Err(TransferError::BlockRefused(digest));
            }
        }
    }

    Ok(meta.update_file(record).await?)
}

/// Distinct blocks of a file the store does not hold yet, first occurrence order
async fn missing_blocks(
    store: &dyn BlockStore,
    blocks: Vec<Block>,
) -> Result<Vec<Block>, TransferError> {
    let mut seen = HashSet::new();
    let distinct: Vec<(Digest, Block)> = blocks
        .into_iter()
        .map(|b| (b.digest(), b))
        .filter(|(d, _)| seen.insert(*d))
        .collect();

    let digests: Vec<Digest> = distinct.iter().map(|(d, _)| *d).collect();
    let present: HashSet<Digest> = store.has_blocks(&digests).await?.into_iter().collect();

    Ok(distinct
        .into_iter()
        .filter(|(d, _)| !present.contains(d))
        .map(|(_, b)| b)
        .collect())
}

fn target_path(base_dir: &Path, filename: &str) -> Result<PathBuf, TransferError> {
    local_path(base_dir, filename).ok_or_else(|| TransferError::UnsafeName(filename.to_string()))
}

async fn blocking<T, F>(f: F) -> Result<T, TransferError>
where
    F: FnOnce() -> Result<T, TransferError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| TransferError::Join(e.to_string()))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use surf_core::hash_bytes;
    use surf_store::{MemoryBlockStore, MemoryMetaStore};
    use tempfile::TempDir;

    async fn stored_record(store: &MemoryBlockStore, name: &str, chunks: &[&[u8]]) -> FileRecord {
        let mut digests = Vec::new();
        for chunk in chunks {
            let block = Block::new(chunk.to_vec());
            digests.push(block.digest());
            store.put_block(block).await.unwrap();
        }
        FileRecord::new(name, 1, digests)
    }

    #[tokio::test]
    async fn test_download_reassembles_in_order() {
        let dir = TempDir::new().unwrap();
        let store = MemoryBlockStore::new();
        let record = stored_record(&store, "nested/dir/f.txt", &[b"hello ", b"block ", b"world"]).await;

        let applied = download(dir.path(), &store, &record).await.unwrap();
        assert_eq!(applied, Applied::Written);
        assert_eq!(
            fs::read(dir.path().join("nested/dir/f.txt")).unwrap(),
            b"hello block world"
        );
    }

    #[tokio::test]
    async fn test_download_empty_file() {
        let dir = TempDir::new().unwrap();
        let store = MemoryBlockStore::new();
        let record = FileRecord::new("empty", 2, vec![]);

        download(dir.path(), &store, &record).await.unwrap();
        assert_eq!(fs::read(dir.path().join("empty")).unwrap(), b"");
    }

    #[tokio::test]
    async fn test_tombstone_removes_and_tolerates_missing() {
        let dir = TempDir::new().unwrap();
        let store = MemoryBlockStore::new();
        fs::write(dir.path().join("gone.txt"), b"bye").unwrap();

        let tomb = FileRecord::tombstone("gone.txt", 2);
        assert_eq!(download(dir.path(), &store, &tomb).await.unwrap(), Applied::Removed);
        assert!(!dir.path().join("gone.txt").exists());
        assert_eq!(download(dir.path(), &store, &tomb).await.unwrap(), Applied::Removed);
    }

    #[tokio::test]
    async fn test_download_missing_block_fails_without_writing() {
        let dir = TempDir::new().unwrap();
        let store = MemoryBlockStore::new();
        let record = FileRecord::new("a.txt", 1, vec![hash_bytes(b"never stored")]);

        assert!(matches!(
            download(dir.path(), &store, &record).await,
            Err(TransferError::Store(_))
        ));
        assert!(!dir.path().join("a.txt").exists());
    }

    #[tokio::test]
    async fn test_download_rejects_escaping_names() {
        let dir = TempDir::new().unwrap();
        let store = MemoryBlockStore::new();
        let record = FileRecord::new("../evil", 1, vec![]);
        assert!(matches!(
            download(dir.path(), &store, &record).await,
            Err(TransferError::UnsafeName(_))
        ));
    }

    #[tokio::test]
    async fn test_upload_sends_each_distinct_block_once() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("rep.bin"), [vec![7u8; 10], vec![7u8; 10], vec![9u8; 5]].concat()).unwrap();
        let store = MemoryBlockStore::new();
        let meta = MemoryMetaStore::new(["b0"]);

        let digests = vec![hash_bytes(&[7u8; 10]), hash_bytes(&[7u8; 10]), hash_bytes(&[9u8; 5])];
        let record = FileRecord::new("rep.bin", 1, digests);
        assert_eq!(upload(dir.path(), &store, &meta, record, 10).await.unwrap(), 1);
        assert_eq!(store.put_count(), 2);
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn test_upload_skips_blocks_already_stored() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.txt"), b"abcdef").unwrap();
        let store = MemoryBlockStore::new();
        let meta = MemoryMetaStore::new(["b0"]);
        store.put_block(Block::new(&b"abc"[..])).await.unwrap();

        let record = FileRecord::new("a.txt", 1, vec![hash_bytes(b"abc"), hash_bytes(b"def")]);
        upload(dir.path(), &store, &meta, record, 3).await.unwrap();
        assert_eq!(store.put_count(), 2);
        assert!(store.contains(&hash_bytes(b"def")));
    }

    #[tokio::test]
    async fn test_upload_detects_concurrent_edit() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.txt"), b"edited").unwrap();
        let store = MemoryBlockStore::new();
        let meta = MemoryMetaStore::new(["b0"]);

        let record = FileRecord::new("a.txt", 1, vec![hash_bytes(b"original")]);
        assert!(matches!(
            upload(dir.path(), &store, &meta, record, 64).await,
            Err(TransferError::ChangedDuringSync(_))
        ));
        assert_eq!(store.put_count(), 0);
        assert_eq!(meta.accepted_updates(), 0);
    }

    #[tokio::test]
    async fn test_upload_tombstone_sends_no_blocks() {
        let dir = TempDir::new().unwrap();
        let store = MemoryBlockStore::new();
        let meta = MemoryMetaStore::new(["b0"]);
        meta.update_file(FileRecord::new("a.txt", 1, vec![])).await.unwrap();

        let version = upload(dir.path(), &store, &meta, FileRecord::tombstone("a.txt", 2), 64)
            .await
            .unwrap();
        assert_eq!(version, 2);
        assert_eq!(store.put_count(), 0);
    }
}
