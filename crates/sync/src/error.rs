//! Error types for a sync pass

use std::path::PathBuf;

use surf_index::IndexError;
use surf_store::StoreError;

/// Failures that abort a whole sync pass before any remote mutation
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("base directory {path} is not usable: {reason}")]
    BaseDir { path: PathBuf, reason: String },

    #[error("block size {0} is outside 1..=64 MiB")]
    BlockSize(usize),

    #[error("failed to load local index: {0}")]
    LoadIndex(#[source] IndexError),

    #[error("metadata service unreachable: {0}")]
    MetaUnreachable(#[source] StoreError),

    #[error("failed to load ignore rules: {0}")]
    Ignore(#[from] ::ignore::Error),

    #[error("scan task failed: {0}")]
    Scan(String),

    #[error("failed to persist local index: {0}")]
    PersistIndex(#[source] IndexError),
}

/// Failure transferring one file; the file is skipped for this pass
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{0} changed during sync")]
    ChangedDuringSync(String),

    #[error("refusing to write outside base directory: {0}")]
    UnsafeName(String),

    #[error("block store refused block {0}")]
    BlockRefused(surf_core::Digest),

    #[error("block {index} of {filename} does not match its digest")]
    CorruptBlock { filename: String, index: usize },

    #[error("background task failed: {0}")]
    Join(String),
}

impl TransferError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        TransferError::Io {
            path: path.into(),
            source,
        }
    }
}
