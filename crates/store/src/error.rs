//! Error types for store operations.

use std::time::Duration;

use surf_core::Digest;

/// Errors that can occur talking to a block or metadata store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The requested block is not held by the store.
    #[error("block not found: {0}")]
    NotFound(Digest),

    /// The call did not complete within its deadline.
    #[error("call timed out after {0:?}")]
    Timeout(Duration),

    /// The service could not be reached.
    #[error("service unavailable at {addr}: {reason}")]
    Unavailable {
        /// Address that was dialed.
        addr: String,
        /// Underlying failure.
        reason: String,
    },

    /// The remote answered with something the client could not use.
    #[error("transport error: {0}")]
    Transport(String),

    /// An I/O error occurred.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The shard directory is empty.
    #[error("no block-store shards available")]
    NoShards,

    /// A digest was routed to a shard with no open handle.
    #[error("unknown block-store shard: {0}")]
    UnknownShard(String),
}

impl StoreError {
    /// Whether retrying on a later pass can succeed without outside action
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            StoreError::Timeout(_)
                | StoreError::Unavailable { .. }
                | StoreError::Transport(_)
                | StoreError::Io(_)
        )
    }
}
