//! Surf Core - content-addressing primitives for the sync system
//!
//! This crate provides the foundational types:
//! - BLAKE3 digests used as block identifiers
//! - Fixed-size block splitting
//! - Versioned file records and tombstones
//! - Consistent hash ring for block-store sharding

pub mod block;
pub mod hash;
pub mod record;
pub mod ring;

// Re-export main types for convenience
pub use block::{block_digests, read_blocks, split_blocks, Block};
pub use hash::{hash_bytes, Digest};
pub use record::{BlockList, FileInfoMap, FileRecord, INVALID_VERSION, TOMBSTONE_SENTINEL};
pub use ring::Ring;
