//! Persisted local index for the sync client
//!
//! This crate provides:
//! - The `LocalIndex` mapping of filename to last-synced record
//! - Crash-safe persistence next to the synced directory

pub mod atomic;
pub mod index;

// Re-exports
pub use atomic::{atomic_write, is_temp_file, TEMP_PREFIX};
pub use index::{IndexError, LocalIndex, INDEX_FILE_NAME};
