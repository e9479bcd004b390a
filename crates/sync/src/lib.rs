//! Surf Sync - reconciles a local directory with the remote services
//!
//! A pass scans the base directory, folds local edits into the
//! [`LocalIndex`](surf_index::LocalIndex), pulls newer remote files, pushes
//! files the remote is behind on, and persists the index.

pub mod engine;
pub mod error;
pub mod ignore;
pub mod report;
pub mod scan;
pub mod transfer;

pub use crate::engine::{SyncEngine, SyncOptions, MAX_BLOCK_SIZE};
pub use crate::error::{SyncError, TransferError};
pub use crate::ignore::{IgnoreConfig, IgnoreRules, IGNORE_FILE, LOCAL_CONFIG_FILE};
pub use crate::report::{SkippedFile, SyncReport};
pub use crate::scan::{scan_dir, Scan};
