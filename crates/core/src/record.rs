//! Versioned file records and tombstones

use crate::hash::Digest;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Block-list sentinel marking a deleted file
pub const TOMBSTONE_SENTINEL: &str = "0";

/// Version written locally after the metadata service rejected an update.
/// Any remote version is newer, so the next pass re-pulls the file.
pub const INVALID_VERSION: i64 = -1;

/// Snapshot of every file the metadata service knows about
pub type FileInfoMap = BTreeMap<String, FileRecord>;

/// Ordered block digests of a file, or a deletion marker
///
/// Serialized as a list of hex digests; a tombstone is the one-element
/// list `["0"]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "Vec<String>", try_from = "Vec<String>")]
pub enum BlockList {
    Live(Vec<Digest>),
    Tombstone,
}

impl BlockList {
    pub fn is_tombstone(&self) -> bool {
        matches!(self, BlockList::Tombstone)
    }

    /// Digests of a live file; empty for tombstones
    pub fn digests(&self) -> &[Digest] {
        match self {
            BlockList::Live(digests) => digests,
            BlockList::Tombstone => &[],
        }
    }
}

impl From<BlockList> for Vec<String> {
    fn from(list: BlockList) -> Self {
        match list {
            BlockList::Live(digests) => digests.iter().map(Digest::to_hex).collect(),
            BlockList::Tombstone => vec![TOMBSTONE_SENTINEL.to_string()],
        }
    }
}

impl TryFrom<Vec<String>> for BlockList {
    type Error = anyhow::Error;

    fn try_from(raw: Vec<String>) -> Result<Self, Self::Error> {
        if raw.len() == 1 && raw[0] == TOMBSTONE_SENTINEL {
            return Ok(BlockList::Tombstone);
        }
        let digests = raw
            .iter()
            .map(|s| Digest::from_hex(s))
            .collect::<anyhow::Result<Vec<_>>>()?;
        Ok(BlockList::Live(digests))
    }
}

/// Versioned description of one file's content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub filename: String,
    pub version: i64,
    pub blocks: BlockList,
}

impl FileRecord {
    pub fn new(filename: impl Into<String>, version: i64, digests: Vec<Digest>) -> Self {
        Self {
            filename: filename.into(),
            version,
            blocks: BlockList::Live(digests),
        }
    }

    pub fn tombstone(filename: impl Into<String>, version: i64) -> Self {
        Self {
            filename: filename.into(),
            version,
            blocks: BlockList::Tombstone,
        }
    }

    pub fn is_tombstone(&self) -> bool {
        self.blocks.is_tombstone()
    }

    /// The next version of this record marking the file deleted
    pub fn to_tombstone(&self) -> Self {
        Self::tombstone(self.filename.clone(), self.version + 1)
    }

    /// Order-sensitive block list comparison
    pub fn same_blocks(&self, other: &FileRecord) -> bool {
        self.blocks == other.blocks
    }
}
