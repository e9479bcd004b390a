//! Outcome of one sync pass

use serde::Serialize;

/// A file that was left alone this pass, with the reason
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedFile {
    pub filename: String,
    pub reason: String,
}

/// What a sync pass did, per filename
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Files written locally from the remote copy
    pub downloaded: Vec<String>,
    /// Files whose update the metadata service accepted
    pub uploaded: Vec<String>,
    /// Files removed locally because the remote holds a tombstone
    pub deleted_locally: Vec<String>,
    /// Files whose upload lost a version race; re-pulled next pass
    pub conflicts: Vec<String>,
    /// Files where equal versions carried different content and the remote copy won
    pub tie_breaks: Vec<String>,
    pub skipped: Vec<SkippedFile>,
}

impl SyncReport {
    /// No conflicts and nothing skipped
    pub fn is_clean(&self) -> bool {
        self.conflicts.is_empty() && self.skipped.is_empty()
    }

    /// Whether the pass changed anything locally or remotely
    pub fn has_changes(&self) -> bool {
        !(self.downloaded.is_empty() && self.uploaded.is_empty() && self.deleted_locally.is_empty())
    }

    pub(crate) fn skip(&mut self, filename: impl Into<String>, reason: impl ToString) {
        self.skipped.push(SkippedFile {
            filename: filename.into(),
            reason: reason.to_string(),
        });
    }

    /// Sort every list so reports compare independently of task completion order
    pub(crate) fn normalize(&mut self) {
        self.downloaded.sort();
        self.uploaded.sort();
        self.deleted_locally.sort();
        self.conflicts.sort();
        self.tie_breaks.sort();
        self.skipped.sort_by(|a, b| a.filename.cmp(&b.filename));
    }
}
