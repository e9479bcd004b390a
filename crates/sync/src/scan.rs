//! Directory scan producing the current block list of every file

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Component, Path, PathBuf};

use surf_core::{block_digests, Digest};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::SyncError;
use crate::ignore::IgnoreRules;

/// Result of scanning a base directory
#[derive(Debug, Default)]
pub struct Scan {
    /// filename -> ordered block digests
    pub files: BTreeMap<String, Vec<Digest>>,
    /// Files that exist but could not be read this pass, with the reason
    pub unreadable: BTreeMap<String, String>,
    /// Directories that could not be listed (their contents are unknown)
    pub unreadable_dirs: BTreeSet<String>,
}

impl Scan {
    /// Whether a filename's on-disk state is unknown this pass
    pub fn is_unknown(&self, filename: &str) -> bool {
        self.unreadable.contains_key(filename)
            || self
                .unreadable_dirs
                .iter()
                .any(|dir| dir.is_empty() || filename.starts_with(&format!("{dir}/")))
    }

    /// Whether a previously synced filename has really been deleted
    ///
    /// A name that was not scanned but still has something on disk (an
    /// ignored file, a directory) is not gone, and neither is one whose
    /// state is unknown this pass.
    pub fn is_gone(&self, base_dir: &Path, filename: &str) -> bool {
        !self.files.contains_key(filename)
            && !self.is_unknown(filename)
            && !local_path(base_dir, filename).is_some_and(|p| p.symlink_metadata().is_ok())
    }
}

/// Walk `base_dir` and compute block digests for every regular file
///
/// Only a missing or unlistable base directory is fatal; everything below
/// it is recorded in the returned [`Scan`] and skipped.
pub fn scan_dir(base_dir: &Path, block_size: usize, rules: &IgnoreRules) -> Result<Scan, SyncError> {
    let mut scan = Scan::default();

    let walker = WalkDir::new(base_dir)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| {
            if e.depth() == 0 {
                return true;
            }
            match e.path().strip_prefix(base_dir) {
                Ok(rel) => !rules.should_ignore(rel, e.file_type().is_dir()),
                Err(_) => false,
            }
        });

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                if e.depth() == 0 {
                    return Err(SyncError::BaseDir {
                        path: base_dir.to_path_buf(),
                        reason: e.to_string(),
                    });
                }
                let rel = e
                    .path()
                    .and_then(|p| p.strip_prefix(base_dir).ok())
                    .and_then(relative_name);
                warn!(error = %e, "skipping unreadable directory entry");
                match rel {
                    Some(name) => {
                        scan.unreadable_dirs.insert(name);
                    }
                    // Unknown location: treat the whole tree as unknown
                    None => {
                        scan.unreadable_dirs.insert(String::new());
                    }
                }
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }

        let rel_path = match entry.path().strip_prefix(base_dir) {
            Ok(rel) => rel,
            Err(_) => continue,
        };
        let Some(name) = relative_name(rel_path) else {
            warn!(path = %entry.path().display(), "skipping file with non-UTF-8 name");
            continue;
        };

        match block_digests(entry.path(), block_size) {
            Ok(digests) => {
                debug!(file = %name, blocks = digests.len(), "scanned file");
                scan.files.insert(name, digests);
            }
            Err(e) => {
                warn!(file = %name, error = %e, "skipping unreadable file");
                scan.unreadable.insert(name, e.to_string());
            }
        }
    }

    Ok(scan)
}

/// `/`-separated name for a path relative to the base directory
pub fn relative_name(rel_path: &Path) -> Option<String> {
    let mut parts = Vec::new();
    for component in rel_path.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_str()?),
            Component::CurDir => {}
            _ => return None,
        }
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}

/// Location on disk of a synced filename, rejecting names that escape `base_dir`
pub fn local_path(base_dir: &Path, filename: &str) -> Option<PathBuf> {
    let rel = Path::new(filename);
    let safe = rel
        .components()
        .all(|c| matches!(c, Component::Normal(_)));
    if filename.is_empty() || !safe {
        return None;
    }
    Some(base_dir.join(rel))
}
