//! One sync pass: scan, diff, pull, push, persist

use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use surf_core::{BlockList, FileRecord, INVALID_VERSION};
use surf_index::LocalIndex;
use surf_store::{BlockStoreConnector, MetaStore, ShardedBlockStore, UPDATE_REJECTED};
use tracing::{debug, info, warn};

use crate::error::SyncError;
use crate::ignore::{IgnoreConfig, IgnoreRules};
use crate::report::SyncReport;
use crate::scan::{scan_dir, Scan};
use crate::transfer::{self, Applied};

/// Largest accepted block size
pub const MAX_BLOCK_SIZE: usize = 64 * 1024 * 1024;

/// Tuning for a sync pass
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Bytes per block (the last block of a file may be shorter)
    pub block_size: usize,
    /// Files transferred concurrently
    pub parallelism: usize,
    pub ignore: IgnoreConfig,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            block_size: 4096,
            parallelism: 4,
            ignore: IgnoreConfig::default(),
        }
    }
}

/// Reconciles a local directory with the metadata and block services
pub struct SyncEngine {
    meta: Arc<dyn MetaStore>,
    connector: Arc<dyn BlockStoreConnector>,
    options: SyncOptions,
}

/// Transfers decided for a pass
#[derive(Debug, Default)]
struct Plan {
    /// Remote records to apply locally, with whether this was an equal-version tie
    downloads: Vec<(FileRecord, bool)>,
    uploads: Vec<FileRecord>,
}

impl SyncEngine {
    pub fn new(
        meta: Arc<dyn MetaStore>,
        connector: Arc<dyn BlockStoreConnector>,
        options: SyncOptions,
    ) -> Self {
        Self {
            meta,
            connector,
            options,
        }
    }

    /// Run a full pass over `base_dir`, loading and persisting its index
    pub async fn sync(&self, base_dir: &Path) -> Result<SyncReport, SyncError> {
        check_base_dir(base_dir).await?;

        let mut index = LocalIndex::load(base_dir).map_err(SyncError::LoadIndex)?;
        let report = self.reconcile(base_dir, &mut index).await?;
        index.save(base_dir).map_err(SyncError::PersistIndex)?;

        info!(
            base_dir = %base_dir.display(),
            downloaded = report.downloaded.len(),
            uploaded = report.uploaded.len(),
            deleted = report.deleted_locally.len(),
            conflicts = report.conflicts.len(),
            skipped = report.skipped.len(),
            "sync pass complete"
        );
        Ok(report)
    }

    /// Bring `index` and the directory in line with the remote; the caller persists `index`
    pub async fn reconcile(
        &self,
        base_dir: &Path,
        index: &mut LocalIndex,
    ) -> Result<SyncReport, SyncError> {
        let block_size = self.options.block_size;
        if block_size == 0 || block_size > MAX_BLOCK_SIZE {
            return Err(SyncError::BlockSize(block_size));
        }
        check_base_dir(base_dir).await?;

        let mut report = SyncReport::default();

        let rules = IgnoreRules::load(base_dir, &self.options.ignore)?;
        debug!(sources = rules.active_sources(), "loaded ignore rules");
        let scan = {
            let base = base_dir.to_path_buf();
            tokio::task::spawn_blocking(move || scan_dir(&base, block_size, &rules))
                .await
                .map_err(|e| SyncError::Scan(e.to_string()))??
        };
        for (name, reason) in &scan.unreadable {
            report.skip(name.clone(), reason);
        }

        apply_local_changes(base_dir, &scan, index);

        let remote = self
            .meta
            .get_file_info_map()
            .await
            .map_err(SyncError::MetaUnreachable)?;
        debug!(remote_files = remote.len(), local_files = index.len(), "fetched remote snapshot");

        let mut plan = Plan::default();
        let mut adopted = Vec::new();

        for (name, theirs) in &remote {
            if scan.is_unknown(name) {
                skip_unknown(&mut report, &scan, name);
                continue;
            }
            match index.get(name) {
                // Nothing on disk to remove
                None if theirs.is_tombstone() => adopted.push(theirs.clone()),
                None => plan.downloads.push((theirs.clone(), false)),
                Some(ours) if theirs.version > ours.version => {
                    plan.downloads.push((theirs.clone(), false));
                }
                Some(ours) if theirs.version == ours.version && !ours.same_blocks(theirs) => {
                    warn!(
                        file = %name,
                        version = ours.version,
                        "local and remote differ at the same version, keeping remote copy"
                    );
                    plan.downloads.push((theirs.clone(), true));
                }
                Some(_) => {}
            }
        }
        for record in adopted {
            index.insert(record);
        }

        let mut forgotten = Vec::new();
        for (name, ours) in index.iter() {
            if scan.is_unknown(name) {
                if !remote.contains_key(name) {
                    skip_unknown(&mut report, &scan, name);
                }
                continue;
            }
            match remote.get(name) {
                None if ours.is_tombstone() => forgotten.push(name.clone()),
                Some(theirs) if theirs.version >= ours.version => {}
                theirs => {
                    // Passes that never reached the remote may have bumped the
                    // local version more than once; offer the next remote version
                    let next = theirs.map_or(1, |t| t.version + 1);
                    let mut record = ours.clone();
                    if record.version != next {
                        debug!(file = %name, from = record.version, to = next, "rebasing local version onto remote");
                        record.version = next;
                    }
                    plan.uploads.push(record);
                }
            }
        }
        for name in forgotten {
            debug!(file = %name, "dropping tombstone the remote never saw");
            index.remove(&name);
        }

        if !plan.downloads.is_empty() || !plan.uploads.is_empty() {
            self.transfer(base_dir, plan, index, &mut report).await;
        }

        report.normalize();
        Ok(report)
    }

    async fn transfer(
        &self,
        base_dir: &Path,
        plan: Plan,
        index: &mut LocalIndex,
        report: &mut SyncReport,
    ) {
        let blocks = match self.open_block_store().await {
            Ok(blocks) => blocks,
            Err(reason) => {
                warn!(%reason, "block store unavailable, skipping all transfers this pass");
                for (record, _) in &plan.downloads {
                    report.skip(record.filename.clone(), &reason);
                }
                for record in &plan.uploads {
                    report.skip(record.filename.clone(), &reason);
                }
                return;
            }
        };
        let parallelism = self.options.parallelism.max(1);

        let downloads: Vec<_> = stream::iter(plan.downloads)
            .map(|(record, tie)| {
                let blocks = &blocks;
                async move {
                    let result = transfer::download(base_dir, blocks, &record).await;
                    (record, tie, result)
                }
            })
            .buffer_unordered(parallelism)
            .collect()
            .await;

        for (record, tie, result) in downloads {
            match result {
                Ok(applied) => {
                    debug!(file = %record.filename, version = record.version, ?applied, "applied remote record");
                    match applied {
                        Applied::Written => report.downloaded.push(record.filename.clone()),
                        Applied::Removed => report.deleted_locally.push(record.filename.clone()),
                    }
                    if tie {
                        report.tie_breaks.push(record.filename.clone());
                    }
                    index.insert(record);
                }
                Err(e) => {
                    warn!(file = %record.filename, error = %e, "download failed, will retry next pass");
                    report.skip(record.filename.clone(), e);
                }
            }
        }

        let block_size = self.options.block_size;
        let meta = self.meta.as_ref();
        let uploads: Vec<_> = stream::iter(plan.uploads)
            .map(|record| {
                let blocks = &blocks;
                async move {
                    let result =
                        transfer::upload(base_dir, blocks, meta, record.clone(), block_size).await;
                    (record, result)
                }
            })
            .buffer_unordered(parallelism)
            .collect()
            .await;

        for (mut record, result) in uploads {
            match result {
                Ok(UPDATE_REJECTED) => {
                    warn!(
                        file = %record.filename,
                        offered = record.version,
                        "update rejected by metadata service, remote copy wins next pass"
                    );
                    report.conflicts.push(record.filename.clone());
                    record.version = INVALID_VERSION;
                    index.insert(record);
                }
                Ok(version) => {
                    debug!(file = %record.filename, version, "uploaded file");
                    report.uploaded.push(record.filename.clone());
                    record.version = version;
                    index.insert(record);
                }
                Err(e) => {
                    warn!(file = %record.filename, error = %e, "upload failed, will retry next pass");
                    report.skip(record.filename.clone(), e);
                }
            }
        }
    }

    /// Resolve the shard directory into a routed block store
    async fn open_block_store(&self) -> Result<ShardedBlockStore, String> {
        let addrs = self
            .meta
            .get_block_store_addrs()
            .await
            .map_err(|e| format!("block store directory unavailable: {e}"))?;
        ShardedBlockStore::from_directory(&addrs, self.connector.as_ref())
            .map_err(|e| format!("block store unavailable: {e}"))
    }
}

/// Fold the scan into the index: new files at version 1, changed files bumped,
/// vanished files turned into tombstones
fn apply_local_changes(base_dir: &Path, scan: &Scan, index: &mut LocalIndex) {
    for (name, digests) in &scan.files {
        let current = BlockList::Live(digests.clone());
        match index.get_mut(name) {
            None => {
                debug!(file = %name, "new local file");
                index.insert(FileRecord::new(name.clone(), 1, digests.clone()));
            }
            Some(record) if record.blocks != current => {
                record.version += 1;
                record.blocks = current;
                debug!(file = %name, version = record.version, "local file changed");
            }
            Some(_) => {}
        }
    }

    let vanished: Vec<String> = index
        .iter()
        .filter(|(name, record)| !record.is_tombstone() && scan.is_gone(base_dir, name))
        .map(|(name, _)| name.clone())
        .collect();

    for name in vanished {
        if let Some(record) = index.get_mut(&name) {
            *record = record.to_tombstone();
            debug!(file = %name, version = record.version, "local file deleted");
        }
    }
}

fn skip_unknown(report: &mut SyncReport, scan: &Scan, name: &str) {
    if !scan.unreadable.contains_key(name) {
        report.skip(name, "parent directory unreadable");
    }
}

async fn check_base_dir(base_dir: &Path) -> Result<(), SyncError> {
    let fail = |reason: String| SyncError::BaseDir {
        path: PathBuf::from(base_dir),
        reason,
    };
    match tokio::fs::metadata(base_dir).await {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(fail("not a directory".to_string())),
        Err(e) => Err(fail(e.to_string())),
    }
}
