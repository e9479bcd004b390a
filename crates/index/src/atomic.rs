//! Atomic file replacement

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

/// Prefix of temporary files created next to their targets
pub const TEMP_PREFIX: &str = ".surf-tmp-";

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Write `data` to `target` atomically
///
/// Writes to a temporary file in the target's directory, fsyncs it, then
/// renames it over the target. Readers see either the old or the new
/// content, never a partial write.
pub fn atomic_write(target: &Path, data: &[u8]) -> io::Result<()> {
    let dir = match target.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let name = target
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("file");
    let tmp = dir.join(format!(
        "{}{}-{}-{}",
        TEMP_PREFIX,
        std::process::id(),
        TEMP_COUNTER.fetch_add(1, Ordering::Relaxed),
        name
    ));

    let result = (|| {
        let mut file = File::create(&tmp)?;
        file.write_all(data)?;
        file.sync_all()?;
        fs::rename(&tmp, target)
    })();

    if result.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    result
}

/// Whether a file name belongs to an in-flight atomic write
pub fn is_temp_file(name: &str) -> bool {
    name.starts_with(TEMP_PREFIX)
}
