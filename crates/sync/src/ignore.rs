//! Ignore rules for the directory scan
//!
//! Supports multiple sources of ignore patterns:
//! 1. Built-in patterns (index file, temp files, OS artifacts - always active)
//! 2. .surfignore patterns (gitignore syntax, optional)
//! 3. Config-based patterns (additional custom patterns)

use ::ignore::gitignore::{Gitignore, GitignoreBuilder};
use serde::{Deserialize, Serialize};
use std::path::Path;
use surf_index::{is_temp_file, INDEX_FILE_NAME};

/// Per-directory client configuration file, never synced
pub const LOCAL_CONFIG_FILE: &str = "surf.toml";

/// Per-directory ignore file
pub const IGNORE_FILE: &str = ".surfignore";

/// Ignore rule manager
pub struct IgnoreRules {
    /// .surfignore patterns (optional)
    surfignore: Option<Gitignore>,

    /// Patterns from configuration
    configured: Option<Gitignore>,
}

impl IgnoreRules {
    /// Load ignore rules for a base directory
    pub fn load(base_dir: &Path, config: &IgnoreConfig) -> Result<Self, ::ignore::Error> {
        let surfignore = if config.use_surfignore {
            let path = base_dir.join(IGNORE_FILE);
            if path.is_file() {
                let mut builder = GitignoreBuilder::new(base_dir);
                if let Some(err) = builder.add(&path) {
                    return Err(err);
                }
                Some(builder.build()?)
            } else {
                None
            }
        } else {
            None
        };

        let configured = if config.additional_patterns.is_empty() {
            None
        } else {
            let mut builder = GitignoreBuilder::new(base_dir);
            for pattern in &config.additional_patterns {
                builder.add_line(None, pattern)?;
            }
            Some(builder.build()?)
        };

        Ok(Self {
            surfignore,
            configured,
        })
    }

    /// Rules with only the built-in patterns
    pub fn builtin() -> Self {
        Self {
            surfignore: None,
            configured: None,
        }
    }

    /// Check if a path relative to the base directory should be skipped
    pub fn should_ignore(&self, rel_path: &Path, is_dir: bool) -> bool {
        if !is_dir && is_builtin_ignored(rel_path) {
            return true;
        }

        if let Some(ref surfignore) = self.surfignore {
            if surfignore.matched(rel_path, is_dir).is_ignore() {
                return true;
            }
        }

        if let Some(ref configured) = self.configured {
            if configured.matched(rel_path, is_dir).is_ignore() {
                return true;
            }
        }

        false
    }

    /// Number of active ignore sources
    pub fn active_sources(&self) -> usize {
        1 + usize::from(self.surfignore.is_some()) + usize::from(self.configured.is_some())
    }
}

/// Files that are never synced regardless of configuration
fn is_builtin_ignored(rel_path: &Path) -> bool {
    let filename = rel_path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("");

    // Sync state and client config at the top level
    if rel_path.parent().map_or(true, |p| p.as_os_str().is_empty())
        && (filename == INDEX_FILE_NAME || filename == LOCAL_CONFIG_FILE)
    {
        return true;
    }

    // In-flight atomic writes
    if is_temp_file(filename) {
        return true;
    }

    // MacOS system files
    if filename == ".DS_Store" || filename.starts_with("._") {
        return true;
    }

    // Windows system files
    if filename == "Thumbs.db" || filename == "desktop.ini" {
        return true;
    }

    // Vim swap files
    if filename.ends_with(".swp") || filename.ends_with(".swo") {
        return true;
    }

    // Emacs lock and auto-save files
    if filename.starts_with(".#") || (filename.len() > 1 && filename.starts_with('#') && filename.ends_with('#')) {
        return true;
    }

    false
}

/// Ignore configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IgnoreConfig {
    /// Read .surfignore in the base directory (default: true)
    #[serde(default = "default_true")]
    pub use_surfignore: bool,

    /// Additional gitignore-style patterns
    #[serde(default)]
    pub additional_patterns: Vec<String>,
}

impl Default for IgnoreConfig {
    fn default() -> Self {
        Self {
            use_surfignore: true,
            additional_patterns: vec![],
        }
    }
}

fn default_true() -> bool {
    true
}
