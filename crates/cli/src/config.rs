//! Client configuration
//!
//! Values are resolved in layers, later layers winning:
//! 1. Built-in defaults
//! 2. `$XDG_CONFIG_HOME/surf/config.toml`
//! 3. `<base_dir>/surf.toml`
//! 4. Command line flags
//!
//! Files only need to name the keys they change. `ignore_patterns`
//! accumulate across layers instead of replacing each other.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use surf_sync::{IgnoreConfig, SyncOptions, LOCAL_CONFIG_FILE, MAX_BLOCK_SIZE};

/// Effective client configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurfConfig {
    pub sync: SyncConfig,
    pub remote: RemoteConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Bytes per block (default: 4096)
    pub block_size: usize,

    /// Files transferred concurrently (default: 4)
    pub parallelism: usize,

    /// Read `.surfignore` in the base directory (default: true)
    pub use_surfignore: bool,

    /// Extra gitignore-style patterns
    pub ignore_patterns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Metadata service address (default: 127.0.0.1:8080)
    pub meta_addr: String,

    /// Deadline for each call in milliseconds (default: 1000)
    pub rpc_timeout_ms: u64,
}

impl Default for SurfConfig {
    fn default() -> Self {
        Self {
            sync: SyncConfig {
                block_size: 4096,
                parallelism: 4,
                use_surfignore: true,
                ignore_patterns: Vec::new(),
            },
            remote: RemoteConfig {
                meta_addr: "127.0.0.1:8080".to_string(),
                rpc_timeout_ms: 1000,
            },
        }
    }
}

/// One configuration file; every key optional
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigLayer {
    sync: Option<SyncLayer>,
    remote: Option<RemoteLayer>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct SyncLayer {
    block_size: Option<usize>,
    parallelism: Option<usize>,
    use_surfignore: Option<bool>,
    ignore_patterns: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RemoteLayer {
    meta_addr: Option<String>,
    rpc_timeout_ms: Option<u64>,
}

/// Values given on the command line
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub meta_addr: Option<String>,
    pub block_size: Option<usize>,
    pub parallelism: Option<usize>,
}

impl SurfConfig {
    /// Resolve the configuration for a base directory
    ///
    /// Returns the configuration and the files that contributed to it.
    pub fn load(base_dir: Option<&Path>) -> Result<(Self, Vec<PathBuf>)> {
        let mut config = Self::default();
        let mut sources = Vec::new();

        let mut candidates = Vec::new();
        if let Some(global) = global_config_path() {
            candidates.push(global);
        }
        if let Some(base) = base_dir {
            candidates.push(local_config_path(base));
        }

        for path in candidates {
            if config.apply_file(&path)? {
                sources.push(path);
            }
        }
        Ok((config, sources))
    }

    /// Merge one file into `self`; a missing file is skipped
    pub fn apply_file(&mut self, path: &Path) -> Result<bool> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read config file {}", path.display()))
            }
        };
        let layer: ConfigLayer = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        self.apply_layer(layer);
        Ok(true)
    }

    fn apply_layer(&mut self, layer: ConfigLayer) {
        if let Some(sync) = layer.sync {
            if let Some(v) = sync.block_size {
                self.sync.block_size = v;
            }
            if let Some(v) = sync.parallelism {
                self.sync.parallelism = v;
            }
            if let Some(v) = sync.use_surfignore {
                self.sync.use_surfignore = v;
            }
            if let Some(v) = sync.ignore_patterns {
                self.sync.ignore_patterns.extend(v);
            }
        }
        if let Some(remote) = layer.remote {
            if let Some(v) = remote.meta_addr {
                self.remote.meta_addr = v;
            }
            if let Some(v) = remote.rpc_timeout_ms {
                self.remote.rpc_timeout_ms = v;
            }
        }
    }

    /// Apply command line flags
    pub fn apply_overrides(&mut self, overrides: &Overrides) {
        if let Some(addr) = &overrides.meta_addr {
            self.remote.meta_addr = addr.clone();
        }
        if let Some(v) = overrides.block_size {
            self.sync.block_size = v;
        }
        if let Some(v) = overrides.parallelism {
            self.sync.parallelism = v;
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.sync.block_size == 0 || self.sync.block_size > MAX_BLOCK_SIZE {
            anyhow::bail!(
                "block_size must be between 1 and {} bytes (got {})",
                MAX_BLOCK_SIZE,
                self.sync.block_size
            );
        }
        if self.sync.parallelism == 0 {
            anyhow::bail!("parallelism must be at least 1");
        }
        if self.remote.rpc_timeout_ms == 0 {
            anyhow::bail!("rpc_timeout_ms must be at least 1");
        }
        if self.remote.meta_addr.trim().is_empty() {
            anyhow::bail!("meta_addr must not be empty");
        }
        Ok(())
    }

    pub fn sync_options(&self) -> SyncOptions {
        SyncOptions {
            block_size: self.sync.block_size,
            parallelism: self.sync.parallelism,
            ignore: IgnoreConfig {
                use_surfignore: self.sync.use_surfignore,
                additional_patterns: self.sync.ignore_patterns.clone(),
            },
        }
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_millis(self.remote.rpc_timeout_ms)
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize configuration")
    }
}

/// Per-user configuration file
pub fn global_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("surf").join("config.toml"))
}

/// Per-directory configuration file
pub fn local_config_path(base_dir: &Path) -> PathBuf {
    base_dir.join(LOCAL_CONFIG_FILE)
}
