//! Configuration for snapshot synchronization and branch operations.
//!
//! [`SyncConfig`] holds the tunables of the sync engine and branch
//! controller. It is persisted as TOML and every key is optional: missing
//! keys fall back to the defaults below.
//!
//! # Example
//!
//! ```ignore
//! use branchdoc_core::config::SyncConfig;
//!
//! let config = SyncConfig::from_toml_str("debounce_ms = 500")?;
//! assert_eq!(config.debounce().as_millis(), 500);
//! assert_eq!(config.auto_branch_prefix, "branch");
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{BranchDocError, Result};

/// Default quiet period before a dirty document is exported.
pub const DEFAULT_DEBOUNCE_MS: u64 = 300;

/// Default prefix for automatically named branches.
pub const DEFAULT_AUTO_BRANCH_PREFIX: &str = "branch";

/// Default cap of the recent-snapshot list.
pub const DEFAULT_MAX_RECENT_SNAPSHOTS: usize = 20;

/// Tunables for the sync engine and branch controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Quiet period (milliseconds) after the last edit before exporting
    pub debounce_ms: u64,

    /// Prefix used by `create_branch_auto` when the caller passes none
    pub auto_branch_prefix: String,

    /// Maximum number of entries kept in `recentSnapshots`
    pub max_recent_snapshots: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            auto_branch_prefix: DEFAULT_AUTO_BRANCH_PREFIX.to_string(),
            max_recent_snapshots: DEFAULT_MAX_RECENT_SNAPSHOTS,
        }
    }
}

impl SyncConfig {
    /// Debounce interval as a `Duration`.
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Parse a config from TOML text.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Load config from a TOML file.
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|source| BranchDocError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    /// Load config from a TOML file, or return defaults if it doesn't exist.
    pub fn load_from_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load_from(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save config to a TOML file, creating the parent directory if needed.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents).map_err(|source| BranchDocError::FileWrite {
            path: path.to_path_buf(),
            source,
        })
    }
}
