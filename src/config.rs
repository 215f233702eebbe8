//! Optional `config.toml`
//!
//! ```toml
//! backup_location = "~/backups"
//!
//! [execute]
//! max_delete_retries = 3
//! retry_delay_secs = 0
//!
//! [archive]
//! repo = "alice/ghm-archive"
//! branch = "main"
//! visibility = "private"
//! max_bundle_size = "100MB"
//! ```
//!
//! A missing file means defaults. Command-line flags override every value.

use anyhow::{Context, Result};
use lifecycle::{DEFAULT_ARCHIVE_BRANCH, DEFAULT_MAX_DELETE_RETRIES, Visibility};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::paths;
use crate::ui;

/// Same limit as `lifecycle::DEFAULT_MAX_BUNDLE_BYTES`, written for humans
const DEFAULT_MAX_BUNDLE_SIZE: &str = "100MB";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GhmConfig {
    /// Parent directory for new backup roots (defaults to the home directory)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup_location: Option<String>,

    #[serde(default)]
    pub execute: ExecuteSection,

    #[serde(default)]
    pub archive: ArchiveSection,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExecuteSection {
    pub max_delete_retries: u32,
    pub retry_delay_secs: u64,
}

impl Default for ExecuteSection {
    fn default() -> Self {
        Self {
            max_delete_retries: DEFAULT_MAX_DELETE_RETRIES,
            retry_delay_secs: 0,
        }
    }
}

impl ExecuteSection {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ArchiveSection {
    /// `owner/name`; defaults to `<actor>/ghm-archive`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repo: Option<String>,
    pub branch: String,
    pub visibility: Visibility,
    /// Human-readable size, e.g. `"100MB"`
    pub max_bundle_size: String,
}

impl Default for ArchiveSection {
    fn default() -> Self {
        Self {
            repo: None,
            branch: DEFAULT_ARCHIVE_BRANCH.to_string(),
            visibility: Visibility::Private,
            max_bundle_size: DEFAULT_MAX_BUNDLE_SIZE.to_string(),
        }
    }
}

impl ArchiveSection {
    pub fn max_bundle_bytes(&self) -> Result<u64> {
        ui::parse_size(&self.max_bundle_size)
            .map_err(anyhow::Error::msg)
            .with_context(|| format!("Invalid archive.max_bundle_size '{}'", self.max_bundle_size))
    }
}

impl GhmConfig {
    /// Load from the default location
    pub fn load() -> Result<Self> {
        Self::load_from(&paths::config_file()?)
    }

    /// Load from `path`, returning defaults when the file does not exist
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Invalid config in {}", path.display()))?;
        config.archive.max_bundle_bytes()?;
        Ok(config)
    }

    /// Expanded backup location, if configured
    pub fn backup_location(&self) -> Option<PathBuf> {
        self.backup_location
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .map(paths::expand)
    }
}
