//! Configuration and result types for executions

use manifest::Mode;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Delete attempts per repository when the config leaves it at zero
pub const DEFAULT_MAX_DELETE_RETRIES: u32 = 3;

/// Largest bundle published to the archive repository (100 MiB)
pub const DEFAULT_MAX_BUNDLE_BYTES: u64 = 100 * 1024 * 1024;

/// Branch the archive publisher commits to by default
pub const DEFAULT_ARCHIVE_BRANCH: &str = "main";

/// Repository name used as `<actor>/<name>` when no archive repo is given
pub const DEFAULT_ARCHIVE_REPO_NAME: &str = "ghm-archive";

/// Repository visibility on the host
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Private,
    Public,
}

impl Visibility {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Private => "private",
            Self::Public => "public",
        }
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Visibility string other than `private` or `public`
#[derive(Debug, Error)]
#[error("invalid visibility: {0} (expected private or public)")]
pub struct UnknownVisibility(pub String);

impl FromStr for Visibility {
    type Err = UnknownVisibility;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "private" => Ok(Self::Private),
            "public" => Ok(Self::Public),
            _ => Err(UnknownVisibility(s.to_string())),
        }
    }
}

/// Archive publication settings for backup mode
#[derive(Debug, Clone, Default)]
pub struct ArchiveOptions {
    /// `owner/name`; defaults to `<actor>/ghm-archive`
    pub repo: Option<String>,
    /// Defaults to `main`
    pub branch: Option<String>,
    /// Defaults to private
    pub visibility: Option<Visibility>,
    /// Skip publication entirely
    pub disabled: bool,
    /// Size ceiling per bundle; zero means the default
    pub max_bundle_bytes: u64,
}

/// Archive target with every default filled in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveTarget {
    pub repo: String,
    pub branch: String,
    pub visibility: Visibility,
    pub max_bundle_bytes: u64,
}

impl ArchiveOptions {
    /// Fill defaults for `actor`. Returns `None` when archiving is disabled.
    pub fn resolve(&self, actor: &str) -> Option<ArchiveTarget> {
        if self.disabled {
            return None;
        }
        Some(ArchiveTarget {
            repo: non_empty(self.repo.as_deref())
                .map_or_else(|| format!("{actor}/{DEFAULT_ARCHIVE_REPO_NAME}"), str::to_string),
            branch: non_empty(self.branch.as_deref())
                .unwrap_or(DEFAULT_ARCHIVE_BRANCH)
                .to_string(),
            visibility: self.visibility.unwrap_or_default(),
            max_bundle_bytes: if self.max_bundle_bytes == 0 {
                DEFAULT_MAX_BUNDLE_BYTES
            } else {
                self.max_bundle_bytes
            },
        })
    }
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}

/// Settings for one executor run
#[derive(Debug, Clone)]
pub struct ExecuteConfig {
    /// Recorded in the manifest for later inspection
    pub plan_path: PathBuf,
    pub mode: Mode,
    /// Explicit backup root; wins over lookup and allocation
    pub backup_dir: Option<PathBuf>,
    /// Continue from an existing manifest
    pub resume: bool,
    pub dry_run: bool,
    /// Zero means [`DEFAULT_MAX_DELETE_RETRIES`]
    pub max_delete_retries: u32,
    /// Base delay between delete attempts; zero retries immediately
    pub delete_retry_delay: Duration,
    pub archive: ArchiveOptions,
}

impl Default for ExecuteConfig {
    fn default() -> Self {
        Self {
            plan_path: PathBuf::new(),
            mode: Mode::Delete,
            backup_dir: None,
            resume: true,
            dry_run: false,
            max_delete_retries: DEFAULT_MAX_DELETE_RETRIES,
            delete_retry_delay: Duration::ZERO,
            archive: ArchiveOptions::default(),
        }
    }
}

impl ExecuteConfig {
    pub(crate) fn effective_delete_retries(&self) -> u32 {
        if self.max_delete_retries == 0 {
            DEFAULT_MAX_DELETE_RETRIES
        } else {
            self.max_delete_retries
        }
    }
}

/// Summary of an execution
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionReport {
    /// `None` for dry runs
    pub manifest_path: Option<PathBuf>,
    pub backup_root: PathBuf,
    pub deleted: usize,
    /// Entries in `backup_failed` or `delete_failed`
    pub failed: usize,
    pub archive_failed: usize,
    pub archive_skipped_size: usize,
    pub total: usize,
    pub archive_commit: Option<String>,
    pub archive_repo: Option<String>,
    pub archive_branch: Option<String>,
    /// Sorted full names moved aside by the size filter
    pub archive_skipped_repos: Vec<String>,
    pub dry_run: bool,
}
