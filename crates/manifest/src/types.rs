//! Data types for the manifest crate

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::Error;

/// Which pipeline an execution runs.
///
/// Backup mode mirrors, snapshots, bundles and publishes to the archive
/// repository. Delete mode mirrors, snapshots and then deletes the remote.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Backup,
    #[default]
    Delete,
}

impl Mode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Backup => "backup",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "backup" => Ok(Self::Backup),
            "delete" => Ok(Self::Delete),
            _ => Err(Error::UnknownMode(s.to_string())),
        }
    }
}

/// Main per-repository state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepoStatus {
    #[default]
    Pending,
    BackupOk,
    Deleted,
    BackupFailed,
    DeleteFailed,
}

impl RepoStatus {
    /// Whether this status counts as a local failure.
    pub const fn is_failure(self) -> bool {
        matches!(self, Self::BackupFailed | Self::DeleteFailed)
    }
}

impl fmt::Display for RepoStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::BackupOk => "backup_ok",
            Self::Deleted => "deleted",
            Self::BackupFailed => "backup_failed",
            Self::DeleteFailed => "delete_failed",
        };
        f.write_str(s)
    }
}

/// Archive publication state, independent of [`RepoStatus`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArchiveStatus {
    #[default]
    Pending,
    Archived,
    ArchiveFailed,
    #[serde(rename = "archive_skipped_size_limit")]
    SkippedSizeLimit,
    Skipped,
}

impl fmt::Display for ArchiveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Archived => "archived",
            Self::ArchiveFailed => "archive_failed",
            Self::SkippedSizeLimit => "archive_skipped_size_limit",
            Self::Skipped => "skipped",
        };
        f.write_str(s)
    }
}

/// Progress record for one plan target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepoExecutionEntry {
    pub full_name: String,
    pub status: RepoStatus,
    /// Local mirror directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup_path: Option<PathBuf>,
    /// Working-copy clone for local inspection
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub browsable_path: Option<PathBuf>,
    /// Single-file export eligible for archiving
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bundle_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archive_commit: Option<String>,
    #[serde(default)]
    pub archive_status: ArchiveStatus,
    /// Cause of the last failure, kept for later inspection
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_attempt_at: Option<DateTime<Utc>>,
}

impl RepoExecutionEntry {
    pub fn new(full_name: impl Into<String>, archive_status: ArchiveStatus) -> Self {
        Self {
            full_name: full_name.into(),
            status: RepoStatus::Pending,
            backup_path: None,
            browsable_path: None,
            bundle_path: None,
            archive_commit: None,
            archive_status,
            error: None,
            attempts: 0,
            last_attempt_at: None,
        }
    }

    /// Count an attempt and stamp its time.
    pub fn record_attempt(&mut self, now: DateTime<Utc>) {
        self.attempts += 1;
        self.last_attempt_at = Some(now);
    }

    /// Move to a failure status with a human-readable cause.
    pub fn mark_failed(&mut self, status: RepoStatus, cause: impl Into<String>) {
        self.status = status;
        self.error = Some(cause.into());
    }

    /// Set the archive status with an optional cause.
    pub fn mark_archive(&mut self, status: ArchiveStatus, cause: Option<String>) {
        self.archive_status = status;
        if cause.is_some() {
            self.error = cause;
        }
    }
}

/// A bundle queued for archive publication.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleArtifact {
    pub full_name: String,
    pub bundle_path: PathBuf,
    /// Host-reported update time of the repository (RFC 3339 or empty)
    #[serde(default)]
    pub updated_at: String,
}

/// Options for [`crate::ExecutionManifest::new`].
#[derive(Debug, Clone, Default)]
pub struct NewOptions {
    pub mode: Mode,
    pub archive_repo: Option<String>,
    pub archive_branch: Option<String>,
}
