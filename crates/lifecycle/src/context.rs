//! Collaborator traits
//!
//! The executor drives the pipeline but never talks to GitHub or git
//! directly. Everything with side effects outside the backup root's
//! manifest goes through these traits, so the same pipeline runs against
//! the real `gh`/`git` adapters or against in-memory fakes.

use anyhow::Result;
use chrono::{DateTime, Utc};
use manifest::BundleArtifact;
use planfile::RepoRecord;
use std::path::{Path, PathBuf};

use crate::types::Visibility;

/// Deletes a remote repository by full name
pub trait RepoDeleter {
    fn delete_repo(&self, full_name: &str) -> Result<()>;

    /// Whether a failed delete is worth another attempt
    fn is_transient(&self, _error: &anyhow::Error) -> bool {
        true
    }
}

/// Makes sure the archive repository exists
pub trait ArchiveRepoManager {
    /// Create `full_name` with the given visibility unless it already exists
    fn ensure_repo(&self, full_name: &str, visibility: Visibility) -> Result<()>;
}

/// Produces local copies of a repository under a backup root
pub trait BackupProvider {
    /// Mirror clone of the full history. Returns the existing path when
    /// the mirror is already present.
    fn mirror(&self, repo: &RepoRecord, root: &Path) -> Result<PathBuf>;

    /// Working-copy clone made from the mirror
    fn snapshot(&self, repo: &RepoRecord, root: &Path) -> Result<PathBuf>;

    /// Single-file export of all refs made from the mirror
    fn bundle(&self, repo: &RepoRecord, root: &Path) -> Result<PathBuf>;
}

/// One archive publication batch
#[derive(Debug, Clone)]
pub struct PublishRequest<'a> {
    pub archive_repo: &'a str,
    pub branch: &'a str,
    pub backup_root: &'a Path,
    pub bundles: &'a [BundleArtifact],
    pub plan_fingerprint: &'a str,
}

/// Pushes a batch of bundles to the archive repository
pub trait ArchivePublisher {
    /// Publish every bundle in one commit and return its identifier
    fn publish(&self, request: &PublishRequest<'_>) -> Result<String>;
}

/// Finds resumable backup roots and allocates fresh ones
pub trait BackupRootLocator {
    /// Latest existing root whose manifest belongs to `fingerprint`
    fn find_resumable(&self, fingerprint: &str) -> Option<PathBuf>;

    /// Path for a new root. Must not touch the filesystem.
    fn allocate(&self, now: DateTime<Utc>) -> std::io::Result<PathBuf>;
}
