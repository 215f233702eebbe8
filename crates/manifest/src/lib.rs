//! # Manifest
//!
//! Durable per-run execution record for plan-driven repository operations.
//!
//! One manifest lives at `<backup-root>/manifest.json` and holds one entry
//! per plan target. It is rewritten as a full snapshot after every state
//! change, so a killed process leaves the file consistent with the last
//! completed step and a later run can resume from it.
//!
//! ## Example
//!
//! ```no_run
//! use manifest::{ExecutionManifest, Mode, NewOptions};
//! use std::path::Path;
//!
//! let plan = planfile::read(Path::new("plan.json")).unwrap();
//! let root = Path::new("/home/alice/ghm-archive-2026-02-25-100000");
//! let mut manifest = ExecutionManifest::new(
//!     Path::new("plan.json"),
//!     root,
//!     &plan,
//!     chrono::Utc::now(),
//!     NewOptions { mode: Mode::Delete, ..Default::default() },
//! );
//! manifest.save(&ExecutionManifest::path(root))?;
//! # Ok::<(), manifest::Error>(())
//! ```

mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
    ArchiveStatus, BundleArtifact, Mode, NewOptions, RepoExecutionEntry, RepoStatus,
};

use chrono::{DateTime, Utc};
use planfile::DeletionPlan;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Schema version written into every manifest.
pub const SCHEMA_VERSION: &str = "v1";

/// File name of the manifest inside a backup root.
pub const MANIFEST_FILE: &str = "manifest.json";

/// Execution progress for one plan in one backup root
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionManifest {
    pub schema_version: String,
    pub mode: Mode,
    pub plan_fingerprint: String,
    pub plan_path: PathBuf,
    pub actor: String,
    pub host: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archive_repo: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archive_branch: Option<String>,
    pub backup_root: PathBuf,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub repo_executions: Vec<RepoExecutionEntry>,
    #[serde(default)]
    pub deleted_count: usize,
    #[serde(default)]
    pub failed_count: usize,
    #[serde(default)]
    pub skipped_fail_count: usize,
}

impl ExecutionManifest {
    /// Create a manifest with one pending entry per plan target
    pub fn new(
        plan_path: &Path,
        backup_root: &Path,
        plan: &DeletionPlan,
        now: DateTime<Utc>,
        options: NewOptions,
    ) -> Self {
        let archive_status = match options.mode {
            Mode::Backup => ArchiveStatus::Pending,
            Mode::Delete => ArchiveStatus::Skipped,
        };
        let repo_executions = plan
            .repos
            .iter()
            .map(|r| RepoExecutionEntry::new(r.full_name.clone(), archive_status))
            .collect();

        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            mode: options.mode,
            plan_fingerprint: plan.fingerprint.clone(),
            plan_path: plan_path.to_path_buf(),
            actor: plan.actor.clone(),
            host: plan.host.clone(),
            archive_repo: options.archive_repo,
            archive_branch: options.archive_branch,
            backup_root: backup_root.to_path_buf(),
            created_at: now,
            updated_at: now,
            repo_executions,
            deleted_count: 0,
            failed_count: 0,
            skipped_fail_count: 0,
        }
    }

    /// Location of the manifest inside a backup root
    pub fn path(backup_root: &Path) -> PathBuf {
        backup_root.join(MANIFEST_FILE)
    }

    /// Read a manifest from disk
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        let manifest: Self = serde_json::from_str(&content)?;
        if manifest.schema_version != SCHEMA_VERSION {
            return Err(Error::UnsupportedSchema(manifest.schema_version));
        }
        log::debug!(
            "Loaded manifest {} ({} entries)",
            path.display(),
            manifest.repo_executions.len()
        );
        Ok(manifest)
    }

    /// Recompute counters and write the full snapshot atomically
    ///
    /// Content goes to `<path>.tmp` first and is renamed over `path`, so an
    /// interrupted write never leaves a truncated manifest behind.
    pub fn save(&mut self, path: &Path) -> Result<()> {
        self.recompute_counters();

        let mut json = serde_json::to_string_pretty(self)?;
        json.push('\n');

        let tmp = tmp_path(path);
        write_private(&tmp, json.as_bytes())?;
        fs::rename(&tmp, path).map_err(|e| Error::io(path, e))?;

        log::trace!("Wrote manifest {}", path.display());
        Ok(())
    }

    /// Derive aggregate counters from entry state
    pub fn recompute_counters(&mut self) {
        let mut deleted = 0;
        let mut failed = 0;
        for entry in &self.repo_executions {
            if entry.status == RepoStatus::Deleted {
                deleted += 1;
            } else if entry.status.is_failure() {
                failed += 1;
            }
        }
        self.deleted_count = deleted;
        self.failed_count = failed;
        self.skipped_fail_count = failed;
    }

    /// Update the manifest-level modification time
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }

    pub fn entry(&self, full_name: &str) -> Option<&RepoExecutionEntry> {
        self.repo_executions
            .iter()
            .find(|e| e.full_name == full_name)
    }

    pub fn entry_mut(&mut self, full_name: &str) -> Option<&mut RepoExecutionEntry> {
        self.repo_executions
            .iter_mut()
            .find(|e| e.full_name == full_name)
    }

    /// Number of entries with the given archive status
    pub fn count_archive_status(&self, status: ArchiveStatus) -> usize {
        self.repo_executions
            .iter()
            .filter(|e| e.archive_status == status)
            .count()
    }

    /// Sorted full names of entries with the given archive status
    pub fn repos_with_archive_status(&self, status: ArchiveStatus) -> Vec<String> {
        let mut names: Vec<String> = self
            .repo_executions
            .iter()
            .filter(|e| e.archive_status == status)
            .map(|e| e.full_name.clone())
            .collect();
        names.sort();
        names
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".tmp");
    PathBuf::from(name)
}

fn write_private(path: &Path, data: &[u8]) -> Result<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path).map_err(|e| Error::io(path, e))?;
    file.write_all(data).map_err(|e| Error::io(path, e))?;
    file.sync_all().map_err(|e| Error::io(path, e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use planfile::{DEFAULT_HOST, RepoRecord, Secret};
    use proptest::prelude::*;
    use tempfile::TempDir;

    fn plan(names: &[&str]) -> DeletionPlan {
        let mut plan = DeletionPlan::new(
            "alice",
            DEFAULT_HOST,
            "test",
            names.iter().map(|n| RepoRecord::new("alice", *n)),
            Utc::now(),
        );
        plan.sign(&Secret::from_bytes(vec![3u8; 32])).unwrap();
        plan
    }

    fn manifest(mode: Mode, names: &[&str]) -> ExecutionManifest {
        ExecutionManifest::new(
            Path::new("plan.json"),
            Path::new("/tmp/root"),
            &plan(names),
            Utc::now(),
            NewOptions {
                mode,
                ..Default::default()
            },
        )
    }

    #[test]
    fn test_new_entries_follow_plan() {
        let m = manifest(Mode::Backup, &["b", "a"]);
        let names: Vec<_> = m.repo_executions.iter().map(|e| e.full_name.as_str()).collect();
        assert_eq!(names, ["alice/a", "alice/b"]);
        assert!(m.repo_executions.iter().all(|e| e.status == RepoStatus::Pending));
        assert!(
            m.repo_executions
                .iter()
                .all(|e| e.archive_status == ArchiveStatus::Pending)
        );
        assert_eq!(m.plan_fingerprint.len(), 64);
        assert_eq!(m.actor, "alice");
    }

    #[test]
    fn test_new_delete_mode_skips_archive() {
        let m = manifest(Mode::Delete, &["a"]);
        assert_eq!(m.repo_executions[0].archive_status, ArchiveStatus::Skipped);
        assert_eq!(m.mode, Mode::Delete);
    }

    #[test]
    fn test_save_load_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let path = ExecutionManifest::path(tmp.path());
        let mut m = manifest(Mode::Delete, &["a", "b"]);
        m.repo_executions[0].status = RepoStatus::Deleted;
        m.repo_executions[1].mark_failed(RepoStatus::DeleteFailed, "boom");

        m.save(&path).unwrap();
        assert!(!tmp_path(&path).exists());

        let loaded = ExecutionManifest::load(&path).unwrap();
        assert_eq!(loaded, m);
        assert_eq!(loaded.deleted_count, 1);
        assert_eq!(loaded.failed_count, 1);
        assert_eq!(loaded.skipped_fail_count, 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_save_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;
        let tmp = TempDir::new().unwrap();
        let path = ExecutionManifest::path(tmp.path());
        manifest(Mode::Delete, &["a"]).save(&path).unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_load_rejects_other_schema() {
        let tmp = TempDir::new().unwrap();
        let path = ExecutionManifest::path(tmp.path());
        let mut m = manifest(Mode::Delete, &["a"]);
        m.schema_version = "v9".into();
        m.save(&path).unwrap();
        assert!(matches!(
            ExecutionManifest::load(&path),
            Err(Error::UnsupportedSchema(v)) if v == "v9"
        ));
    }

    #[test]
    fn test_save_overrides_hand_edited_counters() {
        let tmp = TempDir::new().unwrap();
        let path = ExecutionManifest::path(tmp.path());
        let mut m = manifest(Mode::Delete, &["a"]);
        m.deleted_count = 42;
        m.save(&path).unwrap();
        assert_eq!(ExecutionManifest::load(&path).unwrap().deleted_count, 0);
    }

    #[test]
    fn test_archive_status_queries() {
        let mut m = manifest(Mode::Backup, &["c", "a", "b"]);
        m.entry_mut("alice/c").unwrap().archive_status = ArchiveStatus::SkippedSizeLimit;
        m.entry_mut("alice/a").unwrap().archive_status = ArchiveStatus::SkippedSizeLimit;
        assert_eq!(m.count_archive_status(ArchiveStatus::SkippedSizeLimit), 2);
        assert_eq!(
            m.repos_with_archive_status(ArchiveStatus::SkippedSizeLimit),
            ["alice/a", "alice/c"]
        );
        assert!(m.entry("alice/missing").is_none());
    }

    #[test]
    fn test_touch_updates_timestamp() {
        let mut m = manifest(Mode::Delete, &["a"]);
        let later = m.updated_at + chrono::Duration::seconds(5);
        m.touch(later);
        assert_eq!(m.updated_at, later);
        assert!(m.created_at < m.updated_at);
    }

    fn status_strategy() -> impl Strategy<Value = RepoStatus> {
        prop_oneof![
            Just(RepoStatus::Pending),
            Just(RepoStatus::BackupOk),
            Just(RepoStatus::Deleted),
            Just(RepoStatus::BackupFailed),
            Just(RepoStatus::DeleteFailed),
        ]
    }

    proptest! {
        #[test]
        fn counters_match_direct_recount(
            edits in prop::collection::vec((0usize..4, status_strategy()), 0..32)
        ) {
            let mut m = manifest(Mode::Delete, &["a", "b", "c", "d"]);
            for (idx, status) in edits {
                m.repo_executions[idx].status = status;
                m.recompute_counters();
            }
            m.recompute_counters();

            let deleted = m.repo_executions.iter().filter(|e| e.status == RepoStatus::Deleted).count();
            let failed = m.repo_executions.iter().filter(|e| e.status.is_failure()).count();
            prop_assert_eq!(m.deleted_count, deleted);
            prop_assert_eq!(m.failed_count, failed);
            prop_assert_eq!(m.skipped_fail_count, failed);
        }
    }
}
