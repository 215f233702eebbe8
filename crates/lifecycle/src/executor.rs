//! Plan executor
//!
//! Drives each plan target through mirror, snapshot and then either bundle
//! (backup mode) or delete (delete mode), persisting the manifest after
//! every step. Backup mode finishes with one archive publication batch.
//!
//! Run-level problems (missing collaborators, rejected confirmation,
//! manifest mismatch) abort before anything irreversible happens.
//! Per-repository problems are recorded on the entry and the run goes on.

use chrono::{DateTime, Utc};
use manifest::{
    ArchiveStatus, BundleArtifact, ExecutionManifest, Mode, NewOptions, RepoStatus,
};
use planfile::{DeletionPlan, RepoRecord};
use std::collections::HashMap;
use std::fs;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use crate::confirm::require_confirmation;
use crate::context::{
    ArchivePublisher, ArchiveRepoManager, BackupProvider, BackupRootLocator, PublishRequest,
    RepoDeleter,
};
use crate::error::{ExecuteError, Result};
use crate::output::emit;
use crate::retry::{LogCallback, RetryPolicy, with_retry};
use crate::simulate::simulate;
use crate::size_filter::{SKIPPED_SIZE_DIR, filter_bundles_by_size};
use crate::types::{ArchiveTarget, ExecuteConfig, ExecutionReport};

type Clock<'a> = Box<dyn Fn() -> DateTime<Utc> + 'a>;

/// Orchestrates one plan execution against injected collaborators.
pub struct Executor<'a> {
    deleter: Option<&'a dyn RepoDeleter>,
    repo_manager: Option<&'a dyn ArchiveRepoManager>,
    backup: Option<&'a dyn BackupProvider>,
    publisher: Option<&'a dyn ArchivePublisher>,
    locator: &'a dyn BackupRootLocator,
    clock: Clock<'a>,
}

impl<'a> Executor<'a> {
    pub fn new(locator: &'a dyn BackupRootLocator) -> Self {
        Self {
            deleter: None,
            repo_manager: None,
            backup: None,
            publisher: None,
            locator,
            clock: Box::new(Utc::now),
        }
    }

    pub fn with_deleter(mut self, deleter: &'a dyn RepoDeleter) -> Self {
        self.deleter = Some(deleter);
        self
    }

    pub fn with_repo_manager(mut self, manager: &'a dyn ArchiveRepoManager) -> Self {
        self.repo_manager = Some(manager);
        self
    }

    pub fn with_backup(mut self, backup: &'a dyn BackupProvider) -> Self {
        self.backup = Some(backup);
        self
    }

    pub fn with_publisher(mut self, publisher: &'a dyn ArchivePublisher) -> Self {
        self.publisher = Some(publisher);
        self
    }

    /// Replace the wall clock, mostly for tests.
    pub fn with_clock(mut self, clock: impl Fn() -> DateTime<Utc> + 'a) -> Self {
        self.clock = Box::new(clock);
        self
    }

    fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    /// Run `plan` with `config`.
    ///
    /// The caller is expected to have validated the plan signature already.
    /// `input` supplies the confirmation line; progress goes to `out`.
    pub fn execute(
        &self,
        config: &ExecuteConfig,
        plan: &DeletionPlan,
        input: &mut dyn BufRead,
        out: &mut dyn Write,
    ) -> Result<ExecutionReport> {
        let backup = self.check_collaborators(config)?;
        let archive = match config.mode {
            Mode::Backup => config.archive.resolve(&plan.actor),
            Mode::Delete => None,
        };

        let backup_root = self.resolve_backup_root(config, plan)?;
        log::debug!(
            "Executing {} plan {} with backup root {}",
            config.mode,
            plan.short_fingerprint(),
            backup_root.display()
        );

        require_confirmation(input, out)?;

        if config.dry_run {
            return Ok(simulate(config.mode, plan, &backup_root, archive.as_ref(), out));
        }

        create_private_dir(&backup_root)?;
        let manifest_path = ExecutionManifest::path(&backup_root);
        let manifest =
            self.load_or_create_manifest(config, plan, &backup_root, &manifest_path, archive.as_ref())?;

        let mut run = Run {
            manifest,
            path: manifest_path,
            backup_root,
        };
        let records: HashMap<&str, &RepoRecord> =
            plan.repos.iter().map(|r| (r.full_name.as_str(), r)).collect();

        let mut bundles = Vec::new();
        for idx in 0..run.manifest.repo_executions.len() {
            let full_name = run.manifest.repo_executions[idx].full_name.clone();
            let repo = records.get(full_name.as_str()).copied();
            if let Some(artifact) = self.process_entry(&mut run, idx, repo, config, backup, out)? {
                bundles.push(artifact);
            }
        }

        let mut archive_commit = None;
        if config.mode == Mode::Backup {
            match &archive {
                Some(target) if !bundles.is_empty() => {
                    archive_commit = self.publish_archive(&mut run, target, bundles, plan, out)?;
                }
                _ => {
                    mark_archive_skipped(&mut run.manifest);
                    run.persist(self.now())?;
                }
            }
        }

        run.manifest.recompute_counters();
        run.persist(self.now())?;

        let m = &run.manifest;
        Ok(ExecutionReport {
            manifest_path: Some(run.path.clone()),
            backup_root: run.backup_root.clone(),
            deleted: m.deleted_count,
            failed: m.failed_count,
            archive_failed: m.count_archive_status(ArchiveStatus::ArchiveFailed),
            archive_skipped_size: m.count_archive_status(ArchiveStatus::SkippedSizeLimit),
            total: m.repo_executions.len(),
            archive_commit,
            archive_repo: archive.as_ref().map(|t| t.repo.clone()),
            archive_branch: archive.as_ref().map(|t| t.branch.clone()),
            archive_skipped_repos: m.repos_with_archive_status(ArchiveStatus::SkippedSizeLimit),
            dry_run: false,
        })
    }

    fn check_collaborators(&self, config: &ExecuteConfig) -> Result<&'a dyn BackupProvider> {
        let backup = self.backup.ok_or(ExecuteError::MissingBackupProvider)?;
        match config.mode {
            Mode::Delete if self.deleter.is_none() => Err(ExecuteError::MissingDeleter),
            Mode::Backup
                if !config.archive.disabled
                    && (self.repo_manager.is_none() || self.publisher.is_none()) =>
            {
                Err(ExecuteError::MissingArchiveServices)
            }
            _ => Ok(backup),
        }
    }

    /// Absolute backup root for this run. Artifact paths recorded in the
    /// manifest are built from it, so they never depend on the working
    /// directory.
    fn resolve_backup_root(&self, config: &ExecuteConfig, plan: &DeletionPlan) -> Result<PathBuf> {
        let root = if let Some(dir) = &config.backup_dir {
            dir.clone()
        } else if config.resume
            && let Some(found) = self.locator.find_resumable(&plan.fingerprint)
        {
            found
        } else {
            self.locator
                .allocate(self.now())
                .map_err(ExecuteError::BackupRoot)?
        };
        std::path::absolute(&root).map_err(ExecuteError::BackupRoot)
    }

    fn load_or_create_manifest(
        &self,
        config: &ExecuteConfig,
        plan: &DeletionPlan,
        backup_root: &Path,
        manifest_path: &Path,
        archive: Option<&ArchiveTarget>,
    ) -> Result<ExecutionManifest> {
        if manifest_path.exists() {
            if !config.resume {
                return Err(ExecuteError::ManifestExists(manifest_path.to_path_buf()));
            }
            let manifest = ExecutionManifest::load(manifest_path)?;
            if manifest.plan_fingerprint != plan.fingerprint {
                return Err(ExecuteError::ManifestFingerprintMismatch {
                    manifest: manifest.plan_fingerprint,
                    plan: plan.fingerprint.clone(),
                });
            }
            if manifest.mode != config.mode {
                return Err(ExecuteError::ManifestModeMismatch {
                    manifest: manifest.mode,
                    requested: config.mode,
                });
            }
            log::info!("Resuming from {}", manifest_path.display());
            return Ok(manifest);
        }

        let mut manifest = ExecutionManifest::new(
            &config.plan_path,
            backup_root,
            plan,
            self.now(),
            NewOptions {
                mode: config.mode,
                archive_repo: archive.map(|t| t.repo.clone()),
                archive_branch: archive.map(|t| t.branch.clone()),
            },
        );
        manifest.save(manifest_path)?;
        log::debug!("Created manifest {}", manifest_path.display());
        Ok(manifest)
    }

    /// Advance one entry as far as it can go this pass.
    ///
    /// Returns the bundle to publish when the entry ends up ready for the
    /// archive batch.
    fn process_entry(
        &self,
        run: &mut Run,
        idx: usize,
        repo: Option<&RepoRecord>,
        config: &ExecuteConfig,
        backup: &dyn BackupProvider,
        out: &mut dyn Write,
    ) -> Result<Option<BundleArtifact>> {
        let mode = config.mode;
        let entry = &run.manifest.repo_executions[idx];

        if is_complete(mode, entry) {
            log::debug!("Skipping {} ({})", entry.full_name, entry.status);
            return Ok(repo.and_then(|r| pending_archive(r, entry)));
        }
        let needs_mirror = entry.backup_path.is_none()
            || matches!(entry.status, RepoStatus::Pending | RepoStatus::BackupFailed);

        let Some(repo) = repo else {
            let now = self.now();
            let entry = &mut run.manifest.repo_executions[idx];
            log::warn!("{} is in the manifest but not in the plan", entry.full_name);
            entry.record_attempt(now);
            entry.mark_failed(RepoStatus::DeleteFailed, "repo missing from plan");
            run.persist(now)?;
            return Ok(None);
        };

        let root = run.backup_root.clone();
        if needs_mirror && !self.run_stage(run, idx, Stage::Mirror, out, || backup.mirror(repo, &root))? {
            return Ok(None);
        }

        if run.manifest.repo_executions[idx].browsable_path.is_none()
            && !self.run_stage(run, idx, Stage::Snapshot, out, || backup.snapshot(repo, &root))?
        {
            return Ok(None);
        }

        match mode {
            Mode::Backup => {
                if run.manifest.repo_executions[idx].bundle_path.is_none()
                    && !self.run_stage(run, idx, Stage::Bundle, out, || backup.bundle(repo, &root))?
                {
                    return Ok(None);
                }
                let entry = &run.manifest.repo_executions[idx];
                Ok(entry.bundle_path.clone().map(|bundle_path| BundleArtifact {
                    full_name: repo.full_name.clone(),
                    bundle_path,
                    updated_at: repo.updated_at.clone(),
                }))
            }
            Mode::Delete => {
                self.delete_stage(run, idx, repo, config, out)?;
                Ok(None)
            }
        }
    }

    /// Run one backup stage with attempt bookkeeping. Returns whether the
    /// entry may continue to the next stage.
    fn run_stage(
        &self,
        run: &mut Run,
        idx: usize,
        stage: Stage,
        out: &mut dyn Write,
        op: impl FnOnce() -> anyhow::Result<PathBuf>,
    ) -> Result<bool> {
        let full_name = run.manifest.repo_executions[idx].full_name.clone();
        emit(out, format_args!("{} {full_name}...", stage.progress()));

        let result = op();
        let now = self.now();
        let entry = &mut run.manifest.repo_executions[idx];
        entry.record_attempt(now);

        let ok = match result {
            Ok(path) => {
                log::debug!("{} for {full_name}: {}", stage.name(), path.display());
                match stage {
                    Stage::Mirror => {
                        entry.backup_path = Some(path);
                        entry.status = RepoStatus::BackupOk;
                    }
                    Stage::Snapshot => entry.browsable_path = Some(path),
                    Stage::Bundle => entry.bundle_path = Some(path),
                }
                entry.error = None;
                true
            }
            Err(e) => {
                let cause = format!("{e:#}");
                log::warn!("{} failed for {full_name}: {cause}", stage.name());
                emit(out, format_args!("{} failed for {full_name}: {cause}", stage.label()));
                entry.mark_failed(RepoStatus::BackupFailed, cause);
                false
            }
        };

        run.persist(now)?;
        Ok(ok)
    }

    fn delete_stage(
        &self,
        run: &mut Run,
        idx: usize,
        repo: &RepoRecord,
        config: &ExecuteConfig,
        out: &mut dyn Write,
    ) -> Result<()> {
        let deleter = self.deleter.ok_or(ExecuteError::MissingDeleter)?;
        let name = repo.full_name.as_str();
        emit(out, format_args!("Deleting {name}..."));

        let policy = RetryPolicy::new(config.effective_delete_retries(), config.delete_retry_delay);
        let label = format!("Delete of {name}");
        let callback = LogCallback { label: &label };
        let result = with_retry(
            &policy,
            Some(&callback),
            |e| deleter.is_transient(e),
            || deleter.delete_repo(name),
        );

        let now = self.now();
        let entry = &mut run.manifest.repo_executions[idx];
        entry.record_attempt(now);
        match result {
            Ok(()) => {
                entry.status = RepoStatus::Deleted;
                entry.error = None;
                log::info!("Deleted {name}");
                emit(out, format_args!("Deleted {name}"));
            }
            Err(e) => {
                let cause = format!("{e:#}");
                log::warn!("Delete failed for {name}: {cause}");
                emit(out, format_args!("Delete failed for {name}: {cause}"));
                entry.mark_failed(RepoStatus::DeleteFailed, cause);
            }
        }
        run.persist(now)
    }

    fn publish_archive(
        &self,
        run: &mut Run,
        target: &ArchiveTarget,
        bundles: Vec<BundleArtifact>,
        plan: &DeletionPlan,
        out: &mut dyn Write,
    ) -> Result<Option<String>> {
        let outcome = filter_bundles_by_size(
            &run.backup_root,
            bundles,
            &mut run.manifest,
            target.max_bundle_bytes,
            out,
        );
        run.persist(self.now())?;

        if !outcome.skipped.is_empty() {
            emit(
                out,
                format_args!(
                    "Archive size-skip: {} bundle(s) moved to {}",
                    outcome.skipped.len(),
                    run.backup_root.join(SKIPPED_SIZE_DIR).display()
                ),
            );
        }
        if outcome.eligible.is_empty() {
            emit(out, format_args!("No bundles eligible for archive publish after size checks."));
            return Ok(None);
        }

        let (Some(manager), Some(publisher)) = (self.repo_manager, self.publisher) else {
            return Err(ExecuteError::MissingArchiveServices);
        };

        emit(
            out,
            format_args!(
                "Publishing {} bundle(s) to {} (branch {})...",
                outcome.eligible.len(),
                target.repo,
                target.branch
            ),
        );
        let request = PublishRequest {
            archive_repo: &target.repo,
            branch: &target.branch,
            backup_root: &run.backup_root,
            bundles: &outcome.eligible,
            plan_fingerprint: &plan.fingerprint,
        };
        let published = manager
            .ensure_repo(&target.repo, target.visibility)
            .map_err(|e| e.context(format!("failed to ensure archive repository {}", target.repo)))
            .and_then(|()| publisher.publish(&request));

        let commit = match published {
            Ok(commit) => {
                log::info!("Published {} bundle(s) as {commit}", outcome.eligible.len());
                mark_archive_result(&mut run.manifest, &outcome.eligible, Ok(commit.as_str()));
                Some(commit)
            }
            Err(e) => {
                let cause = format!("{e:#}");
                log::warn!("Archive publish failed: {cause}");
                emit(out, format_args!("Archive publish failed: {cause}"));
                mark_archive_result(&mut run.manifest, &outcome.eligible, Err(cause.as_str()));
                None
            }
        };
        run.persist(self.now())?;
        Ok(commit)
    }
}

/// Mutable state of one non-dry run
struct Run {
    manifest: ExecutionManifest,
    path: PathBuf,
    backup_root: PathBuf,
}

impl Run {
    fn persist(&mut self, now: DateTime<Utc>) -> Result<()> {
        self.manifest.touch(now);
        self.manifest.save(&self.path)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
enum Stage {
    Mirror,
    Snapshot,
    Bundle,
}

impl Stage {
    const fn name(self) -> &'static str {
        match self {
            Self::Mirror => "mirror",
            Self::Snapshot => "snapshot",
            Self::Bundle => "bundle",
        }
    }

    const fn progress(self) -> &'static str {
        match self {
            Self::Mirror => "Backing up",
            Self::Snapshot => "Creating browsable snapshot",
            Self::Bundle => "Creating bundle",
        }
    }

    const fn label(self) -> &'static str {
        match self {
            Self::Mirror => "Backup",
            Self::Snapshot => "Browsable snapshot",
            Self::Bundle => "Bundle",
        }
    }
}

/// Terminal success for the current mode; resumed runs leave these alone.
fn is_complete(mode: Mode, entry: &manifest::RepoExecutionEntry) -> bool {
    match mode {
        Mode::Delete => entry.status == RepoStatus::Deleted,
        Mode::Backup => entry.status == RepoStatus::BackupOk && entry.bundle_path.is_some(),
    }
}

/// A completed backup whose bundle never made it into the archive.
fn pending_archive(
    repo: &RepoRecord,
    entry: &manifest::RepoExecutionEntry,
) -> Option<BundleArtifact> {
    if !matches!(
        entry.archive_status,
        ArchiveStatus::Pending | ArchiveStatus::ArchiveFailed
    ) {
        return None;
    }
    if entry.status != RepoStatus::BackupOk {
        return None;
    }
    entry.bundle_path.clone().map(|bundle_path| BundleArtifact {
        full_name: repo.full_name.clone(),
        bundle_path,
        updated_at: repo.updated_at.clone(),
    })
}

fn is_archivable(entry: &manifest::RepoExecutionEntry) -> bool {
    entry.status == RepoStatus::BackupOk && entry.bundle_path.is_some()
}

fn mark_archive_result(
    manifest: &mut ExecutionManifest,
    published: &[BundleArtifact],
    result: std::result::Result<&str, &str>,
) {
    for artifact in published {
        let Some(entry) = manifest.entry_mut(&artifact.full_name) else {
            continue;
        };
        if !is_archivable(entry) {
            continue;
        }
        match result {
            Ok(commit) => {
                entry.archive_status = ArchiveStatus::Archived;
                entry.archive_commit = Some(commit.to_string());
                entry.error = None;
            }
            Err(cause) => {
                entry.mark_archive(ArchiveStatus::ArchiveFailed, Some(cause.to_string()));
            }
        }
    }
}

fn mark_archive_skipped(manifest: &mut ExecutionManifest) {
    for entry in &mut manifest.repo_executions {
        if is_archivable(entry) && entry.archive_status == ArchiveStatus::Pending {
            entry.archive_status = ArchiveStatus::Skipped;
        }
    }
}

fn create_private_dir(dir: &Path) -> Result<()> {
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o700);
    }
    builder
        .create(dir)
        .map_err(|e| ExecuteError::io(dir, e))
}
