//! Dry-run rehearsal: one line per stage that a real run would perform.

use manifest::Mode;
use planfile::DeletionPlan;
use std::io::Write;
use std::path::Path;

use crate::output::emit;
use crate::types::{ArchiveTarget, ExecutionReport};

/// Describe the run without touching the filesystem or any collaborator.
pub fn simulate(
    mode: Mode,
    plan: &DeletionPlan,
    backup_root: &Path,
    archive: Option<&ArchiveTarget>,
    out: &mut dyn Write,
) -> ExecutionReport {
    for repo in &plan.repos {
        let name = &repo.full_name;
        emit(out, format_args!("[dry-run] Would mirror backup {name} to {}", backup_root.display()));
        emit(out, format_args!("[dry-run] Would create browsable snapshot for {name}"));
        match mode {
            Mode::Backup => emit(out, format_args!("[dry-run] Would create bundle for {name}")),
            Mode::Delete => emit(out, format_args!("[dry-run] Would delete {name}")),
        }
    }

    let archive = archive.filter(|_| mode == Mode::Backup);
    if let Some(target) = archive {
        emit(
            out,
            format_args!(
                "[dry-run] Would publish bundles to {} (branch {})",
                target.repo, target.branch
            ),
        );
    }

    ExecutionReport {
        manifest_path: None,
        backup_root: backup_root.to_path_buf(),
        total: plan.repos.len(),
        archive_repo: archive.map(|t| t.repo.clone()),
        archive_branch: archive.map(|t| t.branch.clone()),
        dry_run: true,
        ..Default::default()
    }
}
