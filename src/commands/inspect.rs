//! `ghm inspect`: read-only view of a plan and, optionally, its manifest

use anyhow::{Context as _, Result};
use colored::Colorize;
use manifest::{ArchiveStatus, ExecutionManifest, Mode};
use planfile::{DeletionPlan, RepoRecord, Secret};

use crate::Context;
use crate::cli::InspectArgs;
use crate::commands::load_secret;
use crate::ui;

const DESCRIPTION_WIDTH: usize = 60;

/// `valid` or `invalid (<reason>)`
pub fn signature_verdict(plan: &DeletionPlan, secret: &Secret) -> String {
    match plan.validate(secret) {
        Ok(()) => "valid".to_string(),
        Err(e) => format!("invalid ({e})"),
    }
}

fn repo_line(repo: &RepoRecord, width: Option<usize>) -> String {
    let mut line = repo.full_name.clone();
    if repo.is_private {
        line.push_str(" [private]");
    }
    if repo.is_fork {
        line.push_str(" [fork]");
    }
    if repo.is_archived {
        line.push_str(" [archived]");
    }
    let description = repo.description.trim();
    if !description.is_empty() {
        let description = match width {
            Some(w) => ui::truncate(description, w),
            None => description.to_string(),
        };
        line.push_str(&format!("  {description}"));
    }
    line
}

/// Counter lines for a manifest, in display order
pub fn manifest_counters(manifest: &ExecutionManifest) -> Vec<(&'static str, usize)> {
    let total = manifest.repo_executions.len();
    match manifest.mode {
        Mode::Delete => vec![
            ("Deleted", manifest.deleted_count),
            ("Failed", manifest.failed_count),
            ("Total", total),
        ],
        Mode::Backup => vec![
            ("Local failed", manifest.failed_count),
            ("Archived", manifest.count_archive_status(ArchiveStatus::Archived)),
            (
                "Archive failed",
                manifest.count_archive_status(ArchiveStatus::ArchiveFailed),
            ),
            (
                "Archive skipped (size)",
                manifest.count_archive_status(ArchiveStatus::SkippedSizeLimit),
            ),
            ("Total", total),
        ],
    }
}

fn print_manifest(plan: &DeletionPlan, manifest: &ExecutionManifest) {
    ui::section("Manifest");
    ui::kv("Mode", manifest.mode.as_str());
    ui::kv("Backup root", &manifest.backup_root.display().to_string());
    if let Some(repo) = &manifest.archive_repo {
        let branch = manifest.archive_branch.as_deref().unwrap_or("main");
        ui::kv("Archive", &format!("{repo} ({branch})"));
    }
    ui::kv("Created", &manifest.created_at.to_rfc3339());
    ui::kv("Updated", &manifest.updated_at.to_rfc3339());
    for (label, count) in manifest_counters(manifest) {
        ui::kv(label, &count.to_string());
    }
    if manifest.plan_fingerprint != plan.fingerprint {
        ui::warn("Manifest belongs to a different plan");
    }

    let failures: Vec<_> = manifest
        .repo_executions
        .iter()
        .filter(|e| e.error.is_some())
        .collect();
    if !failures.is_empty() {
        ui::section("Errors");
        for entry in failures {
            println!(
                "  {} {} {}",
                entry.full_name,
                format!("[{}]", entry.status).dimmed(),
                entry.error.as_deref().unwrap_or_default()
            );
        }
    }
}

pub fn run(ctx: &Context, args: &InspectArgs) -> Result<()> {
    let plan = planfile::read(&args.plan)
        .with_context(|| format!("Could not read plan {}", args.plan.display()))?;
    let verdict = signature_verdict(&plan, &load_secret()?);

    ui::header("Plan");
    ui::kv("File", &args.plan.display().to_string());
    ui::kv("Schema", &plan.schema_version);
    ui::kv("Created", &plan.created_at);
    ui::kv("Actor", &plan.actor);
    ui::kv("Host", &plan.host);
    ui::kv("Tool version", &plan.tool_version);
    ui::kv("Fingerprint", &plan.fingerprint);
    let verdict = if verdict == "valid" {
        verdict.green().to_string()
    } else {
        verdict.red().to_string()
    };
    ui::kv("Signature", &verdict);

    ui::section(&format!("Repositories ({})", plan.count));
    let width = (ctx.verbose == 0).then_some(DESCRIPTION_WIDTH);
    for repo in &plan.repos {
        println!("  {} {}", "•".dimmed(), repo_line(repo, width));
    }

    if let Some(path) = &args.manifest {
        let manifest = ExecutionManifest::load(path)
            .with_context(|| format!("Could not read manifest {}", path.display()))?;
        print_manifest(&plan, &manifest);
    }
    Ok(())
}
