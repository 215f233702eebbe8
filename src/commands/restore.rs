//! `ghm restore`: list or restore repositories from a backup root

use anyhow::{Context as _, Result, bail};
use colored::Colorize;
use ghkit::{
    ArchiveEntry, ExecRunner, RestoreRequest, RestoreService, SourceKind, is_archive_root,
    load_index,
};
use std::fs;
use std::path::Path;

use crate::Context;
use crate::cli::RestoreArgs;
use crate::ui;

/// Resolve `args` against the index into a restore request
pub fn build_request(entries: &[ArchiveEntry], args: &RestoreArgs) -> Result<RestoreRequest> {
    let Some(full_name) = args.repo.as_deref().map(str::trim) else {
        bail!("--repo is required unless --list is given");
    };
    let Some(entry) = entries.iter().find(|e| e.full_name == full_name) else {
        bail!(
            "{full_name} not found in {}",
            args.archive_root.display()
        );
    };
    let Some(source) = entry.preferred_source() else {
        bail!("no bundle or snapshot on disk for {full_name}");
    };
    let (owner, name) = full_name
        .split_once('/')
        .with_context(|| format!("expected OWNER/NAME, got '{full_name}'"))?;

    Ok(RestoreRequest {
        source,
        owner: args.target_owner.clone().unwrap_or_else(|| owner.to_string()),
        name: args.target_name.clone().unwrap_or_else(|| name.to_string()),
        visibility: args.visibility.into(),
    })
}

fn list(root: &Path, entries: &[ArchiveEntry]) {
    ui::header(&format!("Restorable repositories in {}", root.display()));
    if entries.is_empty() {
        ui::info("Nothing to restore");
        return;
    }
    for entry in entries {
        let (source, size) = match entry.preferred_source() {
            Some(s) if s.kind == SourceKind::Bundle => (
                s.kind.to_string(),
                fs::metadata(&s.path)
                    .map(|m| ui::format_size(m.len()))
                    .unwrap_or_default(),
            ),
            Some(s) => (s.kind.to_string(), String::new()),
            None => ("missing".red().to_string(), String::new()),
        };
        let updated = entry
            .updated_at
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default();
        println!(
            "  {} {:<40} {:<9} {:>10}  {}",
            "•".dimmed(),
            entry.full_name,
            source,
            size,
            updated.dimmed()
        );
    }
}

pub fn run(_ctx: &Context, args: &RestoreArgs) -> Result<()> {
    let root = &args.archive_root;
    if !is_archive_root(root) {
        bail!("{} does not look like a backup root", root.display());
    }
    let entries = load_index(root)
        .with_context(|| format!("Could not index {}", root.display()))?;

    if args.list {
        list(root, &entries);
        return Ok(());
    }

    let request = build_request(&entries, args)?;
    ui::info(&format!(
        "Restoring {} from {} {}",
        request.target_full_name(),
        request.source.kind,
        request.source.path.display()
    ));

    match RestoreService::new(ExecRunner).restore(&request) {
        Ok(outcome) => {
            ui::success(&format!("Restored {}", outcome.target_full_name));
            Ok(())
        }
        Err(e) => {
            if let Some(suggested) = e.suggested_name() {
                ui::dim(&format!("Try again with --target-name {suggested}"));
            }
            Err(e.into())
        }
    }
}
