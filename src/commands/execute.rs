//! `ghm execute` (delete mode) and `ghm backup` (backup mode)

use anyhow::{Context as _, Result, bail};
use colored::Colorize;
use ghkit::{ExecRunner, GitArchive, GitBackup, GitHubClient};
use lifecycle::{
    ArchiveOptions, ExecuteConfig, ExecutionReport, Executor, HomeDirLocator,
    size_filter::SKIPPED_SIZE_DIR,
};
use manifest::Mode;
use planfile::{DEFAULT_HOST, DeletionPlan, Secret};
use std::io::{self, Write};

use crate::Context;
use crate::cli::{BackupArgs, ExecuteArgs, RunArgs};
use crate::commands::{doctor, load_secret};
use crate::config::GhmConfig;
use crate::ui;

/// How many plan targets are listed before the confirmation prompt
const PREVIEW_LIMIT: usize = 20;

/// Refuse plans that are tampered with, belong to someone else or target another host
pub fn validate_for_execution(plan: &DeletionPlan, secret: &Secret, actor: &str) -> Result<()> {
    plan.validate(secret).context("plan validation failed")?;
    if plan.actor != actor {
        bail!("actor mismatch: plan={} current={actor}", plan.actor);
    }
    if plan.host != DEFAULT_HOST {
        bail!("unsupported host: {}", plan.host);
    }
    Ok(())
}

fn base_config(mode: Mode, args: &RunArgs, config: &GhmConfig) -> ExecuteConfig {
    ExecuteConfig {
        plan_path: args.plan.clone(),
        mode,
        backup_dir: args.backup_location.clone(),
        resume: !args.no_resume,
        dry_run: args.dry_run,
        max_delete_retries: config.execute.max_delete_retries,
        delete_retry_delay: config.execute.retry_delay(),
        archive: ArchiveOptions::default(),
    }
}

pub fn delete_config(args: &ExecuteArgs, config: &GhmConfig) -> ExecuteConfig {
    let mut exec = base_config(Mode::Delete, &args.run, config);
    if let Some(retries) = args.max_retries {
        exec.max_delete_retries = retries;
    }
    exec
}

pub fn backup_config(args: &BackupArgs, config: &GhmConfig) -> Result<ExecuteConfig> {
    let mut exec = base_config(Mode::Backup, &args.run, config);
    exec.archive = ArchiveOptions {
        repo: args.archive_repo.clone().or_else(|| config.archive.repo.clone()),
        branch: Some(
            args.archive_branch
                .clone()
                .unwrap_or_else(|| config.archive.branch.clone()),
        ),
        visibility: Some(
            args.archive_visibility
                .map_or(config.archive.visibility, Into::into),
        ),
        disabled: args.no_archive,
        max_bundle_bytes: config.archive.max_bundle_bytes()?,
    };
    Ok(exec)
}

fn preview(plan: &DeletionPlan, mode: Mode) {
    let verb = match mode {
        Mode::Delete => "back up and DELETE",
        Mode::Backup => "back up",
    };
    ui::header(&format!("About to {verb} {} repositories", plan.count));
    ui::kv("Plan", plan.short_fingerprint());
    ui::kv("Actor", &plan.actor);
    for repo in plan.repos.iter().take(PREVIEW_LIMIT) {
        println!("  {} {}", "•".dimmed(), repo.full_name);
    }
    if plan.repos.len() > PREVIEW_LIMIT {
        ui::dim(&format!("... and {} more", plan.repos.len() - PREVIEW_LIMIT));
    }
    println!();
}

/// Lines printed after a run
pub fn summary_lines(mode: Mode, report: &ExecutionReport) -> Vec<String> {
    let mut lines = Vec::new();
    match mode {
        Mode::Delete => {
            if report.dry_run {
                lines.push("execution dry-run complete".to_string());
            }
            lines.push(format!(
                "execution complete: deleted={} failed={} total={}",
                report.deleted, report.failed, report.total
            ));
        }
        Mode::Backup => {
            if report.dry_run {
                lines.push("backup dry-run complete".to_string());
            }
            lines.push(format!(
                "backup complete: local_failed={} archive_failed={} archive_skipped_size={} total={}",
                report.failed, report.archive_failed, report.archive_skipped_size, report.total
            ));
        }
    }

    lines.push(format!("backup root: {}", report.backup_root.display()));
    if let Some(path) = &report.manifest_path {
        lines.push(format!("manifest: {}", path.display()));
    }

    if report.archive_skipped_size > 0 {
        lines.push(format!(
            "archive skipped folder: {}",
            report.backup_root.join(SKIPPED_SIZE_DIR).display()
        ));
        lines.push("archive skipped repos:".to_string());
        lines.extend(report.archive_skipped_repos.iter().map(|r| format!("- {r}")));
    }
    if let Some(repo) = &report.archive_repo {
        lines.push(format!("archive repo: {repo}"));
    }
    if let Some(branch) = &report.archive_branch {
        lines.push(format!("archive branch: {branch}"));
    }
    if let Some(commit) = &report.archive_commit {
        lines.push(format!("archive commit: {commit}"));
    }
    lines
}

/// Validate, confirm and run `exec` against the real gh/git adapters
pub fn run(ctx: &Context, exec: &ExecuteConfig, config: &GhmConfig) -> Result<()> {
    let github = GitHubClient::new(ExecRunner);
    doctor::check(&github)?;

    let secret = load_secret()?;
    let plan = planfile::read(&exec.plan_path)
        .with_context(|| format!("Could not read plan {}", exec.plan_path.display()))?;
    let actor = github
        .current_user()
        .context("Could not determine the authenticated GitHub user")?;
    validate_for_execution(&plan, &secret, &actor)?;

    if !ctx.quiet {
        preview(&plan, exec.mode);
    }

    let locator = config
        .backup_location()
        .map_or_else(HomeDirLocator::new, HomeDirLocator::with_home);
    let backup = GitBackup::new(ExecRunner);
    let publisher = GitArchive::new(ExecRunner);

    let executor = Executor::new(&locator).with_backup(&backup);
    let executor = match exec.mode {
        Mode::Delete => executor.with_deleter(&github),
        Mode::Backup => executor.with_repo_manager(&github).with_publisher(&publisher),
    };

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let report = executor.execute(exec, &plan, &mut stdin.lock(), &mut stdout)?;

    println!();
    for line in summary_lines(exec.mode, &report) {
        writeln!(stdout, "{line}")?;
    }

    if report.failed > 0 || report.archive_failed > 0 {
        ui::warn("Some repositories failed; run the same command again to resume");
    } else if !report.dry_run {
        ui::success("Done");
    }
    Ok(())
}

pub fn execute(ctx: &Context, args: &ExecuteArgs) -> Result<()> {
    let config = GhmConfig::load()?;
    run(ctx, &delete_config(args, &config), &config)
}

pub fn backup(ctx: &Context, args: &BackupArgs) -> Result<()> {
    let config = GhmConfig::load()?;
    run(ctx, &backup_config(args, &config)?, &config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Command};
    use chrono::Utc;
    use clap::Parser;
    use lifecycle::Visibility;
    use planfile::RepoRecord;
    use std::path::PathBuf;

    fn secret() -> Secret {
        Secret::from_bytes(vec![7u8; 32])
    }

    fn signed_plan(actor: &str, host: &str) -> DeletionPlan {
        let mut plan = DeletionPlan::new(
            actor,
            host,
            "test",
            vec![RepoRecord::new(actor, "r1")],
            Utc::now(),
        );
        plan.sign(&secret()).unwrap();
        plan
    }

    #[test]
    fn test_validate_accepts_own_plan() {
        let plan = signed_plan("alice", DEFAULT_HOST);
        validate_for_execution(&plan, &secret(), "alice").unwrap();
    }

    #[test]
    fn test_validate_rejects_other_actor() {
        let plan = signed_plan("alice", DEFAULT_HOST);
        let err = validate_for_execution(&plan, &secret(), "mallory").unwrap_err();
        assert_eq!(err.to_string(), "actor mismatch: plan=alice current=mallory");
    }

    #[test]
    fn test_validate_rejects_other_host() {
        let plan = signed_plan("alice", "ghe.example.com");
        let err = validate_for_execution(&plan, &secret(), "alice").unwrap_err();
        assert_eq!(err.to_string(), "unsupported host: ghe.example.com");
    }

    #[test]
    fn test_validate_rejects_tampering() {
        let mut plan = signed_plan("alice", DEFAULT_HOST);
        plan.repos.push(RepoRecord::new("alice", "sneaky"));
        plan.count += 1;
        let err = validate_for_execution(&plan, &secret(), "alice").unwrap_err();
        assert!(err.to_string().starts_with("plan validation failed"));
    }

    #[test]
    fn test_backup_flags_override_config() {
        let mut config = GhmConfig::default();
        config.archive.repo = Some("alice/from-config".into());
        config.archive.branch = "cfg".into();
        config.execute.max_delete_retries = 9;

        let cli = Cli::try_parse_from([
            "ghm",
            "backup",
            "--plan",
            "p.json",
            "--archive-branch",
            "flag",
            "--archive-visibility",
            "public",
            "--no-resume",
        ])
        .unwrap();
        let Command::Backup(args) = cli.command else {
            panic!("expected backup");
        };

        let exec = backup_config(&args, &config).unwrap();
        assert_eq!(exec.mode, Mode::Backup);
        assert!(!exec.resume);
        assert_eq!(exec.archive.repo.as_deref(), Some("alice/from-config"));
        assert_eq!(exec.archive.branch.as_deref(), Some("flag"));
        assert_eq!(exec.archive.visibility, Some(Visibility::Public));
        assert_eq!(exec.max_delete_retries, 9);
    }

    #[test]
    fn test_delete_retries_flag() {
        let cli = Cli::try_parse_from([
            "ghm",
            "execute",
            "--plan",
            "p.json",
            "--max-retries",
            "5",
            "--backup-location",
            "/b",
        ])
        .unwrap();
        let Command::Execute(args) = cli.command else {
            panic!("expected execute");
        };
        let exec = delete_config(&args, &GhmConfig::default());
        assert_eq!(exec.mode, Mode::Delete);
        assert_eq!(exec.max_delete_retries, 5);
        assert_eq!(exec.backup_dir, Some(PathBuf::from("/b")));
        assert!(exec.resume);
    }

    #[test]
    fn test_summary_lines_backup() {
        let report = ExecutionReport {
            manifest_path: Some(PathBuf::from("/b/manifest.json")),
            backup_root: PathBuf::from("/b"),
            failed: 1,
            archive_skipped_size: 1,
            total: 3,
            archive_repo: Some("alice/ghm-archive".into()),
            archive_branch: Some("main".into()),
            archive_commit: Some("abc".into()),
            archive_skipped_repos: vec!["alice/big".into()],
            ..Default::default()
        };
        let lines = summary_lines(Mode::Backup, &report);
        assert_eq!(
            lines,
            [
                "backup complete: local_failed=1 archive_failed=0 archive_skipped_size=1 total=3",
                "backup root: /b",
                "manifest: /b/manifest.json",
                "archive skipped folder: /b/archive-skipped-size",
                "archive skipped repos:",
                "- alice/big",
                "archive repo: alice/ghm-archive",
                "archive branch: main",
                "archive commit: abc",
            ]
        );
    }

    #[test]
    fn test_summary_lines_delete_dry_run() {
        let report = ExecutionReport {
            backup_root: PathBuf::from("/b"),
            total: 2,
            dry_run: true,
            ..Default::default()
        };
        let lines = summary_lines(Mode::Delete, &report);
        assert_eq!(lines[0], "execution dry-run complete");
        assert_eq!(lines[1], "execution complete: deleted=0 failed=0 total=2");
        assert_eq!(lines.len(), 3);
    }
}
