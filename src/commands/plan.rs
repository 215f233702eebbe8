//! `ghm plan`: list, filter, select, sign, write

use anyhow::{Context as _, Result, bail};
use chrono::{DateTime, Utc};
use colored::Colorize;
use dialoguer::MultiSelect;
use dialoguer::theme::ColorfulTheme;
use ghkit::{ExecRunner, GitHubClient};
use planfile::{DEFAULT_HOST, DeletionPlan, RepoRecord};
use regex::Regex;
use std::collections::BTreeSet;
use std::path::PathBuf;

use crate::Context;
use crate::cli::PlanArgs;
use crate::commands::load_secret;
use crate::ui;

/// Which listed repositories are candidates for selection
#[derive(Debug, Default)]
pub struct RepoFilter {
    pub pattern: Option<Regex>,
    pub skip_forks: bool,
    pub skip_archived: bool,
}

impl RepoFilter {
    pub fn from_args(args: &PlanArgs) -> Result<Self> {
        let pattern = args
            .pattern
            .as_deref()
            .map(Regex::new)
            .transpose()
            .context("Invalid --match pattern")?;
        Ok(Self {
            pattern,
            skip_forks: args.skip_forks,
            skip_archived: args.skip_archived,
        })
    }

    pub fn matches(&self, repo: &RepoRecord) -> bool {
        if self.skip_forks && repo.is_fork {
            return false;
        }
        if self.skip_archived && repo.is_archived {
            return false;
        }
        self.pattern
            .as_ref()
            .is_none_or(|re| re.is_match(&repo.full_name))
    }

    pub fn apply(&self, repos: Vec<RepoRecord>) -> Vec<RepoRecord> {
        repos.into_iter().filter(|r| self.matches(r)).collect()
    }
}

/// Pick `names` out of `candidates`. Unknown names are an error.
pub fn select_named(candidates: &[RepoRecord], names: &[String]) -> Result<Vec<RepoRecord>> {
    let wanted: BTreeSet<&str> = names.iter().map(|n| n.trim()).collect();
    let selected: Vec<RepoRecord> = candidates
        .iter()
        .filter(|r| wanted.contains(r.full_name.as_str()))
        .cloned()
        .collect();

    let found: BTreeSet<&str> = selected.iter().map(|r| r.full_name.as_str()).collect();
    let missing: Vec<&str> = wanted.difference(&found).copied().collect();
    if !missing.is_empty() {
        bail!("not found among listed repositories: {}", missing.join(", "));
    }
    Ok(selected)
}

/// Default output file name for a plan created at `now`
pub fn default_plan_path(now: DateTime<Utc>) -> PathBuf {
    PathBuf::from(format!("deletion-plan-{}.json", now.format("%Y%m%d-%H%M%S")))
}

fn label(repo: &RepoRecord) -> String {
    let mut tags = Vec::new();
    if repo.is_private {
        tags.push("private");
    }
    if repo.is_fork {
        tags.push("fork");
    }
    if repo.is_archived {
        tags.push("archived");
    }
    let mut label = repo.full_name.clone();
    if !tags.is_empty() {
        label.push_str(&format!(" [{}]", tags.join(", ")));
    }
    if !repo.description.trim().is_empty() {
        label.push_str(&format!("  {}", ui::truncate(&repo.description, 50)));
    }
    label
}

fn select_interactive(candidates: &[RepoRecord]) -> Result<Vec<RepoRecord>> {
    let items: Vec<String> = candidates.iter().map(label).collect();
    let picked = MultiSelect::with_theme(&ColorfulTheme::default())
        .with_prompt("Select repositories (space to toggle, enter to confirm)")
        .items(&items)
        .interact()
        .context("Selection aborted")?;
    Ok(picked.into_iter().map(|i| candidates[i].clone()).collect())
}

pub fn run(ctx: &Context, args: &PlanArgs) -> Result<()> {
    let github = GitHubClient::new(ExecRunner);
    let actor = github
        .current_user()
        .context("Could not determine the authenticated GitHub user")?;
    let owner = args.owner.as_deref().unwrap_or(&actor);

    let listed = github
        .list_user_repos(Some(owner))
        .with_context(|| format!("Could not list repositories for {owner}"))?;
    let candidates = RepoFilter::from_args(args)?.apply(listed);
    log::info!("{} candidate repositories for {owner}", candidates.len());

    let selected = if args.all {
        candidates
    } else if !args.repos.is_empty() {
        select_named(&candidates, &args.repos)?
    } else if candidates.is_empty() {
        Vec::new()
    } else {
        select_interactive(&candidates)?
    };
    if selected.is_empty() {
        bail!("no repositories selected");
    }

    let now = Utc::now();
    let mut plan = DeletionPlan::new(
        &actor,
        DEFAULT_HOST,
        env!("CARGO_PKG_VERSION"),
        selected,
        now,
    );
    plan.sign(&load_secret()?)?;

    let path = args.out.clone().unwrap_or_else(|| default_plan_path(now));
    planfile::write(&path, &plan)
        .with_context(|| format!("Could not write plan {}", path.display()))?;

    if !ctx.quiet {
        ui::header("Plan");
        for repo in &plan.repos {
            println!("  {} {}", "•".dimmed(), label(repo));
        }
        println!();
        ui::kv("Repositories", &plan.count.to_string());
        ui::kv("Fingerprint", plan.short_fingerprint());
    }
    ui::success(&format!("Plan written to {}", path.display()));
    Ok(())
}
