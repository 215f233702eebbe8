//! `ghm delete`: one repository, no plan, typed confirmation

use anyhow::{Context as _, Result, bail};
use ghkit::{CommandRunner, ExecRunner, GitHubClient};
use lifecycle::RepoDeleter;
use lifecycle::retry::{LogCallback, RetryPolicy, with_retry};
use std::io::{self, BufRead, Write};

use crate::Context;
use crate::cli::DeleteArgs;
use crate::commands::doctor;
use crate::config::GhmConfig;
use crate::ui;

/// Short name of `owner/name`
pub fn short_name(full_name: &str) -> Result<&str> {
    match full_name.trim().split_once('/') {
        Some((owner, name)) if !owner.is_empty() && !name.is_empty() && !name.contains('/') => {
            Ok(name)
        }
        _ => bail!("expected OWNER/NAME, got '{full_name}'"),
    }
}

/// Ask for the repository's short name. Anything else declines.
pub fn confirm_by_name(input: &mut dyn BufRead, out: &mut dyn Write, name: &str) -> Result<bool> {
    write!(out, "Type the repository name ({name}) to delete it: ")?;
    out.flush()?;
    let mut line = String::new();
    input.read_line(&mut line)?;
    Ok(line.trim() == name)
}

/// Check the tools, confirm unless forced, then delete with retries
fn delete_with(
    github: &GitHubClient<impl CommandRunner>,
    args: &DeleteArgs,
    policy: &RetryPolicy,
    input: &mut dyn BufRead,
    out: &mut dyn Write,
) -> Result<()> {
    let full_name = args.repo.trim();
    let name = short_name(full_name)?;
    doctor::check(github)?;

    if !args.force {
        ui::warn(&format!("{full_name} will be deleted without a backup"));
        if !confirm_by_name(input, out, name)? {
            bail!("confirmation did not match, nothing deleted");
        }
    }

    let callback = LogCallback { label: full_name };
    with_retry(
        policy,
        Some(&callback),
        |e| github.is_transient(e),
        || Ok(github.delete_repo(full_name)?),
    )
    .with_context(|| format!("Failed to delete {full_name}"))?;

    ui::success(&format!("Deleted {full_name}"));
    Ok(())
}

pub fn run(_ctx: &Context, args: &DeleteArgs) -> Result<()> {
    let config = GhmConfig::load()?;
    let policy = RetryPolicy::new(
        config.execute.max_delete_retries,
        config.execute.retry_delay(),
    );
    let stdin = io::stdin();
    delete_with(
        &GitHubClient::new(ExecRunner),
        args,
        &policy,
        &mut stdin.lock(),
        &mut io::stdout(),
    )
}
