use anyhow::{Result, bail};
use colored::Colorize;
use ghkit::{CommandRunner, GitHubClient};

use crate::Context;
use crate::runner;
use crate::ui;

/// Tools ghm shells out to
pub const REQUIRED_COMMANDS: [&str; 2] = ["gh", "git"];

struct Issue {
    summary: String,
    detail: Option<String>,
    fix_cmd: Option<&'static str>,
}

/// Find every problem that would stop ghm from working
fn collect_issues(
    exists: impl Fn(&str) -> bool,
    github: &GitHubClient<impl CommandRunner>,
) -> Vec<Issue> {
    let mut issues = Vec::new();

    for cmd in REQUIRED_COMMANDS {
        if !exists(cmd) {
            issues.push(Issue {
                summary: format!("missing dependency \"{cmd}\" in PATH"),
                detail: None,
                fix_cmd: Some(if cmd == "gh" {
                    "brew install gh"
                } else {
                    "brew install git"
                }),
            });
        }
    }

    // Auth can only be checked with gh present
    if exists("gh")
        && let Err(e) = github.auth_status()
    {
        issues.push(Issue {
            summary: "gh auth status failed".to_string(),
            detail: Some(e.to_string()),
            fix_cmd: Some("gh auth login --scopes delete_repo"),
        });
    }

    issues
}

/// Fail with the first problem found. Used before any plan executes.
pub fn check(github: &GitHubClient<impl CommandRunner>) -> Result<()> {
    if let Some(issue) = collect_issues(runner::command_exists, github).into_iter().next() {
        match issue.detail {
            Some(detail) => bail!("{}: {detail}", issue.summary),
            None => bail!("{}", issue.summary),
        }
    }
    Ok(())
}

pub fn run(ctx: &Context, github: &GitHubClient<impl CommandRunner>) -> Result<()> {
    ui::header("ghm Health Check");

    let issues = collect_issues(runner::command_exists, github);

    if !ctx.quiet {
        ui::section("Required Commands");
        for cmd in REQUIRED_COMMANDS {
            if runner::command_exists(cmd) {
                println!("  {} {}", "✓".green(), cmd);
            } else {
                println!("  {} {}", "✗".red(), cmd);
            }
        }
    }

    println!();
    if issues.is_empty() {
        ui::success("All checks passed");
        return Ok(());
    }

    ui::header(&format!("{} Issue(s) Found", issues.len()));
    for (i, issue) in issues.iter().enumerate() {
        println!("  {}  {}", format!("{}.", i + 1).bold(), issue.summary);
        if let Some(detail) = &issue.detail {
            for line in detail.lines() {
                println!("      {}", line.dimmed());
            }
        }
        if let Some(cmd) = issue.fix_cmd {
            println!("      {} {}", "$".dimmed(), cmd.bold());
        }
    }

    bail!("{} check(s) failed", issues.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ghkit::Error;

    struct AuthRunner {
        logged_in: bool,
    }

    impl CommandRunner for AuthRunner {
        fn run(&self, program: &str, args: &[&str]) -> ghkit::Result<String> {
            if self.logged_in {
                Ok(String::new())
            } else {
                Err(Error::from_command_output(
                    ghkit::display_command(program, args),
                    "You are not logged into any GitHub hosts. Run gh auth login",
                ))
            }
        }
    }

    #[test]
    fn test_all_good() {
        let github = GitHubClient::new(AuthRunner { logged_in: true });
        assert!(collect_issues(|_| true, &github).is_empty());
    }

    #[test]
    fn test_missing_git() {
        let github = GitHubClient::new(AuthRunner { logged_in: true });
        let issues = collect_issues(|cmd| cmd != "git", &github);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].summary, "missing dependency \"git\" in PATH");
    }

    #[test]
    fn test_missing_gh_skips_auth() {
        let github = GitHubClient::new(AuthRunner { logged_in: false });
        let issues = collect_issues(|cmd| cmd != "gh", &github);
        assert_eq!(issues.len(), 1);
        assert!(issues[0].summary.contains("\"gh\""));
    }

    #[test]
    fn test_auth_failure_reported() {
        let github = GitHubClient::new(AuthRunner { logged_in: false });
        let issues = collect_issues(|_| true, &github);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].summary, "gh auth status failed");
        assert!(issues[0].detail.as_deref().unwrap().contains("gh auth login"));
    }
}
