//! GitHub operations through the `gh` CLI

use chrono::DateTime;
use lifecycle::{ArchiveRepoManager, RepoDeleter, Visibility};
use planfile::RepoRecord;
use serde::Deserialize;

use crate::error::{Error, ErrorCategory, Result};
use crate::runner::CommandRunner;

/// Upper bound passed to `gh repo list`
pub const LIST_LIMIT: u32 = 1000;

const LIST_FIELDS: &str = "name,nameWithOwner,description,updatedAt,isPrivate,isFork,isArchived,owner";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GhOwner {
    login: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GhRepo {
    name: String,
    name_with_owner: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    updated_at: String,
    #[serde(default)]
    is_private: bool,
    #[serde(default)]
    is_fork: bool,
    #[serde(default)]
    is_archived: bool,
    owner: GhOwner,
}

impl From<GhRepo> for RepoRecord {
    fn from(repo: GhRepo) -> Self {
        let updated_at = if DateTime::parse_from_rfc3339(&repo.updated_at).is_ok() {
            repo.updated_at
        } else {
            String::new()
        };
        Self {
            owner: repo.owner.login,
            name: repo.name,
            full_name: repo.name_with_owner,
            description: repo.description.unwrap_or_default(),
            is_private: repo.is_private,
            is_fork: repo.is_fork,
            is_archived: repo.is_archived,
            updated_at,
        }
    }
}

/// `--private` / `--public` flag for `gh repo create`
pub(crate) fn visibility_flag(visibility: Visibility) -> &'static str {
    match visibility {
        Visibility::Private => "--private",
        Visibility::Public => "--public",
    }
}

/// Thin client over `gh`
#[derive(Debug, Clone, Default)]
pub struct GitHubClient<R> {
    runner: R,
}

impl<R: CommandRunner> GitHubClient<R> {
    pub fn new(runner: R) -> Self {
        Self { runner }
    }

    fn gh(&self, args: &[&str]) -> Result<String> {
        self.runner.run("gh", args)
    }

    /// Login of the authenticated user
    pub fn current_user(&self) -> Result<String> {
        Ok(self.gh(&["api", "user", "--jq", ".login"])?.trim().to_string())
    }

    /// `gh auth status`, returning its output
    pub fn auth_status(&self) -> Result<String> {
        self.gh(&["auth", "status"])
    }

    /// Repositories owned by `owner`, or by the current user when `None`
    pub fn list_user_repos(&self, owner: Option<&str>) -> Result<Vec<RepoRecord>> {
        let owner = match owner.filter(|o| !o.trim().is_empty()) {
            Some(o) => o.trim().to_string(),
            None => self.current_user()?,
        };
        let limit = LIST_LIMIT.to_string();
        let out = self.gh(&[
            "repo", "list", &owner, "--limit", &limit, "--json", LIST_FIELDS,
        ])?;

        let repos: Vec<GhRepo> = serde_json::from_str(&out)?;
        log::debug!("Listed {} repositories for {owner}", repos.len());
        Ok(repos.into_iter().map(RepoRecord::from).collect())
    }

    /// Delete without prompting
    pub fn delete_repo(&self, full_name: &str) -> Result<()> {
        self.gh(&["repo", "delete", full_name, "--yes"])?;
        Ok(())
    }

    /// Whether `full_name` exists. A not-found answer is `Ok(false)`;
    /// other failures (auth, network) are propagated.
    pub fn repo_exists(&self, full_name: &str) -> Result<bool> {
        match self.gh(&["repo", "view", full_name, "--json", "name", "--jq", ".name"]) {
            Ok(_) => Ok(true),
            Err(e) if e.category() == ErrorCategory::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }

    pub fn create_repo(&self, full_name: &str, visibility: Visibility) -> Result<()> {
        self.gh(&["repo", "create", full_name, visibility_flag(visibility)])?;
        Ok(())
    }

    /// Create `full_name` unless it already exists
    pub fn ensure_repo(&self, full_name: &str, visibility: Visibility) -> Result<()> {
        if self.repo_exists(full_name)? {
            log::debug!("Archive repository {full_name} already exists");
            return Ok(());
        }
        log::info!("Creating {visibility} repository {full_name}");
        self.create_repo(full_name, visibility)
    }
}

impl<R: CommandRunner> RepoDeleter for GitHubClient<R> {
    fn delete_repo(&self, full_name: &str) -> anyhow::Result<()> {
        Ok(Self::delete_repo(self, full_name)?)
    }

    fn is_transient(&self, error: &anyhow::Error) -> bool {
        error.downcast_ref::<Error>().is_none_or(Error::is_retryable)
    }
}

impl<R: CommandRunner> ArchiveRepoManager for GitHubClient<R> {
    fn ensure_repo(&self, full_name: &str, visibility: Visibility) -> anyhow::Result<()> {
        Ok(Self::ensure_repo(self, full_name, visibility)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::testing::FakeRunner;

    const LIST_JSON: &str = r#"[
      {"name":"r1","nameWithOwner":"alice/r1","description":"first","updatedAt":"2026-01-02T03:04:05Z",
       "isPrivate":true,"isFork":false,"isArchived":false,"owner":{"login":"alice"}},
      {"name":"r2","nameWithOwner":"alice/r2","description":null,"updatedAt":"not a date",
       "isPrivate":false,"isFork":true,"isArchived":true,"owner":{"login":"alice"}}
    ]"#;

    #[test]
    fn test_current_user_trims() {
        let runner = FakeRunner::new();
        runner.ok("gh api user", "alice\n");
        let client = GitHubClient::new(&runner);
        assert_eq!(client.current_user().unwrap(), "alice");
        assert_eq!(runner.calls(), ["gh api user --jq .login"]);
    }

    #[test]
    fn test_list_defaults_to_current_user() {
        let runner = FakeRunner::new();
        runner.ok("gh api user", "alice\n");
        runner.ok("gh repo list alice", LIST_JSON);

        let repos = GitHubClient::new(&runner).list_user_repos(None).unwrap();
        assert_eq!(repos.len(), 2);
        assert_eq!(repos[0].full_name, "alice/r1");
        assert_eq!(repos[0].updated_at, "2026-01-02T03:04:05Z");
        assert!(repos[0].is_private);
        assert_eq!(repos[1].description, "");
        assert_eq!(repos[1].updated_at, "");
        assert!(repos[1].is_fork && repos[1].is_archived);
        assert!(runner.calls()[1].contains("--limit 1000"));
    }

    #[test]
    fn test_list_explicit_owner_skips_user_lookup() {
        let runner = FakeRunner::new();
        runner.ok("gh repo list acme", "[]");
        let repos = GitHubClient::new(&runner).list_user_repos(Some("acme")).unwrap();
        assert!(repos.is_empty());
        assert_eq!(runner.calls().len(), 1);
    }

    #[test]
    fn test_delete_passes_yes() {
        let runner = FakeRunner::new();
        GitHubClient::new(&runner).delete_repo("alice/r1").unwrap();
        assert_eq!(runner.calls(), ["gh repo delete alice/r1 --yes"]);
    }

    #[test]
    fn test_delete_failure_transience() {
        let runner = FakeRunner::new();
        runner.fail("gh repo delete alice/gone", "HTTP 404: Not Found");
        runner.fail("gh repo delete alice/flaky", "HTTP 502: Bad Gateway");
        let client = GitHubClient::new(&runner);

        let gone = RepoDeleter::delete_repo(&client, "alice/gone").unwrap_err();
        assert!(!client.is_transient(&gone));
        let flaky = RepoDeleter::delete_repo(&client, "alice/flaky").unwrap_err();
        assert!(client.is_transient(&flaky));
        assert!(client.is_transient(&anyhow::anyhow!("unrelated")));
    }

    #[test]
    fn test_repo_exists_distinguishes_not_found() {
        let runner = FakeRunner::new();
        runner.ok("gh repo view alice/here", "here\n");
        runner.fail("gh repo view alice/gone", "GraphQL: Could not resolve to a Repository");
        runner.fail("gh repo view alice/auth", "HTTP 401: Bad credentials");

        let client = GitHubClient::new(&runner);
        assert!(client.repo_exists("alice/here").unwrap());
        assert!(!client.repo_exists("alice/gone").unwrap());
        assert!(client.repo_exists("alice/auth").is_err());
    }

    #[test]
    fn test_ensure_repo_creates_when_missing() {
        let runner = FakeRunner::new();
        runner.fail("gh repo view", "HTTP 404: Not Found");

        GitHubClient::new(&runner)
            .ensure_repo("alice/ghm-archive", Visibility::Private)
            .unwrap();
        assert_eq!(runner.calls()[1], "gh repo create alice/ghm-archive --private");
    }

    #[test]
    fn test_ensure_repo_noop_when_present() {
        let runner = FakeRunner::new();
        GitHubClient::new(&runner)
            .ensure_repo("alice/ghm-archive", Visibility::Public)
            .unwrap();
        assert_eq!(runner.calls().len(), 1);
    }
}
