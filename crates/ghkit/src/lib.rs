//! # ghkit
//!
//! `gh` and `git` adapters for the repository lifecycle pipeline.
//!
//! Each adapter is generic over a [`CommandRunner`], so the same code runs
//! the real tools through [`ExecRunner`] or a scripted runner in tests.
//!
//! ```no_run
//! use ghkit::{ExecRunner, GitHubClient};
//!
//! let github = GitHubClient::new(ExecRunner);
//! let me = github.current_user()?;
//! for repo in github.list_user_repos(Some(&me))? {
//!     println!("{}", repo.full_name);
//! }
//! # Ok::<(), ghkit::Error>(())
//! ```

pub mod archive;
pub mod backup;
mod error;
pub mod github;
pub mod restore;
mod runner;

pub use archive::GitArchive;
pub use backup::GitBackup;
pub use error::{Error, ErrorCategory, Result};
pub use github::GitHubClient;
pub use restore::{
    ArchiveEntry, RestoreOutcome, RestoreRequest, RestoreService, Source, SourceKind,
    is_archive_root, load_index,
};
pub use runner::{CommandRunner, ExecRunner, display_command};
