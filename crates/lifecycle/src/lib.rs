//! # Lifecycle
//!
//! Resumable backup, archive and delete pipeline for the repositories named
//! in a signed plan.
//!
//! The [`Executor`] owns the ordering and bookkeeping; everything that
//! reaches outside the backup root goes through the traits in [`context`].
//!
//! ```no_run
//! use lifecycle::{ExecuteConfig, Executor, HomeDirLocator};
//! # fn demo(
//! #     plan: &planfile::DeletionPlan,
//! #     deleter: &dyn lifecycle::RepoDeleter,
//! #     backup: &dyn lifecycle::BackupProvider,
//! # ) -> Result<(), lifecycle::ExecuteError> {
//! let locator = HomeDirLocator::new();
//! let executor = Executor::new(&locator)
//!     .with_deleter(deleter)
//!     .with_backup(backup);
//!
//! let stdin = std::io::stdin();
//! let report = executor.execute(
//!     &ExecuteConfig::default(),
//!     plan,
//!     &mut stdin.lock(),
//!     &mut std::io::stdout(),
//! )?;
//! println!("deleted={} failed={}", report.deleted, report.failed);
//! # Ok(())
//! # }
//! ```

pub mod confirm;
pub mod context;
mod error;
mod executor;
mod locator;
mod output;
pub mod retry;
pub mod simulate;
pub mod size_filter;
mod types;

pub use context::{
    ArchivePublisher, ArchiveRepoManager, BackupProvider, BackupRootLocator, PublishRequest,
    RepoDeleter,
};
pub use error::{ExecuteError, Result};
pub use executor::Executor;
pub use locator::{BACKUP_ROOT_PREFIX, HomeDirLocator};
pub use types::{
    ArchiveOptions, ArchiveTarget, DEFAULT_ARCHIVE_BRANCH, DEFAULT_ARCHIVE_REPO_NAME,
    DEFAULT_MAX_BUNDLE_BYTES, DEFAULT_MAX_DELETE_RETRIES, ExecuteConfig, ExecutionReport,
    UnknownVisibility, Visibility,
};
