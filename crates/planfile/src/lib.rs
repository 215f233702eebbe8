//! Signed, tamper-evident repository selection plans.
//!
//! A plan records which repositories an operation is allowed to touch,
//! who selected them, and when. It is fingerprinted with SHA-256 over a
//! canonical projection and signed with HMAC-SHA256 using a secret that
//! lives only on this machine.
//!
//! ```no_run
//! use planfile::{DeletionPlan, RepoRecord, Secret};
//!
//! let secret = Secret::ensure(std::path::Path::new("/tmp/ghm"))?;
//! let mut plan = DeletionPlan::new(
//!     "alice",
//!     planfile::DEFAULT_HOST,
//!     env!("CARGO_PKG_VERSION"),
//!     vec![RepoRecord::new("alice", "old-project")],
//!     chrono::Utc::now(),
//! );
//! plan.sign(&secret)?;
//! plan.validate(&secret)?;
//! # Ok::<(), planfile::PlanError>(())
//! ```

pub mod error;
pub mod secret;
pub mod storage;
pub mod types;

pub use error::{PlanError, Result};
pub use secret::Secret;
pub use storage::{read, write};
pub use types::{DEFAULT_HOST, DeletionPlan, RepoRecord, SCHEMA_VERSION, short_fingerprint};
