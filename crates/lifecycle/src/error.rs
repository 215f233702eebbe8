//! Run-aborting errors
//!
//! Per-repository failures never show up here. They are recorded on the
//! manifest entry and reported through [`crate::ExecutionReport`] counts.

use manifest::Mode;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExecuteError {
    #[error("executor backup provider is not configured")]
    MissingBackupProvider,

    #[error("delete mode requires a repository deleter")]
    MissingDeleter,

    #[error("archive enabled but archive repository manager or publisher is not configured")]
    MissingArchiveServices,

    #[error("confirmation phrase mismatch")]
    ConfirmationRejected,

    #[error("manifest already exists at {} and resume is disabled", .0.display())]
    ManifestExists(PathBuf),

    #[error("manifest plan fingerprint mismatch: manifest={manifest} plan={plan}")]
    ManifestFingerprintMismatch { manifest: String, plan: String },

    #[error("manifest mode mismatch: manifest={manifest} requested={requested}")]
    ManifestModeMismatch { manifest: Mode, requested: Mode },

    #[error("cannot determine backup root: {0}")]
    BackupRoot(#[source] std::io::Error),

    #[error(transparent)]
    Manifest(#[from] manifest::Error),

    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read confirmation: {0}")]
    Input(#[source] std::io::Error),
}

impl ExecuteError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, ExecuteError>;
