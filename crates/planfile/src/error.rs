//! Error types for plan creation, signing and validation.
//!
//! Validation errors are deliberately specific: each check that can fail
//! has its own variant so callers can report exactly why a plan was refused
//! before any irreversible action runs.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while building, signing, validating or storing a plan.
#[derive(Debug, Error)]
pub enum PlanError {
    /// The signing secret has no bytes
    #[error("empty signing secret")]
    EmptySecret,

    /// The plan declares a schema version this tool does not understand
    #[error("unsupported schemaVersion: {0}")]
    UnsupportedSchema(String),

    /// `count` disagrees with the number of repository records
    #[error("count mismatch: count={count} repos={repos}")]
    CountMismatch {
        /// Value stored in the plan
        count: usize,
        /// Actual number of records
        repos: usize,
    },

    /// `createdAt` is not an RFC 3339 timestamp
    #[error("invalid createdAt: {value}: {source}")]
    InvalidCreatedAt {
        /// The stored text
        value: String,
        /// Parser error
        #[source]
        source: chrono::ParseError,
    },

    /// Content was modified after signing
    #[error("fingerprint mismatch")]
    FingerprintMismatch,

    /// Signature does not match this installation's secret
    #[error("invalid signature")]
    InvalidSignature,

    /// Stored secret is not valid hex
    #[error("invalid secret format: {0}")]
    InvalidSecretFormat(#[from] hex::FromHexError),

    /// Stored secret decodes to fewer than 32 bytes
    #[error("secret too short: {0} bytes")]
    SecretTooShort(usize),

    /// Filesystem error with the path involved
    #[error("{}: {source}", .path.display())]
    Io {
        /// File being read or written
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// JSON encoding or decoding error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PlanError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type for plan operations.
pub type Result<T> = std::result::Result<T, PlanError>;
