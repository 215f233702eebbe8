//! Error types for the manifest crate

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during manifest operations
#[derive(Error, Debug)]
pub enum Error {
    /// IO error on a specific file
    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Manifest content could not be encoded or decoded
    #[error("invalid manifest JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Manifest was written by an incompatible version
    #[error("unsupported manifest schemaVersion: {0}")]
    UnsupportedSchema(String),

    /// Mode string is neither `backup` nor `delete`
    #[error("unknown mode: {0} (expected backup or delete)")]
    UnknownMode(String),
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type for manifest operations
pub type Result<T> = std::result::Result<T, Error>;
