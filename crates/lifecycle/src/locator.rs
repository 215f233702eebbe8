//! Default backup-root lookup under the home directory.

use chrono::{DateTime, Utc};
use manifest::ExecutionManifest;
use std::fs;
use std::io;
use std::path::PathBuf;

use crate::context::BackupRootLocator;

/// Directory name prefix for backup roots under the home directory
pub const BACKUP_ROOT_PREFIX: &str = "ghm-archive-";

/// Scans `$HOME/ghm-archive-*` and allocates new roots next to them.
#[derive(Debug, Clone)]
pub struct HomeDirLocator {
    home: Option<PathBuf>,
}

impl Default for HomeDirLocator {
    fn default() -> Self {
        Self::new()
    }
}

impl HomeDirLocator {
    /// Use the current user's home directory.
    pub fn new() -> Self {
        Self {
            home: dirs::home_dir(),
        }
    }

    /// Use an explicit base directory instead of the home directory.
    pub fn with_home(home: impl Into<PathBuf>) -> Self {
        Self {
            home: Some(home.into()),
        }
    }
}

impl BackupRootLocator for HomeDirLocator {
    fn find_resumable(&self, fingerprint: &str) -> Option<PathBuf> {
        let home = self.home.as_ref()?;
        let entries = fs::read_dir(home)
            .inspect_err(|e| log::debug!("Cannot scan {}: {e}", home.display()))
            .ok()?;

        let mut candidates: Vec<PathBuf> = entries
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_ok_and(|t| t.is_dir()))
            .filter(|e| e.file_name().to_string_lossy().starts_with(BACKUP_ROOT_PREFIX))
            .map(|e| e.path())
            .filter(|root| {
                ExecutionManifest::load(&ExecutionManifest::path(root))
                    .is_ok_and(|m| m.plan_fingerprint == fingerprint)
            })
            .collect();

        candidates.sort();
        let found = candidates.pop();
        if let Some(root) = &found {
            log::debug!("Found resumable backup root {}", root.display());
        }
        found
    }

    fn allocate(&self, now: DateTime<Utc>) -> io::Result<PathBuf> {
        let home = self
            .home
            .as_ref()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "home directory not found"))?;
        Ok(home.join(format!(
            "{BACKUP_ROOT_PREFIX}{}",
            now.format("%Y-%m-%d-%H%M%S")
        )))
    }
}
