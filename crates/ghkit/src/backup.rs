//! Local copies of repositories: mirrors, snapshots and bundles.
//!
//! Layout under a backup root:
//!
//! ```text
//! <root>/owner_name.git               bare mirror
//! <root>/snapshots/owner__name/       working-copy clone of the mirror
//! <root>/bundles/owner__name.bundle   single-file export of all refs
//! ```
//!
//! Each operation is idempotent: an existing target is returned as is.

use lifecycle::BackupProvider;
use planfile::RepoRecord;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::runner::CommandRunner;

pub const BUNDLES_DIR: &str = "bundles";
pub const SNAPSHOTS_DIR: &str = "snapshots";
pub const BUNDLE_EXT: &str = "bundle";

/// `owner__name`, the flat form used for snapshot and bundle names
pub fn flat_name(full_name: &str) -> String {
    full_name.replace('/', "__")
}

pub fn mirror_path(root: &Path, full_name: &str) -> PathBuf {
    root.join(format!("{}.git", full_name.replace('/', "_")))
}

pub fn snapshot_path(root: &Path, full_name: &str) -> PathBuf {
    root.join(SNAPSHOTS_DIR).join(flat_name(full_name))
}

pub fn bundle_path(root: &Path, full_name: &str) -> PathBuf {
    root.join(BUNDLES_DIR)
        .join(format!("{}.{BUNDLE_EXT}", flat_name(full_name)))
}

/// SSH clone URL on github.com
pub fn clone_url(full_name: &str) -> String {
    format!("git@github.com:{full_name}.git")
}

pub(crate) fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Create `dir` (and parents) readable by the owner only
pub(crate) fn create_private_dir(dir: &Path) -> Result<()> {
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o700);
    }
    builder.create(dir).map_err(|e| Error::io(dir, e))
}

/// Backups made with `git`
#[derive(Debug, Clone, Default)]
pub struct GitBackup<R> {
    runner: R,
}

impl<R: CommandRunner> GitBackup<R> {
    pub fn new(runner: R) -> Self {
        Self { runner }
    }

    fn git(&self, args: &[&str]) -> Result<()> {
        self.runner.run("git", args).map(|_| ())
    }

    pub fn mirror(&self, full_name: &str, root: &Path) -> Result<PathBuf> {
        let dst = mirror_path(root, full_name);
        if dst.exists() {
            log::debug!("Mirror already present at {}", dst.display());
            return Ok(dst);
        }
        self.git(&["clone", "--mirror", &clone_url(full_name), &path_arg(&dst)])?;
        Ok(dst)
    }

    pub fn snapshot(&self, full_name: &str, root: &Path) -> Result<PathBuf> {
        let mirror = self.mirror(full_name, root)?;
        let dst = snapshot_path(root, full_name);
        if dst.exists() {
            return Ok(dst);
        }
        if let Some(parent) = dst.parent() {
            create_private_dir(parent)?;
        }
        self.git(&["clone", &path_arg(&mirror), &path_arg(&dst)])?;
        Ok(dst)
    }

    pub fn bundle(&self, full_name: &str, root: &Path) -> Result<PathBuf> {
        let mirror = self.mirror(full_name, root)?;
        let dst = bundle_path(root, full_name);
        if dst.is_file() {
            return Ok(dst);
        }
        if let Some(parent) = dst.parent() {
            create_private_dir(parent)?;
        }
        // git resolves the output path against -C, not our working directory
        let target = std::path::absolute(&dst).map_err(|e| Error::io(&dst, e))?;
        self.git(&[
            "-C",
            &path_arg(&mirror),
            "bundle",
            "create",
            &path_arg(&target),
            "--all",
        ])?;
        Ok(dst)
    }
}

impl<R: CommandRunner> BackupProvider for GitBackup<R> {
    fn mirror(&self, repo: &RepoRecord, root: &Path) -> anyhow::Result<PathBuf> {
        Ok(Self::mirror(self, &repo.full_name, root)?)
    }

    fn snapshot(&self, repo: &RepoRecord, root: &Path) -> anyhow::Result<PathBuf> {
        Ok(Self::snapshot(self, &repo.full_name, root)?)
    }

    fn bundle(&self, repo: &RepoRecord, root: &Path) -> anyhow::Result<PathBuf> {
        Ok(Self::bundle(self, &repo.full_name, root)?)
    }
}
