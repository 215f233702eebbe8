//! Restoring repositories from a backup root.
//!
//! [`load_index`] lists what a backup root can restore, merging the
//! execution manifest with whatever bundle and snapshot files are on disk.
//! [`RestoreService`] pushes one of those sources into a freshly created
//! repository.

use chrono::{DateTime, Utc};
use lifecycle::Visibility;
use manifest::{ExecutionManifest, MANIFEST_FILE};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::backup::{BUNDLE_EXT, BUNDLES_DIR, SNAPSHOTS_DIR, clone_url, path_arg};
use crate::error::{Error, Result};
use crate::github::GitHubClient;
use crate::runner::CommandRunner;

/// Suffix appended to the name suggested when a restore target is taken
pub const SUGGESTED_SUFFIX: &str = "-ghm";

/// A restorable repository found in a backup root
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub full_name: String,
    pub bundle_path: Option<PathBuf>,
    pub snapshot_path: Option<PathBuf>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl ArchiveEntry {
    fn named(full_name: &str) -> Self {
        Self {
            full_name: full_name.to_string(),
            ..Default::default()
        }
    }

    /// Bundle when the file is present, otherwise the snapshot directory
    pub fn preferred_source(&self) -> Option<Source> {
        if let Some(path) = self.bundle_path.as_ref().filter(|p| p.is_file()) {
            return Some(Source::new(SourceKind::Bundle, path));
        }
        self.snapshot_path
            .as_ref()
            .filter(|p| p.is_dir())
            .map(|path| Source::new(SourceKind::Snapshot, path))
    }
}

/// Kind of restore source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Bundle,
    Snapshot,
}

impl SourceKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Bundle => "bundle",
            Self::Snapshot => "snapshot",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "bundle" => Ok(Self::Bundle),
            "snapshot" => Ok(Self::Snapshot),
            other => Err(Error::InvalidRequest(format!(
                "unsupported source kind: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
    pub kind: SourceKind,
    pub path: PathBuf,
}

impl Source {
    pub fn new(kind: SourceKind, path: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            path: path.into(),
        }
    }
}

/// Whether `path` looks like a backup root
pub fn is_archive_root(path: &Path) -> bool {
    path.join(MANIFEST_FILE).is_file()
        || path.join(BUNDLES_DIR).is_dir()
        || path.join(SNAPSHOTS_DIR).is_dir()
}

/// Manifest paths are absolute, or relative paths that already carry the
/// root as given at backup time, or relative to the root.
fn resolve(root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() || path.starts_with(root) {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}

/// `owner__name` back to `owner/name`
fn full_name_from_flat(flat: &str) -> Option<String> {
    let (owner, name) = flat.split_once("__")?;
    (!owner.is_empty() && !name.is_empty()).then(|| format!("{owner}/{name}"))
}

/// Entries of `dir` whose flat name maps to a full name
fn scan(dir: &Path, want_dir: bool) -> Vec<(String, PathBuf)> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    entries
        .filter_map(std::result::Result::ok)
        .filter_map(|entry| {
            let path = entry.path();
            let flat = if want_dir {
                path.is_dir().then(|| entry.file_name())?
            } else {
                let is_bundle = path.is_file()
                    && path.extension().is_some_and(|e| e == BUNDLE_EXT);
                is_bundle.then(|| path.file_stem().map(ToOwned::to_owned))??
            };
            let full_name = full_name_from_flat(&flat.to_string_lossy())?;
            Some((full_name, path))
        })
        .collect()
}

/// Everything restorable under `root`, sorted by full name
pub fn load_index(root: &Path) -> Result<Vec<ArchiveEntry>> {
    if root.as_os_str().is_empty() {
        return Err(Error::InvalidRequest("archive root is required".into()));
    }

    let mut index: BTreeMap<String, ArchiveEntry> = BTreeMap::new();

    let manifest_path = root.join(MANIFEST_FILE);
    if manifest_path.is_file() {
        let manifest = ExecutionManifest::load(&manifest_path)?;
        for exec in manifest.repo_executions {
            let entry = index
                .entry(exec.full_name.clone())
                .or_insert_with(|| ArchiveEntry::named(&exec.full_name));
            entry.bundle_path = exec.bundle_path.map(|p| resolve(root, &p));
            entry.snapshot_path = exec.browsable_path.map(|p| resolve(root, &p));
            entry.updated_at = exec.last_attempt_at;
        }
    }

    for (full_name, path) in scan(&root.join(BUNDLES_DIR), false) {
        let entry = index
            .entry(full_name.clone())
            .or_insert_with(|| ArchiveEntry::named(&full_name));
        entry.bundle_path.get_or_insert(path);
    }
    for (full_name, path) in scan(&root.join(SNAPSHOTS_DIR), true) {
        let entry = index
            .entry(full_name.clone())
            .or_insert_with(|| ArchiveEntry::named(&full_name));
        entry.snapshot_path.get_or_insert(path);
    }

    Ok(index
        .into_values()
        .filter(|e| e.bundle_path.is_some() || e.snapshot_path.is_some())
        .collect())
}

/// What to restore and where
#[derive(Debug, Clone)]
pub struct RestoreRequest {
    pub source: Source,
    pub owner: String,
    pub name: String,
    pub visibility: Visibility,
}

impl RestoreRequest {
    pub fn target_full_name(&self) -> String {
        format!("{}/{}", self.owner.trim(), self.name.trim())
    }

    fn validate(&self) -> Result<()> {
        if self.source.path.as_os_str().is_empty() {
            return Err(Error::InvalidRequest("source path is required".into()));
        }
        if self.owner.trim().is_empty() || self.name.trim().is_empty() {
            return Err(Error::InvalidRequest(
                "target owner and name are required".into(),
            ));
        }

        let path = &self.source.path;
        let meta = fs::metadata(path).map_err(|e| Error::io(path, e))?;
        match self.source.kind {
            SourceKind::Bundle if meta.is_dir() => Err(Error::InvalidRequest(
                "bundle source must be a file".into(),
            )),
            SourceKind::Bundle if path.extension().is_none_or(|e| e != BUNDLE_EXT) => Err(
                Error::InvalidRequest("bundle source must end with .bundle".into()),
            ),
            SourceKind::Snapshot if !meta.is_dir() => Err(Error::InvalidRequest(
                "snapshot source must be a directory".into(),
            )),
            _ => Ok(()),
        }
    }
}

/// Result of a successful restore
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreOutcome {
    pub target_full_name: String,
    pub source: Source,
}

/// Pushes a bundle or snapshot into a new repository
#[derive(Debug, Clone, Default)]
pub struct RestoreService<R> {
    runner: R,
}

impl<R: CommandRunner> RestoreService<R> {
    pub fn new(runner: R) -> Self {
        Self { runner }
    }

    fn git(&self, dir: &Path, args: &[&str]) -> Result<String> {
        let dir = path_arg(dir);
        let mut full = vec!["-C", dir.as_str()];
        full.extend_from_slice(args);
        self.runner.run("git", &full)
    }

    pub fn restore(&self, request: &RestoreRequest) -> Result<RestoreOutcome> {
        request.validate()?;
        let target = request.target_full_name();

        let github = GitHubClient::new(&self.runner);
        if github.repo_exists(&target)? {
            return Err(Error::TargetExists {
                target,
                suggested: format!("{}{SUGGESTED_SUFFIX}", request.name.trim()),
            });
        }

        let workdir = tempfile::Builder::new()
            .prefix("ghm-restore-")
            .tempdir()
            .map_err(|e| Error::io(std::env::temp_dir(), e))?;
        let work = workdir.path().join("repo");

        self.runner.run(
            "git",
            &["clone", &path_arg(&request.source.path), &path_arg(&work)],
        )?;
        github.create_repo(&target, request.visibility)?;

        let url = clone_url(&target);
        if let Err(e) = self.git(&work, &["remote", "set-url", "origin", &url]) {
            log::debug!("set-url failed ({e}), adding origin instead");
            self.git(&work, &["remote", "add", "origin", &url])?;
        }
        self.git(&work, &["push", "--all", "origin"])?;
        self.git(&work, &["push", "--tags", "origin"])?;

        log::info!("Restored {target} from {}", request.source.kind);
        Ok(RestoreOutcome {
            target_full_name: target,
            source: request.source.clone(),
        })
    }
}
