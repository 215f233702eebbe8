//! Publishing bundles to the archive repository.
//!
//! One publication is one commit on the archive branch:
//!
//! ```text
//! archives/<UTC timestamp>/bundles/owner__name.bundle
//! archives/<UTC timestamp>/manifest.json
//! ```

use chrono::{DateTime, SecondsFormat, Utc};
use lifecycle::{ArchivePublisher, PublishRequest};
use manifest::BundleArtifact;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use crate::backup::path_arg;
use crate::error::{Error, Result};
use crate::runner::CommandRunner;

pub const ARCHIVES_DIR: &str = "archives";
pub const BATCH_MANIFEST_FILE: &str = "manifest.json";

/// `manifest.json` written next to each published batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchManifest {
    pub plan_fingerprint: String,
    pub created_at: String,
    pub bundles: Vec<BatchEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchEntry {
    pub full_name: String,
    /// Path relative to the batch directory
    pub bundle_file: String,
    pub sha256: String,
    #[serde(default)]
    pub updated_at: String,
}

fn hash_file(path: &Path) -> std::io::Result<String> {
    let file = File::open(path)?;
    let mut reader = BufReader::with_capacity(1024 * 1024, file);
    let mut hasher = Sha256::new();

    let mut buffer = [0u8; 65536];
    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hex::encode(hasher.finalize()))
}

type Clock = Box<dyn Fn() -> DateTime<Utc>>;

/// Publishes through a scratch clone made with `gh repo clone`
pub struct GitArchive<R> {
    runner: R,
    clock: Clock,
}

impl<R: CommandRunner> GitArchive<R> {
    pub fn new(runner: R) -> Self {
        Self {
            runner,
            clock: Box::new(Utc::now),
        }
    }

    /// Replace the clock used for the batch directory name
    #[must_use]
    pub fn with_clock(mut self, clock: impl Fn() -> DateTime<Utc> + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    fn git(&self, dir: &Path, args: &[&str]) -> Result<String> {
        let dir = path_arg(dir);
        let mut full = vec!["-C", dir.as_str()];
        full.extend_from_slice(args);
        self.runner.run("git", &full)
    }

    /// Copy the bundles into a new batch directory of `clone_dir`
    fn stage_batch(
        &self,
        clone_dir: &Path,
        request: &PublishRequest<'_>,
        now: DateTime<Utc>,
    ) -> Result<PathBuf> {
        let batch_dir = clone_dir
            .join(ARCHIVES_DIR)
            .join(now.format("%Y-%m-%d-%H%M%S").to_string());
        let bundles_dir = batch_dir.join("bundles");
        fs::create_dir_all(&bundles_dir).map_err(|e| Error::io(&bundles_dir, e))?;

        let mut bundles: Vec<&BundleArtifact> = request.bundles.iter().collect();
        bundles.sort_by(|a, b| a.full_name.cmp(&b.full_name));

        let mut entries = Vec::with_capacity(bundles.len());
        for bundle in bundles {
            let src = &bundle.bundle_path;
            let file_name = src
                .file_name()
                .ok_or_else(|| {
                    Error::InvalidRequest(format!("invalid bundle path {}", src.display()))
                })?
                .to_string_lossy()
                .into_owned();
            let dst = bundles_dir.join(&file_name);
            fs::copy(src, &dst).map_err(|e| Error::io(src, e))?;

            entries.push(BatchEntry {
                full_name: bundle.full_name.clone(),
                bundle_file: format!("bundles/{file_name}"),
                sha256: hash_file(&dst).map_err(|e| Error::io(&dst, e))?,
                updated_at: bundle.updated_at.clone(),
            });
        }

        let manifest = BatchManifest {
            plan_fingerprint: request.plan_fingerprint.to_string(),
            created_at: now.to_rfc3339_opts(SecondsFormat::Secs, true),
            bundles: entries,
        };
        let path = batch_dir.join(BATCH_MANIFEST_FILE);
        let mut data = serde_json::to_string_pretty(&manifest)?;
        data.push('\n');
        fs::write(&path, data).map_err(|e| Error::io(&path, e))?;

        Ok(batch_dir)
    }

    pub fn publish(&self, request: &PublishRequest<'_>) -> Result<String> {
        if request.bundles.is_empty() {
            return Err(Error::InvalidRequest("no bundles to publish".into()));
        }

        let workdir = tempfile::Builder::new()
            .prefix("ghm-publish-")
            .tempdir()
            .map_err(|e| Error::io(std::env::temp_dir(), e))?;
        let clone_dir = workdir.path().join("archive");

        self.runner.run(
            "gh",
            &["repo", "clone", request.archive_repo, &path_arg(&clone_dir)],
        )?;
        self.git(&clone_dir, &["checkout", "-B", request.branch])?;

        let batch_dir = self.stage_batch(&clone_dir, request, (self.clock)())?;
        log::debug!(
            "Staged {} bundle(s) from {} in {}",
            request.bundles.len(),
            request.backup_root.display(),
            batch_dir.display()
        );

        let message = format!(
            "backup: {} repos from plan {}",
            request.bundles.len(),
            planfile::short_fingerprint(request.plan_fingerprint)
        );
        self.git(&clone_dir, &["add", "."])?;
        self.git(&clone_dir, &["commit", "-m", &message])?;
        self.git(&clone_dir, &["push", "origin", request.branch])?;
        let commit = self.git(&clone_dir, &["rev-parse", "HEAD"])?;

        Ok(commit.trim().to_string())
    }
}

impl<R: CommandRunner> ArchivePublisher for GitArchive<R> {
    fn publish(&self, request: &PublishRequest<'_>) -> anyhow::Result<String> {
        Ok(Self::publish(self, request)?)
    }
}
