//! Archive size filter
//!
//! Oversized bundles must not sink a whole archive batch. Each candidate is
//! checked against the ceiling; oversized ones are moved aside under the
//! backup root and reported, the rest stay eligible.

use manifest::{ArchiveStatus, BundleArtifact, ExecutionManifest};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::output::emit;

/// Folder under the backup root that receives oversized bundles
pub const SKIPPED_SIZE_DIR: &str = "archive-skipped-size";

/// Outcome of [`filter_bundles_by_size`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SizeFilterOutcome {
    /// Bundles still eligible for publication
    pub eligible: Vec<BundleArtifact>,
    /// Full names moved into the skip folder
    pub skipped: Vec<String>,
}

/// Split `bundles` into eligible and size-skipped, updating `manifest`.
///
/// - stat failure: entry becomes `archive_failed`, bundle excluded
/// - larger than `max_bytes`: bundle moved to [`SKIPPED_SIZE_DIR`], entry
///   path updated, status `archive_skipped_size_limit`, bundle excluded
/// - failed move: entry becomes `archive_failed`, bundle excluded
///
/// The skip folder is only created when a bundle is actually moved.
pub fn filter_bundles_by_size(
    backup_root: &Path,
    bundles: Vec<BundleArtifact>,
    manifest: &mut ExecutionManifest,
    max_bytes: u64,
    out: &mut dyn Write,
) -> SizeFilterOutcome {
    let skipped_dir = backup_root.join(SKIPPED_SIZE_DIR);
    let mut outcome = SizeFilterOutcome::default();

    for bundle in bundles {
        let size = match fs::metadata(&bundle.bundle_path) {
            Ok(meta) => meta.len(),
            Err(e) => {
                log::warn!("Cannot stat bundle {}: {e}", bundle.bundle_path.display());
                mark(
                    manifest,
                    &bundle.full_name,
                    ArchiveStatus::ArchiveFailed,
                    format!("bundle stat failed: {e}"),
                );
                continue;
            }
        };

        if size <= max_bytes {
            outcome.eligible.push(bundle);
            continue;
        }

        let moved = skipped_path(backup_root, &bundle.bundle_path)
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "bundle path has no file name"))
            .and_then(|target| {
                ensure_dir(&skipped_dir)?;
                move_file(&bundle.bundle_path, &target)?;
                Ok(target)
            });
        let target = match moved {
            Ok(target) => target,
            Err(e) => {
                log::warn!("Cannot move oversized bundle {}: {e}", bundle.bundle_path.display());
                mark(
                    manifest,
                    &bundle.full_name,
                    ArchiveStatus::ArchiveFailed,
                    format!("failed moving oversized bundle: {e}"),
                );
                continue;
            }
        };

        if let Some(entry) = manifest.entry_mut(&bundle.full_name) {
            entry.bundle_path = Some(target);
            entry.mark_archive(
                ArchiveStatus::SkippedSizeLimit,
                Some(format!("bundle size {size} exceeds archive limit {max_bytes} bytes")),
            );
        }
        emit(out, format_args!("Archive skip (size): {} ({size} bytes)", bundle.full_name));
        outcome.skipped.push(bundle.full_name);
    }

    outcome
}

fn mark(manifest: &mut ExecutionManifest, full_name: &str, status: ArchiveStatus, cause: String) {
    if let Some(entry) = manifest.entry_mut(full_name) {
        entry.mark_archive(status, Some(cause));
    }
}

fn ensure_dir(dir: &Path) -> io::Result<()> {
    if dir.is_dir() {
        return Ok(());
    }
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o700);
    }
    builder.create(dir)
}

/// Rename, falling back to copy and remove across filesystems.
pub(crate) fn move_file(src: &Path, dst: &Path) -> io::Result<()> {
    if fs::rename(src, dst).is_ok() {
        return Ok(());
    }
    fs::copy(src, dst)?;
    fs::remove_file(src)
}

/// Where an oversized bundle for `bundle_path` ends up
pub fn skipped_path(backup_root: &Path, bundle_path: &Path) -> Option<PathBuf> {
    bundle_path
        .file_name()
        .map(|name| backup_root.join(SKIPPED_SIZE_DIR).join(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use manifest::{Mode, NewOptions};
    use planfile::{DEFAULT_HOST, DeletionPlan, RepoRecord};
    use tempfile::TempDir;

    fn setup(root: &Path, names: &[&str]) -> ExecutionManifest {
        let plan = DeletionPlan::new(
            "alice",
            DEFAULT_HOST,
            "test",
            names.iter().map(|n| RepoRecord::new("alice", *n)),
            Utc::now(),
        );
        ExecutionManifest::new(
            Path::new("plan.json"),
            root,
            &plan,
            Utc::now(),
            NewOptions {
                mode: Mode::Backup,
                ..Default::default()
            },
        )
    }

    fn bundle(root: &Path, manifest: &mut ExecutionManifest, name: &str, size: usize) -> BundleArtifact {
        let dir = root.join("bundles");
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join(format!("alice__{name}.bundle"));
        fs::write(&path, vec![0u8; size]).unwrap();
        let full_name = format!("alice/{name}");
        manifest.entry_mut(&full_name).unwrap().bundle_path = Some(path.clone());
        BundleArtifact {
            full_name,
            bundle_path: path,
            updated_at: String::new(),
        }
    }

    #[test]
    fn test_small_bundle_stays_eligible() {
        let tmp = TempDir::new().unwrap();
        let mut m = setup(tmp.path(), &["small"]);
        let b = bundle(tmp.path(), &mut m, "small", 10);
        let mut out = Vec::new();

        let outcome = filter_bundles_by_size(tmp.path(), vec![b.clone()], &mut m, 10, &mut out);

        assert_eq!(outcome.eligible, vec![b.clone()]);
        assert!(outcome.skipped.is_empty());
        assert!(b.bundle_path.exists());
        assert!(!tmp.path().join(SKIPPED_SIZE_DIR).exists());
        assert_eq!(m.repo_executions[0].archive_status, ArchiveStatus::Pending);
        assert!(out.is_empty());
    }

    #[test]
    fn test_large_bundle_is_moved() {
        let tmp = TempDir::new().unwrap();
        let mut m = setup(tmp.path(), &["big", "small"]);
        let big = bundle(tmp.path(), &mut m, "big", 64);
        let small = bundle(tmp.path(), &mut m, "small", 8);
        let mut out = Vec::new();

        let outcome =
            filter_bundles_by_size(tmp.path(), vec![big.clone(), small.clone()], &mut m, 32, &mut out);

        assert_eq!(outcome.eligible, vec![small]);
        assert_eq!(outcome.skipped, vec!["alice/big".to_string()]);

        let moved = skipped_path(tmp.path(), &big.bundle_path).unwrap();
        assert!(moved.exists());
        assert!(!big.bundle_path.exists());

        let entry = m.entry("alice/big").unwrap();
        assert_eq!(entry.bundle_path.as_deref(), Some(moved.as_path()));
        assert_eq!(entry.archive_status, ArchiveStatus::SkippedSizeLimit);
        assert_eq!(
            entry.error.as_deref(),
            Some("bundle size 64 exceeds archive limit 32 bytes")
        );
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "Archive skip (size): alice/big (64 bytes)\n"
        );
    }

    #[test]
    fn test_missing_bundle_marks_failure() {
        let tmp = TempDir::new().unwrap();
        let mut m = setup(tmp.path(), &["gone"]);
        let b = bundle(tmp.path(), &mut m, "gone", 4);
        fs::remove_file(&b.bundle_path).unwrap();

        let outcome = filter_bundles_by_size(tmp.path(), vec![b], &mut m, 32, &mut Vec::new());

        assert!(outcome.eligible.is_empty());
        assert!(outcome.skipped.is_empty());
        let entry = m.entry("alice/gone").unwrap();
        assert_eq!(entry.archive_status, ArchiveStatus::ArchiveFailed);
        assert!(entry.error.as_deref().unwrap().starts_with("bundle stat failed: "));
    }

    #[test]
    fn test_move_file_replaces_destination() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("a");
        let dst = tmp.path().join("b");
        fs::write(&src, "new").unwrap();
        fs::write(&dst, "old").unwrap();
        move_file(&src, &dst).unwrap();
        assert!(!src.exists());
        assert_eq!(fs::read_to_string(&dst).unwrap(), "new");
    }
}
