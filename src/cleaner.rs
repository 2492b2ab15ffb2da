//! Deleting a confirmed target
//!
//! Nothing here decides whether a path is safe to remove; the caller already
//! asked the user. The deleter only removes, counts, and reports.

use crate::error::{AnalyzeError, Result};
use std::any::Any;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info};
use walkdir::WalkDir;

pub trait Deleter: Send + Sync {
    /// Remove `path` and everything under it, bumping `removed` once per item.
    /// Returns the number of items removed.
    fn delete(&self, path: &Path, removed: &AtomicU64) -> Result<u64>;
}

fn delete_failed(path: &Path, reason: impl ToString) -> AnalyzeError {
    AnalyzeError::DeleteFailed {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}

/// Permanent removal, children before parents.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsDeleter;

impl Deleter for FsDeleter {
    fn delete(&self, path: &Path, removed: &AtomicU64) -> Result<u64> {
        let meta = fs::symlink_metadata(path).map_err(|e| delete_failed(path, e))?;

        // A symlink is removed itself, never its target.
        if !meta.is_dir() {
            fs::remove_file(path).map_err(|e| delete_failed(path, e))?;
            removed.fetch_add(1, Ordering::Relaxed);
            return Ok(1);
        }

        let mut count = 0u64;
        let mut first_error: Option<String> = None;
        for entry in WalkDir::new(path).follow_links(false).contents_first(true) {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    first_error.get_or_insert_with(|| e.to_string());
                    continue;
                }
            };
            let result = if entry.file_type().is_dir() {
                fs::remove_dir(entry.path())
            } else {
                fs::remove_file(entry.path())
            };
            match result {
                Ok(()) => {
                    count += 1;
                    removed.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) => {
                    debug!("could not remove {}: {}", entry.path().display(), e);
                    first_error.get_or_insert_with(|| format!("{}: {}", entry.path().display(), e));
                }
            }
        }

        if path.exists() {
            return Err(delete_failed(
                path,
                first_error.unwrap_or_else(|| "directory still present".into()),
            ));
        }
        info!("deleted {} ({} items)", path.display(), count);
        Ok(count)
    }
}

fn panic_payload_to_string(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Moves the target to the system trash in one call.
#[derive(Debug, Clone, Copy, Default)]
pub struct TrashDeleter;

impl Deleter for TrashDeleter {
    fn delete(&self, path: &Path, removed: &AtomicU64) -> Result<u64> {
        let items = WalkDir::new(path)
            .follow_links(false)
            .into_iter()
            .filter_map(|e| e.ok())
            .count() as u64;

        // `trash` can panic inside platform APIs; surface that as a failure.
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| trash::delete(path)));
        match outcome {
            Ok(Ok(())) => {
                removed.fetch_add(items, Ordering::Relaxed);
                info!("moved {} to trash ({} items)", path.display(), items);
                Ok(items)
            }
            Ok(Err(e)) => Err(delete_failed(path, e)),
            Err(payload) => Err(delete_failed(
                path,
                format!("trash operation panicked: {}", panic_payload_to_string(payload)),
            )),
        }
    }
}

/// The deleter selected by configuration.
pub fn deleter_for(use_trash: bool) -> Box<dyn Deleter> {
    if use_trash {
        Box::new(TrashDeleter)
    } else {
        Box::new(FsDeleter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delete_tree_counts_every_item() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("victim");
        fs::create_dir_all(target.join("a/b")).unwrap();
        fs::write(target.join("one.txt"), "1").unwrap();
        fs::write(target.join("a/two.txt"), "2").unwrap();
        fs::write(target.join("a/b/three.txt"), "3").unwrap();

        let removed = AtomicU64::new(0);
        let count = FsDeleter.delete(&target, &removed).unwrap();

        // three files plus victim, a, b
        assert_eq!(count, 6);
        assert_eq!(removed.load(Ordering::Relaxed), 6);
        assert!(!target.exists());
    }

    #[test]
    fn test_delete_single_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("big.iso");
        fs::write(&file, vec![0u8; 64]).unwrap();
        let removed = AtomicU64::new(0);
        assert_eq!(FsDeleter.delete(&file, &removed).unwrap(), 1);
        assert!(!file.exists());
    }

    #[test]
    fn test_delete_missing_path_fails() {
        let dir = tempfile::tempdir().unwrap();
        let removed = AtomicU64::new(0);
        let err = FsDeleter
            .delete(&dir.path().join("gone"), &removed)
            .unwrap_err();
        assert!(matches!(err, AnalyzeError::DeleteFailed { .. }));
        assert_eq!(removed.load(Ordering::Relaxed), 0);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_target_survives() {
        let dir = tempfile::tempdir().unwrap();
        let real = dir.path().join("real");
        fs::create_dir(&real).unwrap();
        fs::write(real.join("keep.txt"), "keep").unwrap();
        let link = dir.path().join("link");
        std::os::unix::fs::symlink(&real, &link).unwrap();

        let removed = AtomicU64::new(0);
        FsDeleter.delete(&link, &removed).unwrap();
        assert!(!link.exists());
        assert!(real.join("keep.txt").exists());
    }
}
