//! Whole-directory sizing with a fallback chain
//!
//! Tried in order, first success wins:
//!
//! 1. a size stored by an earlier measurement
//! 2. the fast disk-usage tool
//! 3. a logical walk that skips unreadable subtrees
//! 4. the total of a cached scan, however old
//!
//! Results from 2 and 3 are stored before returning so the next measurement of
//! the same path is a lookup.

use crate::disk_usage_cache::CacheStore;
use crate::error::{AnalyzeError, Result};
use crate::tools::DiskUsageTool;
use crate::utils;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};
use walkdir::WalkDir;

pub struct SizeResolver {
    store: Option<Arc<CacheStore>>,
    disk_usage: Option<Arc<dyn DiskUsageTool>>,
    apparent: bool,
}

impl SizeResolver {
    pub fn new(
        store: Option<Arc<CacheStore>>,
        disk_usage: Option<Arc<dyn DiskUsageTool>>,
        apparent: bool,
    ) -> Self {
        Self {
            store,
            disk_usage,
            apparent,
        }
    }

    pub fn measure(&self, path: &Path) -> Result<u64> {
        if path.as_os_str().is_empty() {
            return Err(AnalyzeError::InvalidInput("empty path".into()));
        }
        if !path.is_absolute() {
            return Err(AnalyzeError::InvalidInput(format!(
                "path must be absolute: {}",
                path.display()
            )));
        }

        std::fs::metadata(path).map_err(|source| AnalyzeError::Unreadable {
            path: path.to_path_buf(),
            source,
        })?;

        if let Some(size) = self.store.as_ref().and_then(|s| s.load_overview_size(path)) {
            debug!("{}: stored size {}", path.display(), size);
            return Ok(size);
        }

        if let Some(du) = &self.disk_usage {
            match du.disk_usage(path) {
                Ok(size) if size > 0 => {
                    self.remember(path, size);
                    return Ok(size);
                }
                Ok(_) => {}
                Err(e) => debug!("{}: {}", path.display(), e),
            }
        }

        let logical = logical_size(path, self.apparent);
        if logical > 0 {
            self.remember(path, logical);
            return Ok(logical);
        }

        if let Some(record) = self.store.as_ref().and_then(|s| s.load_any_age(path)) {
            return Ok(record.result.total_size);
        }

        Err(AnalyzeError::MeasurementUnavailable(path.to_path_buf()))
    }

    fn remember(&self, path: &Path, size: u64) {
        if let Some(store) = &self.store {
            if let Err(e) = store.store_overview_size(path, size) {
                warn!("failed to store size for {}: {:#}", path.display(), e);
            }
        }
    }
}

/// Sum of file sizes under `root`, not following symlinks.
///
/// Directories that cannot be read are skipped along with their subtree.
pub fn logical_size(root: &Path, apparent: bool) -> u64 {
    WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| !e.file_type().is_dir())
        .filter_map(|e| e.metadata().ok())
        .map(|m| utils::actual_size(&m, apparent))
        .sum()
}
