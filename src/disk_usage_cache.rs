//! Persisted scan results and overview sizes
//!
//! One JSON file per scanned path under `<cache dir>/scans/`, named by a hash of
//! the path, plus a single `overview_sizes.json` map. Writes go to a temp file
//! first and are renamed into place so a crash never leaves a torn record.
//!
//! Records stay valid until something invalidates them. An optional maximum age
//! can be configured on top. [`CacheStore::prune`] clears out records that
//! have expired or whose directory is gone.

use crate::model::{CacheRecord, ScanResult};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::fs;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;

const SCANS_DIR: &str = "scans";
const OVERVIEW_FILE: &str = "overview_sizes.json";

#[derive(Debug)]
pub struct CacheStore {
    dir: PathBuf,
    max_age: Option<chrono::Duration>,
    /// Serializes read-modify-write of the overview map within this process.
    overview_lock: Mutex<()>,
}

/// Default cache directory: `<cache dir>/spacelens`.
pub fn default_cache_dir() -> Result<PathBuf> {
    let dirs = directories::ProjectDirs::from("", "", "spacelens")
        .context("Could not determine a home directory for the cache")?;
    Ok(dirs.cache_dir().to_path_buf())
}

fn cache_key(path: &Path) -> String {
    let mut hasher = DefaultHasher::new();
    path.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

fn write_atomic(target: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create cache directory: {}", parent.display()))?;
    }
    let temp = target.with_extension("tmp");
    fs::write(&temp, contents)
        .with_context(|| format!("Failed to write cache file: {}", temp.display()))?;
    fs::rename(&temp, target)
        .with_context(|| format!("Failed to rename cache file: {}", target.display()))?;
    Ok(())
}

fn modified_time(path: &Path) -> Option<DateTime<Utc>> {
    fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .map(DateTime::<Utc>::from)
}

impl CacheStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            max_age: None,
            overview_lock: Mutex::new(()),
        }
    }

    pub fn with_max_age(mut self, max_age: Option<chrono::Duration>) -> Self {
        self.max_age = max_age;
        self
    }

    fn record_file(&self, path: &Path) -> PathBuf {
        self.dir
            .join(SCANS_DIR)
            .join(format!("{}.json", cache_key(path)))
    }

    fn overview_file(&self) -> PathBuf {
        self.dir.join(OVERVIEW_FILE)
    }

    /// A record for `path`, if present and within the configured maximum age.
    pub fn load(&self, path: &Path) -> Option<CacheRecord> {
        let record = self.load_any_age(path)?;
        if let Some(max_age) = self.max_age {
            if Utc::now() - record.cached_at > max_age {
                debug!("cache record for {} expired", path.display());
                return None;
            }
        }
        Some(record)
    }

    /// A record for `path` regardless of its age.
    pub fn load_any_age(&self, path: &Path) -> Option<CacheRecord> {
        let file = self.record_file(path);
        let data = fs::read_to_string(&file).ok()?;
        let record: CacheRecord = match serde_json::from_str(&data) {
            Ok(r) => r,
            Err(e) => {
                debug!("discarding unreadable cache file {}: {}", file.display(), e);
                let _ = fs::remove_file(&file);
                return None;
            }
        };
        // Hash collision guard
        if record.path != path {
            return None;
        }
        Some(record)
    }

    pub fn save(&self, path: &Path, result: &ScanResult) -> Result<()> {
        let record = CacheRecord {
            path: path.to_path_buf(),
            result: result.clone(),
            source_mod_time: modified_time(path),
            cached_at: Utc::now(),
        };
        let json = serde_json::to_string(&record).context("Failed to serialize scan result")?;
        write_atomic(&self.record_file(path), &json)
    }

    /// Drop the scan record and overview size stored for `path`.
    pub fn invalidate(&self, path: &Path) -> Result<()> {
        let file = self.record_file(path);
        match fs::remove_file(&file) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to remove cache file: {}", file.display()))
            }
        }

        let _guard = self.overview_lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut sizes = self.read_overview_map();
        if sizes.remove(path).is_some() {
            self.write_overview_map(&sizes)?;
        }
        Ok(())
    }

    /// Remove scan records that can no longer be served: unreadable ones,
    /// those for directories that are gone, and those past the maximum age.
    /// Returns how many files were removed.
    pub fn prune(&self) -> usize {
        let Ok(read_dir) = fs::read_dir(self.dir.join(SCANS_DIR)) else {
            return 0;
        };
        let now = Utc::now();
        let mut removed = 0;
        for file in read_dir.flatten().map(|e| e.path()) {
            let record: Option<CacheRecord> = fs::read_to_string(&file)
                .ok()
                .and_then(|data| serde_json::from_str(&data).ok());
            let stale = match record {
                None => true,
                Some(record) => {
                    !record.path.is_dir()
                        || self
                            .max_age
                            .is_some_and(|max_age| now - record.cached_at > max_age)
                }
            };
            if stale && fs::remove_file(&file).is_ok() {
                removed += 1;
            }
        }
        if removed > 0 {
            debug!("pruned {} cache records from {}", removed, self.dir.display());
        }
        removed
    }

    fn read_overview_map(&self) -> HashMap<PathBuf, u64> {
        fs::read_to_string(self.overview_file())
            .ok()
            .and_then(|data| serde_json::from_str(&data).ok())
            .unwrap_or_default()
    }

    fn write_overview_map(&self, sizes: &HashMap<PathBuf, u64>) -> Result<()> {
        let json = serde_json::to_string_pretty(sizes).context("Failed to serialize overview sizes")?;
        write_atomic(&self.overview_file(), &json)
    }

    /// Every stored overview size.
    pub fn overview_sizes(&self) -> HashMap<PathBuf, u64> {
        let _guard = self.overview_lock.lock().unwrap_or_else(|e| e.into_inner());
        self.read_overview_map()
    }

    /// A stored size for `path`, only if positive.
    pub fn load_overview_size(&self, path: &Path) -> Option<u64> {
        self.overview_sizes().get(path).copied().filter(|s| *s > 0)
    }

    pub fn store_overview_size(&self, path: &Path, size: u64) -> Result<()> {
        let _guard = self.overview_lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut sizes = self.read_overview_map();
        sizes.insert(path.to_path_buf(), size);
        self.write_overview_map(&sizes)
    }
}
