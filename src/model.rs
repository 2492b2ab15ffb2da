//! Data shared between the scanner, the caches and the navigation model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One immediate child of a scanned directory, or an overview shortcut.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub name: String,
    pub path: PathBuf,
    /// `None` until measured. Only overview shortcuts are ever unmeasured.
    pub size: Option<u64>,
    pub is_dir: bool,
    /// Symlinks are listed as non-directories and never entered.
    #[serde(default)]
    pub is_symlink: bool,
    #[serde(default)]
    pub last_access: Option<DateTime<Utc>>,
}

impl Entry {
    pub fn file(name: impl Into<String>, path: impl Into<PathBuf>, size: u64) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            size: Some(size),
            is_dir: false,
            is_symlink: false,
            last_access: None,
        }
    }

    pub fn dir(name: impl Into<String>, path: impl Into<PathBuf>, size: u64) -> Self {
        Self {
            is_dir: true,
            ..Self::file(name, path, size)
        }
    }

    /// An overview shortcut that has not been measured yet.
    pub fn pending_dir(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            size: None,
            ..Self::dir(name, path, 0)
        }
    }

    /// Measured size, or zero while pending.
    pub fn known_size(&self) -> u64 {
        self.size.unwrap_or(0)
    }

    pub fn is_pending(&self) -> bool {
        self.size.is_none()
    }

    /// Recorded last access, or read from disk when the scan left it out.
    pub fn last_access_or_read(&self) -> Option<DateTime<Utc>> {
        self.last_access
            .or_else(|| crate::utils::last_access_of(&self.path))
    }
}

/// A large-file hit. Never a directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub name: String,
    pub path: PathBuf,
    pub size: u64,
}

/// Output of one directory-level scan. Both lists are sorted by size, descending.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanResult {
    pub entries: Vec<Entry>,
    pub large_files: Vec<FileRecord>,
    pub total_size: u64,
}

/// A persisted scan result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheRecord {
    pub path: PathBuf,
    #[serde(flatten)]
    pub result: ScanResult,
    pub source_mod_time: Option<DateTime<Utc>>,
    pub cached_at: DateTime<Utc>,
}

/// Selection and scroll state for both lists of a view.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Selection {
    pub selected: usize,
    pub offset: usize,
    pub large_selected: usize,
    pub large_offset: usize,
}

/// Snapshot of a view, kept on the history stack and in the per-path view cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryFrame {
    pub path: PathBuf,
    pub entries: Vec<Entry>,
    pub large_files: Vec<FileRecord>,
    pub total_size: u64,
    pub selection: Selection,
    /// Set after any deletion. A dirty frame is rescanned instead of restored.
    pub dirty: bool,
}

/// Sum of measured sizes; pending entries do not count.
pub fn sum_known_sizes(entries: &[Entry]) -> u64 {
    entries.iter().filter_map(|e| e.size).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_entries_are_excluded_from_total() {
        let entries = vec![
            Entry::dir("a", "/a", 10),
            Entry::pending_dir("b", "/b"),
            Entry::file("c", "/c", 5),
        ];
        assert_eq!(sum_known_sizes(&entries), 15);
        assert!(entries[1].is_pending());
        assert_eq!(entries[1].known_size(), 0);
    }

    #[test]
    fn test_cache_record_json_shape() {
        let record = CacheRecord {
            path: PathBuf::from("/data"),
            result: ScanResult {
                entries: vec![Entry::dir("x", "/data/x", 42)],
                large_files: vec![],
                total_size: 42,
            },
            source_mod_time: None,
            cached_at: Utc::now(),
        };
        let json = serde_json::to_value(&record).unwrap();
        // The result fields sit at the top level of the record.
        assert_eq!(json["total_size"], 42);
        assert_eq!(json["entries"][0]["name"], "x");
    }

    #[test]
    fn test_last_access_read_lazily_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let entry = Entry::dir("d", dir.path(), 0);
        assert!(entry.last_access.is_none());
        assert!(entry.last_access_or_read().is_some());

        let recorded = Utc::now() - chrono::Duration::days(400);
        let entry = Entry {
            last_access: Some(recorded),
            ..Entry::file("gone", "/no/such/file", 1)
        };
        assert_eq!(entry.last_access_or_read(), Some(recorded));
        assert_eq!(Entry::file("gone", "/no/such/file", 1).last_access_or_read(), None);
    }
}
