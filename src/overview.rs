//! Whole-system overview: a few top-level shortcuts measured lazily
//!
//! The scheduler only tracks which shortcuts are being measured. Each tick it
//! hands out up to `batch` unmeasured, not-yet-dispatched paths; the caller
//! runs the measurements and reports completion.

use crate::model::Entry;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

pub const VOLUMES_DIR: &str = "/Volumes";

/// The shortcut list, every size pending.
pub fn create_overview_entries() -> Vec<Entry> {
    let home = directories::BaseDirs::new().map(|d| d.home_dir().to_path_buf());
    overview_entries_for(home.as_deref(), Path::new(VOLUMES_DIR))
}

/// Shortcut list for an explicit home and volumes directory.
pub fn overview_entries_for(home: Option<&Path>, volumes: &Path) -> Vec<Entry> {
    let mut entries = Vec::new();
    if let Some(home) = home {
        entries.push(Entry::pending_dir("Home (~)", home));
        entries.push(Entry::pending_dir("Library (~/Library)", home.join("Library")));
    }
    entries.push(Entry::pending_dir("Applications", "/Applications"));
    entries.push(Entry::pending_dir("System Library", "/Library"));
    if has_useful_volume_mounts(volumes) {
        entries.push(Entry::pending_dir("Volumes", volumes));
    }
    entries
}

/// True when `path` holds at least one visible, real directory.
///
/// Hidden control folders and the symlink back to the boot volume don't count.
pub fn has_useful_volume_mounts(path: &Path) -> bool {
    let Ok(read_dir) = fs::read_dir(path) else {
        return false;
    };
    read_dir.flatten().any(|entry| {
        if entry.file_name().to_string_lossy().starts_with('.') {
            return false;
        }
        fs::symlink_metadata(entry.path())
            .map(|m| m.is_dir() && !m.file_type().is_symlink())
            .unwrap_or(false)
    })
}

#[derive(Debug, Clone)]
pub struct OverviewScheduler {
    in_flight: HashSet<PathBuf>,
    batch: usize,
}

impl OverviewScheduler {
    pub fn new(batch: usize) -> Self {
        Self {
            in_flight: HashSet::new(),
            batch: batch.max(1),
        }
    }

    /// Claim the next batch of pending shortcuts. Claimed paths stay in flight
    /// until [`complete`](Self::complete) is called for them.
    pub fn schedule(&mut self, entries: &[Entry]) -> Vec<PathBuf> {
        let picked: Vec<PathBuf> = entries
            .iter()
            .filter(|e| e.is_pending() && !self.in_flight.contains(&e.path))
            .take(self.batch)
            .map(|e| e.path.clone())
            .collect();
        self.in_flight.extend(picked.iter().cloned());
        picked
    }

    pub fn complete(&mut self, path: &Path) {
        self.in_flight.remove(path);
    }

    pub fn is_active(&self) -> bool {
        !self.in_flight.is_empty()
    }

    pub fn is_in_flight(&self, path: &Path) -> bool {
        self.in_flight.contains(path)
    }
}

pub fn has_pending(entries: &[Entry]) -> bool {
    entries.iter().any(Entry::is_pending)
}
