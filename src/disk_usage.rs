//! Disk usage analysis - one directory level, sized all the way down
//!
//! The immediate children of the root become the entry list. Every ordinary
//! subdirectory is recursed on a bounded rayon pool; the files found on the
//! way feed the large-file list. Dependency and cache trees are folded: sized
//! in one go and reported as a single entry.
//!
//! Results stream over channels into two aggregator threads, one per top-N
//! tracker, so the trackers themselves are never shared between workers.

use crate::config::ScanConfig;
use crate::error::{AnalyzeError, Result};
use crate::model::{Entry, FileRecord, ScanResult};
use crate::progress::ScanProgress;
use crate::rules::ScanRules;
use crate::tools::Accelerators;
use crate::top_n::TopN;
use crate::utils;
use crossbeam_channel::{bounded, Sender};
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Something that can produce a [`ScanResult`] for a directory.
pub trait DirScanner: Send + Sync {
    fn scan(&self, root: &Path, progress: &ScanProgress) -> Result<ScanResult>;
}

#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub max_entries: usize,
    pub max_large_files: usize,
    pub min_large_file_size: u64,
    pub cpu_multiplier: usize,
    pub min_workers: usize,
    pub max_workers: usize,
    pub max_dir_workers: usize,
    pub fallback_walk_timeout: Duration,
    pub apparent_size: bool,
    /// Scanning exactly this directory skips the OS pseudo-filesystems below it.
    pub filesystem_root: PathBuf,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self::from_config(&ScanConfig::default())
    }
}

impl ScanOptions {
    pub fn from_config(config: &ScanConfig) -> Self {
        Self {
            max_entries: config.max_entries,
            max_large_files: config.max_large_files,
            min_large_file_size: config.min_large_file_bytes(),
            cpu_multiplier: config.cpu_multiplier,
            min_workers: config.min_workers,
            max_workers: config.max_workers,
            max_dir_workers: config.max_dir_workers,
            fallback_walk_timeout: config.fallback_walk_timeout(),
            apparent_size: config.apparent_size,
            filesystem_root: PathBuf::from("/"),
        }
    }
}

/// Pool size for one scan: CPUs times the multiplier, clamped to
/// `[min, max]`, then to the number of children, and never below one.
pub fn worker_count(cpus: usize, multiplier: usize, min: usize, max: usize, children: usize) -> usize {
    cpus.saturating_mul(multiplier)
        .max(min)
        .min(max)
        .min(children)
        .max(1)
}

enum ChildKind {
    Symlink,
    Folded,
    Dir,
    File,
    Skipped,
}

pub struct ConcurrentScanner {
    options: ScanOptions,
    rules: Arc<ScanRules>,
    accel: Accelerators,
}

impl ConcurrentScanner {
    pub fn new(options: ScanOptions, rules: Arc<ScanRules>, accel: Accelerators) -> Self {
        Self {
            options,
            rules,
            accel,
        }
    }

    fn classify(&self, name: &str, path: &Path, file_type: fs::FileType, is_root: bool) -> ChildKind {
        if file_type.is_symlink() || utils::is_windows_reparse_point(path) {
            ChildKind::Symlink
        } else if file_type.is_dir() {
            if is_root && self.rules.is_root_system_dir(name) {
                ChildKind::Skipped
            } else if self.rules.should_fold(name, path) {
                ChildKind::Folded
            } else {
                ChildKind::Dir
            }
        } else {
            ChildKind::File
        }
    }

    fn wants_large(&self, path: &Path, size: u64) -> bool {
        size >= self.options.min_large_file_size && !self.rules.skip_for_large_tracking(path)
    }

    /// Size of a folded directory: the disk-usage tool, else a time-boxed walk.
    fn folded_size(&self, path: &Path, progress: &ScanProgress) -> u64 {
        if let Some(du) = &self.accel.disk_usage {
            match du.disk_usage(path) {
                Ok(size) if size > 0 => {
                    progress.add_bytes(size);
                    return size;
                }
                Ok(_) => {}
                Err(e) => debug!("{}: {}", path.display(), e),
            }
        }
        self.bounded_walk(path, progress)
    }

    /// Walk a whole tree on its own small pool, giving up at the deadline.
    fn bounded_walk(&self, root: &Path, progress: &ScanProgress) -> u64 {
        let deadline = Instant::now() + self.options.fallback_walk_timeout;
        let threads = num_cpus::get()
            .saturating_mul(2)
            .min(self.options.max_dir_workers)
            .max(1);
        progress.set_current(root);

        let walker = jwalk::WalkDir::new(root)
            .skip_hidden(false)
            .follow_links(false)
            .parallelism(jwalk::Parallelism::RayonNewPool(threads));

        let mut total = 0u64;
        for entry in walker {
            if Instant::now() >= deadline {
                warn!(
                    "size walk of {} stopped after {:?}; reporting partial size",
                    root.display(),
                    self.options.fallback_walk_timeout
                );
                break;
            }
            let Ok(entry) = entry else { continue };
            if entry.file_type().is_dir() {
                progress.add_dir();
                continue;
            }
            if let Ok(meta) = entry.metadata() {
                let size = utils::actual_size(&meta, self.options.apparent_size);
                total += size;
                progress.add_file(size);
            }
        }
        total
    }

    /// Total size under `dir`, streaming qualifying files into `large_tx`.
    ///
    /// Unreadable directories and entries count as nothing.
    fn dir_size(&self, dir: &Path, large_tx: &Sender<FileRecord>, progress: &ScanProgress) -> u64 {
        let Ok(read_dir) = fs::read_dir(dir) else {
            return 0;
        };
        progress.set_current(dir);

        let mut total = 0u64;
        let mut subdirs = Vec::new();
        let mut folded = Vec::new();

        for child in read_dir.flatten() {
            let path = child.path();
            let Ok(file_type) = child.file_type() else { continue };
            let name = child.file_name().to_string_lossy().into_owned();

            match self.classify(&name, &path, file_type, false) {
                ChildKind::Dir => subdirs.push(path),
                ChildKind::Folded => folded.push(path),
                ChildKind::Skipped => {}
                ChildKind::Symlink => {
                    if let Ok(meta) = fs::symlink_metadata(&path) {
                        let size = utils::actual_size(&meta, self.options.apparent_size);
                        total += size;
                        progress.add_file(size);
                    }
                }
                ChildKind::File => {
                    let Ok(meta) = child.metadata() else { continue };
                    let size = utils::actual_size(&meta, self.options.apparent_size);
                    total += size;
                    progress.add_file(size);
                    if self.wants_large(&path, size) {
                        let _ = large_tx.send(FileRecord { name, path, size });
                    }
                }
            }
        }

        // Runs on whichever pool the caller is installed in.
        let nested: u64 = subdirs
            .par_iter()
            .map(|sub| {
                let size = self.dir_size(sub, large_tx, progress);
                progress.add_dir();
                size
            })
            .sum();
        let folded_total: u64 = folded
            .par_iter()
            .map(|sub| {
                let size = self.folded_size(sub, progress);
                progress.add_dir();
                size
            })
            .sum();

        total + nested + folded_total
    }

    /// Large files from the content index, filtered by the same rules as the heap.
    fn indexed_large_files(&self, root: &Path) -> Vec<FileRecord> {
        let Some(index) = &self.accel.index else {
            return Vec::new();
        };
        let paths = match index.search(root, self.options.min_large_file_size) {
            Ok(paths) => paths,
            Err(e) => {
                debug!("content index unavailable for {}: {}", root.display(), e);
                return Vec::new();
            }
        };

        let mut files: Vec<FileRecord> = paths
            .into_iter()
            .filter(|p| !self.rules.skip_for_large_tracking(p) && !self.rules.is_in_folded_dir(p))
            .filter_map(|path| {
                let meta = fs::symlink_metadata(&path).ok()?;
                if meta.is_dir() || meta.file_type().is_symlink() {
                    return None;
                }
                let size = utils::actual_size(&meta, self.options.apparent_size);
                let name = path.file_name()?.to_string_lossy().into_owned();
                Some(FileRecord { name, path, size })
            })
            .collect();

        files.sort_by(|a, b| b.size.cmp(&a.size));
        files.truncate(self.options.max_large_files);
        files
    }
}

impl DirScanner for ConcurrentScanner {
    fn scan(&self, root: &Path, progress: &ScanProgress) -> Result<ScanResult> {
        let children: Vec<fs::DirEntry> = fs::read_dir(root)
            .map_err(|source| AnalyzeError::Unreadable {
                path: root.to_path_buf(),
                source,
            })?
            .flatten()
            .collect();

        let is_root = root == self.options.filesystem_root;
        let workers = worker_count(
            num_cpus::get(),
            self.options.cpu_multiplier,
            self.options.min_workers,
            self.options.max_workers,
            children.len(),
        );
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("spacelens-scan-{}", i))
            .build()
            .map_err(|e| AnalyzeError::tool("worker pool", e.to_string()))?;
        debug!("scanning {} with {} workers", root.display(), workers);

        let (entry_tx, entry_rx) = bounded::<Entry>(children.len().max(1));
        let (large_tx, large_rx) = bounded::<FileRecord>(self.options.max_large_files.max(1) * 2);
        let total = AtomicU64::new(0);

        let (entries, large_files) = thread::scope(|s| {
            let max_entries = self.options.max_entries;
            let max_large = self.options.max_large_files;
            let entries_agg = s.spawn(move || {
                let mut top = TopN::new(max_entries);
                for entry in entry_rx {
                    top.push(entry);
                }
                top.drain_descending()
            });
            let large_agg = s.spawn(move || {
                let mut top = TopN::new(max_large);
                for file in large_rx {
                    top.push(file);
                }
                top.drain_descending()
            });

            pool.scope(|ps| {
                for child in &children {
                    let path = child.path();
                    let Ok(file_type) = child.file_type() else { continue };
                    let name = child.file_name().to_string_lossy().into_owned();

                    match self.classify(&name, &path, file_type, is_root) {
                        ChildKind::Skipped => {}
                        ChildKind::Symlink => {
                            let Ok(meta) = fs::symlink_metadata(&path) else { continue };
                            let size = utils::actual_size(&meta, self.options.apparent_size);
                            total.fetch_add(size, Ordering::Relaxed);
                            progress.add_file(size);
                            let _ = entry_tx.send(Entry {
                                is_symlink: true,
                                last_access: utils::last_access(&meta),
                                ..Entry::file(name, path, size)
                            });
                        }
                        ChildKind::File => {
                            let Ok(meta) = child.metadata() else { continue };
                            let size = utils::actual_size(&meta, self.options.apparent_size);
                            total.fetch_add(size, Ordering::Relaxed);
                            progress.add_file(size);
                            if self.wants_large(&path, size) {
                                let _ = large_tx.send(FileRecord {
                                    name: name.clone(),
                                    path: path.clone(),
                                    size,
                                });
                            }
                            let _ = entry_tx.send(Entry {
                                last_access: utils::last_access(&meta),
                                ..Entry::file(name, path, size)
                            });
                        }
                        ChildKind::Folded => {
                            let entry_tx = entry_tx.clone();
                            let total = &total;
                            ps.spawn(move |_| {
                                let size = self.folded_size(&path, progress);
                                total.fetch_add(size, Ordering::Relaxed);
                                progress.add_dir();
                                let _ = entry_tx.send(Entry::dir(name, path, size));
                            });
                        }
                        ChildKind::Dir => {
                            let entry_tx = entry_tx.clone();
                            let large_tx = large_tx.clone();
                            let total = &total;
                            ps.spawn(move |_| {
                                let size = self.dir_size(&path, &large_tx, progress);
                                total.fetch_add(size, Ordering::Relaxed);
                                progress.add_dir();
                                let _ = entry_tx.send(Entry::dir(name, path, size));
                            });
                        }
                    }
                }
            });

            // Every worker has finished; closing the channels ends the aggregators.
            drop(entry_tx);
            drop(large_tx);
            (
                entries_agg.join().unwrap_or_default(),
                large_agg.join().unwrap_or_default(),
            )
        });

        let indexed = self.indexed_large_files(root);
        let large_files = if indexed.is_empty() {
            large_files
        } else {
            debug!("using {} indexed large files for {}", indexed.len(), root.display());
            indexed
        };

        Ok(ScanResult {
            entries,
            large_files,
            total_size: total.into_inner(),
        })
    }
}

/// Display names for symlink entries carry an arrow.
pub fn display_name(entry: &Entry) -> String {
    if entry.is_symlink {
        format!("{} →", entry.name)
    } else {
        entry.name.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worker_count_clamps() {
        // floor
        assert_eq!(worker_count(2, 4, 16, 64, 100), 16);
        // ceiling
        assert_eq!(worker_count(32, 4, 16, 64, 100), 64);
        // never more than children
        assert_eq!(worker_count(8, 4, 16, 64, 5), 5);
        // at least one
        assert_eq!(worker_count(8, 4, 16, 64, 0), 1);
    }

    #[test]
    fn test_display_name_tags_symlinks() {
        let mut entry = Entry::file("link", "/x/link", 0);
        assert_eq!(display_name(&entry), "link");
        entry.is_symlink = true;
        assert_eq!(display_name(&entry), "link →");
    }
}
