//! Integration tests for spacelens
//!
//! These tests drive the scanner, caches and size resolver against real
//! temporary directory trees, with fake accelerators where a tool is involved.

use spacelens::disk_usage::{display_name, ConcurrentScanner, DirScanner, ScanOptions};
use spacelens::disk_usage_cache::CacheStore;
use spacelens::error::{AnalyzeError, Result};
use spacelens::model::ScanResult;
use spacelens::progress::ScanProgress;
use spacelens::rules::ScanRules;
use spacelens::scan_cache::ScanCache;
use spacelens::size_resolver::SizeResolver;
use spacelens::tools::{Accelerators, ContentIndex, DiskUsageTool};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};
use tempfile::TempDir;

fn create_test_dir() -> TempDir {
    tempfile::tempdir().unwrap()
}

fn write_bytes(path: &Path, len: usize) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, vec![0u8; len]).unwrap();
}

fn options() -> ScanOptions {
    ScanOptions {
        apparent_size: true,
        min_large_file_size: 50,
        fallback_walk_timeout: Duration::from_secs(10),
        ..ScanOptions::default()
    }
}

fn scanner_with(accel: Accelerators) -> ConcurrentScanner {
    ConcurrentScanner::new(options(), Arc::new(ScanRules::default()), accel)
}

struct FailingDu;

impl DiskUsageTool for FailingDu {
    fn disk_usage(&self, _path: &Path) -> Result<u64> {
        Err(AnalyzeError::tool("du", "timed out"))
    }
}

struct FixedDu(u64);

impl DiskUsageTool for FixedDu {
    fn disk_usage(&self, _path: &Path) -> Result<u64> {
        Ok(self.0)
    }
}

struct FixedIndex(Vec<PathBuf>);

impl ContentIndex for FixedIndex {
    fn search(&self, _root: &Path, _min_size: u64) -> Result<Vec<PathBuf>> {
        Ok(self.0.clone())
    }
}

/// Returns an empty result after a pause, counting how often it ran.
struct CountingScanner {
    runs: AtomicUsize,
    delay: Duration,
}

impl CountingScanner {
    fn new(delay: Duration) -> Self {
        Self {
            runs: AtomicUsize::new(0),
            delay,
        }
    }

    fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }
}

impl DirScanner for CountingScanner {
    fn scan(&self, _root: &Path, _progress: &ScanProgress) -> Result<ScanResult> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        thread::sleep(self.delay);
        Ok(ScanResult {
            total_size: 7,
            ..ScanResult::default()
        })
    }
}

fn wait_for(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(20));
    }
    false
}

#[test]
fn test_scan_totals_and_order() {
    let temp_dir = create_test_dir();
    let root = temp_dir.path();
    write_bytes(&root.join("a.bin"), 10);
    write_bytes(&root.join("b.bin"), 20);
    write_bytes(&root.join("c.bin"), 5);
    write_bytes(&root.join("sub/deep/d.bin"), 100);

    let progress = ScanProgress::new();
    let result = scanner_with(Accelerators::none()).scan(root, &progress).unwrap();

    assert_eq!(result.total_size, 135);
    let names: Vec<&str> = result.entries.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["sub", "b.bin", "a.bin", "c.bin"]);
    assert_eq!(result.entries[0].size, Some(100));
    assert!(result.entries[0].is_dir);

    // Only d.bin clears the 50-byte threshold, found two levels down.
    assert_eq!(result.large_files.len(), 1);
    assert_eq!(result.large_files[0].name, "d.bin");

    let snapshot = progress.snapshot();
    assert_eq!(snapshot.files, 4);
    assert!(snapshot.dirs >= 2);
}

#[test]
fn test_entry_list_is_capped() {
    let temp_dir = create_test_dir();
    for i in 0..10 {
        write_bytes(&temp_dir.path().join(format!("f{}.bin", i)), i + 1);
    }
    let scanner = ConcurrentScanner::new(
        ScanOptions {
            max_entries: 3,
            ..options()
        },
        Arc::new(ScanRules::default()),
        Accelerators::none(),
    );
    let result = scanner.scan(temp_dir.path(), &ScanProgress::new()).unwrap();

    let sizes: Vec<u64> = result.entries.iter().map(|e| e.known_size()).collect();
    assert_eq!(sizes, vec![10, 9, 8]);
    // The total still counts every child.
    assert_eq!(result.total_size, 55);
}

#[test]
fn test_folded_directory_is_one_entry() {
    let temp_dir = create_test_dir();
    let root = temp_dir.path();
    write_bytes(&root.join("node_modules/pkg/index.bin"), 70);
    write_bytes(&root.join("node_modules/pkg/nested/blob.bin"), 30);

    let result = scanner_with(Accelerators::none())
        .scan(root, &ScanProgress::new())
        .unwrap();

    assert_eq!(result.entries.len(), 1);
    let folded = &result.entries[0];
    assert_eq!(folded.name, "node_modules");
    assert!(folded.is_dir);
    assert_eq!(folded.size, Some(100));
    // Files inside folded trees never reach the large-file list.
    assert!(result.large_files.is_empty());
}

#[test]
fn test_folded_directory_uses_disk_usage_tool() {
    let temp_dir = create_test_dir();
    write_bytes(&temp_dir.path().join(".git/objects/pack.bin"), 10);

    let accel = Accelerators::none().with_disk_usage(Arc::new(FixedDu(4096)));
    let result = scanner_with(accel)
        .scan(temp_dir.path(), &ScanProgress::new())
        .unwrap();
    assert_eq!(result.total_size, 4096);
}

#[test]
fn test_folded_directory_falls_back_to_walk_when_tool_fails() {
    let temp_dir = create_test_dir();
    write_bytes(&temp_dir.path().join(".git/objects/pack.bin"), 10);

    let accel = Accelerators::none().with_disk_usage(Arc::new(FailingDu));
    let result = scanner_with(accel)
        .scan(temp_dir.path(), &ScanProgress::new())
        .unwrap();
    assert_eq!(result.total_size, 10);
}

#[cfg(unix)]
#[test]
fn test_symlink_listed_but_not_followed() {
    let temp_dir = create_test_dir();
    let root = temp_dir.path().join("root");
    write_bytes(&temp_dir.path().join("elsewhere/huge.bin"), 500);
    fs::create_dir(&root).unwrap();
    std::os::unix::fs::symlink(temp_dir.path().join("elsewhere"), root.join("link")).unwrap();

    let result = scanner_with(Accelerators::none())
        .scan(&root, &ScanProgress::new())
        .unwrap();

    assert_eq!(result.entries.len(), 1);
    let link = &result.entries[0];
    assert!(link.is_symlink);
    assert!(!link.is_dir);
    assert!(link.known_size() < 500);
    assert_eq!(display_name(link), "link →");
    assert!(result.large_files.is_empty());
}

#[cfg(unix)]
#[test]
fn test_symlinks_count_toward_file_progress() {
    let temp_dir = create_test_dir();
    let root = temp_dir.path().join("root");
    fs::create_dir(&root).unwrap();
    write_bytes(&root.join("real.bin"), 10);
    for i in 0..3 {
        std::os::unix::fs::symlink(root.join("real.bin"), root.join(format!("link{}", i))).unwrap();
    }

    let progress = ScanProgress::new();
    scanner_with(Accelerators::none()).scan(&root, &progress).unwrap();
    assert_eq!(progress.snapshot().files, 4);
}

#[test]
fn test_system_dirs_skipped_only_at_filesystem_root() {
    let temp_dir = create_test_dir();
    let root = temp_dir.path();
    write_bytes(&root.join("proc/kcore.bin"), 100);
    write_bytes(&root.join("home/user.bin"), 60);

    let as_root = ConcurrentScanner::new(
        ScanOptions {
            filesystem_root: root.to_path_buf(),
            ..options()
        },
        Arc::new(ScanRules::default()),
        Accelerators::none(),
    );
    let result = as_root.scan(root, &ScanProgress::new()).unwrap();
    let names: Vec<&str> = result.entries.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["home"]);
    assert_eq!(result.total_size, 60);
    let large: Vec<&str> = result.large_files.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(large, vec!["user.bin"]);

    // Anywhere else the same name is an ordinary directory.
    let result = scanner_with(Accelerators::none())
        .scan(root, &ScanProgress::new())
        .unwrap();
    assert_eq!(result.entries.len(), 2);
    assert_eq!(result.total_size, 160);
}

#[test]
fn test_nested_folded_directory_counts_but_stays_opaque() {
    let temp_dir = create_test_dir();
    let root = temp_dir.path();
    write_bytes(&root.join("proj/node_modules/pkg/big.bin"), 1000);
    write_bytes(&root.join("proj/src/big2.bin"), 500);
    write_bytes(&root.join("proj/a.cache"), 400);

    let result = scanner_with(Accelerators::none())
        .scan(root, &ScanProgress::new())
        .unwrap();

    assert_eq!(result.entries.len(), 1);
    assert_eq!(result.entries[0].name, "proj");
    assert_eq!(result.entries[0].size, Some(1900));
    assert_eq!(result.total_size, 1900);

    let large: Vec<(&str, u64)> = result
        .large_files
        .iter()
        .map(|f| (f.name.as_str(), f.size))
        .collect();
    assert_eq!(large, vec![("big2.bin", 500), ("a.cache", 400)]);
}

#[cfg(unix)]
#[test]
fn test_unreadable_subdirectory_is_omitted() {
    use std::os::unix::fs::PermissionsExt;

    let temp_dir = create_test_dir();
    let root = temp_dir.path();
    write_bytes(&root.join("a/locked/secret.bin"), 70);
    write_bytes(&root.join("a/seen.bin"), 20);
    write_bytes(&root.join("top.bin"), 10);

    let locked = root.join("a/locked");
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();
    if fs::read_dir(&locked).is_ok() {
        // Permissions are not enforced for this user (e.g. running as root).
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
        return;
    }

    let result = scanner_with(Accelerators::none()).scan(root, &ScanProgress::new());
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

    let result = result.unwrap();
    assert_eq!(result.total_size, 30);
    let sizes: Vec<(&str, u64)> = result
        .entries
        .iter()
        .map(|e| (e.name.as_str(), e.known_size()))
        .collect();
    assert_eq!(sizes, vec![("a", 20), ("top.bin", 10)]);
    assert!(result.large_files.is_empty());
}

#[test]
fn test_unreadable_root_is_an_error() {
    let temp_dir = create_test_dir();
    let missing = temp_dir.path().join("missing");
    let err = scanner_with(Accelerators::none())
        .scan(&missing, &ScanProgress::new())
        .unwrap_err();
    assert!(matches!(err, AnalyzeError::Unreadable { .. }));
}

#[test]
fn test_index_results_replace_large_files() {
    let temp_dir = create_test_dir();
    let root = temp_dir.path();
    write_bytes(&root.join("walked.bin"), 60);
    write_bytes(&root.join("media/indexed.bin"), 80);
    write_bytes(&root.join("node_modules/hidden.bin"), 90);
    write_bytes(&root.join("notes.txt"), 95);

    let index = FixedIndex(vec![
        root.join("media/indexed.bin"),
        root.join("node_modules/hidden.bin"),
        root.join("notes.txt"),
        root.join("media"),
        root.join("gone.bin"),
    ]);
    let accel = Accelerators::none().with_index(Arc::new(index));
    let result = scanner_with(accel).scan(root, &ScanProgress::new()).unwrap();

    let names: Vec<&str> = result.large_files.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, vec!["indexed.bin"]);
}

#[test]
fn test_empty_index_keeps_walked_large_files() {
    let temp_dir = create_test_dir();
    write_bytes(&temp_dir.path().join("walked.bin"), 60);

    let accel = Accelerators::none().with_index(Arc::new(FixedIndex(Vec::new())));
    let result = scanner_with(accel)
        .scan(temp_dir.path(), &ScanProgress::new())
        .unwrap();
    assert_eq!(result.large_files.len(), 1);
    assert_eq!(result.large_files[0].name, "walked.bin");
}

#[test]
fn test_concurrent_requests_share_one_scan() {
    let scanner = Arc::new(CountingScanner::new(Duration::from_millis(300)));
    let cache = Arc::new(ScanCache::new(scanner.clone(), None));
    let barrier = Arc::new(Barrier::new(5));

    let handles: Vec<_> = (0..5)
        .map(|_| {
            let cache = Arc::clone(&cache);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                cache.get_or_scan(Path::new("/shared"), &ScanProgress::new())
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap().unwrap().total_size, 7);
    }
    assert_eq!(scanner.runs(), 1);
}

#[test]
fn test_persisted_results_survive_a_new_cache() {
    let temp_dir = create_test_dir();
    let target = temp_dir.path().join("data");
    write_bytes(&target.join("x.bin"), 3);
    let store = Arc::new(CacheStore::new(temp_dir.path().join("cache")));

    let first = Arc::new(CountingScanner::new(Duration::ZERO));
    let cache = ScanCache::new(first.clone(), Some(Arc::clone(&store)));
    cache.get_or_scan(&target, &ScanProgress::new()).unwrap();
    assert_eq!(first.runs(), 1);
    // The write happens in the background.
    assert!(wait_for(|| store.load(&target).is_some()));

    let second = Arc::new(CountingScanner::new(Duration::ZERO));
    let cache = ScanCache::new(second.clone(), Some(Arc::clone(&store)));
    let result = cache.get_or_scan(&target, &ScanProgress::new()).unwrap();
    assert_eq!(result.total_size, 7);
    assert_eq!(second.runs(), 0);

    cache.invalidate(&target);
    assert!(store.load(&target).is_none());
    cache.get_or_scan(&target, &ScanProgress::new()).unwrap();
    assert_eq!(second.runs(), 1);
    assert!(wait_for(|| store.load(&target).is_some()));
}

#[test]
fn test_expired_records_are_rescanned() {
    let temp_dir = create_test_dir();
    let target = temp_dir.path().join("data");
    fs::create_dir(&target).unwrap();
    let store = CacheStore::new(temp_dir.path().join("cache"))
        .with_max_age(Some(chrono::Duration::zero()));
    store.save(&target, &ScanResult::default()).unwrap();
    thread::sleep(Duration::from_millis(10));

    assert!(store.load(&target).is_none());
    assert!(store.load_any_age(&target).is_some());
}

#[test]
fn test_resolver_rejects_relative_paths() {
    let resolver = SizeResolver::new(None, None, true);
    let err = resolver.measure(Path::new("relative/dir")).unwrap_err();
    assert!(matches!(err, AnalyzeError::InvalidInput(_)));
}

#[test]
fn test_resolver_falls_back_to_walk_and_remembers() {
    let temp_dir = create_test_dir();
    let target = temp_dir.path().join("data");
    write_bytes(&target.join("one.bin"), 40);
    write_bytes(&target.join("two/three.bin"), 2);
    let store = Arc::new(CacheStore::new(temp_dir.path().join("cache")));

    let resolver = SizeResolver::new(Some(Arc::clone(&store)), Some(Arc::new(FailingDu)), true);
    assert_eq!(resolver.measure(&target).unwrap(), 42);
    assert_eq!(store.load_overview_size(&target), Some(42));

    // A stored size wins over measuring again.
    write_bytes(&target.join("more.bin"), 1000);
    assert_eq!(resolver.measure(&target).unwrap(), 42);
}

#[test]
fn test_resolver_prefers_disk_usage_tool() {
    let temp_dir = create_test_dir();
    write_bytes(&temp_dir.path().join("one.bin"), 40);
    let resolver = SizeResolver::new(None, Some(Arc::new(FixedDu(8192))), true);
    assert_eq!(resolver.measure(temp_dir.path()).unwrap(), 8192);
}

#[test]
fn test_resolver_uses_any_age_scan_record_last() {
    let temp_dir = create_test_dir();
    let target = temp_dir.path().join("empty");
    fs::create_dir(&target).unwrap();
    let store = Arc::new(
        CacheStore::new(temp_dir.path().join("cache")).with_max_age(Some(chrono::Duration::zero())),
    );
    let recorded = ScanResult {
        total_size: 900,
        ..ScanResult::default()
    };
    store.save(&target, &recorded).unwrap();

    let resolver = SizeResolver::new(Some(store), Some(Arc::new(FailingDu)), true);
    assert_eq!(resolver.measure(&target).unwrap(), 900);
}

#[test]
fn test_resolver_reports_unavailable_instead_of_zero() {
    let temp_dir = create_test_dir();
    let resolver = SizeResolver::new(None, Some(Arc::new(FailingDu)), true);
    let err = resolver.measure(temp_dir.path()).unwrap_err();
    assert!(matches!(err, AnalyzeError::MeasurementUnavailable(_)));
}
