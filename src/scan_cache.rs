//! Scan results with request deduplication and a persisted layer
//!
//! A request first checks the persisted store. On a miss it joins any scan of
//! the same path already in progress, or starts one. Only the caller that
//! actually ran the scan persists the result, on a background thread.

use crate::disk_usage::DirScanner;
use crate::disk_usage_cache::CacheStore;
use crate::error::Result;
use crate::model::ScanResult;
use crate::progress::ScanProgress;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use tracing::{debug, warn};

enum CallState<V> {
    Running,
    Done(V),
    /// The leader unwound before producing a value.
    Abandoned,
}

struct Call<V> {
    state: Mutex<CallState<V>>,
    done: Condvar,
}

/// Collapses concurrent calls for the same path into one execution.
pub struct InFlight<V> {
    calls: Mutex<HashMap<PathBuf, Arc<Call<V>>>>,
}

impl<V> Default for InFlight<V> {
    fn default() -> Self {
        Self {
            calls: Mutex::new(HashMap::new()),
        }
    }
}

/// Removes the call and wakes waiters even if the leader panics.
struct LeaderGuard<'a, V> {
    owner: &'a InFlight<V>,
    key: &'a Path,
    call: Arc<Call<V>>,
}

impl<V> Drop for LeaderGuard<'_, V> {
    fn drop(&mut self) {
        {
            let mut state = self.call.state.lock().unwrap_or_else(|e| e.into_inner());
            if matches!(*state, CallState::Running) {
                *state = CallState::Abandoned;
            }
        }
        self.call.done.notify_all();
        self.owner
            .calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(self.key);
    }
}

impl<V: Clone> InFlight<V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` for `key` unless a call for it is already running, in which case
    /// wait for and share that call's value. The flag is true for the caller
    /// whose `f` actually ran.
    pub fn run<F: FnOnce() -> V>(&self, key: &Path, f: F) -> (V, bool) {
        let mut calls = self.calls.lock().unwrap_or_else(|e| e.into_inner());
        let existing = calls.get(key).cloned();
        let call = match existing {
            Some(call) => {
                drop(calls);
                call
            }
            None => {
                let call = Arc::new(Call {
                    state: Mutex::new(CallState::Running),
                    done: Condvar::new(),
                });
                calls.insert(key.to_path_buf(), Arc::clone(&call));
                drop(calls);
                return self.lead(key, call, f);
            }
        };

        let mut state = call.state.lock().unwrap_or_else(|e| e.into_inner());
        while matches!(*state, CallState::Running) {
            state = call.done.wait(state).unwrap_or_else(|e| e.into_inner());
        }
        if let CallState::Done(value) = &*state {
            return (value.clone(), false);
        }
        drop(state);

        // The leader went away empty-handed; do the work here.
        (f(), true)
    }

    fn lead<F: FnOnce() -> V>(&self, key: &Path, call: Arc<Call<V>>, f: F) -> (V, bool) {
        let guard = LeaderGuard {
            owner: self,
            key,
            call,
        };
        let value = f();
        {
            let mut state = guard.call.state.lock().unwrap_or_else(|e| e.into_inner());
            *state = CallState::Done(value.clone());
        }
        drop(guard);
        (value, true)
    }

    /// Number of calls currently running.
    pub fn len(&self) -> usize {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub struct ScanCache {
    scanner: Arc<dyn DirScanner>,
    store: Option<Arc<CacheStore>>,
    in_flight: InFlight<Result<ScanResult>>,
}

impl ScanCache {
    /// `store` is `None` when persistence is disabled.
    pub fn new(scanner: Arc<dyn DirScanner>, store: Option<Arc<CacheStore>>) -> Self {
        Self {
            scanner,
            store,
            in_flight: InFlight::new(),
        }
    }

    pub fn store(&self) -> Option<&Arc<CacheStore>> {
        self.store.as_ref()
    }

    pub fn get_or_scan(&self, path: &Path, progress: &ScanProgress) -> Result<ScanResult> {
        if let Some(record) = self.store.as_ref().and_then(|s| s.load(path)) {
            debug!("cache hit for {}", path.display());
            return Ok(record.result);
        }

        let (result, leader) = self
            .in_flight
            .run(path, || self.scanner.scan(path, progress));

        if leader {
            if let (Ok(scan), Some(store)) = (&result, &self.store) {
                let store = Arc::clone(store);
                let path = path.to_path_buf();
                let scan = scan.clone();
                thread::spawn(move || {
                    if let Err(e) = store.save(&path, &scan) {
                        warn!("failed to cache scan of {}: {:#}", path.display(), e);
                    }
                });
            }
        }
        result
    }

    /// Forget the persisted result for `path`.
    pub fn invalidate(&self, path: &Path) {
        if let Some(store) = &self.store {
            if let Err(e) = store.invalidate(path) {
                warn!("failed to invalidate cache for {}: {:#}", path.display(), e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Barrier;
    use std::time::Duration;

    #[test]
    fn test_in_flight_runs_once_for_concurrent_callers() {
        let in_flight = Arc::new(InFlight::<u64>::new());
        let runs = Arc::new(AtomicUsize::new(0));
        let barrier = Arc::new(Barrier::new(4));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let in_flight = Arc::clone(&in_flight);
                let runs = Arc::clone(&runs);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    in_flight.run(Path::new("/same"), || {
                        runs.fetch_add(1, Ordering::SeqCst);
                        thread::sleep(Duration::from_millis(200));
                        42
                    })
                })
            })
            .collect();

        let results: Vec<(u64, bool)> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(results.iter().all(|(v, _)| *v == 42));
        assert_eq!(results.iter().filter(|(_, leader)| *leader).count(), 1);
        assert!(in_flight.is_empty());
    }

    #[test]
    fn test_in_flight_sequential_calls_both_run() {
        let in_flight = InFlight::<u64>::new();
        let (a, first) = in_flight.run(Path::new("/p"), || 1);
        let (b, second) = in_flight.run(Path::new("/p"), || 2);
        assert_eq!((a, b), (1, 2));
        assert!(first && second);
    }

    #[test]
    fn test_in_flight_recovers_from_panicking_leader() {
        let in_flight = InFlight::<u64>::new();
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            in_flight.run(Path::new("/boom"), || panic!("scan blew up"))
        }));
        assert!(outcome.is_err());
        assert!(in_flight.is_empty());
        assert_eq!(in_flight.run(Path::new("/boom"), || 7).0, 7);
    }
}
