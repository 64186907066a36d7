//! In-flight tracking for paths with an active conversion task.
//!
//! The tracker guarantees at most one conversion per path at any instant.
//! Rapid-fire filesystem events for the same path all race through
//! `try_acquire`; only the first wins, which is the debounce mechanism.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Concurrent set of paths currently scheduled or being processed.
///
/// Backed by a single mutex with minimal critical sections. Membership
/// test and insert happen under one lock acquisition so two events for the
/// same path cannot both pass the check.
#[derive(Debug, Default)]
pub struct InFlightTracker {
    paths: Mutex<HashSet<PathBuf>>,
}

impl InFlightTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically claim a path. Returns false if it is already in flight.
    pub fn try_acquire(&self, path: &Path) -> bool {
        let mut paths = self.paths.lock().expect("in-flight lock poisoned");
        paths.insert(path.to_path_buf())
    }

    /// Remove a path from the tracker.
    ///
    /// Idempotent: releasing a path that was never acquired is a no-op.
    pub fn release(&self, path: &Path) {
        let mut paths = self.paths.lock().expect("in-flight lock poisoned");
        paths.remove(path);
    }

    /// Number of paths currently in flight.
    pub fn len(&self) -> usize {
        self.paths.lock().expect("in-flight lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Claim a path, returning a guard that releases it on drop.
    ///
    /// The guard ties the release to scope exit, so the tracker entry is
    /// removed on every return path of a conversion task, including panics.
    pub fn acquire(self: &Arc<Self>, path: &Path) -> Option<InFlightGuard> {
        if self.try_acquire(path) {
            Some(InFlightGuard {
                tracker: Arc::clone(self),
                path: path.to_path_buf(),
            })
        } else {
            None
        }
    }
}

/// RAII handle for an in-flight path; releases the entry when dropped.
#[derive(Debug)]
pub struct InFlightGuard {
    tracker: Arc<InFlightTracker>,
    path: PathBuf,
}

impl InFlightGuard {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.tracker.release(&self.path);
    }
}
