//! Catalog version counter and the propagation watch.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::error::{AppError, AppResult};

/// Version carried by objects that have not reached a versioned state, and by
/// skeleton table entries in a delta snapshot.
pub const INITIAL_CATALOG_VERSION: u64 = 0;

/// Process-wide monotonic catalog version source.
#[derive(Debug)]
pub struct VersionCounter {
    current: AtomicU64,
}

impl Default for VersionCounter {
    fn default() -> Self { Self::new() }
}

impl VersionCounter {
    pub fn new() -> Self { Self { current: AtomicU64::new(INITIAL_CATALOG_VERSION) } }

    #[cfg(test)]
    pub(crate) fn starting_at(v: u64) -> Self { Self { current: AtomicU64::new(v) } }

    /// Issue a fresh version. Values are unique and strictly increasing across threads.
    pub fn next(&self) -> AppResult<u64> {
        let prev = self.current
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |v| v.checked_add(1))
            .map_err(|v| AppError::fatal("version_overflow".to_string(), format!("catalog version counter exhausted at {}", v)))?;
        Ok(prev + 1)
    }

    /// Last issued version.
    pub fn current(&self) -> u64 { self.current.load(Ordering::Acquire) }
}

/// Highest `max_version` of any snapshot produced so far; DDL callers block on it.
#[derive(Debug, Default)]
pub struct VersionWatch {
    seen: Mutex<u64>,
    cond: Condvar,
}

impl VersionWatch {
    pub fn new() -> Self { Self::default() }

    pub fn observe(&self, version: u64) {
        let mut g = self.seen.lock();
        if version > *g {
            *g = version;
            self.cond.notify_all();
        }
    }

    pub fn last_seen(&self) -> u64 { *self.seen.lock() }

    /// Block until a snapshot with `max_version >= version` was produced.
    /// Returns false when `timeout` elapsed first.
    pub fn wait_at_least(&self, version: u64, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut g = self.seen.lock();
        while *g < version {
            if self.cond.wait_until(&mut g, deadline).timed_out() {
                return *g >= version;
            }
        }
        true
    }
}
