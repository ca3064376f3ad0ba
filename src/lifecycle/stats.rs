//! In-process lifecycle counters.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Counters shared by an initializer and the tasks it spawns.
#[derive(Debug, Default)]
pub struct LifecycleStats {
    attempts: AtomicU64,
    retries: AtomicU64,
    timeouts: AtomicU64,
    late_results: AtomicU64,
}

/// Point-in-time copy of [`LifecycleStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    /// Init attempts started.
    pub attempts: u64,
    /// Attempts that were retries of an earlier failure.
    pub retries: u64,
    /// Attempts abandoned at their deadline.
    pub timeouts: u64,
    /// Abandoned attempts that later finished (either way).
    pub late_results: u64,
}

impl LifecycleStats {
    pub fn record_attempt(&self) {
        self.attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_retry(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_timeout(&self) {
        self.timeouts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_late_result(&self) {
        self.late_results.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            attempts: self.attempts.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            late_results: self.late_results.load(Ordering::Relaxed),
        }
    }
}
