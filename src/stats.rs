//! Engine statistics

use std::sync::atomic::{AtomicU64, Ordering};

/// Engine-wide counters, shared across all in-flight runs
pub struct EngineStats {
    /// Runs accepted by the engine
    pub runs_started: AtomicU64,
    /// Runs that reached `Succeeded`
    pub runs_succeeded: AtomicU64,
    /// Runs that reached `Failed`
    pub runs_failed: AtomicU64,
    /// Forward attempts executed
    pub step_attempts: AtomicU64,
    /// Forward attempts that failed
    pub step_failures: AtomicU64,
    /// Compensation attempts executed
    pub compensation_attempts: AtomicU64,
    /// Compensations that exhausted their retries
    pub compensation_failures: AtomicU64,
    /// Terminal notifications that could not be delivered
    pub notifications_failed: AtomicU64,
}

impl EngineStats {
    /// Create zeroed counters
    pub fn new() -> Self {
        Self {
            runs_started: AtomicU64::new(0),
            runs_succeeded: AtomicU64::new(0),
            runs_failed: AtomicU64::new(0),
            step_attempts: AtomicU64::new(0),
            step_failures: AtomicU64::new(0),
            compensation_attempts: AtomicU64::new(0),
            compensation_failures: AtomicU64::new(0),
            notifications_failed: AtomicU64::new(0),
        }
    }

    /// Consistent-enough point-in-time copy of the counters
    pub fn snapshot(&self) -> EngineStatsSnapshot {
        EngineStatsSnapshot {
            runs_started: self.runs_started.load(Ordering::Relaxed),
            runs_succeeded: self.runs_succeeded.load(Ordering::Relaxed),
            runs_failed: self.runs_failed.load(Ordering::Relaxed),
            step_attempts: self.step_attempts.load(Ordering::Relaxed),
            step_failures: self.step_failures.load(Ordering::Relaxed),
            compensation_attempts: self.compensation_attempts.load(Ordering::Relaxed),
            compensation_failures: self.compensation_failures.load(Ordering::Relaxed),
            notifications_failed: self.notifications_failed.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

impl Default for EngineStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of [`EngineStats`]
#[derive(Clone, Debug)]
pub struct EngineStatsSnapshot {
    /// Runs accepted by the engine
    pub runs_started: u64,
    /// Runs that reached `Succeeded`
    pub runs_succeeded: u64,
    /// Runs that reached `Failed`
    pub runs_failed: u64,
    /// Forward attempts executed
    pub step_attempts: u64,
    /// Forward attempts that failed
    pub step_failures: u64,
    /// Compensation attempts executed
    pub compensation_attempts: u64,
    /// Compensations that exhausted their retries
    pub compensation_failures: u64,
    /// Terminal notifications that could not be delivered
    pub notifications_failed: u64,
}
