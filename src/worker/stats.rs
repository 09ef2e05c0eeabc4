//! Counters describing what the worker has done so far.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

#[derive(Debug)]
pub(crate) struct WorkerStats {
    tasks_added: AtomicU64,
    tasks_executed: AtomicU64,
    tasks_skipped: AtomicU64,
    tasks_cancelled: AtomicU64,
    tasks_panicked: AtomicU64,
    busy_time_ns: AtomicU64,
    start_time: Instant,
}

impl WorkerStats {
    pub fn new() -> Self {
        Self {
            tasks_added: AtomicU64::new(0),
            tasks_executed: AtomicU64::new(0),
            tasks_skipped: AtomicU64::new(0),
            tasks_cancelled: AtomicU64::new(0),
            tasks_panicked: AtomicU64::new(0),
            busy_time_ns: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn record_added(&self) {
        self.tasks_added.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_execution(&self, duration: Duration) {
        self.tasks_executed.fetch_add(1, Ordering::Relaxed);
        self.busy_time_ns
            .fetch_add(duration.as_nanos() as u64, Ordering::Relaxed);
    }

    pub fn record_skipped(&self) {
        self.tasks_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cancelled(&self, count: usize) {
        self.tasks_cancelled.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn record_panic(&self) {
        self.tasks_panicked.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            uptime: self.start_time.elapsed(),
            tasks_added: self.tasks_added.load(Ordering::Relaxed),
            tasks_executed: self.tasks_executed.load(Ordering::Relaxed),
            tasks_skipped: self.tasks_skipped.load(Ordering::Relaxed),
            tasks_cancelled: self.tasks_cancelled.load(Ordering::Relaxed),
            tasks_panicked: self.tasks_panicked.load(Ordering::Relaxed),
            busy_time: Duration::from_nanos(self.busy_time_ns.load(Ordering::Relaxed)),
        }
    }
}

impl Default for WorkerStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of the worker counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub uptime: Duration,
    pub tasks_added: u64,
    /// Bodies that ran to completion (or panicked under `Isolate`).
    pub tasks_executed: u64,
    /// Dequeued with exit already pending, never run.
    pub tasks_skipped: u64,
    /// Evicted from the pending set by a cancel call.
    pub tasks_cancelled: u64,
    pub tasks_panicked: u64,
    pub busy_time: Duration,
}

impl StatsSnapshot {
    /// Fraction of uptime spent inside task bodies.
    pub fn utilization(&self) -> f64 {
        let total = self.uptime.as_nanos();
        if total == 0 {
            return 0.0;
        }
        self.busy_time.as_nanos() as f64 / total as f64
    }
}
