//! prio-worker - a priority task queue on a dedicated worker thread
//!
//! Producers on any thread hand tasks to a [`WorkerThread`]. A single
//! consumer thread blocks until work arrives, always runs the
//! highest-priority pending task next (ties in arrival order), and stops
//! when shutdown is requested. Any task can be cancelled: a queued task is
//! evicted and never runs, a running task is asked to stop cooperatively.
//!
//! # Quick Start
//!
//! ```no_run
//! use prio_worker::prelude::*;
//!
//! let worker = WorkerThread::spawn(WorkerConfig::default()).unwrap();
//!
//! let task = FnTask::new(|ctx| {
//!     for _ in 0..100 {
//!         if ctx.is_exit_pending() {
//!             return;
//!         }
//!         // ... one slice of work ...
//!     }
//! })
//! .with_priority(Priority::HIGH)
//! .into_ref();
//!
//! let id = task.id();
//! worker.add_task(task);
//! worker.cancel_task(id);
//!
//! worker.shutdown().unwrap();
//! ```
//!
//! # Cancellation contract
//!
//! - [`WorkerThread::cancel_task`] returns `false` only for
//!   [`TaskId::INVALID`]. For every other identity it returns `true`, even
//!   when nothing matched.
//! - Neither `cancel_task` nor [`WorkerThread::cancel_all`] waits for a
//!   running task to finish. A body that never checks its exit flag runs to
//!   completion.
//! - Shutdown and cancellation are independent: shutdown stops the loop
//!   before its next extraction, cancellation signals tasks.

#![warn(missing_debug_implementations)]

pub mod config;
pub mod error;
pub mod prelude;
pub mod task;
pub mod worker;

pub use config::{WorkerConfig, WorkerConfigBuilder};
pub use error::{Error, Result};
pub use task::{ExitFlag, FnTask, Priority, Task, TaskContext, TaskId, TaskRef};
pub use worker::{PanicStrategy, StatsSnapshot, WorkerHandle, WorkerThread};

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::time::Duration;

    #[test]
    fn test_spawn_run_shutdown() {
        let worker = WorkerThread::spawn(WorkerConfig::default()).unwrap();
        let (tx, rx) = mpsc::channel();

        worker.add_task(
            FnTask::new(move |ctx| tx.send(ctx.id()).unwrap())
                .with_id(5u64)
                .into_ref(),
        );

        let ran = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(ran, TaskId::from_raw(5));
        worker.shutdown().unwrap();
    }
}
