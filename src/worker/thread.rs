use super::panic::{payload_message, PanicHandler, PanicStrategy};
use super::queue::{Dequeued, TaskQueue};
use super::stats::{StatsSnapshot, WorkerStats};
use crate::config::WorkerConfig;
use crate::error::{Error, Result};
use crate::task::{TaskId, TaskRef};
use std::fmt;
use std::ops::Deref;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;
use tracing::{debug, error, trace, warn};

struct Inner {
    queue: TaskQueue,
    stats: WorkerStats,
    panic_handler: PanicHandler,
    /// Held by the one thread inside `run_loop`.
    consumer_active: AtomicBool,
}

/// Priority task queue drained by a single dedicated thread.
///
/// Cloning a `WorkerThread` yields another handle to the same queue, so
/// producers on any thread can add, cancel and inspect work while the
/// owning thread sits in [`run_loop`](Self::run_loop).
#[derive(Clone)]
pub struct WorkerThread {
    inner: Arc<Inner>,
}

impl WorkerThread {
    pub fn new() -> Self {
        Self::with_panic_strategy(PanicStrategy::default())
    }

    pub fn with_panic_strategy(strategy: PanicStrategy) -> Self {
        Self {
            inner: Arc::new(Inner {
                queue: TaskQueue::new(),
                stats: WorkerStats::new(),
                panic_handler: PanicHandler::new(strategy),
                consumer_active: AtomicBool::new(false),
            }),
        }
    }

    /// Spawn a named OS thread running [`run_loop`](Self::run_loop).
    pub fn spawn(config: WorkerConfig) -> Result<WorkerHandle> {
        config.validate()?;

        let worker = Self::with_panic_strategy(config.panic_strategy);
        let runner = worker.clone();

        let mut builder = thread::Builder::new().name(config.thread_name.clone());
        if let Some(stack_size) = config.stack_size {
            builder = builder.stack_size(stack_size);
        }

        let thread = builder
            .spawn(move || runner.run_loop())
            .map_err(Error::Spawn)?;

        debug!(thread = %config.thread_name, "worker thread spawned");

        Ok(WorkerHandle {
            worker,
            thread: Some(thread),
        })
    }

    /// Append a task to the pending set and wake the worker.
    ///
    /// No ordering work happens here; the highest priority is picked when
    /// the worker next extracts.
    pub fn add_task(&self, task: TaskRef) {
        trace!(
            task = %task.id(),
            name = task.name(),
            priority = task.priority().value(),
            "task queued"
        );
        self.inner.queue.push(task);
        self.inner.stats.record_added();
    }

    /// Cancel every task carrying `id`.
    ///
    /// A pending match is signalled and removed, so it never runs. A match
    /// that is currently running is only signalled; this call does not wait
    /// for it to return.
    ///
    /// Returns `false` only for [`TaskId::INVALID`], without touching the
    /// queue. Any other identity returns `true` **whether or not a task
    /// matched**: the return value certifies that the identity was
    /// acceptable, not that something was cancelled.
    pub fn cancel_task(&self, id: TaskId) -> bool {
        if !id.is_valid() {
            return false;
        }

        let cancelled = self.inner.queue.cancel(id);
        self.inner.stats.record_cancelled(cancelled.pending_removed);

        debug!(
            task = %id,
            running = cancelled.current_signalled,
            removed = cancelled.pending_removed,
            "cancel requested"
        );
        true
    }

    /// Signal the running task and every pending task, and empty the
    /// pending set.
    ///
    /// Nothing pending at call time will run on this worker afterwards. The
    /// running task, if any, may still be executing when this returns.
    pub fn cancel_all(&self) {
        let cancelled = self.inner.queue.cancel_all();
        self.inner.stats.record_cancelled(cancelled.pending_removed);

        debug!(
            running = cancelled.current_signalled,
            removed = cancelled.pending_removed,
            "all tasks cancelled"
        );
    }

    /// Pending tasks plus the running one. Advisory: it may be stale as soon
    /// as it is returned.
    pub fn queue_size(&self) -> usize {
        self.inner.queue.len()
    }

    /// Ask the loop to stop before its next extraction and wake it if it is
    /// blocked. Does not cancel anything; combine with
    /// [`cancel_all`](Self::cancel_all) to stop immediately.
    pub fn request_shutdown(&self) {
        debug!("worker shutdown requested");
        self.inner.queue.request_exit();
    }

    pub fn is_shutdown_requested(&self) -> bool {
        self.inner.queue.is_exit_requested()
    }

    /// Block until a task is pending or shutdown is requested, then remove
    /// and return the highest-priority task. Ties go to the earliest added.
    ///
    /// Returns `None` once shutdown is requested and nothing is pending.
    /// Also returns `None` without blocking while a [`run_loop`](Self::run_loop)
    /// is draining this queue: there is only ever one consumer.
    pub fn extract_task(&self) -> Option<TaskRef> {
        if self.inner.consumer_active.load(Ordering::Acquire) {
            warn!("extract_task called while the worker loop is running");
            return None;
        }
        self.inner.queue.extract()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.inner.stats.snapshot()
    }

    /// Worker main loop. Returns once shutdown has been requested.
    ///
    /// Only one loop may drain a queue. A second call made while another
    /// thread is inside `run_loop` returns immediately.
    pub fn run_loop(&self) {
        if self.inner.consumer_active.swap(true, Ordering::AcqRel) {
            warn!("worker loop already running on another thread");
            return;
        }
        let _consumer = ConsumerGuard { inner: &self.inner };

        debug!(
            strategy = ?self.inner.panic_handler.strategy(),
            "worker loop started"
        );

        while !self.inner.queue.is_exit_requested() {
            match self.inner.queue.dequeue_for_run() {
                Dequeued::Ready(task) => self.execute_task(task),
                Dequeued::Skipped(task) => {
                    trace!(task = %task.id(), "skipping task with exit pending");
                    self.inner.stats.record_skipped();
                }
                Dequeued::Empty => {}
            }
        }

        debug!("worker loop exited");
    }

    fn execute_task(&self, task: TaskRef) {
        let slot = CurrentSlot { inner: &self.inner };
        let tid = task.id();
        trace!(task = %tid, name = task.name(), "running task");

        let start = Instant::now();
        let result = self.inner.panic_handler.execute(|| task.run());
        self.inner.stats.record_execution(start.elapsed());

        drop(slot);

        if let Err(info) = result {
            self.inner.stats.record_panic();
            error!(task = %tid, name = task.name(), "task panicked: {}", info.message);
        }
    }
}

impl Default for WorkerThread {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for WorkerThread {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerThread")
            .field("queue_size", &self.queue_size())
            .field("shutdown_requested", &self.is_shutdown_requested())
            .finish()
    }
}

/// Clears the current slot when the task body returns or unwinds.
struct CurrentSlot<'a> {
    inner: &'a Inner,
}

impl Drop for CurrentSlot<'_> {
    fn drop(&mut self) {
        self.inner.queue.finish_current();
        if thread::panicking() {
            self.inner.stats.record_panic();
            // nothing will drain the queue any more
            self.inner.queue.request_exit();
            error!("task panicked, worker thread unwinding");
        }
    }
}

/// Releases the single-consumer claim when `run_loop` returns or unwinds.
struct ConsumerGuard<'a> {
    inner: &'a Inner,
}

impl Drop for ConsumerGuard<'_> {
    fn drop(&mut self) {
        self.inner.consumer_active.store(false, Ordering::Release);
    }
}

/// Owns a spawned worker thread. Dropping it requests shutdown and joins.
pub struct WorkerHandle {
    worker: WorkerThread,
    thread: Option<JoinHandle<()>>,
}

impl WorkerHandle {
    /// Another producer handle to the same queue.
    pub fn worker(&self) -> WorkerThread {
        self.worker.clone()
    }

    /// Whether the worker thread has already exited.
    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().map_or(true, |t| t.is_finished())
    }

    /// Request shutdown and join. Tasks still pending are not run.
    ///
    /// Fails with [`Error::WorkerPanic`] if a task panic escaped the loop.
    pub fn shutdown(mut self) -> Result<()> {
        self.stop()
    }

    /// Cancel everything, then request shutdown and join.
    pub fn shutdown_now(mut self) -> Result<()> {
        self.worker.cancel_all();
        self.stop()
    }

    fn stop(&mut self) -> Result<()> {
        self.worker.request_shutdown();

        match self.thread.take() {
            Some(thread) => thread
                .join()
                .map_err(|payload| Error::worker_panic(payload_message(payload))),
            None => Ok(()),
        }
    }
}

impl Deref for WorkerHandle {
    type Target = WorkerThread;

    fn deref(&self) -> &WorkerThread {
        &self.worker
    }
}

impl fmt::Debug for WorkerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerHandle")
            .field("worker", &self.worker)
            .field("finished", &self.is_finished())
            .finish()
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{FnTask, Task};
    use parking_lot::Mutex;
    use std::sync::mpsc;
    use std::time::Duration;

    fn noop(id: u64, priority: i32) -> TaskRef {
        FnTask::new(|_| {})
            .with_id(id)
            .with_priority(priority)
            .into_ref()
    }

    #[test]
    fn test_extract_in_priority_order() {
        let worker = WorkerThread::new();
        worker.add_task(noop(1, 3));
        worker.add_task(noop(2, 1));
        worker.add_task(noop(3, 2));

        let order: Vec<u64> = (0..3)
            .map(|_| worker.extract_task().unwrap().id().as_u64())
            .collect();
        assert_eq!(order, vec![1, 3, 2]);
    }

    #[test]
    fn test_equal_priority_is_fifo() {
        let worker = WorkerThread::new();
        worker.add_task(noop(10, 5));
        worker.add_task(noop(11, 5));

        assert_eq!(worker.extract_task().unwrap().id(), TaskId::from_raw(10));
        assert_eq!(worker.extract_task().unwrap().id(), TaskId::from_raw(11));
    }

    #[test]
    fn test_cancel_invalid_id() {
        let worker = WorkerThread::new();
        let task = noop(1, 0);
        worker.add_task(task.clone());

        assert!(!worker.cancel_task(TaskId::INVALID));
        assert_eq!(worker.queue_size(), 1);
        assert!(!task.is_exit_pending());
        assert_eq!(worker.stats().tasks_cancelled, 0);
    }

    #[test]
    fn test_cancel_unknown_id_returns_true() {
        let worker = WorkerThread::new();
        worker.add_task(noop(1, 0));

        assert!(worker.cancel_task(TaskId::from_raw(999)));
        assert_eq!(worker.queue_size(), 1);
    }

    #[test]
    fn test_run_loop_on_caller_thread() {
        let worker = WorkerThread::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        for (id, priority) in [(1u64, 0), (2, 9), (3, 4)] {
            let log = log.clone();
            worker.add_task(
                FnTask::new(move |ctx| log.lock().push(ctx.id().as_u64()))
                    .with_id(id)
                    .with_priority(priority)
                    .into_ref(),
            );
        }

        // last task stops the loop from inside
        let stopper = worker.clone();
        worker.add_task(
            FnTask::new(move |_| stopper.request_shutdown())
                .with_priority(i32::MIN)
                .into_ref(),
        );

        worker.run_loop();

        assert_eq!(*log.lock(), vec![2, 3, 1]);
        assert_eq!(worker.queue_size(), 0);
        assert_eq!(worker.stats().tasks_executed, 4);
    }

    #[test]
    fn test_current_counts_toward_queue_size() {
        let handle = WorkerThread::spawn(WorkerConfig::default()).unwrap();
        let (started_tx, started_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();

        handle.add_task(
            FnTask::new(move |_| {
                started_tx.send(()).unwrap();
                let _ = release_rx.recv();
            })
            .into_ref(),
        );
        started_rx.recv_timeout(Duration::from_secs(5)).unwrap();

        handle.add_task(noop(77, 0));
        assert_eq!(handle.queue_size(), 2);

        release_tx.send(()).unwrap();
        handle.shutdown().unwrap();
    }

    #[test]
    fn test_isolated_panic_keeps_worker_alive() {
        let config = WorkerConfig::builder()
            .panic_strategy(PanicStrategy::Isolate)
            .build()
            .unwrap();
        let handle = WorkerThread::spawn(config).unwrap();
        let (tx, rx) = mpsc::channel();

        handle.add_task(FnTask::new(|_| panic!("boom")).with_priority(1).into_ref());
        handle.add_task(FnTask::new(move |_| tx.send(()).unwrap()).into_ref());

        rx.recv_timeout(Duration::from_secs(5)).unwrap();
        let stats = handle.stats();
        assert_eq!(stats.tasks_panicked, 1);
        assert!(handle.shutdown().is_ok());
    }

    #[test]
    fn test_propagated_panic_surfaces_on_join() {
        let handle = WorkerThread::spawn(WorkerConfig::default()).unwrap();
        handle.add_task(FnTask::new(|_| panic!("fatal task")).into_ref());

        let start = Instant::now();
        while !handle.is_finished() && start.elapsed() < Duration::from_secs(5) {
            thread::sleep(Duration::from_millis(5));
        }

        assert_eq!(handle.queue_size(), 0);
        assert!(handle.is_shutdown_requested());
        match handle.shutdown() {
            Err(Error::WorkerPanic(msg)) => assert_eq!(msg, "fatal task"),
            other => panic!("expected worker panic, got {:?}", other),
        }
    }

    #[test]
    fn test_second_consumer_is_rejected() {
        let handle = WorkerThread::spawn(WorkerConfig::default()).unwrap();
        let (started_tx, started_rx) = mpsc::channel();

        let running = FnTask::new(move |ctx| {
            started_tx.send(()).unwrap();
            while !ctx.is_exit_pending() {
                thread::sleep(Duration::from_millis(1));
            }
        })
        .into_ref();
        let running_id = running.id();
        handle.add_task(running.clone());
        started_rx.recv_timeout(Duration::from_secs(5)).unwrap();

        let intruder = handle.worker();
        let second = thread::spawn(move || {
            intruder.run_loop();
            intruder.extract_task().is_none()
        });
        assert!(second.join().unwrap());

        let queued = noop(900, 0);
        handle.add_task(queued.clone());
        assert_eq!(handle.queue_size(), 2);

        assert!(handle.cancel_task(running_id));
        assert!(running.is_exit_pending());
        assert!(!queued.is_exit_pending());

        handle.shutdown().unwrap();
    }

    #[test]
    fn test_loop_can_restart_after_return() {
        let worker = WorkerThread::new();
        let stopper = worker.clone();
        worker.add_task(FnTask::new(move |_| stopper.request_shutdown()).into_ref());
        worker.run_loop();

        // the claim is released, so the caller may extract directly again
        worker.add_task(noop(31, 0));
        assert_eq!(worker.extract_task().unwrap().id(), TaskId::from_raw(31));
    }
}
