//! Pending set, current slot and shutdown flag behind one lock.
//!
//! Every read or write of the shared state happens while holding `state`.
//! A single condvar serves both wake reasons ("work arrived" and "shutdown
//! requested"); waiters re-check the compound predicate after every wake.

use crate::task::{Priority, TaskId, TaskRef};
use parking_lot::{Condvar, Mutex, MutexGuard};

#[derive(Default)]
struct QueueState {
    /// Insertion order. Selection happens at extraction time.
    pending: Vec<TaskRef>,
    /// Set only while the worker is inside `run()`.
    current: Option<TaskRef>,
    /// Set once, never reset.
    exit_requested: bool,
}

impl QueueState {
    fn len(&self) -> usize {
        self.pending.len() + usize::from(self.current.is_some())
    }

    /// Index of the first task holding the strictly greatest priority.
    fn best_index(&self) -> Option<usize> {
        let mut best: Option<(usize, Priority)> = None;
        for (idx, task) in self.pending.iter().enumerate() {
            let priority = task.priority();
            match best {
                Some((_, best_priority)) if priority <= best_priority => {}
                _ => best = Some((idx, priority)),
            }
        }
        best.map(|(idx, _)| idx)
    }
}

/// Outcome of one dequeue by the worker loop.
pub(crate) enum Dequeued {
    /// Installed in the current slot; the caller must run it and then call
    /// [`TaskQueue::finish_current`].
    Ready(TaskRef),
    /// Exit was already pending when dequeued. Not installed, never run.
    Skipped(TaskRef),
    /// Shutdown was requested with nothing pending.
    Empty,
}

/// Result of a cancellation sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) struct Cancelled {
    pub current_signalled: bool,
    pub pending_removed: usize,
}

#[derive(Default)]
pub(crate) struct TaskQueue {
    state: Mutex<QueueState>,
    cond: Condvar,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, task: TaskRef) {
        let mut state = self.state.lock();
        state.pending.push(task);
        self.cond.notify_all();
    }

    /// Block until a task is pending or shutdown is requested, then remove
    /// and return the highest-priority pending task.
    pub fn extract(&self) -> Option<TaskRef> {
        let mut state = self.state.lock();
        self.wait_and_take(&mut state)
    }

    /// Like [`extract`](Self::extract), but installs a runnable task in the
    /// current slot within the same critical section, so a concurrent cancel
    /// always sees the task either in `pending` or in `current`.
    pub fn dequeue_for_run(&self) -> Dequeued {
        let mut state = self.state.lock();
        match self.wait_and_take(&mut state) {
            None => Dequeued::Empty,
            Some(task) if task.is_exit_pending() => Dequeued::Skipped(task),
            Some(task) => {
                state.current = Some(task.clone());
                Dequeued::Ready(task)
            }
        }
    }

    pub fn finish_current(&self) -> Option<TaskRef> {
        self.state.lock().current.take()
    }

    fn wait_and_take(&self, state: &mut MutexGuard<'_, QueueState>) -> Option<TaskRef> {
        while state.pending.is_empty() && !state.exit_requested {
            self.cond.wait(state);
        }

        let idx = state.best_index()?;
        Some(state.pending.remove(idx))
    }

    /// Signal every task carrying `id`. Pending matches are also evicted;
    /// the current task is only signalled.
    pub fn cancel(&self, id: TaskId) -> Cancelled {
        let mut state = self.state.lock();
        let mut result = Cancelled::default();

        if let Some(current) = state.current.as_ref() {
            if current.id() == id {
                current.signal_exit();
                result.current_signalled = true;
            }
        }

        let mut removed = Vec::new();
        state.pending.retain(|task| {
            if task.id() == id {
                task.signal_exit();
                removed.push(task.clone());
                false
            } else {
                true
            }
        });
        result.pending_removed = removed.len();

        self.cond.notify_all();

        // evicted tasks may be the last reference; drop them unlocked
        drop(state);
        drop(removed);
        result
    }

    pub fn cancel_all(&self) -> Cancelled {
        let mut state = self.state.lock();
        let mut result = Cancelled::default();

        if let Some(current) = state.current.as_ref() {
            current.signal_exit();
            result.current_signalled = true;
        }

        let removed = std::mem::take(&mut state.pending);
        for task in &removed {
            task.signal_exit();
        }
        result.pending_removed = removed.len();

        self.cond.notify_all();

        drop(state);
        drop(removed);
        result
    }

    pub fn len(&self) -> usize {
        self.state.lock().len()
    }

    pub fn request_exit(&self) {
        let mut state = self.state.lock();
        state.exit_requested = true;
        self.cond.notify_all();
    }

    pub fn is_exit_requested(&self) -> bool {
        self.state.lock().exit_requested
    }
}
