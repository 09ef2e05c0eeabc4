//! Task representation consumed by the worker.
//!
//! The worker never looks inside a task body. It only needs an identity, a
//! priority, a one-way exit flag and a way to run the body once.

mod closure;

pub use closure::{FnTask, TaskContext};

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Global task ID counter. Starts at 1 because 0 is reserved.
static TASK_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId(u64);

impl TaskId {
    /// Reserved identity meaning "no such task". Never assigned.
    pub const INVALID: TaskId = TaskId(0);

    /// Allocate a fresh, process-unique identity.
    pub fn next() -> Self {
        TaskId(TASK_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Wrap a raw identity. Callers supplying their own identities are
    /// responsible for uniqueness.
    pub const fn from_raw(raw: u64) -> Self {
        TaskId(raw)
    }

    pub const fn as_u64(self) -> u64 {
        self.0
    }

    pub const fn is_valid(self) -> bool {
        self.0 != 0
    }
}

impl From<u64> for TaskId {
    fn from(raw: u64) -> Self {
        TaskId(raw)
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Scheduling priority. Higher values are more urgent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Priority(pub i32);

impl Priority {
    pub const BACKGROUND: Priority = Priority(-100);
    pub const LOW: Priority = Priority(-10);
    pub const NORMAL: Priority = Priority(0);
    pub const HIGH: Priority = Priority(10);
    pub const REALTIME: Priority = Priority(100);

    pub const fn value(self) -> i32 {
        self.0
    }
}

impl From<i32> for Priority {
    fn from(value: i32) -> Self {
        Priority(value)
    }
}

/// Capability set the worker requires from a unit of work.
///
/// Tasks are shared between the producer that created them and the worker,
/// so every method takes `&self`; implementations use interior mutability
/// for their exit flag and body.
pub trait Task: Send + Sync {
    /// Identity of this task. Must not be [`TaskId::INVALID`] and must not
    /// change after creation.
    fn id(&self) -> TaskId;

    /// Must not change while the task is queued.
    fn priority(&self) -> Priority;

    fn is_exit_pending(&self) -> bool;

    /// Request cooperative termination.
    ///
    /// Idempotent and non-blocking. Once signalled, `is_exit_pending` must
    /// keep returning `true`. A body that is already running keeps running
    /// until it observes the flag itself.
    fn signal_exit(&self);

    /// Execute the task body. The worker calls this at most once, and only
    /// if `is_exit_pending` was `false` when the task was dequeued.
    fn run(&self);

    /// Label used in log output.
    fn name(&self) -> &str {
        "task"
    }
}

/// Shared task handle. The task is dropped when the last holder (producer,
/// pending set or current slot) releases it.
pub type TaskRef = Arc<dyn Task>;

/// One-way exit flag for [`Task`] implementations.
#[derive(Debug, Default)]
pub struct ExitFlag(AtomicBool);

impl ExitFlag {
    pub const fn new() -> Self {
        ExitFlag(AtomicBool::new(false))
    }

    /// Raise the flag. Returns `true` if this call was the one that raised it.
    pub fn raise(&self) -> bool {
        !self.0.swap(true, Ordering::AcqRel)
    }

    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}
