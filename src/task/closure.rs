use super::{ExitFlag, Priority, Task, TaskId, TaskRef};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

type Body = Box<dyn FnOnce(&TaskContext<'_>) + Send + 'static>;

/// View of the running task handed to an [`FnTask`] body.
pub struct TaskContext<'a> {
    id: TaskId,
    priority: Priority,
    exit: &'a ExitFlag,
}

impl TaskContext<'_> {
    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    /// Long-running bodies should poll this and return early once it flips.
    pub fn is_exit_pending(&self) -> bool {
        self.exit.is_raised()
    }
}

impl fmt::Debug for TaskContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskContext")
            .field("id", &self.id)
            .field("priority", &self.priority)
            .field("exit_pending", &self.is_exit_pending())
            .finish()
    }
}

/// A [`Task`] backed by a closure.
///
/// The closure is taken on the first `run()`, so a second call is a no-op.
pub struct FnTask {
    id: TaskId,
    priority: Priority,
    name: Option<String>,
    exit: ExitFlag,
    body: Mutex<Option<Body>>,
}

impl FnTask {
    /// Create a new task with normal priority
    pub fn new<F>(f: F) -> Self
    where
        F: FnOnce(&TaskContext<'_>) + Send + 'static,
    {
        FnTask {
            id: TaskId::next(),
            priority: Priority::NORMAL,
            name: None,
            exit: ExitFlag::new(),
            body: Mutex::new(Some(Box::new(f))),
        }
    }

    pub fn with_priority(mut self, priority: impl Into<Priority>) -> Self {
        self.priority = priority.into();
        self
    }

    /// Override the generated identity.
    pub fn with_id(mut self, id: impl Into<TaskId>) -> Self {
        let id = id.into();
        debug_assert!(id.is_valid(), "task identity 0 is reserved");
        self.id = id;
        self
    }

    pub fn named<S: Into<String>>(mut self, name: S) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn into_ref(self) -> TaskRef {
        Arc::new(self)
    }

    /// Whether the body has already been consumed by `run()`.
    pub fn has_run(&self) -> bool {
        self.body.lock().is_none()
    }
}

impl Task for FnTask {
    fn id(&self) -> TaskId {
        self.id
    }

    fn priority(&self) -> Priority {
        self.priority
    }

    fn is_exit_pending(&self) -> bool {
        self.exit.is_raised()
    }

    fn signal_exit(&self) {
        self.exit.raise();
    }

    fn run(&self) {
        // release the lock before calling into user code
        let body = self.body.lock().take();
        if let Some(body) = body {
            let ctx = TaskContext {
                id: self.id,
                priority: self.priority,
                exit: &self.exit,
            };
            body(&ctx);
        }
    }

    fn name(&self) -> &str {
        self.name.as_deref().unwrap_or("task")
    }
}

impl fmt::Debug for FnTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnTask")
            .field("id", &self.id)
            .field("priority", &self.priority)
            .field("name", &self.name)
            .field("exit_pending", &self.exit.is_raised())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_runs_at_most_once() {
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        let task = FnTask::new(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });

        assert!(!task.has_run());
        task.run();
        task.run();
        assert!(task.has_run());
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_context_sees_exit_signal() {
        let seen = Arc::new(AtomicUsize::new(0));
        let s = seen.clone();
        let task = FnTask::new(move |ctx| {
            if ctx.is_exit_pending() {
                s.store(1, Ordering::SeqCst);
            }
        })
        .with_priority(7)
        .with_id(42u64);

        task.signal_exit();
        task.signal_exit();
        assert!(task.is_exit_pending());
        task.run();

        assert_eq!(seen.load(Ordering::SeqCst), 1);
        assert_eq!(task.id(), TaskId::from_raw(42));
        assert_eq!(task.priority(), Priority(7));
    }

    #[test]
    fn test_name() {
        let task = FnTask::new(|_| {});
        assert_eq!(task.name(), "task");

        let task = FnTask::new(|_| {}).named("thumbnail");
        assert_eq!(task.name(), "thumbnail");
    }
}
