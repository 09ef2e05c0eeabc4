use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};

/// What the worker does when a task body panics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PanicStrategy {
    /// Let the panic unwind out of the worker loop. The worker thread
    /// terminates and the panic is reported when the thread is joined.
    #[default]
    Propagate,
    /// Catch the panic, log it and move on to the next task.
    Isolate,
}

/// Message captured from a task body that panicked.
#[derive(Debug, Clone)]
pub(crate) struct TaskPanic {
    pub message: String,
}

impl TaskPanic {
    fn from_payload(payload: &(dyn Any + Send)) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic".to_string()
        };

        Self { message }
    }
}

#[derive(Debug, Default)]
pub(crate) struct PanicHandler {
    strategy: PanicStrategy,
}

impl PanicHandler {
    pub fn new(strategy: PanicStrategy) -> Self {
        Self { strategy }
    }

    pub fn strategy(&self) -> PanicStrategy {
        self.strategy
    }

    /// Run `f` under the configured strategy. Returns `Err` only for an
    /// isolated panic; a propagated one never returns.
    pub fn execute<F>(&self, f: F) -> Result<(), TaskPanic>
    where
        F: FnOnce(),
    {
        match self.strategy {
            PanicStrategy::Propagate => {
                f();
                Ok(())
            }
            PanicStrategy::Isolate => match catch_unwind(AssertUnwindSafe(f)) {
                Ok(()) => Ok(()),
                Err(payload) => Err(TaskPanic::from_payload(payload.as_ref())),
            },
        }
    }
}

/// Message of a panic payload captured from a joined thread.
pub(crate) fn payload_message(payload: Box<dyn Any + Send>) -> String {
    TaskPanic::from_payload(payload.as_ref()).message
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_isolate_catches() {
        let handler = PanicHandler::new(PanicStrategy::Isolate);

        let result = handler.execute(|| panic!("test panic"));

        let info = result.unwrap_err();
        assert_eq!(info.message, "test panic");
    }

    #[test]
    fn test_isolate_success() {
        let handler = PanicHandler::new(PanicStrategy::Isolate);
        assert!(handler.execute(|| {}).is_ok());
    }

    #[test]
    fn test_propagate_unwinds() {
        let handler = PanicHandler::new(PanicStrategy::Propagate);

        let outer = catch_unwind(AssertUnwindSafe(|| {
            let _ = handler.execute(|| panic!("{}", String::from("formatted")));
        }));

        let payload = outer.unwrap_err();
        assert_eq!(payload_message(payload), "formatted");
    }
}
