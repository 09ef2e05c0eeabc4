//! The dedicated worker: a locked pending set drained in priority order by
//! one thread, with cooperative cancellation of queued and running tasks.

mod panic;
mod queue;
mod stats;
mod thread;

pub use panic::PanicStrategy;
pub use stats::StatsSnapshot;
pub use thread::{WorkerHandle, WorkerThread};
