pub use crate::config::{WorkerConfig, WorkerConfigBuilder};
pub use crate::error::{Error, Result};
pub use crate::task::{ExitFlag, FnTask, Priority, Task, TaskContext, TaskId, TaskRef};
pub use crate::worker::{PanicStrategy, StatsSnapshot, WorkerHandle, WorkerThread};
