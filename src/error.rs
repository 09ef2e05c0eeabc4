pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by configuration, thread spawn and join.
///
/// Queue operations never fail: an invalid identity is reported through the
/// `bool` returned by [`cancel_task`](crate::WorkerThread::cancel_task) and
/// an empty extraction is the normal termination path.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("worker panic: {0}")]
    WorkerPanic(String),
}

impl Error {
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Error::Config(msg.into())
    }

    pub(crate) fn worker_panic<S: Into<String>>(msg: S) -> Self {
        Error::WorkerPanic(msg.into())
    }
}
