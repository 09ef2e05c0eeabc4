use crate::error::{Error, Result};
use crate::worker::PanicStrategy;

const MIN_STACK_SIZE: usize = 16 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerConfig {
    pub thread_name: String,
    pub stack_size: Option<usize>,
    pub panic_strategy: PanicStrategy,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            thread_name: "prio-worker".to_string(),
            stack_size: Some(2 * 1024 * 1024),
            panic_strategy: PanicStrategy::default(),
        }
    }
}

impl WorkerConfig {
    pub fn builder() -> WorkerConfigBuilder {
        WorkerConfigBuilder::new()
    }

    pub fn validate(&self) -> Result<()> {
        if self.thread_name.is_empty() {
            return Err(Error::config("thread_name must not be empty"));
        }
        // std::thread::Builder panics on interior NUL bytes
        if self.thread_name.contains('\0') {
            return Err(Error::config("thread_name must not contain NUL bytes"));
        }

        if let Some(size) = self.stack_size {
            if size < MIN_STACK_SIZE {
                return Err(Error::config(format!(
                    "stack_size too small (min {} bytes)",
                    MIN_STACK_SIZE
                )));
            }
        }

        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct WorkerConfigBuilder {
    config: WorkerConfig,
}

impl WorkerConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: WorkerConfig::default(),
        }
    }

    pub fn thread_name<S: Into<String>>(mut self, name: S) -> Self {
        self.config.thread_name = name.into();
        self
    }

    pub fn stack_size(mut self, size: usize) -> Self {
        self.config.stack_size = Some(size);
        self
    }

    /// Use the platform's default stack size for the worker thread.
    pub fn default_stack_size(mut self) -> Self {
        self.config.stack_size = None;
        self
    }

    pub fn panic_strategy(mut self, strategy: PanicStrategy) -> Self {
        self.config.panic_strategy = strategy;
        self
    }

    pub fn build(self) -> Result<WorkerConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
