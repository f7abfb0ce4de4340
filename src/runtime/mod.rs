//! Task runtime linked into rewritten programs
//!
//! Rewritten functions never call each other directly. A call site fills a
//! record from the callee's [`CallRecordPool`], hands `(function, record)` to
//! the [`Scheduler`], and then waits for the record's `done` flag while
//! draining its own worker queue.
//!
//! - [`scheduler`]: worker threads, queues, quiescence and teardown
//! - [`balancer`]: picks the worker a task is queued on
//! - [`pool`]: call records and the call-and-wait idiom
//! - [`globals`]: critical sections around global state
//! - [`ffi`]: the C ABI the generated C++ glue calls

pub mod balancer;
pub mod ffi;
pub mod globals;
pub mod pool;
pub mod scheduler;

pub use balancer::LoadBalancer;
pub use globals::{GlobalsGuard, GlobalsLock};
pub use pool::{call_and_wait, call_detached, CallRecord, CallRecordPool};
pub use scheduler::{Scheduler, SchedulerCore, SchedulerStats, Task, TaskTable, WorkerSlot};

use crate::config::ConfigError;
use thiserror::Error;

/// Runtime errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RuntimeError {
    #[error("invalid scheduler configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to spawn worker thread {worker}: {message}")]
    SpawnFailed { worker: usize, message: String },

    #[error("scheduler is shut down; task for function {function} rejected")]
    ShutDown { function: usize },

    #[error("teardown called from worker thread {worker}")]
    TeardownFromWorker { worker: usize },

    #[error("record {index} is not in use")]
    NotInUse { index: usize },

    #[error("record {index} does not exist")]
    UnknownRecord { index: usize },

    #[error("record {index} has no return value")]
    MissingReturn { index: usize },

    #[error("record {index} has no arguments")]
    MissingArguments { index: usize },
}

impl From<ConfigError> for RuntimeError {
    fn from(err: ConfigError) -> Self {
        RuntimeError::InvalidConfig(err.to_string())
    }
}
