//! Autotask - retryable, resumable task execution
//!
//! An `AutomatedTask` runs an async unit of work a bounded number of times,
//! records every result and error, and can be paused, resumed, or stopped while
//! it runs. With a persistence plugin attached, a run interrupted by a crash
//! picks up where it left off in the next process.

pub mod domain;
pub mod error;
pub mod gate;
pub mod storage;
pub mod task;

pub use domain::{CapturedError, EnginePhase, TaskReport, TaskState};
pub use error::{AutotaskError, Result};
pub use storage::{FilePersistence, MemoryPersistence, PersistencePlugin, StoredState};
pub use task::{AutomatedTask, TaskConfig, TaskHandle};
