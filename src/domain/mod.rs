//! Domain types for autotask
//!
//! - TaskState: the resumable run snapshot handed to persistence
//! - TaskReport: the read-only summary returned once a run ends
//! - EnginePhase: lifecycle of a single engine instance

pub mod phase;
pub mod report;
pub mod state;

pub use phase::EnginePhase;
pub use report::TaskReport;
pub use state::{CapturedError, TaskState};
