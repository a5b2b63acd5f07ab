//! Error types for autotask
//!
//! Centralized error handling using thiserror. Attempt failures raised by task
//! units never show up here; they are recorded in the run state instead.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// All error types that can escape `AutomatedTask::start`
#[derive(Debug, Error)]
pub enum AutotaskError {
    /// A new run was configured with a start date that is not in the future
    #[error("Start date must be in the future (start date {start_date}, now {now})")]
    StartDateInPast {
        start_date: DateTime<Utc>,
        now: DateTime<Utc>,
    },

    /// The persistence plugin failed to load or store the run state
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AutotaskError {
    /// Stable, machine-readable code for the error
    pub fn code(&self) -> &'static str {
        match self {
            AutotaskError::StartDateInPast { .. } => "START_DATE_IN_PAST",
            AutotaskError::Persistence(_) => "PERSISTENCE",
            AutotaskError::Io(_) => "IO",
            AutotaskError::Json(_) => "JSON",
        }
    }
}

/// Result type alias for autotask operations
pub type Result<T> = std::result::Result<T, AutotaskError>;
