//! Final run report returned by `AutomatedTask::start`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::state::{CapturedError, TaskState};

/// Read-only view of a finished run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskReport<T> {
    num_errors: u32,
    num_successful_repetitions: u32,
    results: Vec<T>,
    errors: Vec<CapturedError>,
    was_manually_stopped: bool,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
}

impl<T> From<TaskState<T>> for TaskReport<T> {
    fn from(state: TaskState<T>) -> Self {
        Self {
            num_errors: state.num_errors,
            num_successful_repetitions: state.num_successful_repetitions,
            results: state.results,
            errors: state.errors,
            was_manually_stopped: state.was_manually_stopped,
            started_at: state.started_at,
            completed_at: state.completed_at,
        }
    }
}

impl<T> TaskReport<T> {
    pub fn num_errors(&self) -> u32 {
        self.num_errors
    }

    pub fn num_successful_repetitions(&self) -> u32 {
        self.num_successful_repetitions
    }

    /// Total attempts made, successful or not
    pub fn attempts(&self) -> u32 {
        self.num_errors + self.num_successful_repetitions
    }

    pub fn results(&self) -> &[T] {
        &self.results
    }

    pub fn errors(&self) -> &[CapturedError] {
        &self.errors
    }

    /// True if the run ended through `stop()` or a stop-on-error hook
    pub fn was_manually_stopped(&self) -> bool {
        self.was_manually_stopped
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    /// Wall-clock span of the run, if both ends were recorded
    pub fn elapsed(&self) -> Option<chrono::Duration> {
        Some(self.completed_at? - self.started_at?)
    }

    /// Take ownership of the collected results
    pub fn into_results(self) -> Vec<T> {
        self.results
    }
}
