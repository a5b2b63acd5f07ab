//! Task run state and related types
//!
//! `TaskState` is the resumable snapshot of a run. Every transition consumes
//! the previous snapshot and returns the next one, so the engine always hands
//! persistence a complete state and never a half-applied update.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An attempt failure captured for the run record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapturedError {
    /// Top-level error message
    pub message: String,

    /// Messages of the underlying causes, outermost first
    #[serde(default)]
    pub chain: Vec<String>,

    /// When the attempt failed
    pub occurred_at: DateTime<Utc>,
}

impl CapturedError {
    /// Capture an error together with its cause chain
    pub fn from_report(report: &eyre::Report) -> Self {
        Self {
            message: report.to_string(),
            chain: report.chain().skip(1).map(|cause| cause.to_string()).collect(),
            occurred_at: Utc::now(),
        }
    }
}

impl From<&eyre::Report> for CapturedError {
    fn from(report: &eyre::Report) -> Self {
        Self::from_report(report)
    }
}

/// The serializable snapshot of run progress
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskState<T> {
    //=== Lifecycle ===
    /// True until a fresh run has begun
    pub is_first_run: bool,

    /// True once the loop has exited for any reason
    pub has_finished: bool,

    /// True once stop was requested, or a stop-on-error hook ended the run
    pub was_manually_stopped: bool,

    //=== Counters ===
    pub num_errors: u32,
    pub num_successful_repetitions: u32,

    //=== Records ===
    /// One entry per successful attempt, in completion order
    pub results: Vec<T>,

    /// One entry per failed attempt, in completion order
    pub errors: Vec<CapturedError>,

    //=== Timestamps ===
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl<T> Default for TaskState<T> {
    fn default() -> Self {
        Self {
            is_first_run: true,
            has_finished: false,
            was_manually_stopped: false,
            num_errors: 0,
            num_successful_repetitions: 0,
            results: Vec::new(),
            errors: Vec::new(),
            started_at: None,
            completed_at: None,
        }
    }
}

impl<T> TaskState<T> {
    /// A pristine state for a run that has not started yet
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of attempts made so far, successful or not
    pub fn attempts(&self) -> u32 {
        self.num_errors + self.num_successful_repetitions
    }

    /// True when this state describes a run that was started and never finished
    pub fn is_resumable(&self) -> bool {
        !self.is_first_run && !self.has_finished
    }

    /// Begin a fresh run
    pub fn begin(mut self, now: DateTime<Utc>) -> Self {
        self.is_first_run = false;
        self.started_at = Some(now);
        self
    }

    /// Record a successful attempt
    pub fn record_success(mut self, result: T) -> Self {
        self.results.push(result);
        self.num_successful_repetitions += 1;
        self
    }

    /// Record a failed attempt
    pub fn record_error(mut self, error: CapturedError) -> Self {
        self.errors.push(error);
        self.num_errors += 1;
        self
    }

    /// Mark the run as stopped so a resumed process will not attempt it again
    pub fn mark_stopped(mut self) -> Self {
        self.was_manually_stopped = true;
        self
    }

    /// Terminal transition; the last mutation of a run
    pub fn finish(mut self, now: DateTime<Utc>) -> Self {
        self.has_finished = true;
        self.completed_at = Some(now);
        self
    }
}
