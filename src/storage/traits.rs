//! Persistence plugin trait definitions.

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::TaskState;
use crate::error::Result;

/// What a persistence plugin found when asked for prior state
#[derive(Debug, Clone, PartialEq)]
pub enum StoredState<T> {
    /// No prior run exists for this task stream
    FirstRun,
    /// A previously persisted snapshot
    Saved(TaskState<T>),
}

impl<T> StoredState<T> {
    /// Interpret a loaded snapshot; one still flagged as first-run is a marker, not a run
    pub fn from_state(state: TaskState<T>) -> Self {
        if state.is_first_run {
            StoredState::FirstRun
        } else {
            StoredState::Saved(state)
        }
    }
}

/// External store that lets an interrupted run resume in another process.
///
/// The engine calls `get_state` once before iterating and `set_state` after
/// every state mutation, awaiting each write before it moves on.
#[async_trait]
pub trait PersistencePlugin<T>: Send + Sync {
    /// Load the prior run state, or report that none exists
    async fn get_state(&self) -> Result<StoredState<T>>;

    /// Durably store a full snapshot
    async fn set_state(&self, state: &TaskState<T>) -> Result<()>;
}

#[async_trait]
impl<T, P> PersistencePlugin<T> for Arc<P>
where
    T: Send + Sync,
    P: PersistencePlugin<T> + ?Sized,
{
    async fn get_state(&self) -> Result<StoredState<T>> {
        (**self).get_state().await
    }

    async fn set_state(&self, state: &TaskState<T>) -> Result<()> {
        (**self).set_state(state).await
    }
}
