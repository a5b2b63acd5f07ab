//! In-memory persistence, mostly for tests and embedding.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

use super::traits::{PersistencePlugin, StoredState};
use crate::domain::TaskState;
use crate::error::{AutotaskError, Result};

/// Keeps the latest snapshot plus a history of every write.
pub struct MemoryPersistence<T> {
    current: Mutex<Option<TaskState<T>>>,
    history: Mutex<Vec<TaskState<T>>>,
    fail_writes: AtomicBool,
}

impl<T> std::fmt::Debug for MemoryPersistence<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryPersistence").finish_non_exhaustive()
    }
}

impl<T> Default for MemoryPersistence<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> MemoryPersistence<T> {
    /// Empty store; the first `get_state` reports a first run
    pub fn new() -> Self {
        Self {
            current: Mutex::new(None),
            history: Mutex::new(Vec::new()),
            fail_writes: AtomicBool::new(false),
        }
    }

    /// Store pre-seeded with a prior snapshot
    pub fn with_state(state: TaskState<T>) -> Self {
        let store = Self::new();
        *store.current.lock().unwrap_or_else(|e| e.into_inner()) = Some(state);
        store
    }

    /// Make every subsequent `set_state` fail
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of snapshots written so far
    pub fn write_count(&self) -> usize {
        self.history.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

impl<T: Clone> MemoryPersistence<T> {
    /// Latest stored snapshot
    pub fn current(&self) -> Option<TaskState<T>> {
        self.current.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Every snapshot written, oldest first
    pub fn history(&self) -> Vec<TaskState<T>> {
        self.history.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl<T> PersistencePlugin<T> for MemoryPersistence<T>
where
    T: Clone + Send + Sync,
{
    async fn get_state(&self) -> Result<StoredState<T>> {
        let current = self.current.lock().map_err(|e| AutotaskError::Persistence(e.to_string()))?;
        Ok(match current.as_ref() {
            Some(state) => StoredState::from_state(state.clone()),
            None => StoredState::FirstRun,
        })
    }

    async fn set_state(&self, state: &TaskState<T>) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(AutotaskError::Persistence("write rejected".to_string()));
        }

        *self.current.lock().map_err(|e| AutotaskError::Persistence(e.to_string()))? = Some(state.clone());
        self.history
            .lock()
            .map_err(|e| AutotaskError::Persistence(e.to_string()))?
            .push(state.clone());
        Ok(())
    }
}
