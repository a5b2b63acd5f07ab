//! Gate - a resettable open/closed barrier for suspending the iteration loop
//!
//! The gate starts open. `close()` arms a fresh wait, `open()` releases every
//! parked caller of the current wait. Each close gets its own `Notify`, so a
//! release belonging to an earlier pause cycle can never wake a later one.

use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::Notify;

#[derive(Debug)]
struct GateInner {
    open: bool,
    notify: Arc<Notify>,
}

/// Pause/resume synchronization primitive
#[derive(Debug)]
pub struct Gate {
    inner: Mutex<GateInner>,
}

impl Default for Gate {
    fn default() -> Self {
        Self::new()
    }
}

impl Gate {
    /// Create a new gate in the open state
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(GateInner {
                open: true,
                notify: Arc::new(Notify::new()),
            }),
        }
    }

    // A poisoned lock still holds a valid bool/Arc pair, so keep using it.
    fn lock(&self) -> MutexGuard<'_, GateInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Whether parked callers currently pass straight through
    pub fn is_open(&self) -> bool {
        self.lock().open
    }

    /// Close the gate; subsequent `park()` calls suspend until `open()`
    pub fn close(&self) {
        let mut inner = self.lock();
        if inner.open {
            inner.open = false;
            inner.notify = Arc::new(Notify::new());
        }
    }

    /// Open the gate, releasing all parked callers
    pub fn open(&self) {
        let mut inner = self.lock();
        if !inner.open {
            inner.open = true;
            inner.notify.notify_waiters();
        }
    }

    /// Suspend until the gate is open; returns immediately if it already is
    pub async fn park(&self) {
        loop {
            let notify = {
                let inner = self.lock();
                if inner.open {
                    return;
                }
                inner.notify.clone()
            };

            let notified = notify.notified();
            tokio::pin!(notified);
            {
                // Registration and the state check happen under the same lock
                // that open() and close() take, so no release can slip between them.
                let inner = self.lock();
                if inner.open {
                    return;
                }
                if !Arc::ptr_eq(&inner.notify, &notify) {
                    // Reopened and closed again since the clone; wait on the new cycle.
                    continue;
                }
                notified.as_mut().enable();
            }
            notified.await;
        }
    }
}
