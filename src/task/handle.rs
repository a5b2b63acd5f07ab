//! Runtime controls for a running task.
//!
//! A `TaskHandle` is cheap to clone and every method is synchronous, so it can
//! be called from another task, a signal handler, or from inside a hook.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use log::debug;
use tokio::sync::Notify;

use crate::domain::EnginePhase;
use crate::gate::Gate;

#[derive(Debug)]
struct Controls {
    gate: Gate,
    stop_requested: AtomicBool,
    stop_notify: Notify,
    delay: Mutex<Duration>,
    phase: AtomicU8,
}

/// Shared control surface: stop, pause, resume, and delay adjustment
#[derive(Debug, Clone)]
pub struct TaskHandle {
    inner: Arc<Controls>,
}

impl Default for TaskHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskHandle {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Controls {
                gate: Gate::new(),
                stop_requested: AtomicBool::new(false),
                stop_notify: Notify::new(),
                delay: Mutex::new(Duration::ZERO),
                phase: AtomicU8::new(EnginePhase::Idle as u8),
            }),
        }
    }

    /// Request a stop; takes effect at the next suspension point.
    ///
    /// Wakes a paused loop and cuts short any delay or start-date wait. An
    /// attempt that is already executing runs to completion, but the stop is
    /// persisted as soon as the engine sees it.
    pub fn stop(&self) {
        debug!("TaskHandle::stop: called");
        self.inner.stop_requested.store(true, Ordering::SeqCst);
        self.inner.stop_notify.notify_waiters();
        self.inner.gate.open();
    }

    /// Suspend before the next iteration
    pub fn pause(&self) {
        debug!("TaskHandle::pause: called");
        self.inner.gate.close();
    }

    pub fn resume(&self) {
        debug!("TaskHandle::resume: called");
        self.inner.gate.open();
    }

    pub fn is_paused(&self) -> bool {
        !self.inner.gate.is_open()
    }

    pub fn is_stop_requested(&self) -> bool {
        self.inner.stop_requested.load(Ordering::SeqCst)
    }

    pub fn phase(&self) -> EnginePhase {
        EnginePhase::from_u8(self.inner.phase.load(Ordering::SeqCst))
    }

    /// Current wait applied after a successful attempt
    pub fn delay(&self) -> Duration {
        *self.delay_slot()
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay_slot() = delay;
    }

    pub fn increase_delay(&self, amount: Duration) {
        let mut delay = self.delay_slot();
        *delay = delay.saturating_add(amount);
    }

    /// Shorten the delay; it bottoms out at zero
    pub fn decrease_delay(&self, amount: Duration) {
        let mut delay = self.delay_slot();
        *delay = delay.saturating_sub(amount);
    }

    fn delay_slot(&self) -> MutexGuard<'_, Duration> {
        self.inner.delay.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub(crate) fn set_phase(&self, phase: EnginePhase) {
        self.inner.phase.store(phase as u8, Ordering::SeqCst);
    }

    /// Park on the gate if a pause is pending
    pub(crate) async fn wait_if_paused(&self) {
        if self.inner.gate.is_open() {
            return;
        }
        self.set_phase(EnginePhase::Paused);
        self.inner.gate.park().await;
        self.set_phase(EnginePhase::Running);
    }

    /// Resolve once a stop has been requested
    pub(crate) async fn stopped(&self) {
        let notified = self.inner.stop_notify.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();
        if self.is_stop_requested() {
            return;
        }
        notified.await;
    }

    /// Sleep for `duration`; returns false if a stop request cut the wait short
    pub(crate) async fn sleep_unless_stopped(&self, duration: Duration) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(duration) => true,
            _ = self.stopped() => false,
        }
    }
}
