//! AutomatedTask - runs a unit of work a bounded number of times.
//!
//! Each iteration parks on the pause gate, checks for a stop request, runs one
//! attempt from the factory, records the outcome, persists the new state, and
//! consults the hooks. State is persisted after every mutation so a killed
//! process can be resumed by a new engine pointed at the same store.

use chrono::Utc;
use log::{debug, info, warn};

use super::config::{TaskConfig, TaskUnit};
use super::handle::TaskHandle;
use crate::domain::{CapturedError, EnginePhase, TaskReport, TaskState};
use crate::error::{AutotaskError, Result};
use crate::storage::{PersistencePlugin, StoredState};

/// Retryable, resumable task executor
pub struct AutomatedTask<T> {
    config: TaskConfig<T>,
    handle: TaskHandle,
    persistence: Option<Box<dyn PersistencePlugin<T>>>,
}

impl<T> std::fmt::Debug for AutomatedTask<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AutomatedTask")
            .field("config", &self.config)
            .field("handle", &self.handle)
            .field("persistence", &self.persistence.is_some())
            .finish()
    }
}

impl<T> AutomatedTask<T>
where
    T: Send + Sync + 'static,
{
    /// Create a task with its own control handle
    pub fn new(config: TaskConfig<T>) -> Self {
        Self::with_handle(config, TaskHandle::new())
    }

    /// Create a task driven by an existing handle.
    ///
    /// Useful when hooks need to pause or stop the task they belong to: create
    /// the handle first, capture clones of it in the hooks, then pass it here.
    pub fn with_handle(config: TaskConfig<T>, handle: TaskHandle) -> Self {
        handle.set_delay(config.delay);
        Self {
            config,
            handle,
            persistence: None,
        }
    }

    /// Control handle for stop/pause/resume and delay changes
    pub fn handle(&self) -> TaskHandle {
        self.handle.clone()
    }

    /// Attach the store used to recover and persist run state
    pub fn register_persistence_plugin(&mut self, plugin: impl PersistencePlugin<T> + 'static) -> &mut Self {
        self.persistence = Some(Box::new(plugin));
        self
    }

    /// Builder-style variant of `register_persistence_plugin`
    pub fn with_persistence(mut self, plugin: impl PersistencePlugin<T> + 'static) -> Self {
        self.register_persistence_plugin(plugin);
        self
    }

    pub fn stop(&self) {
        self.handle.stop();
    }

    pub fn pause(&self) {
        self.handle.pause();
    }

    pub fn resume(&self) {
        self.handle.resume();
    }

    pub fn increase_delay(&self, amount: std::time::Duration) {
        self.handle.increase_delay(amount);
    }

    pub fn decrease_delay(&self, amount: std::time::Duration) {
        self.handle.decrease_delay(amount);
    }

    /// Run the task to completion and return the final report.
    ///
    /// Attempt failures never make this fail; they are recorded in the report.
    /// Errors are returned only when a new run's start date is not in the
    /// future, or when the persistence plugin fails.
    pub async fn start(self) -> Result<TaskReport<T>> {
        self.handle.set_phase(EnginePhase::Recovering);

        let mut state = match self.recover().await? {
            Some(state) => {
                info!(
                    "Resuming run started at {:?}: {} of {} attempts done",
                    state.started_at,
                    state.attempts(),
                    self.config.num_repetitions
                );
                state
            }
            None => {
                self.wait_for_start_date().await?;
                let state = TaskState::new().begin(Utc::now());
                self.persist(&state).await?;
                info!("Starting new run of {} repetitions", self.config.num_repetitions);
                state
            }
        };

        self.handle.set_phase(EnginePhase::Running);

        while state.attempts() < self.config.num_repetitions {
            self.handle.wait_if_paused().await;

            if self.handle.is_stop_requested() || state.was_manually_stopped {
                info!("Stop requested after {} attempts", state.attempts());
                state = state.mark_stopped();
                break;
            }

            let attempt = state.attempts() + 1;
            debug!("Attempt {} of {}", attempt, self.config.num_repetitions);
            let unit = (self.config.task_factory)();
            let (next, outcome) = self.run_attempt(unit, state).await?;
            state = next;

            match outcome {
                Ok(result) => {
                    state = state.record_success(result);
                    self.persist(&state).await?;

                    let stop = state
                        .results
                        .last()
                        .is_some_and(|result| self.config.hooks.after_success(result));
                    if stop {
                        info!("Stopping after attempt {}: success hook requested stop", attempt);
                        break;
                    }

                    if state.attempts() < self.config.num_repetitions {
                        let delay = self.handle.delay();
                        if !delay.is_zero() {
                            debug!("Waiting {:?} before next attempt", delay);
                            self.handle.sleep_unless_stopped(delay).await;
                        }
                    }
                }
                Err(error) => {
                    warn!("Attempt {} failed: {:#}", attempt, error);
                    state = state.record_error(CapturedError::from_report(&error));
                    self.persist(&state).await?;

                    if self.config.hooks.after_error(&error) {
                        info!("Stopping after attempt {}: error hook requested stop", attempt);
                        state = state.mark_stopped();
                        break;
                    }
                }
            }
        }

        if self.handle.is_stop_requested() && !state.was_manually_stopped {
            state = state.mark_stopped();
        }

        state = state.finish(Utc::now());
        self.persist(&state).await?;
        self.handle.set_phase(EnginePhase::Finished);

        info!(
            "Run finished: {} succeeded, {} failed",
            state.num_successful_repetitions, state.num_errors
        );
        Ok(state.into())
    }

    /// Await one attempt, persisting a stop requested while it is in flight.
    ///
    /// The attempt itself is never cancelled; only the stopped flag is written
    /// early so a process killed mid-attempt does not resume the run.
    async fn run_attempt(
        &self,
        mut unit: TaskUnit<T>,
        state: TaskState<T>,
    ) -> Result<(TaskState<T>, eyre::Result<T>)> {
        let finished = tokio::select! {
            outcome = &mut unit => Some(outcome),
            _ = self.handle.stopped() => None,
        };
        if let Some(outcome) = finished {
            return Ok((state, outcome));
        }

        info!("Stop requested during attempt {}; waiting for it to finish", state.attempts() + 1);
        let state = state.mark_stopped();
        self.persist(&state).await?;
        Ok((state, unit.await))
    }

    /// Load prior state; `None` means a new run must begin
    async fn recover(&self) -> Result<Option<TaskState<T>>> {
        let Some(persistence) = &self.persistence else {
            return Ok(None);
        };

        match persistence.get_state().await? {
            StoredState::FirstRun => {
                debug!("No prior run found");
                Ok(None)
            }
            StoredState::Saved(state) if state.has_finished => {
                info!(
                    "Prior run completed at {:?}; starting a new cycle",
                    state.completed_at
                );
                Ok(None)
            }
            StoredState::Saved(state) => Ok(Some(state)),
        }
    }

    /// Validate and wait for the configured start date of a new run
    async fn wait_for_start_date(&self) -> Result<()> {
        let Some(start_date) = self.config.start_date else {
            return Ok(());
        };

        let now = Utc::now();
        if start_date <= now {
            return Err(AutotaskError::StartDateInPast { start_date, now });
        }

        let wait = (start_date - now).to_std().unwrap_or_default();
        info!("Waiting {:?} until start date {}", wait, start_date);
        self.handle.set_phase(EnginePhase::WaitingForStartDate);
        self.handle.sleep_unless_stopped(wait).await;
        Ok(())
    }

    async fn persist(&self, state: &TaskState<T>) -> Result<()> {
        if let Some(persistence) = &self.persistence {
            persistence.set_state(state).await?;
            debug!("Persisted state after {} attempts", state.attempts());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryPersistence;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::{Duration, Instant};

    fn counting_factory(calls: Arc<AtomicU32>) -> TaskConfig<u32> {
        TaskConfig::new(move || {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move { Ok(n) }
        })
    }

    #[tokio::test]
    async fn test_runs_factory_num_repetitions_times() {
        let calls = Arc::new(AtomicU32::new(0));
        let task = AutomatedTask::new(counting_factory(calls.clone()).repetitions(3));

        let report = task.start().await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(report.num_successful_repetitions(), 3);
        assert_eq!(report.num_errors(), 0);
        assert_eq!(report.results(), &[1, 2, 3]);
        assert!(!report.was_manually_stopped());
        assert!(report.started_at().is_some());
        assert!(report.completed_at().is_some());
    }

    #[tokio::test]
    async fn test_alternating_failures_are_recorded() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let config = TaskConfig::new(move || {
            let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if n % 2 == 0 {
                    Ok("success".to_string())
                } else {
                    Err(eyre::eyre!("failure"))
                }
            }
        })
        .repetitions(4);

        let report = AutomatedTask::new(config).start().await.unwrap();

        assert_eq!(report.results(), &["success".to_string(), "success".to_string()]);
        assert_eq!(report.num_successful_repetitions(), 2);
        assert_eq!(report.num_errors(), 2);
        assert_eq!(report.errors().len(), 2);
        assert_eq!(report.errors()[0].message, "failure");
    }

    #[tokio::test]
    async fn test_should_stop_on_error_halts_and_marks_stopped() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let config = TaskConfig::new(move || {
            let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if n == 2 {
                    Err(eyre::eyre!("error"))
                } else {
                    Ok("success")
                }
            }
        })
        .repetitions(4)
        .should_stop_on_error(|_| true);

        let store = Arc::new(MemoryPersistence::new());
        let task = AutomatedTask::new(config).with_persistence(store.clone());
        let report = task.start().await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(report.num_successful_repetitions(), 1);
        assert_eq!(report.num_errors(), 1);
        assert_eq!(report.results(), &["success"]);
        assert!(report.was_manually_stopped());

        let persisted = store.current().unwrap();
        assert!(persisted.was_manually_stopped);
        assert!(persisted.has_finished);
    }

    #[tokio::test]
    async fn test_should_stop_on_success_does_not_mark_stopped() {
        let hook_calls = Arc::new(AtomicU32::new(0));
        let counter = hook_calls.clone();
        let config = TaskConfig::new(|| async { Ok(serde_json::json!({"foo": "bar"})) })
            .repetitions(2)
            .should_stop_on_success(move |result| {
                counter.fetch_add(1, Ordering::SeqCst);
                result["foo"] == "bar"
            });

        let report = AutomatedTask::new(config).start().await.unwrap();

        assert_eq!(hook_calls.load(Ordering::SeqCst), 1);
        assert_eq!(report.num_successful_repetitions(), 1);
        assert!(!report.was_manually_stopped());
    }

    #[tokio::test]
    async fn test_observers_are_called() {
        let successes = Arc::new(AtomicU32::new(0));
        let errors = Arc::new(AtomicU32::new(0));
        let (s, e) = (successes.clone(), errors.clone());
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let config = TaskConfig::new(move || {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Err(eyre::eyre!("first fails"))
                } else {
                    Ok(n)
                }
            }
        })
        .repetitions(3)
        .on_success(move |_| {
            s.fetch_add(1, Ordering::SeqCst);
        })
        .on_error(move |err| {
            assert_eq!(err.to_string(), "first fails");
            e.fetch_add(1, Ordering::SeqCst);
        });

        let report = AutomatedTask::new(config).start().await.unwrap();

        assert_eq!(successes.load(Ordering::SeqCst), 2);
        assert_eq!(errors.load(Ordering::SeqCst), 1);
        assert_eq!(report.attempts(), 3);
    }

    #[tokio::test]
    async fn test_delay_not_applied_after_last_attempt() {
        let task = AutomatedTask::new(
            TaskConfig::new(|| async { Ok(()) })
                .repetitions(3)
                .delay(Duration::from_millis(200)),
        );

        let started = Instant::now();
        task.start().await.unwrap();
        let elapsed = started.elapsed();

        // Two delays between three attempts, none after the last
        assert!(elapsed >= Duration::from_millis(400));
        assert!(elapsed < Duration::from_millis(550));
    }

    #[tokio::test]
    async fn test_delay_not_applied_after_failure() {
        let task = AutomatedTask::new(
            TaskConfig::new(|| async { Err::<(), _>(eyre::eyre!("always")) })
                .repetitions(3)
                .delay(Duration::from_secs(5)),
        );

        let started = Instant::now();
        let report = task.start().await.unwrap();

        assert_eq!(report.num_errors(), 3);
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_start_date_in_past_fails_before_any_attempt() {
        let calls = Arc::new(AtomicU32::new(0));
        let store = Arc::new(MemoryPersistence::<u32>::new());
        let task = AutomatedTask::new(
            counting_factory(calls.clone()).start_date(Utc::now() - chrono::Duration::seconds(1)),
        )
        .with_persistence(store.clone());

        let err = task.start().await.unwrap_err();

        assert!(matches!(err, AutotaskError::StartDateInPast { .. }));
        assert_eq!(err.code(), "START_DATE_IN_PAST");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn test_waits_for_start_date() {
        let start_date = Utc::now() + chrono::Duration::milliseconds(300);
        let task = AutomatedTask::new(TaskConfig::new(|| async { Ok(()) }).start_date(start_date));
        let handle = task.handle();

        let started = Instant::now();
        let run = tokio::spawn(task.start());
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(handle.phase(), EnginePhase::WaitingForStartDate);

        let report = run.await.unwrap().unwrap();
        assert!(started.elapsed() >= Duration::from_millis(250));
        assert_eq!(report.num_successful_repetitions(), 1);
        assert_eq!(handle.phase(), EnginePhase::Finished);
    }

    #[tokio::test]
    async fn test_resumes_unfinished_state() {
        let prior = TaskState::new()
            .begin(Utc::now() - chrono::Duration::minutes(1))
            .record_success(100u32)
            .record_success(101u32);
        let started_at = prior.started_at;
        let store = Arc::new(MemoryPersistence::with_state(prior));

        let calls = Arc::new(AtomicU32::new(0));
        let task = AutomatedTask::new(counting_factory(calls.clone()).repetitions(5)).with_persistence(store.clone());
        let report = task.start().await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(report.results(), &[100, 101, 1, 2, 3]);
        assert_eq!(report.started_at(), started_at);
        assert!(store.current().unwrap().has_finished);
    }

    #[tokio::test]
    async fn test_resume_skips_start_date_check() {
        let prior: TaskState<u32> = TaskState::new().begin(Utc::now()).record_success(1);
        let store = Arc::new(MemoryPersistence::with_state(prior));

        let task = AutomatedTask::new(
            counting_factory(Arc::new(AtomicU32::new(0)))
                .repetitions(2)
                .start_date(Utc::now() - chrono::Duration::seconds(10)),
        )
        .with_persistence(store);

        let report = task.start().await.unwrap();
        assert_eq!(report.num_successful_repetitions(), 2);
    }

    #[tokio::test]
    async fn test_finished_state_starts_new_cycle() {
        let earlier = Utc::now() - chrono::Duration::hours(1);
        let prior = TaskState::new()
            .begin(earlier)
            .record_success(7u32)
            .finish(earlier);
        let store = Arc::new(MemoryPersistence::with_state(prior));

        let calls = Arc::new(AtomicU32::new(0));
        let task = AutomatedTask::new(counting_factory(calls.clone()).repetitions(2)).with_persistence(store.clone());
        let report = task.start().await.unwrap();

        assert_eq!(report.results(), &[1, 2]);
        assert!(report.started_at().unwrap() > earlier);
        assert!(report.completed_at().unwrap() > earlier);
    }

    #[tokio::test]
    async fn test_resumed_stopped_state_does_not_attempt() {
        let prior: TaskState<u32> = TaskState::new().begin(Utc::now()).record_success(1).mark_stopped();
        let store = Arc::new(MemoryPersistence::with_state(prior));

        let calls = Arc::new(AtomicU32::new(0));
        let task = AutomatedTask::new(counting_factory(calls.clone()).repetitions(5)).with_persistence(store);
        let report = task.start().await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(report.num_successful_repetitions(), 1);
        assert!(report.was_manually_stopped());
    }

    #[tokio::test]
    async fn test_persists_after_every_mutation() {
        let store = Arc::new(MemoryPersistence::new());
        let task = AutomatedTask::new(counting_factory(Arc::new(AtomicU32::new(0))).repetitions(3))
            .with_persistence(store.clone());

        task.start().await.unwrap();

        // begin + 3 attempts + finish
        let history = store.history();
        assert_eq!(history.len(), 5);
        for (i, snapshot) in history.iter().enumerate().take(4) {
            assert_eq!(snapshot.attempts() as usize, i);
            assert!(!snapshot.has_finished);
        }
        assert!(history[4].has_finished);
    }

    #[tokio::test]
    async fn test_persistence_failure_is_fatal() {
        let store = Arc::new(MemoryPersistence::<u32>::new());
        store.fail_writes(true);

        let calls = Arc::new(AtomicU32::new(0));
        let task = AutomatedTask::new(counting_factory(calls.clone()).repetitions(3)).with_persistence(store);
        let err = task.start().await.unwrap_err();

        assert!(matches!(err, AutotaskError::Persistence(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_stop_before_start_runs_nothing() {
        let calls = Arc::new(AtomicU32::new(0));
        let task = AutomatedTask::new(counting_factory(calls.clone()).repetitions(3));
        task.stop();

        let report = task.start().await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(report.was_manually_stopped());
    }

    #[tokio::test]
    async fn test_stop_interrupts_delay() {
        let task = AutomatedTask::new(
            TaskConfig::new(|| async { Ok(()) })
                .repetitions(5)
                .delay(Duration::from_secs(30)),
        );
        let handle = task.handle();

        let started = Instant::now();
        let run = tokio::spawn(task.start());
        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.stop();

        let report = run.await.unwrap().unwrap();
        assert_eq!(report.num_successful_repetitions(), 1);
        assert!(report.was_manually_stopped());
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_stop_during_attempt_is_persisted_immediately() {
        let store = Arc::new(MemoryPersistence::new());
        let task = AutomatedTask::new(
            TaskConfig::new(|| async {
                tokio::time::sleep(Duration::from_millis(500)).await;
                Ok(1u32)
            })
            .repetitions(3),
        )
        .with_persistence(store.clone());
        let handle = task.handle();

        let run = tokio::spawn(task.start());
        tokio::time::sleep(Duration::from_millis(100)).await;
        handle.stop();
        tokio::time::sleep(Duration::from_millis(100)).await;

        // The attempt is still running, but the stop is already on record
        let snapshot = store.current().unwrap();
        assert!(snapshot.was_manually_stopped);
        assert!(!snapshot.has_finished);
        assert_eq!(snapshot.attempts(), 0);

        let report = run.await.unwrap().unwrap();
        assert_eq!(report.results(), &[1]);
        assert!(report.was_manually_stopped());
    }

    #[tokio::test]
    async fn test_resumed_run_after_mid_attempt_stop_does_not_attempt() {
        let store = Arc::new(MemoryPersistence::new());
        let task = AutomatedTask::new(
            TaskConfig::new(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(1u32)
            })
            .repetitions(3),
        )
        .with_persistence(store.clone());
        let handle = task.handle();

        let run = tokio::spawn(task.start());
        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.stop();
        tokio::time::sleep(Duration::from_millis(50)).await;
        // Killed before the attempt completes
        run.abort();
        let _ = run.await;

        let calls = Arc::new(AtomicU32::new(0));
        let report = AutomatedTask::new(counting_factory(calls.clone()).repetitions(3))
            .with_persistence(store.clone())
            .start()
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(report.was_manually_stopped());
        assert!(store.current().unwrap().has_finished);
    }

    #[tokio::test]
    async fn test_zero_repetitions_runs_nothing() {
        let calls = Arc::new(AtomicU32::new(0));
        let report = AutomatedTask::new(counting_factory(calls.clone()).repetitions(0))
            .start()
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(report.attempts(), 0);
        assert!(report.completed_at().is_some());
    }

    #[tokio::test]
    async fn test_increase_delay_takes_effect_on_next_wait() {
        let task = AutomatedTask::new(TaskConfig::new(|| async { Ok(()) }).repetitions(2));
        task.increase_delay(Duration::from_millis(150));

        let started = Instant::now();
        task.start().await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(150));
    }
}
