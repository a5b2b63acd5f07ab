//! Task configuration: the unit-of-work factory, repetition budget, and hooks.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::FutureExt;
use futures::future::BoxFuture;

/// One attempt: a future that settles to a result or an error
pub type TaskUnit<T> = BoxFuture<'static, eyre::Result<T>>;

/// Produces a fresh attempt for every iteration
pub type TaskFactory<T> = Arc<dyn Fn() -> TaskUnit<T> + Send + Sync>;

pub type SuccessObserver<T> = Arc<dyn Fn(&T) + Send + Sync>;
pub type ErrorObserver = Arc<dyn Fn(&eyre::Report) + Send + Sync>;
pub type SuccessPredicate<T> = Arc<dyn Fn(&T) -> bool + Send + Sync>;
pub type ErrorPredicate = Arc<dyn Fn(&eyre::Report) -> bool + Send + Sync>;

/// Optional callbacks consulted after every attempt
pub struct Hooks<T> {
    pub on_success: Option<SuccessObserver<T>>,
    pub on_error: Option<ErrorObserver>,
    pub should_stop_on_success: Option<SuccessPredicate<T>>,
    pub should_stop_on_error: Option<ErrorPredicate>,
}

impl<T> Default for Hooks<T> {
    fn default() -> Self {
        Self {
            on_success: None,
            on_error: None,
            should_stop_on_success: None,
            should_stop_on_error: None,
        }
    }
}

impl<T> Clone for Hooks<T> {
    fn clone(&self) -> Self {
        Self {
            on_success: self.on_success.clone(),
            on_error: self.on_error.clone(),
            should_stop_on_success: self.should_stop_on_success.clone(),
            should_stop_on_error: self.should_stop_on_error.clone(),
        }
    }
}

impl<T> Hooks<T> {
    /// Run the success observer, then return whether the loop should end
    pub fn after_success(&self, result: &T) -> bool {
        if let Some(observer) = &self.on_success {
            observer(result);
        }
        self.should_stop_on_success
            .as_ref()
            .is_some_and(|predicate| predicate(result))
    }

    /// Run the error observer, then return whether the loop should end
    pub fn after_error(&self, error: &eyre::Report) -> bool {
        if let Some(observer) = &self.on_error {
            observer(error);
        }
        self.should_stop_on_error
            .as_ref()
            .is_some_and(|predicate| predicate(error))
    }
}

/// Configuration for an `AutomatedTask`
pub struct TaskConfig<T> {
    /// Total attempts budget
    pub num_repetitions: u32,
    /// Initial wait after each successful attempt; adjustable at runtime through the handle
    pub delay: Duration,
    /// When set, a new run waits until this instant before the first attempt
    pub start_date: Option<DateTime<Utc>>,
    pub task_factory: TaskFactory<T>,
    pub hooks: Hooks<T>,
}

impl<T> Clone for TaskConfig<T> {
    fn clone(&self) -> Self {
        Self {
            num_repetitions: self.num_repetitions,
            delay: self.delay,
            start_date: self.start_date,
            task_factory: self.task_factory.clone(),
            hooks: self.hooks.clone(),
        }
    }
}

impl<T> std::fmt::Debug for TaskConfig<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskConfig")
            .field("num_repetitions", &self.num_repetitions)
            .field("delay", &self.delay)
            .field("start_date", &self.start_date)
            .field("on_success", &self.hooks.on_success.is_some())
            .field("on_error", &self.hooks.on_error.is_some())
            .field("should_stop_on_success", &self.hooks.should_stop_on_success.is_some())
            .field("should_stop_on_error", &self.hooks.should_stop_on_error.is_some())
            .finish_non_exhaustive()
    }
}

impl<T: Send + 'static> TaskConfig<T> {
    /// Build a config around a factory of async attempts.
    ///
    /// Defaults: one repetition, no delay, no start date, no hooks.
    pub fn new<F, Fut>(factory: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = eyre::Result<T>> + Send + 'static,
    {
        Self::from_factory(Arc::new(move || factory().boxed()))
    }

    /// Build a config around an already boxed factory
    pub fn from_factory(task_factory: TaskFactory<T>) -> Self {
        Self {
            num_repetitions: 1,
            delay: Duration::ZERO,
            start_date: None,
            task_factory,
            hooks: Hooks::default(),
        }
    }

    pub fn repetitions(mut self, num_repetitions: u32) -> Self {
        self.num_repetitions = num_repetitions;
        self
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn start_date(mut self, start_date: DateTime<Utc>) -> Self {
        self.start_date = Some(start_date);
        self
    }

    pub fn on_success(mut self, observer: impl Fn(&T) + Send + Sync + 'static) -> Self {
        self.hooks.on_success = Some(Arc::new(observer));
        self
    }

    pub fn on_error(mut self, observer: impl Fn(&eyre::Report) + Send + Sync + 'static) -> Self {
        self.hooks.on_error = Some(Arc::new(observer));
        self
    }

    pub fn should_stop_on_success(mut self, predicate: impl Fn(&T) -> bool + Send + Sync + 'static) -> Self {
        self.hooks.should_stop_on_success = Some(Arc::new(predicate));
        self
    }

    pub fn should_stop_on_error(
        mut self,
        predicate: impl Fn(&eyre::Report) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.hooks.should_stop_on_error = Some(Arc::new(predicate));
        self
    }
}
