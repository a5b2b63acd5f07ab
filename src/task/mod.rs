//! Task module - the iteration engine and its runtime controls.
//!
//! This module provides:
//! - AutomatedTask for running a unit of work a bounded number of times
//! - TaskConfig for the factory, repetition budget, delay, and hooks
//! - TaskHandle for stop/pause/resume from outside (or inside) the loop

mod config;
mod engine;
mod handle;

pub use config::{
    ErrorObserver, ErrorPredicate, Hooks, SuccessObserver, SuccessPredicate, TaskConfig, TaskFactory, TaskUnit,
};
pub use engine::AutomatedTask;
pub use handle::TaskHandle;
