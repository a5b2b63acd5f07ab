//! CLI module for autotask - command-line interface and subcommands.
//!
//! Provides the main entry point with subcommands for running a command as a
//! resumable task stream and inspecting or resetting its persisted state.

pub mod commands;
pub mod shell;

pub use commands::Cli;
