//! CLI command definitions using clap.
//!
//! Defines the main CLI structure and subcommands:
//! - run: execute a command repeatedly, persisting progress per task stream
//! - status: show the persisted state of a task stream
//! - reset: forget the persisted state of a task stream

use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Autotask - run a command N times, resumable across restarts
#[derive(Parser, Debug)]
#[command(name = "autotask")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Optional config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Check if verbose mode is enabled
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }
}

/// Which persisted task stream to operate on
#[derive(Args, Debug, Clone)]
pub struct StreamArgs {
    /// Task stream name; state lives at <state_dir>/<name>.json
    #[arg(long, default_value = "default")]
    pub name: String,

    /// Explicit state file, overrides --name
    #[arg(long)]
    pub state_file: Option<PathBuf>,
}

/// Options for the run subcommand
#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    #[command(flatten)]
    pub stream: StreamArgs,

    /// Do not persist progress (no resume after a crash)
    #[arg(long, conflicts_with = "state_file")]
    pub no_persist: bool,

    /// Number of repetitions (default from config)
    #[arg(short = 'n', long)]
    pub repetitions: Option<u32>,

    /// Delay in milliseconds after each successful run (default from config)
    #[arg(short, long)]
    pub delay_ms: Option<u64>,

    /// Start this many seconds from now
    #[arg(long, conflicts_with = "start_at")]
    pub start_in_secs: Option<u64>,

    /// Start at an RFC 3339 timestamp, e.g. 2030-01-01T09:00:00Z
    #[arg(long)]
    pub start_at: Option<DateTime<Utc>>,

    /// Stop at the first failed run
    #[arg(long)]
    pub stop_on_error: bool,

    /// Stop once a run's output contains this text
    #[arg(long)]
    pub until_output: Option<String>,

    /// Program and arguments to run, after `--`
    #[arg(last = true, required = true)]
    pub command: Vec<String>,
}

/// Main subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a command repeatedly, resuming an unfinished run if one exists
    Run(RunArgs),

    /// Show the persisted state of a task stream
    Status(StreamArgs),

    /// Delete the persisted state of a task stream
    Reset(StreamArgs),
}
