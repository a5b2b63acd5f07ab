use autotask::{AutomatedTask, FilePersistence, TaskConfig, TaskReport, TaskState};
use chrono::Utc;
use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use log::{debug, info, warn};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

mod cli;
mod config;

use cli::Cli;
use cli::commands::{Commands, RunArgs, StreamArgs};
use cli::shell;
use config::Config;

fn setup_logging() -> Result<()> {
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("autotask")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join("autotask.log");
    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    logger_builder().target(env_logger::Target::Pipe(target)).init();

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(())
}

// The logger admits every level; the config's level is applied afterwards as
// the global max level unless RUST_LOG is set.
fn logger_builder() -> env_logger::Builder {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("trace"))
}

fn apply_log_level(config: &Config) {
    if std::env::var_os("RUST_LOG").is_some() {
        return;
    }
    let level = config.log_level_filter();
    log::set_max_level(level);
    debug!("Log level set to {} from config", level);
}

fn persistence_for(stream: &StreamArgs, config: &Config) -> FilePersistence {
    match &stream.state_file {
        Some(path) => FilePersistence::new(path),
        None => FilePersistence::for_stream(&config.storage.state_dir, &stream.name),
    }
}

fn start_date(args: &RunArgs) -> Option<chrono::DateTime<Utc>> {
    if let Some(at) = args.start_at {
        return Some(at);
    }
    args.start_in_secs
        .map(|secs| Utc::now() + chrono::Duration::seconds(secs as i64))
}

async fn run_application(cli: &Cli, config: &Config) -> Result<()> {
    info!("Starting application");

    if cli.is_verbose() {
        println!("{}", "Verbose mode enabled".yellow());
    }

    match &cli.command {
        Commands::Run(args) => handle_run_command(args, config).await,
        Commands::Status(stream) => handle_status_command(stream, config).await,
        Commands::Reset(stream) => handle_reset_command(stream, config).await,
    }
}

async fn handle_run_command(args: &RunArgs, config: &Config) -> Result<()> {
    let repetitions = args.repetitions.unwrap_or(config.defaults.repetitions);
    let delay = Duration::from_millis(args.delay_ms.unwrap_or(config.defaults.delay_ms));
    info!("Running {:?} x{} (delay {:?})", args.command, repetitions, delay);

    let command = Arc::new(args.command.clone());
    let successes = Arc::new(AtomicU32::new(0));
    let counter = successes.clone();

    let mut task_config = TaskConfig::new(move || {
        let command = command.clone();
        async move { shell::run_once(&command).await }
    })
    .repetitions(repetitions)
    .delay(delay)
    .on_success(move |output: &String| {
        let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
        debug!("Run {} output: {}", n, output);
        println!("{}", n);
    })
    .on_error(|e| {
        println!("{} {:#}", "error:".red(), e);
    });

    if args.stop_on_error || config.defaults.stop_on_error {
        task_config = task_config.should_stop_on_error(|_| true);
    }
    if let Some(needle) = args.until_output.clone() {
        task_config = task_config.should_stop_on_success(move |output: &String| output.contains(&needle));
    }
    if let Some(at) = start_date(args) {
        task_config = task_config.start_date(at);
    }

    let mut task = AutomatedTask::new(task_config);
    if !args.no_persist {
        let persistence = persistence_for(&args.stream, config);
        info!("Persisting state to {}", persistence.path().display());
        task.register_persistence_plugin(persistence);
    }

    let handle = task.handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, stopping after the current run");
            eprintln!("{}", "Stopping after the current run...".yellow());
            handle.stop();
        }
    });

    let report = task.start().await.context("Task failed")?;
    println!("DONE");
    print_report(&report);
    Ok(())
}

fn print_report(report: &TaskReport<String>) {
    println!(
        "{} {} succeeded, {} failed",
        "Summary:".green(),
        report.num_successful_repetitions(),
        report.num_errors()
    );
    if report.was_manually_stopped() {
        println!("  {}", "Stopped before all repetitions ran".yellow());
    }
    if let Some(elapsed) = report.elapsed() {
        println!("  Elapsed: {}ms", elapsed.num_milliseconds());
    }
}

async fn handle_status_command(stream: &StreamArgs, config: &Config) -> Result<()> {
    let persistence = persistence_for(stream, config);
    info!("Reading state from {}", persistence.path().display());

    let state: Option<TaskState<serde_json::Value>> = persistence
        .load()
        .await
        .context(format!("Failed to read {}", persistence.path().display()))?;

    let Some(state) = state else {
        println!("{} {}", "No state at".yellow(), persistence.path().display());
        return Ok(());
    };

    let status = if state.has_finished {
        "finished".green()
    } else if state.is_first_run {
        "not started".normal()
    } else {
        "in progress".cyan()
    };

    println!("{} {}", "State:".green(), persistence.path().display());
    println!("  Status:     {}", status);
    println!("  Succeeded:  {}", state.num_successful_repetitions);
    println!("  Failed:     {}", state.num_errors);
    if state.was_manually_stopped {
        println!("  {}", "Stopped manually".yellow());
    }
    if let Some(started) = state.started_at {
        println!("  Started:    {}", started.to_rfc3339());
    }
    if let Some(completed) = state.completed_at {
        println!("  Completed:  {}", completed.to_rfc3339());
    }
    if let Some(last) = state.errors.last() {
        println!("  Last error: {}", last.message.red());
    }
    Ok(())
}

async fn handle_reset_command(stream: &StreamArgs, config: &Config) -> Result<()> {
    let persistence = persistence_for(stream, config);
    info!("Resetting state at {}", persistence.path().display());
    persistence.clear().await.context("Failed to reset state")?;
    println!("{} {}", "Reset:".green(), persistence.path().display());
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Setup logging first; fall back to stderr when the log file cannot be opened
    if let Err(e) = setup_logging() {
        logger_builder().init();
        warn!("File logging unavailable: {:#}", e);
    }

    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    apply_log_level(&config);

    info!("Starting with config from: {:?}", cli.config);

    // Run the main application logic
    run_application(&cli, &config).await.context("Application failed")?;

    Ok(())
}
