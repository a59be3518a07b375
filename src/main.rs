use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use log::info;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use loopr::config::{GlobalConfig, LoopConfig};
use loopr::domain::{LoopEvent, LoopEventKind};
use loopr::driver::{DriverConfig, LoopDriver, LoopOptions, LoopReport};
use loopr::monitor::Monitor;
use loopr::session::ProcessRunner;
use loopr::storage::{FileStore, STATUS_FILE, StateStore};
use loopr::workspace::{ControllerPaths, resolve_root};

mod cli;

use cli::Cli;
use cli::commands::Commands;

fn setup_logging() -> Result<()> {
    // Create log directory
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("loopr")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join("loopr.log");

    // Setup env_logger with file output
    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    env_logger::Builder::from_default_env()
        .target(env_logger::Target::Pipe(target))
        .init();

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(())
}

fn controller_paths(cli: &Cli, config: &GlobalConfig) -> Result<ControllerPaths> {
    let cwd = std::env::current_dir().context("Failed to read current directory")?;
    let dir_name = &config.controller.dir_name;
    let root = resolve_root(&cwd, cli.loopr_root.as_deref(), dir_name).context("Failed to resolve working root")?;
    Ok(ControllerPaths::new(root, dir_name))
}

async fn run_application(cli: &Cli, config: &GlobalConfig) -> Result<()> {
    info!("Starting application");

    if cli.is_verbose() {
        println!("{}", "Verbose mode enabled".yellow());
    }

    let paths = controller_paths(cli, config)?;
    info!("Working root: {}", paths.root().display());

    match &cli.command {
        Commands::Loop {
            max_iterations,
            agent_args,
        } => handle_loop_command(&paths, config, *max_iterations, agent_args, cli.is_verbose()).await,
        Commands::Monitor { interval_ms, once } => {
            let interval = Duration::from_millis(interval_ms.unwrap_or(config.monitor.interval_ms));
            handle_monitor_command(&paths, interval, *once).await
        }
        Commands::Reset => handle_reset_command(&paths),
    }
}

async fn handle_loop_command(
    paths: &ControllerPaths,
    config: &GlobalConfig,
    max_iterations: Option<u32>,
    agent_args: &[String],
    verbose: bool,
) -> Result<()> {
    let config_path = paths.config_path();
    let loop_config = LoopConfig::load(&config_path).context(format!("Failed to load {}", config_path.display()))?;
    if verbose {
        println!("{} {:?}", "Loop config:".cyan(), loop_config);
    }

    let store = Arc::new(FileStore::open(paths.dir()).context("Failed to open controller directory")?);
    let runner = Arc::new(ProcessRunner::new(config.agent.clone(), config.controller.dir_name.clone()));
    let driver_config =
        DriverConfig::new(paths.root(), loop_config).with_handoff_path(config.controller.handoff_path.clone());
    let driver = LoopDriver::new(runner, store, driver_config);

    let options = LoopOptions {
        max_iterations,
        agent_args: agent_args.to_vec(),
        progress: None,
    }
    .with_progress(print_event);

    info!("Starting loop in {}", paths.root().display());
    let report = driver.run(&options).await.context("Loop failed")?;
    print_report(&report);
    Ok(())
}

fn print_event(event: &LoopEvent) {
    let label = format!("[{}]", event.kind.as_str());
    let label = match event.kind {
        LoopEventKind::Start => label.cyan(),
        LoopEventKind::Waiting => label.yellow(),
        LoopEventKind::Done => label.green(),
        LoopEventKind::Exit => label.magenta(),
        LoopEventKind::Error => label.red(),
    };
    if event.details.is_empty() {
        println!("{} iteration {}", label, event.iteration);
    } else {
        println!("{} iteration {}: {}", label, event.iteration, event.details);
    }
}

fn print_report(report: &LoopReport) {
    let reason = report
        .exit_reason
        .map(|reason| reason.to_string())
        .unwrap_or_else(|| "none".to_string());
    println!("{} {} iterations, exit reason {}", "Loop finished:".green(), report.iterations, reason);
    if let Some(session) = &report.last_session {
        println!("  Last transcript: {}", session.transcript_path.display());
    }
}

async fn handle_monitor_command(paths: &ControllerPaths, interval: Duration, once: bool) -> Result<()> {
    let mut monitor = Monitor::new(paths.dir().join(STATUS_FILE));
    monitor.run(interval, once).await.context("Monitor failed")?;
    Ok(())
}

fn handle_reset_command(paths: &ControllerPaths) -> Result<()> {
    info!("Resetting loop state in {}", paths.dir().display());
    if !paths.dir().is_dir() {
        println!("{} {}", "Nothing to reset in".yellow(), paths.root().display());
        return Ok(());
    }
    let store = FileStore::open(paths.dir()).context("Failed to open controller directory")?;
    store.reset().context("Failed to reset loop state")?;
    println!("{} {}", "Reset loop state for".green(), paths.root().display());
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Setup logging first
    setup_logging().context("Failed to setup logging")?;

    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration
    let config = GlobalConfig::load(cli.config.as_ref()).context("Failed to load configuration")?;

    info!("Starting with config from: {:?}", cli.config);

    // Run the main application logic
    run_application(&cli, &config).await.context("Application failed")?;

    Ok(())
}
