//! CLI command definitions using clap.
//!
//! Defines the main CLI structure and subcommands:
//! - loop: drive the agent until completion or a breaker opens
//! - monitor: follow `status.json`
//! - reset: forget loop state and call budget

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Loopr - drive an autonomous coding agent in a supervised loop
#[derive(Parser, Debug)]
#[command(name = "loopr")]
#[command(author, version, about, long_about = None)]
#[command(after_help = "Run a single controller per working root; state files are not locked.")]
pub struct Cli {
    /// Optional config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Working root (defaults to the nearest ancestor with a .loopr directory)
    #[arg(long, global = true, value_name = "DIR")]
    pub loopr_root: Option<PathBuf>,

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

/// Main subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the agent repeatedly until it completes or a breaker opens
    Loop {
        /// Override MAX_ITERATIONS for this run
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
        max_iterations: Option<u32>,

        /// Extra arguments passed to the agent before the prompt
        #[arg(last = true)]
        agent_args: Vec<String>,
    },

    /// Print status changes of a running loop
    Monitor {
        /// Poll interval in milliseconds (defaults to monitor.interval-ms)
        #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
        interval_ms: Option<u64>,

        /// Print the current status once and exit
        #[arg(long)]
        once: bool,
    },

    /// Delete loop state and call budget so the next run starts at iteration 0
    Reset,
}
