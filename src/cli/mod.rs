//! CLI module for loopr - command-line interface and subcommands.
//!
//! Provides the main entry point with subcommands for running the loop,
//! monitoring it, and resetting its state.

pub mod commands;

pub use commands::Cli;
