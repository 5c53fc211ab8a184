//! CLI argument definitions for the logship daemon.
//!
//! Uses `clap` v4 derive macros to parse command-line arguments.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// logship event pipeline daemon.
///
/// Loads a pipeline configuration, wires the configured inputs, filters and
/// outputs, and runs until the inputs finish or a shutdown signal arrives.
#[derive(Parser, Debug)]
#[command(name = "logship")]
#[command(version, about, long_about = None)]
pub struct DaemonCli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Path to the pipeline configuration file (.yml, .yaml, .toml or .json).
    #[arg(short, long, env = "CONFIG", default_value = "logship.yml")]
    pub config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_level: Option<String>,

    /// Override log format (json, pretty).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_format: Option<String>,

    /// Validate configuration file and exit without starting the pipeline.
    #[arg(long)]
    pub validate: bool,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Print version information and exit.
    Version,
}

/// Version string printed by the `version` subcommand.
pub fn version_string() -> String {
    format!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
}
