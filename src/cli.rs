// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};

use crate::config::default_config_path;
use crate::types::parse_duration;

/// Command-line arguments for `polypack`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "polypack",
    version,
    about = "Build several bundler configurations at once, watch them, and run their output.",
    long_about = None
)]
pub struct CliArgs {
    /// Task to run: dist, watch, run or watch-and-run.
    #[arg(value_name = "TASK")]
    pub task: String,

    /// Path to the project file (TOML).
    ///
    /// Default: `Polypack.toml` in the current working directory.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `POLYPACK_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse + validate, print the signed configurations and the pipeline,
    /// but don't build anything.
    #[arg(long)]
    pub dry_run: bool,

    /// Override `[config].batch_timeout`, e.g. `30s`.
    #[arg(long, value_name = "DURATION", value_parser = parse_duration)]
    pub timeout: Option<Duration>,

    /// Arguments passed through to launched runtimes (after `--`).
    #[arg(last = true, value_name = "ARGS")]
    pub passthrough: Vec<String>,
}

impl CliArgs {
    /// The project file to load: `--config`, or the default path.
    pub fn config_path(&self) -> PathBuf {
        self.config.clone().unwrap_or_else(default_config_path)
    }
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
