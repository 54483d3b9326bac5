// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

/// Command-line arguments for `persched`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "persched",
    version,
    about = "Run recurring tasks on fixed intervals, persisting last-run times across restarts.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `Persched.toml` in the current working directory. If the file
    /// does not exist, built-in defaults are used (no state file, persist
    /// every tick).
    #[arg(long, value_name = "PATH", default_value = "Persched.toml")]
    pub config: String,

    /// Run a single poll-and-persist tick, then exit.
    #[arg(long)]
    pub once: bool,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `PERSCHED_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse + validate the config, print effective settings, but don't
    /// start the driver loop.
    #[arg(long)]
    pub dry_run: bool,
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
