// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Command-line arguments for `fleetdag`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "fleetdag",
    version,
    about = "Provision a fleet of hosts from a declarative, dependency-ordered plan.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the fleet config file (TOML).
    #[arg(long, value_name = "PATH", default_value = "Fleet.toml")]
    pub config: PathBuf,

    /// Override document merged over the config.
    ///
    /// Default: `<config-stem>.override.toml` next to the config, if present.
    #[arg(long = "override", value_name = "PATH")]
    pub override_path: Option<PathBuf>,

    /// Directory holding `scripts/`, `templates/` and `config/`.
    #[arg(long, value_name = "DIR", default_value = "deploy")]
    pub assets: PathBuf,

    /// Only run the named instance (repeatable).
    #[arg(long, value_name = "NAME")]
    pub only: Vec<String>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `FLEETDAG_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Validate config and environment, print every plan, contact no host.
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
