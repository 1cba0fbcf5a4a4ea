//! CLI argument definitions using clap derive API

use clap::{Args, Parser, Subcommand};

/// fastmigrate - structured, versioned migrations for DuckDB databases
#[derive(Parser, Debug)]
#[command(name = "fastmigrate")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Global options
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Global arguments available to all commands
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to the database file (or adapter target identifier)
    #[arg(long, global = true)]
    pub db: Option<String>,

    /// Path to the migrations directory
    #[arg(long, global = true)]
    pub migrations: Option<String>,

    /// Override config file path
    #[arg(short, long, global = true, env = "FASTMIGRATE_CONFIG")]
    pub config: Option<String>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Apply pending migrations
    Run(RunArgs),

    /// Create a new versioned database, or report the version of an existing one
    CreateDb,

    /// Print the database version
    CheckVersion,

    /// Mark an existing database as managed without running migrations
    EnrollDb(EnrollArgs),

    /// Write a timestamped copy of the database next to it
    BackupDb,
}

/// Arguments for the run command
#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Show which migrations would run without executing them
    #[arg(long)]
    pub dry_run: bool,
}

/// Arguments for the enroll-db command
#[derive(Args, Debug, Default)]
pub struct EnrollArgs {
    /// Version to record for the database
    #[arg(long, default_value_t = 0, value_parser = clap::value_parser!(i64).range(0..))]
    pub version: i64,

    /// Fail if the database is already versioned
    #[arg(long)]
    pub err_if_versioned: bool,
}

#[cfg(test)]
#[path = "cli_test.rs"]
mod tests;
