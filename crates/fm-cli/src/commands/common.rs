//! Shared utilities for CLI commands

use anyhow::{Context, Result};
use fm_core::{Config, Interpreters};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::cli::GlobalArgs;

/// Error type representing a non-zero process exit code.
///
/// Use `return Err(ExitCode(N).into())` instead of `std::process::exit(N)`
/// so that RAII destructors run and cleanup happens properly.
#[derive(Debug)]
pub(crate) struct ExitCode(pub(crate) i32);

impl fmt::Display for ExitCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Control flow only; main.rs never prints it.
        write!(f, "")
    }
}

impl std::error::Error for ExitCode {}

/// Paths and interpreters a command operates on
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Settings {
    /// Database path, or the target identifier in adapter mode
    pub db: String,
    pub migrations: PathBuf,
    pub interpreters: Interpreters,
}

impl Settings {
    pub(crate) fn db_path(&self) -> &Path {
        Path::new(&self.db)
    }
}

/// Load the config file named by `--config` / `FASTMIGRATE_CONFIG`, or the
/// one in `dir` if present
fn load_config(global: &GlobalArgs, dir: &Path) -> Result<Config> {
    if let Some(path) = Config::resolve_path(global.config.as_deref()) {
        return Config::load(&path).context("Failed to load config");
    }
    Ok(Config::load_from_dir(dir)
        .context("Failed to load config")?
        .unwrap_or_default())
}

/// Resolve settings with precedence: flag > config file > default.
///
/// Values from the config file are resolved against `dir`; flags are used
/// as given.
pub(crate) fn resolve_settings_in(global: &GlobalArgs, dir: &Path) -> Result<Settings> {
    let config = load_config(global, dir)?;

    let db = match &global.db {
        Some(db) => db.clone(),
        None => config.db_target(dir),
    };
    let migrations = match &global.migrations {
        Some(migrations) => PathBuf::from(migrations),
        None => config.migrations_path_absolute(dir),
    };

    log::debug!("Using database {db} and migrations {}", migrations.display());
    Ok(Settings {
        db,
        migrations,
        interpreters: config.interpreters,
    })
}

/// [`resolve_settings_in`] for the current directory
pub(crate) fn resolve_settings(global: &GlobalArgs) -> Result<Settings> {
    let cwd = std::env::current_dir().context("Failed to read current directory")?;
    resolve_settings_in(global, &cwd)
}

/// Report a library error on stderr and turn it into exit code 1
pub(crate) fn fail(err: impl fmt::Display) -> anyhow::Error {
    eprintln!("Error: {err}");
    ExitCode(1).into()
}

#[cfg(test)]
#[path = "common_test.rs"]
mod tests;
