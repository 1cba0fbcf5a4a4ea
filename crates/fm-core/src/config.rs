//! Configuration types and parsing for .fastmigrate.yml

use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Config file names looked up in a directory, in order
pub const CONFIG_FILE_NAMES: &[&str] = &[".fastmigrate.yml", ".fastmigrate.yaml"];

/// Environment variable naming an alternative config file
pub const CONFIG_ENV_VAR: &str = "FASTMIGRATE_CONFIG";

const DEFAULT_DB_PATH: &str = "data/database.duckdb";

const DEFAULT_MIGRATIONS_DIR: &str = "migrations";

/// Project configuration from .fastmigrate.yml
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Path to the database file
    #[serde(default = "default_db_path")]
    pub db: String,

    /// Directory holding the migration scripts
    #[serde(default = "default_migrations_dir")]
    pub migrations: String,

    /// Interpreters used for external scripts
    #[serde(default)]
    pub interpreters: Interpreters,
}

/// Programs used to run the non-SQL script kinds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Interpreters {
    /// Interpreter for `.py` scripts
    #[serde(default = "default_python")]
    pub python: String,

    /// Interpreter for `.sh` scripts
    #[serde(default = "default_shell")]
    pub shell: String,
}

impl Default for Interpreters {
    fn default() -> Self {
        Self {
            python: default_python(),
            shell: default_shell(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db: default_db_path(),
            migrations: default_migrations_dir(),
            interpreters: Interpreters::default(),
        }
    }
}

fn default_db_path() -> String {
    DEFAULT_DB_PATH.to_string()
}

fn default_migrations_dir() -> String {
    DEFAULT_MIGRATIONS_DIR.to_string()
}

fn default_python() -> String {
    "python3".to_string()
}

fn default_shell() -> String {
    "sh".to_string()
}

impl Config {
    /// Load configuration from a file path
    pub fn load(path: &Path) -> CoreResult<Self> {
        if !path.exists() {
            return Err(CoreError::ConfigNotFound {
                path: path.display().to_string(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| CoreError::IoWithPath {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::parse(&content, path)
    }

    /// Parse configuration text; `origin` is only used in error messages
    pub fn parse(content: &str, origin: &Path) -> CoreResult<Self> {
        // An empty file is a valid config with every default.
        let config: Config = if content.trim().is_empty() {
            Config::default()
        } else {
            serde_yaml::from_str(content).map_err(|e| CoreError::ConfigParseError {
                path: origin.display().to_string(),
                message: e.to_string(),
            })?
        };
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a directory, if one of [`CONFIG_FILE_NAMES`] exists.
    ///
    /// Returns `Ok(None)` when no config file is present.
    pub fn load_from_dir(dir: &Path) -> CoreResult<Option<Self>> {
        for name in CONFIG_FILE_NAMES {
            let path = dir.join(name);
            if path.exists() {
                return Self::load(&path).map(Some);
            }
        }
        Ok(None)
    }

    /// Resolve the config file path from a CLI flag or `FASTMIGRATE_CONFIG`
    pub fn resolve_path(cli_config: Option<&str>) -> Option<PathBuf> {
        cli_config
            .map(PathBuf::from)
            .or_else(|| std::env::var(CONFIG_ENV_VAR).ok().map(PathBuf::from))
    }

    /// Validate the configuration
    fn validate(&self) -> CoreResult<()> {
        if self.db.trim().is_empty() {
            return Err(CoreError::ConfigInvalid {
                message: "'db' cannot be empty".to_string(),
            });
        }
        if self.migrations.trim().is_empty() {
            return Err(CoreError::ConfigInvalid {
                message: "'migrations' cannot be empty".to_string(),
            });
        }
        for (key, value) in [
            ("interpreters.python", &self.interpreters.python),
            ("interpreters.shell", &self.interpreters.shell),
        ] {
            if value.trim().is_empty() {
                return Err(CoreError::ConfigInvalid {
                    message: format!("'{key}' cannot be empty"),
                });
            }
        }
        Ok(())
    }

    /// Database target resolved against `root`.
    ///
    /// URI-style targets (`scheme://...`) meant for a backend adapter are
    /// returned unchanged.
    pub fn db_target(&self, root: &Path) -> String {
        if self.db.contains("://") {
            return self.db.clone();
        }
        root.join(&self.db).to_string_lossy().into_owned()
    }

    /// Migrations directory resolved against `root`
    pub fn migrations_path_absolute(&self, root: &Path) -> PathBuf {
        root.join(&self.migrations)
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
