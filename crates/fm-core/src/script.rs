//! Migration script model and filename parsing

use regex::Regex;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// A migration version number.
///
/// Filenames carry at most four digits, but the ledger stores a plain
/// integer, so the wider type is used everywhere.
pub type Version = i64;

static FILENAME_RE: OnceLock<Regex> = OnceLock::new();

/// `NNNN-slug.ext`, where the slug contains no dots and ext is sql, py or sh.
fn filename_regex() -> &'static Regex {
    FILENAME_RE.get_or_init(|| {
        Regex::new(r"^([0-9]{4})-[^.]*\.(sql|py|sh)$").expect("valid regex")
    })
}

/// How a migration script is applied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScriptKind {
    /// SQL text executed as one batch against the database
    Sql,
    /// Python script run as a child process
    Python,
    /// Shell script run through a shell interpreter
    Shell,
}

impl ScriptKind {
    /// Map a file extension (without the dot) to a script kind
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "sql" => Some(ScriptKind::Sql),
            "py" => Some(ScriptKind::Python),
            "sh" => Some(ScriptKind::Shell),
            _ => None,
        }
    }

    /// Human-readable label used in diagnostics
    pub fn label(&self) -> &'static str {
        match self {
            ScriptKind::Sql => "SQL",
            ScriptKind::Python => "Python",
            ScriptKind::Shell => "shell",
        }
    }
}

impl fmt::Display for ScriptKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScriptKind::Sql => write!(f, "sql"),
            ScriptKind::Python => write!(f, "py"),
            ScriptKind::Shell => write!(f, "sh"),
        }
    }
}

/// A discovered migration script
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationScript {
    /// Version parsed from the filename prefix
    pub version: Version,

    /// Location of the script on disk
    pub path: PathBuf,

    /// Runner to dispatch to
    pub kind: ScriptKind,
}

impl MigrationScript {
    /// Build a script from a path whose file name follows the naming contract.
    ///
    /// Returns `None` when the file name does not match.
    pub fn from_path(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_str()?;
        let caps = filename_regex().captures(name)?;
        let version = caps.get(1)?.as_str().parse().ok()?;
        let kind = ScriptKind::from_extension(caps.get(2)?.as_str())?;
        Some(Self {
            version,
            path: path.to_path_buf(),
            kind,
        })
    }

    /// The script's file name, for progress output
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

/// Extract the version number from a migration script filename.
///
/// Returns `None` for anything that is not `NNNN-slug.{sql,py,sh}`.
pub fn extract_version_from_filename(filename: &str) -> Option<Version> {
    filename_regex()
        .captures(filename)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

#[cfg(test)]
#[path = "script_test.rs"]
mod tests;
