//! Error types for fm-core

use thiserror::Error;

/// Core error type for fastmigrate
#[derive(Error, Debug)]
pub enum CoreError {
    /// F001: Configuration file not found
    #[error("[F001] Config file not found: {path}")]
    ConfigNotFound { path: String },

    /// F002: Failed to parse configuration file
    #[error("[F002] Failed to parse config {path}: {message}")]
    ConfigParseError { path: String, message: String },

    /// F003: Invalid configuration value
    #[error("[F003] Invalid config: {message}")]
    ConfigInvalid { message: String },

    /// F004: Two migration scripts share a version number
    #[error("[F004] Duplicate migration version {version}: {first} and {second}")]
    DuplicateVersion {
        version: i64,
        first: String,
        second: String,
    },

    /// F005: IO error with file path context
    #[error("[F005] Failed to read '{path}': {source}")]
    IoWithPath {
        path: String,
        source: std::io::Error,
    },
}

/// Result type alias for CoreError
pub type CoreResult<T> = Result<T, CoreError>;
