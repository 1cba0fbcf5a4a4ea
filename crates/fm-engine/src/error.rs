//! Error types for fm-engine

use fm_core::CoreError;
use fm_db::DbError;
use thiserror::Error;

/// Errors that stop a migration run before or between scripts
#[derive(Error, Debug)]
pub enum EngineError {
    /// G001: Migrations directory missing in native mode
    #[error("[G001] Migrations directory does not exist: {path}")]
    MigrationsDirNotFound { path: String },

    /// G002: Adapter file could not be read or parsed
    #[error("[G002] Failed to load backend adapter {path}: {message}")]
    AdapterParse { path: String, message: String },

    /// G003: Adapter file lacks required hooks
    #[error("[G003] Backend adapter {path} is missing required hook(s): {hooks}")]
    MissingHooks { path: String, hooks: String },

    /// G004: Adapter hook is present but cannot be invoked
    #[error("[G004] Backend adapter {path}: hook '{hook}' is not invocable: {reason}")]
    HookNotInvocable {
        path: String,
        hook: String,
        reason: String,
    },

    /// G005: An adapter hook failed during the run
    #[error("[G005] Backend hook '{hook}' failed: {message}")]
    Hook { hook: String, message: String },

    /// G006: The async runtime could not be started or its worker died
    #[error("[G006] Migration runtime error: {0}")]
    Runtime(String),

    /// Script discovery / config error
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Native database error
    #[error(transparent)]
    Db(#[from] DbError),
}

/// Result type alias for EngineError
pub type EngineResult<T> = Result<T, EngineError>;
