//! Error types for fm-db

use thiserror::Error;

/// Database operation errors
#[derive(Error, Debug)]
pub enum DbError {
    /// Connection error (D001)
    #[error("[D001] Database connection failed: {0}")]
    Connection(String),

    /// Query execution error (D002)
    #[error("[D002] SQL execution failed: {0}")]
    Execution(String),

    /// Database file does not exist (D003)
    #[error("[D003] Database does not exist: {path}")]
    DatabaseNotFound { path: String },

    /// Database exists but has no version ledger (D004)
    #[error(
        "[D004] Database is not managed by fastmigrate: {path} has no _meta table. \
         Run `fastmigrate create-db` for a new database or `fastmigrate enroll-db` \
         to enroll an existing one"
    )]
    Unmanaged { path: String },

    /// Target of a create operation already exists (D005)
    #[error("[D005] {what} already exists: {path}")]
    AlreadyExists { what: String, path: String },

    /// Transaction management error (D006)
    #[error("[D006] Transaction failed: {0}")]
    Transaction(String),

    /// IO error with file path context (D007)
    #[error("[D007] IO error on '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    /// Backup copy did not verify (D008)
    #[error("[D008] Backup verification failed for {path}: {message}")]
    BackupVerification { path: String, message: String },
}

/// Result type alias for DbError
pub type DbResult<T> = Result<T, DbError>;

impl From<duckdb::Error> for DbError {
    fn from(err: duckdb::Error) -> Self {
        DbError::Execution(err.to_string())
    }
}
