//! DuckDB database lifecycle and SQL batch execution

use crate::error::{DbError, DbResult};
use crate::ledger;
use duckdb::Connection;
use std::path::Path;

/// Open an existing database file.
///
/// Unlike [`Connection::open`], this never creates a new file: a missing
/// path is reported as [`DbError::DatabaseNotFound`].
pub fn open_existing(path: &Path) -> DbResult<Connection> {
    if !path.is_file() {
        return Err(DbError::DatabaseNotFound {
            path: path.display().to_string(),
        });
    }
    Connection::open(path).map_err(|e| DbError::Connection(format!("{e}: {}", path.display())))
}

/// Execute `body` within a `BEGIN` / `COMMIT` transaction, rolling back on
/// error.
pub fn with_transaction<F, T>(conn: &Connection, body: F) -> DbResult<T>
where
    F: FnOnce(&Connection) -> DbResult<T>,
{
    conn.execute_batch("BEGIN TRANSACTION")
        .map_err(|e| DbError::Transaction(format!("BEGIN failed: {e}")))?;

    let result = body(conn);

    match &result {
        Ok(_) => {
            if let Err(commit_err) = conn.execute_batch("COMMIT") {
                let _ = conn.execute_batch("ROLLBACK");
                return Err(DbError::Transaction(format!(
                    "COMMIT failed: {commit_err}"
                )));
            }
        }
        Err(_) => {
            let _ = conn.execute_batch("ROLLBACK");
        }
    }
    result
}

/// Execute a SQL migration batch as a single transaction.
///
/// Any failing statement rolls back every statement before it, so a failed
/// script leaves the database as it was.
pub fn execute_sql_script(conn: &Connection, sql: &str) -> DbResult<()> {
    if sql.trim().is_empty() {
        return Ok(());
    }
    with_transaction(conn, |conn| {
        conn.execute_batch(sql)?;
        Ok(())
    })
}

/// Create a new managed database, or report the version of an existing one.
///
/// - missing file: created (with parent directories) at version 0
/// - existing managed database: its current version is returned
/// - existing database without `_meta`: [`DbError::Unmanaged`]
pub fn create_db(path: &Path) -> DbResult<i64> {
    if path.exists() {
        return get_db_version(path);
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| DbError::Io {
            path: parent.display().to_string(),
            source: e,
        })?;
    }

    let conn = Connection::open(path)
        .map_err(|e| DbError::Connection(format!("{e}: {}", path.display())))?;
    ledger::create_meta_table(&conn, 0)?;
    log::debug!("Created versioned database at {}", path.display());
    Ok(0)
}

/// Options for [`enroll_db`]
#[derive(Debug, Clone, Copy, Default)]
pub struct EnrollOptions {
    /// Fail instead of returning `false` when the database is already versioned
    pub err_if_versioned: bool,

    /// Version to record for the enrolled database
    pub version: i64,
}

/// Mark an existing database as managed without running any migrations.
///
/// Returns `true` when the ledger was created and `false` when the database
/// was already versioned (unless `err_if_versioned` is set). Existing tables
/// are left untouched.
pub fn enroll_db(path: &Path, options: EnrollOptions) -> DbResult<bool> {
    let conn = open_existing(path)?;

    if ledger::meta_table_exists(&conn)? {
        if options.err_if_versioned {
            return Err(DbError::AlreadyExists {
                what: "Version table".to_string(),
                path: path.display().to_string(),
            });
        }
        return Ok(false);
    }

    if options.version < 0 {
        return Err(DbError::Execution(format!(
            "cannot enroll at negative version {}",
            options.version
        )));
    }
    ledger::create_meta_table(&conn, options.version)
}

/// Read the version of the database at `path`.
///
/// A missing file is [`DbError::DatabaseNotFound`]; a database with no
/// ledger is [`DbError::Unmanaged`], never version 0.
pub fn get_db_version(path: &Path) -> DbResult<i64> {
    let conn = open_existing(path)?;
    ledger::get_version(&conn)?.ok_or_else(|| DbError::Unmanaged {
        path: path.display().to_string(),
    })
}

/// Record `version` in the ledger of the database at `path`
pub fn set_db_version(path: &Path, version: i64) -> DbResult<()> {
    let conn = open_existing(path)?;
    if !ledger::meta_table_exists(&conn)? {
        return Err(DbError::Unmanaged {
            path: path.display().to_string(),
        });
    }
    ledger::set_version(&conn, version)
}

#[cfg(test)]
#[path = "database_test.rs"]
mod tests;
