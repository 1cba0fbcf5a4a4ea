//! Native DuckDB backend
//!
//! Every hook opens its own short-lived connection to the database file.
//! DuckDB allows a single writing process per file, so no handle may stay
//! open while a Python or shell migration is running against the same path.

use super::{Backend, Deferred, HookError};
use fm_core::Version;
use fm_db::{ledger, DbError, DbResult};
use std::path::{Path, PathBuf};

/// Backend applying migrations to a local DuckDB file
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeBackend;

/// Connection state for [`NativeBackend`]: the database path only
#[derive(Debug, Clone)]
pub struct NativeConnection {
    path: PathBuf,
}

impl NativeConnection {
    /// Path of the database file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Check that `path` is an existing database carrying a `_meta` ledger.
///
/// This runs before the ledger is ensured, so an unmanaged database is
/// refused instead of being silently initialised at version 0.
pub fn check_managed(path: &Path) -> DbResult<()> {
    let conn = fm_db::open_existing(path)?;
    if !ledger::meta_table_exists(&conn)? {
        return Err(DbError::Unmanaged {
            path: path.display().to_string(),
        });
    }
    Ok(())
}

impl Backend for NativeBackend {
    type Connection = NativeConnection;

    fn name(&self) -> &str {
        "duckdb"
    }

    fn get_connection<'a>(&'a self, target: &'a str) -> Deferred<'a, NativeConnection> {
        let path = PathBuf::from(target);
        if !path.is_file() {
            return Deferred::ready(Err(DbError::DatabaseNotFound {
                path: path.display().to_string(),
            }
            .into()));
        }
        Deferred::ready(Ok(NativeConnection { path }))
    }

    fn ensure_meta_table<'a>(&'a self, conn: &'a mut NativeConnection) -> Deferred<'a, ()> {
        let result = fm_db::open_existing(&conn.path)
            .and_then(|db| ledger::ensure_meta_table(&db))
            .map(|status| log::debug!("Ledger status for {}: {status:?}", conn.path.display()));
        Deferred::ready(result.map_err(HookError::from))
    }

    fn get_version<'a>(&'a self, conn: &'a mut NativeConnection) -> Deferred<'a, Version> {
        let result = fm_db::open_existing(&conn.path)
            .and_then(|db| ledger::get_version(&db))
            .and_then(|version| {
                version.ok_or_else(|| DbError::Unmanaged {
                    path: conn.path.display().to_string(),
                })
            });
        Deferred::ready(result.map_err(HookError::from))
    }

    fn set_version<'a>(
        &'a self,
        conn: &'a mut NativeConnection,
        version: Version,
    ) -> Deferred<'a, ()> {
        let result =
            fm_db::open_existing(&conn.path).and_then(|db| ledger::set_version(&db, version));
        Deferred::ready(result.map_err(HookError::from))
    }

    fn execute_sql<'a>(&'a self, conn: &'a mut NativeConnection, sql: &'a str) -> Deferred<'a, ()> {
        let result =
            fm_db::open_existing(&conn.path).and_then(|db| fm_db::execute_sql_script(&db, sql));
        Deferred::ready(result.map_err(HookError::from))
    }
}
