//! Single-row version ledger stored in the `_meta` table.
//!
//! The row is keyed by the constant `id = 1` (enforced by a `CHECK`), which
//! turns "set version" into an upsert and keeps the table from ever holding
//! more than one row.

use crate::database::with_transaction;
use crate::error::{DbError, DbResult};
use duckdb::Connection;

/// Name of the ledger table
pub const META_TABLE: &str = "_meta";

const CREATE_META_SQL: &str = "CREATE TABLE _meta (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    version INTEGER NOT NULL DEFAULT 0
)";

/// Outcome of [`ensure_meta_table`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerStatus {
    /// The table was already in the current shape
    Current,
    /// A fresh table was created at version 0
    Created,
    /// A legacy table was converted, preserving its version
    Upgraded,
    /// A legacy table could not be converted and was reset to version 0
    Reset,
}

/// Check whether the `_meta` table exists in the main schema
pub fn meta_table_exists(conn: &Connection) -> DbResult<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM duckdb_tables() WHERE schema_name = 'main' AND table_name = ?",
        duckdb::params![META_TABLE],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Check whether `_meta` carries the fixed-identity primary key
fn has_fixed_identity(conn: &Connection) -> DbResult<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM duckdb_constraints()
         WHERE schema_name = 'main' AND table_name = ? AND constraint_type = 'PRIMARY KEY'",
        duckdb::params![META_TABLE],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

fn create_fresh(conn: &Connection, version: i64) -> DbResult<()> {
    conn.execute_batch(CREATE_META_SQL)?;
    conn.execute(
        "INSERT INTO _meta (id, version) VALUES (1, ?)",
        duckdb::params![version],
    )?;
    Ok(())
}

/// Read the version out of a legacy `_meta` table (any shape with a
/// `version` column). An empty table counts as version 0.
fn read_legacy_version(conn: &Connection) -> DbResult<i64> {
    let mut stmt = conn.prepare("SELECT version FROM _meta LIMIT 1")?;
    let mut rows = stmt.query([])?;
    match rows.next()? {
        Some(row) => Ok(row.get(0)?),
        None => Ok(0),
    }
}

fn upgrade_legacy(conn: &Connection) -> DbResult<i64> {
    let version = read_legacy_version(conn)?;
    with_transaction(conn, |conn| {
        conn.execute_batch("ALTER TABLE _meta RENAME TO _meta_old")?;
        create_fresh(conn, version)?;
        conn.execute_batch("DROP TABLE _meta_old")?;
        Ok(())
    })?;
    Ok(version)
}

/// Create `_meta` at `version` if it does not exist yet.
///
/// Returns `false` without touching anything when the table is present.
pub fn create_meta_table(conn: &Connection, version: i64) -> DbResult<bool> {
    if meta_table_exists(conn)? {
        return Ok(false);
    }
    with_transaction(conn, |conn| create_fresh(conn, version))?;
    Ok(true)
}

/// Guarantee that `_meta` exists in the current single-row shape.
///
/// A missing table is created at version 0. A legacy table without the
/// fixed-identity key has its version carried over into the new shape; if
/// that conversion fails the ledger is reset to version 0.
pub fn ensure_meta_table(conn: &Connection) -> DbResult<LedgerStatus> {
    if !meta_table_exists(conn)? {
        create_meta_table(conn, 0)?;
        return Ok(LedgerStatus::Created);
    }

    if has_fixed_identity(conn)? {
        return Ok(LedgerStatus::Current);
    }

    match upgrade_legacy(conn) {
        Ok(version) => {
            log::warn!("Converted legacy _meta table to single-row format (version {version})");
            Ok(LedgerStatus::Upgraded)
        }
        Err(e) => {
            log::warn!("Failed to convert legacy _meta table, resetting to version 0: {e}");
            with_transaction(conn, |conn| {
                conn.execute_batch("DROP TABLE IF EXISTS _meta_old; DROP TABLE IF EXISTS _meta;")?;
                create_fresh(conn, 0)
            })?;
            Ok(LedgerStatus::Reset)
        }
    }
}

/// Read the current version.
///
/// Returns `Ok(None)` when the ledger is absent, which callers must treat
/// as an unmanaged database rather than version 0.
pub fn get_version(conn: &Connection) -> DbResult<Option<i64>> {
    if !meta_table_exists(conn)? {
        return Ok(None);
    }
    if !has_fixed_identity(conn)? {
        return read_legacy_version(conn).map(Some);
    }
    let mut stmt = conn.prepare("SELECT version FROM _meta WHERE id = 1")?;
    let mut rows = stmt.query([])?;
    match rows.next()? {
        Some(row) => Ok(Some(row.get(0)?)),
        None => Ok(None),
    }
}

/// Upsert the ledger row to `version`
pub fn set_version(conn: &Connection, version: i64) -> DbResult<()> {
    if version < 0 {
        return Err(DbError::Execution(format!(
            "refusing to record negative version {version}"
        )));
    }
    with_transaction(conn, |conn| {
        conn.execute(
            "INSERT OR REPLACE INTO _meta (id, version) VALUES (1, ?)",
            duckdb::params![version],
        )?;
        Ok(())
    })
}

#[cfg(test)]
#[path = "ledger_test.rs"]
mod tests;
