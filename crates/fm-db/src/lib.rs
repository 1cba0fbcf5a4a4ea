//! fm-db - DuckDB layer for fastmigrate
//!
//! This crate owns everything that touches a native DuckDB database file:
//! the single-row `_meta` version ledger, transactional execution of SQL
//! migration batches, and the create / enroll / backup lifecycle operations.

pub mod backup;
pub mod database;
pub mod error;
pub mod ledger;

pub use backup::create_db_backup;
pub use database::{
    create_db, enroll_db, execute_sql_script, get_db_version, open_existing, set_db_version,
    with_transaction, EnrollOptions,
};
pub use error::{DbError, DbResult};
pub use ledger::META_TABLE;
