//! fm-engine - Migration engine for fastmigrate
//!
//! Applies the pending migration scripts of a directory to a target in
//! ascending version order, advancing the version ledger after each
//! success and halting on the first failure.
//!
//! Targets are native DuckDB files by default. A `backend.yml` file inside
//! the migrations directory switches the run to a command-based
//! [`backend::Backend`] adapter, and any other adapter can be supplied
//! programmatically through [`run_migrations_with_backend`].

pub mod backend;
pub mod error;
pub mod executor;
pub mod orchestrator;
pub(crate) mod runtime;

pub use backend::{
    load_backend, AnyConnection, Backend, BackendHandle, Deferred, DynBackend, HookError,
    HookResult, BACKEND_FILE,
};
pub use error::{EngineError, EngineResult};
pub use orchestrator::{
    run_migrations, run_migrations_async, run_migrations_report, run_migrations_with_backend,
    FailedMigration, MigrationReport, RunOptions,
};

pub use fm_core::{get_migration_scripts, MigrationScript, ScriptKind, ScriptSet, Version};
pub use fm_db::{create_db, create_db_backup, enroll_db, get_db_version, EnrollOptions};
