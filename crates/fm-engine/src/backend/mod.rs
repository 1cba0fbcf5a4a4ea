//! Backend adapter contract
//!
//! A backend is a bundle of hooks the orchestrator calls instead of touching
//! the database itself: five required hooks and an optional
//! `close_connection`. Every hook returns a [`Deferred`], so an adapter is
//! free to answer synchronously or hand back a future.
//!
//! Implementations are written against the typed [`Backend`] trait. The
//! orchestrator talks to the object-safe [`DynBackend`] form, which every
//! `Backend` gets for free and which hides the connection type behind
//! [`AnyConnection`].

pub mod command;
pub mod deferred;
pub mod native;

pub use command::CommandBackend;
pub use deferred::{Deferred, HookError, HookResult};
pub use native::NativeBackend;

use crate::error::EngineResult;
use fm_core::Version;
use std::any::Any;
use std::path::Path;

/// File inside the migrations directory that switches a run to adapter mode
pub const BACKEND_FILE: &str = "backend.yml";

/// Names of the hooks every adapter must provide
pub const REQUIRED_HOOKS: &[&str] = &[
    "get_connection",
    "ensure_meta_table",
    "get_version",
    "set_version",
    "execute_sql",
];

/// Name of the optional release hook
pub const OPTIONAL_HOOK: &str = "close_connection";

/// Hook set for a migration target
pub trait Backend: Send + Sync {
    /// Connection object passed between hooks
    type Connection: Send + 'static;

    /// Short name used in log output
    fn name(&self) -> &str {
        "custom"
    }

    /// Open a connection for the target identifier passed to the run
    fn get_connection<'a>(&'a self, target: &'a str) -> Deferred<'a, Self::Connection>;

    /// Make sure the version ledger exists, defaulting to version 0
    fn ensure_meta_table<'a>(&'a self, conn: &'a mut Self::Connection) -> Deferred<'a, ()>;

    /// Read the current version
    fn get_version<'a>(&'a self, conn: &'a mut Self::Connection) -> Deferred<'a, Version>;

    /// Record `version` as the current version
    fn set_version<'a>(
        &'a self,
        conn: &'a mut Self::Connection,
        version: Version,
    ) -> Deferred<'a, ()>;

    /// Apply the full text of a SQL migration
    fn execute_sql<'a>(&'a self, conn: &'a mut Self::Connection, sql: &'a str)
        -> Deferred<'a, ()>;

    /// Release the connection at the end of the run
    fn close_connection(&self, conn: Self::Connection) -> Deferred<'_, ()> {
        drop(conn);
        Deferred::ready(Ok(()))
    }
}

/// Type-erased connection handed out by a [`DynBackend`]
pub type AnyConnection = Box<dyn Any + Send>;

/// Object-safe form of [`Backend`]
pub trait DynBackend: Send + Sync {
    /// Short name used in log output
    fn name(&self) -> &str;

    /// See [`Backend::get_connection`]
    fn get_connection<'a>(&'a self, target: &'a str) -> Deferred<'a, AnyConnection>;

    /// See [`Backend::ensure_meta_table`]
    fn ensure_meta_table<'a>(&'a self, conn: &'a mut AnyConnection) -> Deferred<'a, ()>;

    /// See [`Backend::get_version`]
    fn get_version<'a>(&'a self, conn: &'a mut AnyConnection) -> Deferred<'a, Version>;

    /// See [`Backend::set_version`]
    fn set_version<'a>(&'a self, conn: &'a mut AnyConnection, version: Version)
        -> Deferred<'a, ()>;

    /// See [`Backend::execute_sql`]
    fn execute_sql<'a>(&'a self, conn: &'a mut AnyConnection, sql: &'a str) -> Deferred<'a, ()>;

    /// See [`Backend::close_connection`]
    fn close_connection(&self, conn: AnyConnection) -> Deferred<'_, ()>;
}

/// Owned handle returned by [`load_backend`]
pub type BackendHandle = Box<dyn DynBackend>;

fn connection_mismatch<'a, T: Send + 'a>(backend: &str) -> Deferred<'a, T> {
    Deferred::ready(Err(HookError::new(format!(
        "connection was not created by the '{backend}' backend"
    ))))
}

impl<B: Backend> DynBackend for B {
    fn name(&self) -> &str {
        Backend::name(self)
    }

    fn get_connection<'a>(&'a self, target: &'a str) -> Deferred<'a, AnyConnection> {
        Backend::get_connection(self, target).map(|conn| Box::new(conn) as AnyConnection)
    }

    fn ensure_meta_table<'a>(&'a self, conn: &'a mut AnyConnection) -> Deferred<'a, ()> {
        match conn.as_mut().downcast_mut::<B::Connection>() {
            Some(conn) => Backend::ensure_meta_table(self, conn),
            None => connection_mismatch(Backend::name(self)),
        }
    }

    fn get_version<'a>(&'a self, conn: &'a mut AnyConnection) -> Deferred<'a, Version> {
        match conn.as_mut().downcast_mut::<B::Connection>() {
            Some(conn) => Backend::get_version(self, conn),
            None => connection_mismatch(Backend::name(self)),
        }
    }

    fn set_version<'a>(
        &'a self,
        conn: &'a mut AnyConnection,
        version: Version,
    ) -> Deferred<'a, ()> {
        match conn.as_mut().downcast_mut::<B::Connection>() {
            Some(conn) => Backend::set_version(self, conn, version),
            None => connection_mismatch(Backend::name(self)),
        }
    }

    fn execute_sql<'a>(&'a self, conn: &'a mut AnyConnection, sql: &'a str) -> Deferred<'a, ()> {
        match conn.as_mut().downcast_mut::<B::Connection>() {
            Some(conn) => Backend::execute_sql(self, conn, sql),
            None => connection_mismatch(Backend::name(self)),
        }
    }

    fn close_connection(&self, conn: AnyConnection) -> Deferred<'_, ()> {
        match conn.downcast::<B::Connection>() {
            Ok(conn) => Backend::close_connection(self, *conn),
            Err(_) => connection_mismatch(Backend::name(self)),
        }
    }
}

/// Load the backend adapter declared in `migrations_dir`, if any.
///
/// Returns `Ok(None)` when [`BACKEND_FILE`] is absent, meaning the run uses
/// the native DuckDB backend. A present but malformed file is an error.
pub fn load_backend(migrations_dir: &Path) -> EngineResult<Option<BackendHandle>> {
    let path = migrations_dir.join(BACKEND_FILE);
    if !path.is_file() {
        return Ok(None);
    }
    let backend = CommandBackend::from_file(&path)?;
    log::debug!("Loaded backend adapter from {}", path.display());
    Ok(Some(Box::new(backend)))
}

#[cfg(test)]
#[path = "backend_test.rs"]
mod tests;
