//! Migration orchestrator
//!
//! A run moves through `Preparing → Applying(v)… → Complete | Failed`:
//!
//! 1. Preparing: discover scripts (duplicates fail here, before any hook
//!    runs), acquire the connection, ensure the ledger, read the version and
//!    compute the pending set.
//! 2. Applying(v): execute script `v`, then record `v` in the ledger. The
//!    first failure ends the run; the ledger keeps the last recorded version.
//! 3. The connection is released exactly once, whatever the outcome.
//!
//! The pending set is recomputed from the ledger on every run, which makes
//! runs idempotent and lets a run resume after a failed script is fixed.

use crate::backend::{self, native, AnyConnection, Backend, DynBackend, HookError, NativeBackend};
use crate::error::{EngineError, EngineResult};
use crate::executor;
use crate::runtime;
use fm_core::{get_migration_scripts, Interpreters, ScriptSet, Version};
use std::path::{Path, PathBuf};

/// Options for a migration run
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Print per-script progress to stdout
    pub verbose: bool,

    /// List pending scripts without executing them
    pub dry_run: bool,

    /// Programs used for Python and shell scripts
    pub interpreters: Interpreters,
}

/// The script that stopped a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedMigration {
    pub version: Version,
    pub path: PathBuf,
    /// Operator-facing diagnostic
    pub reason: String,
}

/// Outcome of a migration run that got past preparation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationReport {
    /// Ledger version when the run started
    pub starting_version: Version,

    /// Ledger version when the run ended
    pub final_version: Version,

    /// Versions that were pending at the start, ascending
    pub pending: Vec<Version>,

    /// Versions applied and recorded during this run, in order
    pub applied: Vec<Version>,

    /// The script that failed, if any
    pub failed: Option<FailedMigration>,

    /// Whether the run only listed the pending scripts
    pub dry_run: bool,
}

impl MigrationReport {
    fn new(starting_version: Version, pending: Vec<Version>, dry_run: bool) -> Self {
        Self {
            starting_version,
            final_version: starting_version,
            pending,
            dry_run,
            ..Default::default()
        }
    }

    /// True when no script failed
    pub fn succeeded(&self) -> bool {
        self.failed.is_none()
    }

    /// Number of scripts that failed (zero or one, since a run halts)
    pub fn failed_count(&self) -> usize {
        usize::from(self.failed.is_some())
    }

    fn record_applied(&mut self, version: Version) {
        self.applied.push(version);
        self.final_version = version;
    }

    /// Report the outcome: failures always go to stderr, the success summary
    /// is printed only when `verbose`.
    pub fn print_summary(&self, verbose: bool) {
        if let Some(failed) = &self.failed {
            eprintln!("{}", failed.reason);
            eprintln!("Migration failed: {}", failed.path.display());
            eprintln!(
                "{} applied, {} failed (database at version {})",
                self.applied.len(),
                self.failed_count(),
                self.final_version
            );
        } else if verbose && !self.dry_run && !self.applied.is_empty() {
            println!(
                "Migrations complete: {} applied, 0 failed (database at version {})",
                self.applied.len(),
                self.final_version
            );
        }
    }
}

fn hook_error(hook: &'static str) -> impl FnOnce(HookError) -> EngineError {
    move |e| EngineError::Hook {
        hook: hook.to_string(),
        message: e.to_string(),
    }
}

async fn apply(
    backend: &dyn DynBackend,
    conn: &mut AnyConnection,
    target: &str,
    scripts: &ScriptSet,
    options: &RunOptions,
) -> EngineResult<MigrationReport> {
    backend
        .ensure_meta_table(conn)
        .resolve()
        .await
        .map_err(hook_error("ensure_meta_table"))?;
    let current = backend
        .get_version(conn)
        .resolve()
        .await
        .map_err(hook_error("get_version"))?;

    let pending = scripts.pending(current);
    let mut report = MigrationReport::new(
        current,
        pending.iter().map(|s| s.version).collect(),
        options.dry_run,
    );
    log::debug!(
        "Database at version {current}, {} of {} script(s) pending",
        pending.len(),
        scripts.len()
    );

    if pending.is_empty() {
        if options.verbose {
            println!("Database is up to date (version {current})");
        }
        log::debug!("Complete: nothing to apply");
        return Ok(report);
    }

    if options.dry_run {
        for script in &pending {
            println!(
                "Would apply migration {}: {}",
                script.version,
                script.file_name()
            );
        }
        return Ok(report);
    }

    for script in pending {
        let version = script.version;
        log::debug!("Applying migration {version}");
        if options.verbose {
            println!("Applying migration {version}: {}", script.file_name());
        }

        if let Err(reason) =
            executor::run_script(backend, conn, target, script, &options.interpreters).await
        {
            log::debug!("Failed at migration {version}");
            report.failed = Some(FailedMigration {
                version,
                path: script.path.clone(),
                reason,
            });
            return Ok(report);
        }

        // The script has run; only a recorded version counts as applied.
        if let Err(e) = backend.set_version(conn, version).resolve().await {
            report.failed = Some(FailedMigration {
                version,
                path: script.path.clone(),
                reason: format!("Migration {version} ran but its version could not be recorded: {e}"),
            });
            return Ok(report);
        }
        report.record_applied(version);
        if options.verbose {
            println!("Database updated to version {version}");
        }
    }

    log::debug!("Complete at version {}", report.final_version);
    Ok(report)
}

async fn drive(
    backend: &dyn DynBackend,
    target: &str,
    migrations_dir: &Path,
    options: &RunOptions,
) -> EngineResult<MigrationReport> {
    let scripts = get_migration_scripts(migrations_dir)?;
    log::debug!("Preparing with the {} backend", backend.name());

    let mut conn = backend
        .get_connection(target)
        .resolve()
        .await
        .map_err(hook_error("get_connection"))?;

    let result = apply(backend, &mut conn, target, &scripts, options).await;

    if let Err(e) = backend.close_connection(conn).resolve().await {
        log::warn!("Backend hook 'close_connection' failed: {e}");
    }
    result
}

/// Run pending migrations against `target` and return a structured report.
///
/// Errors cover everything that stops the run before the first script
/// (missing directory, unmanaged target, duplicate versions, adapter or hook
/// failures while preparing). A failing script is not an error: it is
/// recorded in [`MigrationReport::failed`].
pub async fn run_migrations_report(
    target: &str,
    migrations_dir: &Path,
    options: &RunOptions,
) -> EngineResult<MigrationReport> {
    log::debug!("Preparing migrations for {target}");
    if let Some(adapter) = backend::load_backend(migrations_dir)? {
        return drive(adapter.as_ref(), target, migrations_dir, options).await;
    }

    if !migrations_dir.is_dir() {
        return Err(EngineError::MigrationsDirNotFound {
            path: migrations_dir.display().to_string(),
        });
    }
    native::check_managed(Path::new(target))?;
    drive(&NativeBackend, target, migrations_dir, options).await
}

/// Run pending migrations with a caller-supplied backend.
///
/// Ignores any `backend.yml` in `migrations_dir`.
pub async fn run_migrations_with_backend<B: Backend>(
    target: &str,
    migrations_dir: &Path,
    backend: &B,
    options: &RunOptions,
) -> EngineResult<MigrationReport> {
    drive(backend, target, migrations_dir, options).await
}

/// Run pending migrations, printing diagnostics. Returns `true` on success.
pub async fn run_migrations_async(target: &str, migrations_dir: &Path, options: &RunOptions) -> bool {
    match run_migrations_report(target, migrations_dir, options).await {
        Ok(report) => {
            report.print_summary(options.verbose);
            report.succeeded()
        }
        Err(e) => {
            eprintln!("Error: {e}");
            false
        }
    }
}

/// Blocking form of [`run_migrations_async`].
///
/// Safe to call from inside a Tokio runtime: the run then happens on a
/// dedicated worker thread with its own runtime.
pub fn run_migrations(target: &str, migrations_dir: &Path, options: &RunOptions) -> bool {
    match runtime::block_on_isolated(|| run_migrations_async(target, migrations_dir, options)) {
        Ok(success) => success,
        Err(e) => {
            eprintln!("Error: {e}");
            false
        }
    }
}
