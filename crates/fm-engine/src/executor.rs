//! Dispatch of a single migration script to its runner.
//!
//! SQL scripts are handed to the backend's `execute_sql` hook as one batch.
//! Python and shell scripts are spawned as child processes with the target
//! identifier as their only argument; exit code 0 means success.

use crate::backend::{AnyConnection, DynBackend};
use fm_core::{Interpreters, MigrationScript, ScriptKind};
use std::path::Path;
use std::process::Stdio;

/// Result of running an external script
#[derive(Debug, Clone)]
pub struct ProcessOutcome {
    pub success: bool,
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

/// Run `script` with `interpreter`, passing `target` as the only argument.
///
/// The interpreter may carry its own arguments (`"uv run python"`), split
/// on whitespace. The child inherits the working directory and gets no stdin.
pub async fn run_script_process(
    interpreter: &str,
    script: &Path,
    target: &str,
) -> std::io::Result<ProcessOutcome> {
    let mut parts = interpreter.split_whitespace();
    let program = parts.next().ok_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::InvalidInput, "interpreter is empty")
    })?;

    let output = tokio::process::Command::new(program)
        .args(parts)
        .arg(script)
        .arg(target)
        .stdin(Stdio::null())
        .output()
        .await?;

    Ok(ProcessOutcome {
        success: output.status.success(),
        exit_code: output.status.code().unwrap_or(-1),
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
    })
}

/// Apply one script, returning the operator-facing diagnostic on failure
pub async fn run_script(
    backend: &dyn DynBackend,
    conn: &mut AnyConnection,
    target: &str,
    script: &MigrationScript,
    interpreters: &Interpreters,
) -> Result<(), String> {
    let path = script.path.display();
    log::debug!("Executing {} script {path}", script.kind.label());

    let interpreter = match script.kind {
        ScriptKind::Sql => {
            let sql = tokio::fs::read_to_string(&script.path)
                .await
                .map_err(|e| format!("Error reading SQL script {path}: {e}"))?;
            return backend
                .execute_sql(conn, &sql)
                .resolve()
                .await
                .map_err(|e| format!("Error executing SQL script {path}:\n{e}"));
        }
        ScriptKind::Python => &interpreters.python,
        ScriptKind::Shell => &interpreters.shell,
    };

    let label = script.kind.label();
    let outcome = run_script_process(interpreter, &script.path, target)
        .await
        .map_err(|e| format!("Error launching {label} script {path} with '{interpreter}': {e}"))?;
    if outcome.success {
        return Ok(());
    }

    let mut message = format!(
        "Error executing {label} script {path} (exit code {}):",
        outcome.exit_code
    );
    let stderr = outcome.stderr.trim_end();
    if !stderr.is_empty() {
        message.push('\n');
        message.push_str(stderr);
    }
    Err(message)
}

/// Apply one script against `conn`, printing diagnostics on failure
pub async fn execute_migration_script(
    backend: &dyn DynBackend,
    conn: &mut AnyConnection,
    target: &str,
    script: &MigrationScript,
    interpreters: &Interpreters,
) -> bool {
    match run_script(backend, conn, target, script, interpreters).await {
        Ok(()) => true,
        Err(message) => {
            eprintln!("{message}");
            false
        }
    }
}

#[cfg(test)]
#[path = "executor_test.rs"]
mod tests;
