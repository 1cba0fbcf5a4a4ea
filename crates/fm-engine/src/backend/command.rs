//! Command-based backend adapter declared in `backend.yml`
//!
//! Each hook is an external command. A string value runs through the
//! configured shell (`sh -c` by default), a list value is executed directly
//! as argv. Hooks run with the migrations directory as their working
//! directory and receive their inputs through the environment:
//!
//! | variable                 | set for                                   |
//! |--------------------------|-------------------------------------------|
//! | `FASTMIGRATE_TARGET`     | every hook                                |
//! | `FASTMIGRATE_CONNECTION` | every hook after `get_connection`         |
//! | `FASTMIGRATE_VERSION`    | `set_version`                             |
//!
//! `execute_sql` receives the SQL text on stdin. `get_connection` prints the
//! connection value on stdout (the target is used when it prints nothing) and
//! `get_version` prints the current version.
//!
//! ```yaml
//! shell: bash
//! get_connection: echo "$FASTMIGRATE_TARGET"
//! ensure_meta_table: ./ledger.sh ensure
//! get_version: ./ledger.sh get
//! set_version: ./ledger.sh set
//! execute_sql: [psql, --single-transaction, -f, "-"]
//! close_connection: ./ledger.sh close
//! ```

use super::{Backend, Deferred, HookError, HookResult, OPTIONAL_HOOK, REQUIRED_HOOKS};
use crate::error::{EngineError, EngineResult};
use fm_core::Version;
use serde_yaml::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::AsyncWriteExt;

/// Environment variable carrying the run's target identifier
pub const TARGET_ENV: &str = "FASTMIGRATE_TARGET";

/// Environment variable carrying the value printed by `get_connection`
pub const CONNECTION_ENV: &str = "FASTMIGRATE_CONNECTION";

/// Environment variable carrying the version passed to `set_version`
pub const VERSION_ENV: &str = "FASTMIGRATE_VERSION";

const SHELL_KEY: &str = "shell";

const DEFAULT_SHELL: &str = "sh";

/// A single hook command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookCommand {
    /// Command line interpreted by the shell
    Shell(String),
    /// Program and arguments, executed without a shell
    Argv(Vec<String>),
}

impl HookCommand {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::String(s) if s.trim().is_empty() => Err("command is empty".to_string()),
            Value::String(s) => Ok(HookCommand::Shell(s.clone())),
            Value::Sequence(items) => {
                let argv = items
                    .iter()
                    .map(|item| match item {
                        Value::String(s) => Ok(s.clone()),
                        _ => Err("command list items must be strings".to_string()),
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                match argv.first() {
                    None => Err("command list is empty".to_string()),
                    Some(program) if program.trim().is_empty() => {
                        Err("program name is empty".to_string())
                    }
                    Some(_) => Ok(HookCommand::Argv(argv)),
                }
            }
            Value::Null => Err("no command given".to_string()),
            Value::Bool(_) => Err("expected a command string or list, found a boolean".to_string()),
            Value::Number(_) => Err("expected a command string or list, found a number".to_string()),
            Value::Mapping(_) => {
                Err("expected a command string or list, found a mapping".to_string())
            }
            Value::Tagged(_) => Err("expected a command string or list".to_string()),
        }
    }
}

/// Connection state for [`CommandBackend`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandConnection {
    target: String,
    handle: String,
}

impl CommandConnection {
    /// Target identifier passed to the run
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Value printed by the `get_connection` hook
    pub fn handle(&self) -> &str {
        &self.handle
    }
}

/// Inputs for one hook invocation
#[derive(Default)]
struct HookCall<'a> {
    target: &'a str,
    connection: Option<&'a str>,
    version: Option<Version>,
    stdin: Option<&'a str>,
}

/// Backend whose hooks are external commands
#[derive(Debug, Clone)]
pub struct CommandBackend {
    hooks: BTreeMap<String, HookCommand>,
    shell: String,
    base_dir: PathBuf,
}

impl CommandBackend {
    /// Load an adapter file; hooks run from the file's directory
    pub fn from_file(path: &Path) -> EngineResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| EngineError::AdapterParse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        Self::parse(&content, path, base_dir)
    }

    /// Parse adapter text; `origin` is only used in error messages
    pub fn parse(content: &str, origin: &Path, base_dir: PathBuf) -> EngineResult<Self> {
        let origin_str = origin.display().to_string();
        let parse_err = |message: String| EngineError::AdapterParse {
            path: origin_str.clone(),
            message,
        };

        let value: Value = serde_yaml::from_str(content).map_err(|e| parse_err(e.to_string()))?;
        let mapping = match value {
            Value::Mapping(mapping) => mapping,
            Value::Null => serde_yaml::Mapping::new(),
            _ => {
                return Err(parse_err(
                    "expected a mapping of hook names to commands".to_string(),
                ))
            }
        };

        let mut entries = BTreeMap::new();
        for (key, value) in mapping {
            let Value::String(key) = key else {
                return Err(parse_err("hook names must be strings".to_string()));
            };
            entries.insert(key, value);
        }

        let missing: Vec<&str> = REQUIRED_HOOKS
            .iter()
            .copied()
            .filter(|hook| !entries.contains_key(*hook))
            .collect();
        if !missing.is_empty() {
            return Err(EngineError::MissingHooks {
                path: origin_str.clone(),
                hooks: missing.join(", "),
            });
        }

        let mut shell = DEFAULT_SHELL.to_string();
        let mut hooks = BTreeMap::new();
        for (key, value) in entries {
            if key == SHELL_KEY {
                shell = match value {
                    Value::String(s) if !s.trim().is_empty() => s.trim().to_string(),
                    _ => return Err(parse_err("'shell' must be a program name".to_string())),
                };
                continue;
            }
            if !REQUIRED_HOOKS.contains(&key.as_str()) && key != OPTIONAL_HOOK {
                log::warn!("Ignoring unknown key '{key}' in backend adapter {origin_str}");
                continue;
            }
            let command =
                HookCommand::from_value(&value).map_err(|reason| EngineError::HookNotInvocable {
                    path: origin_str.clone(),
                    hook: key.clone(),
                    reason,
                })?;
            hooks.insert(key, command);
        }

        Ok(Self {
            hooks,
            shell,
            base_dir,
        })
    }

    /// The command configured for `hook`, if any
    pub fn hook(&self, hook: &str) -> Option<&HookCommand> {
        self.hooks.get(hook)
    }

    /// Program used for string hooks
    pub fn shell(&self) -> &str {
        &self.shell
    }

    /// Run `hook` and return its stdout
    async fn run_hook(&self, hook: &str, call: HookCall<'_>) -> HookResult<String> {
        let command = self
            .hooks
            .get(hook)
            .ok_or_else(|| HookError::new(format!("hook '{hook}' is not configured")))?;

        let mut cmd = match command {
            HookCommand::Shell(line) => {
                let mut cmd = tokio::process::Command::new(&self.shell);
                cmd.arg("-c").arg(line);
                cmd
            }
            HookCommand::Argv(argv) => {
                let mut cmd = tokio::process::Command::new(&argv[0]);
                cmd.args(&argv[1..]);
                cmd
            }
        };
        cmd.current_dir(&self.base_dir)
            .env(TARGET_ENV, call.target)
            .stdin(if call.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(connection) = call.connection {
            cmd.env(CONNECTION_ENV, connection);
        }
        if let Some(version) = call.version {
            cmd.env(VERSION_ENV, version.to_string());
        }

        log::debug!("Running backend hook '{hook}'");
        let mut child = cmd
            .spawn()
            .map_err(|e| HookError::new(format!("failed to launch: {e}")))?;

        let stdin = child.stdin.take();
        let input = call.stdin;
        let feed = async move {
            if let (Some(mut pipe), Some(input)) = (stdin, input) {
                pipe.write_all(input.as_bytes()).await?;
                pipe.shutdown().await?;
            }
            Ok::<(), std::io::Error>(())
        };
        let (fed, output) = tokio::join!(feed, child.wait_with_output());
        let output = output.map_err(|e| HookError::new(format!("failed to wait: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(HookError::new(format!(
                "exited with status {}: {}",
                output.status.code().unwrap_or(-1),
                stderr.trim()
            )));
        }
        // A hook that exits successfully without reading its input is fine.
        if let Err(e) = fed {
            if e.kind() != std::io::ErrorKind::BrokenPipe {
                return Err(HookError::new(format!("failed to write stdin: {e}")));
            }
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn connected<'a>(conn: &'a CommandConnection) -> HookCall<'a> {
        HookCall {
            target: &conn.target,
            connection: Some(&conn.handle),
            ..Default::default()
        }
    }
}

impl Backend for CommandBackend {
    type Connection = CommandConnection;

    fn name(&self) -> &str {
        "command"
    }

    fn get_connection<'a>(&'a self, target: &'a str) -> Deferred<'a, CommandConnection> {
        Deferred::pending(async move {
            let call = HookCall {
                target,
                ..Default::default()
            };
            let stdout = self.run_hook("get_connection", call).await?;
            let handle = match stdout.trim() {
                "" => target.to_string(),
                printed => printed.to_string(),
            };
            Ok(CommandConnection {
                target: target.to_string(),
                handle,
            })
        })
    }

    fn ensure_meta_table<'a>(&'a self, conn: &'a mut CommandConnection) -> Deferred<'a, ()> {
        Deferred::pending(async move {
            self.run_hook("ensure_meta_table", Self::connected(conn))
                .await
                .map(|_| ())
        })
    }

    fn get_version<'a>(&'a self, conn: &'a mut CommandConnection) -> Deferred<'a, Version> {
        Deferred::pending(async move {
            let stdout = self
                .run_hook("get_version", Self::connected(conn))
                .await?;
            let printed = stdout.trim();
            printed.parse::<Version>().map_err(|_| {
                HookError::new(format!("expected an integer version, got '{printed}'"))
            })
        })
    }

    fn set_version<'a>(
        &'a self,
        conn: &'a mut CommandConnection,
        version: Version,
    ) -> Deferred<'a, ()> {
        Deferred::pending(async move {
            let call = HookCall {
                version: Some(version),
                ..Self::connected(conn)
            };
            self.run_hook("set_version", call).await.map(|_| ())
        })
    }

    fn execute_sql<'a>(
        &'a self,
        conn: &'a mut CommandConnection,
        sql: &'a str,
    ) -> Deferred<'a, ()> {
        Deferred::pending(async move {
            let call = HookCall {
                stdin: Some(sql),
                ..Self::connected(conn)
            };
            self.run_hook("execute_sql", call).await.map(|_| ())
        })
    }

    fn close_connection(&self, conn: CommandConnection) -> Deferred<'_, ()> {
        if !self.hooks.contains_key(OPTIONAL_HOOK) {
            return Deferred::ready(Ok(()));
        }
        Deferred::pending(async move {
            self.run_hook(OPTIONAL_HOOK, Self::connected(&conn))
                .await
                .map(|_| ())
        })
    }
}

#[cfg(test)]
#[path = "command_test.rs"]
mod tests;
