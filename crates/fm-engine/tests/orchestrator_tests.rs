//! End-to-end migration runs against DuckDB files and command adapters

use fm_engine::{
    create_db, get_db_version, run_migrations, run_migrations_report, run_migrations_with_backend,
    Backend, Deferred, EngineError, HookError, RunOptions, Version, BACKEND_FILE,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::{tempdir, TempDir};

/// Shell body appending `tag` to `order.log` next to the script
fn log_step(tag: &str) -> String {
    format!("echo {tag} >> \"$(dirname \"$0\")/order.log\"\n")
}

struct Project {
    _dir: TempDir,
    db: PathBuf,
    migrations: PathBuf,
}

impl Project {
    /// Managed database at version 0 plus an empty migrations directory
    fn new() -> Self {
        let dir = tempdir().unwrap();
        let db = dir.path().join("app.duckdb");
        let migrations = dir.path().join("migrations");
        fs::create_dir(&migrations).unwrap();
        create_db(&db).unwrap();
        Self {
            _dir: dir,
            db,
            migrations,
        }
    }

    fn target(&self) -> String {
        self.db.to_string_lossy().into_owned()
    }

    fn script(&self, name: &str, body: &str) {
        fs::write(self.migrations.join(name), body).unwrap();
    }

    fn order_log(&self) -> Vec<String> {
        fs::read_to_string(self.migrations.join("order.log"))
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }

    async fn run(&self) -> Result<fm_engine::MigrationReport, EngineError> {
        run_migrations_report(&self.target(), &self.migrations, &RunOptions::default()).await
    }

    fn version(&self) -> Version {
        get_db_version(&self.db).unwrap()
    }

    fn table_exists(&self, name: &str) -> bool {
        let conn = duckdb::Connection::open(&self.db).unwrap();
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM duckdb_tables() WHERE table_name = ?",
                duckdb::params![name],
                |row| row.get(0),
            )
            .unwrap();
        count > 0
    }
}

#[tokio::test]
async fn test_second_run_applies_nothing() {
    let project = Project::new();
    project.script("0001-users.sql", "CREATE TABLE users (id INTEGER, name VARCHAR);");
    project.script("0002-seed.sh", &log_step("seed"));

    let first = project.run().await.unwrap();
    assert_eq!(first.applied, vec![1, 2]);
    assert_eq!(project.version(), 2);

    let second = project.run().await.unwrap();
    assert!(second.applied.is_empty());
    assert!(second.pending.is_empty());
    assert_eq!(second.final_version, 2);
    assert_eq!(project.version(), 2);
    assert_eq!(project.order_log(), vec!["seed"]);
}

#[tokio::test]
async fn test_scripts_apply_in_version_order() {
    let project = Project::new();
    for (name, tag) in [
        ("0010-ten.sh", "10"),
        ("0002-two.sh", "2"),
        ("0003-three.sh", "3"),
        ("0001-one.sh", "1"),
    ] {
        project.script(name, &log_step(tag));
    }

    let report = project.run().await.unwrap();
    assert_eq!(report.applied, vec![1, 2, 3, 10]);
    assert_eq!(project.order_log(), vec!["1", "2", "3", "10"]);
    assert_eq!(project.version(), 10);
}

#[tokio::test]
async fn test_duplicate_versions_apply_nothing() {
    let project = Project::new();
    project.script("0001-users.sql", "CREATE TABLE users (id INTEGER);");
    project.script("0001-other.sh", &log_step("other"));

    let err = project.run().await.unwrap_err();
    let message = err.to_string();
    assert!(message.contains("0001-users.sql"), "{message}");
    assert!(message.contains("0001-other.sh"), "{message}");

    assert_eq!(project.version(), 0);
    assert!(!project.table_exists("users"));
    assert!(project.order_log().is_empty());

    assert!(!run_migrations(
        &project.target(),
        &project.migrations,
        &RunOptions::default()
    ));
}

#[tokio::test]
async fn test_halt_on_failure_then_resume_after_fix() {
    let project = Project::new();
    project.script("0001-one.sh", &log_step("1"));
    project.script("0002-two.sh", &format!("{}exit 1\n", log_step("2-broken")));
    project.script("0003-three.sh", &log_step("3"));

    let report = project.run().await.unwrap();
    assert!(!report.succeeded());
    assert_eq!(report.applied, vec![1]);
    let failed = report.failed.unwrap();
    assert_eq!(failed.version, 2);
    assert!(failed.path.ends_with("0002-two.sh"));
    assert_eq!(project.version(), 1);
    assert_eq!(project.order_log(), vec!["1", "2-broken"]);

    project.script("0002-two.sh", &log_step("2-fixed"));
    let report = project.run().await.unwrap();
    assert!(report.succeeded());
    assert_eq!(report.starting_version, 1);
    assert_eq!(report.applied, vec![2, 3]);
    assert_eq!(project.version(), 3);
    assert_eq!(project.order_log(), vec!["1", "2-broken", "2-fixed", "3"]);
}

#[tokio::test]
async fn test_failed_sql_script_rolls_back_its_batch() {
    let project = Project::new();
    project.script("0001-users.sql", "CREATE TABLE users (id INTEGER);");
    project.script(
        "0002-posts.sql",
        "CREATE TABLE posts (id INTEGER);\nINSERT INTO users VALUES (1);\nINSERT INTO posts (id VALUES (2);\n",
    );

    let report = project.run().await.unwrap();
    assert_eq!(report.applied, vec![1]);
    assert_eq!(report.failed.as_ref().map(|f| f.version), Some(2));
    assert!(report.failed.unwrap().reason.contains("0002-posts.sql"));

    assert_eq!(project.version(), 1);
    assert!(project.table_exists("users"));
    assert!(!project.table_exists("posts"));
    let conn = duckdb::Connection::open(&project.db).unwrap();
    let users: i64 = conn
        .query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))
        .unwrap();
    assert_eq!(users, 0);
}

#[tokio::test]
async fn test_unmanaged_database_is_refused() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("hand_built.duckdb");
    {
        let conn = duckdb::Connection::open(&db).unwrap();
        conn.execute_batch("CREATE TABLE users (id INTEGER)").unwrap();
    }
    let migrations = dir.path().join("migrations");
    fs::create_dir(&migrations).unwrap();
    fs::write(migrations.join("0001-x.sql"), "CREATE TABLE x (id INTEGER);").unwrap();

    let err = run_migrations_report(&db.to_string_lossy(), &migrations, &RunOptions::default())
        .await
        .unwrap_err();
    assert!(
        matches!(err, EngineError::Db(fm_db::DbError::Unmanaged { .. })),
        "got {err:?}"
    );

    let conn = duckdb::Connection::open(&db).unwrap();
    let ledgers: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM duckdb_tables() WHERE table_name IN ('_meta', 'x')",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(ledgers, 0);
}

#[tokio::test]
async fn test_missing_target_and_directory() {
    let project = Project::new();

    let missing_db = project.migrations.with_file_name("nope.duckdb");
    let err = run_migrations_report(
        &missing_db.to_string_lossy(),
        &project.migrations,
        &RunOptions::default(),
    )
    .await
    .unwrap_err();
    assert!(matches!(
        err,
        EngineError::Db(fm_db::DbError::DatabaseNotFound { .. })
    ));
    assert!(!missing_db.exists());

    let err = run_migrations_report(
        &project.target(),
        &project.migrations.join("missing"),
        &RunOptions::default(),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, EngineError::MigrationsDirNotFound { .. }));
}

#[tokio::test]
async fn test_legacy_ledger_upgraded_before_run() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("legacy.duckdb");
    {
        let conn = duckdb::Connection::open(&db).unwrap();
        conn.execute_batch("CREATE TABLE _meta (version INTEGER); INSERT INTO _meta VALUES (1);")
            .unwrap();
    }
    let migrations = dir.path().join("migrations");
    fs::create_dir(&migrations).unwrap();
    fs::write(migrations.join("0001-old.sql"), "CREATE TABLE old (id INTEGER);").unwrap();
    fs::write(migrations.join("0002-new.sql"), "CREATE TABLE new_t (id INTEGER);").unwrap();

    let report = run_migrations_report(&db.to_string_lossy(), &migrations, &RunOptions::default())
        .await
        .unwrap();
    assert_eq!(report.starting_version, 1);
    assert_eq!(report.applied, vec![2]);
    assert_eq!(get_db_version(&db).unwrap(), 2);
}

#[tokio::test]
async fn test_dry_run_changes_nothing() {
    let project = Project::new();
    project.script("0001-users.sql", "CREATE TABLE users (id INTEGER);");
    project.script("0002-seed.sh", &log_step("seed"));

    let options = RunOptions {
        dry_run: true,
        ..Default::default()
    };
    let report = run_migrations_report(&project.target(), &project.migrations, &options)
        .await
        .unwrap();
    assert!(report.dry_run);
    assert_eq!(report.pending, vec![1, 2]);
    assert!(report.applied.is_empty());
    assert_eq!(project.version(), 0);
    assert!(!project.table_exists("users"));
    assert!(project.order_log().is_empty());
}

#[tokio::test]
async fn test_blocking_entry_point_inside_runtime() {
    let project = Project::new();
    project.script("0001-users.sql", "CREATE TABLE users (id INTEGER);");

    assert!(run_migrations(
        &project.target(),
        &project.migrations,
        &RunOptions::default()
    ));
    assert_eq!(project.version(), 1);
}

#[test]
fn test_blocking_entry_point_without_runtime() {
    let project = Project::new();
    project.script("0001-one.sh", &log_step("1"));

    assert!(run_migrations(
        &project.target(),
        &project.migrations,
        &RunOptions::default()
    ));
    assert_eq!(project.order_log(), vec!["1"]);
}

// ----- adapter mode -----

const FILE_STORE_ADAPTER: &str = r#"
get_connection: echo store.txt
ensure_meta_table: 'test -f "$FASTMIGRATE_CONNECTION" || echo 0 > "$FASTMIGRATE_CONNECTION"'
get_version: 'cat "$FASTMIGRATE_CONNECTION"'
set_version: 'echo "$FASTMIGRATE_VERSION" > "$FASTMIGRATE_CONNECTION"'
execute_sql: 'cat >> applied.sql && echo sql >> order.log'
close_connection: 'echo closed >> closed.txt'
"#;

fn adapter_project(adapter: &str) -> (TempDir, PathBuf) {
    let dir = tempdir().unwrap();
    let migrations = dir.path().join("migrations");
    fs::create_dir(&migrations).unwrap();
    fs::write(migrations.join(BACKEND_FILE), adapter).unwrap();
    (dir, migrations)
}

fn stored_version(migrations: &Path) -> Version {
    fs::read_to_string(migrations.join("store.txt"))
        .unwrap()
        .trim()
        .parse()
        .unwrap()
}

#[tokio::test]
async fn test_adapter_parity_with_native() {
    let native = Project::new();
    native.script("0001-users.sql", "CREATE TABLE users (id INTEGER);");
    native.script("0002-seed.sh", &log_step("sh"));
    let native_report = native.run().await.unwrap();

    let (_dir, migrations) = adapter_project(FILE_STORE_ADAPTER);
    fs::write(
        migrations.join("0001-users.sql"),
        "CREATE TABLE users (id INTEGER);",
    )
    .unwrap();
    fs::write(migrations.join("0002-seed.sh"), log_step("sh")).unwrap();
    let adapter_report = run_migrations_report("warehouse", &migrations, &RunOptions::default())
        .await
        .unwrap();

    assert_eq!(adapter_report.applied, native_report.applied);
    assert_eq!(adapter_report.final_version, native_report.final_version);
    assert_eq!(stored_version(&migrations), native.version());

    let order = fs::read_to_string(migrations.join("order.log")).unwrap();
    assert_eq!(order.lines().collect::<Vec<_>>(), vec!["sql", "sh"]);
    assert_eq!(
        fs::read_to_string(migrations.join("applied.sql")).unwrap(),
        "CREATE TABLE users (id INTEGER);"
    );
    assert_eq!(
        fs::read_to_string(migrations.join("closed.txt")).unwrap(),
        "closed\n"
    );
}

#[tokio::test]
async fn test_adapter_scripts_receive_raw_target() {
    let (_dir, migrations) = adapter_project(FILE_STORE_ADAPTER);
    fs::write(
        migrations.join("0001-target.sh"),
        "echo \"$1\" > \"$(dirname \"$0\")/target.txt\"\n",
    )
    .unwrap();

    let report = run_migrations_report("postgres://db/app", &migrations, &RunOptions::default())
        .await
        .unwrap();
    assert!(report.succeeded());
    assert_eq!(
        fs::read_to_string(migrations.join("target.txt")).unwrap().trim(),
        "postgres://db/app"
    );
}

#[tokio::test]
async fn test_adapter_release_runs_once_on_failure() {
    let (_dir, migrations) = adapter_project(FILE_STORE_ADAPTER);
    fs::write(migrations.join("0001-ok.sh"), "exit 0\n").unwrap();
    fs::write(migrations.join("0002-bad.sh"), "exit 2\n").unwrap();

    let report = run_migrations_report("t", &migrations, &RunOptions::default())
        .await
        .unwrap();
    assert_eq!(report.failed.map(|f| f.version), Some(2));
    assert_eq!(stored_version(&migrations), 1);
    assert_eq!(
        fs::read_to_string(migrations.join("closed.txt")).unwrap(),
        "closed\n"
    );
}

#[tokio::test]
async fn test_release_failure_does_not_mask_outcome() {
    let adapter = FILE_STORE_ADAPTER.replace(
        "close_connection: 'echo closed >> closed.txt'",
        "close_connection: 'exit 9'",
    );
    let (_dir, migrations) = adapter_project(&adapter);
    fs::write(migrations.join("0001-ok.sh"), "exit 0\n").unwrap();

    let report = run_migrations_report("t", &migrations, &RunOptions::default())
        .await
        .unwrap();
    assert!(report.succeeded());
    assert_eq!(stored_version(&migrations), 1);
}

#[tokio::test]
async fn test_adapter_missing_hooks_fail_before_scripts() {
    let (_dir, migrations) = adapter_project("get_connection: echo x\nexecute_sql: cat\n");
    fs::write(migrations.join("0001-one.sh"), log_step("1")).unwrap();

    let err = run_migrations_report("t", &migrations, &RunOptions::default())
        .await
        .unwrap_err();
    match err {
        EngineError::MissingHooks { hooks, .. } => {
            assert_eq!(hooks, "ensure_meta_table, get_version, set_version")
        }
        other => panic!("expected MissingHooks, got {other:?}"),
    }
    assert!(!migrations.join("order.log").exists());
}

#[tokio::test]
async fn test_adapter_hook_failure_stops_run() {
    let adapter = FILE_STORE_ADAPTER.replace(
        "get_version: 'cat \"$FASTMIGRATE_CONNECTION\"'",
        "get_version: 'echo unreachable >&2; exit 1'",
    );
    let (_dir, migrations) = adapter_project(&adapter);
    fs::write(migrations.join("0001-one.sh"), log_step("1")).unwrap();

    let err = run_migrations_report("t", &migrations, &RunOptions::default())
        .await
        .unwrap_err();
    match err {
        EngineError::Hook { hook, message } => {
            assert_eq!(hook, "get_version");
            assert!(message.contains("unreachable"));
        }
        other => panic!("expected Hook error, got {other:?}"),
    }
    assert!(!migrations.join("order.log").exists());
    // The connection was acquired, so it is still released
    assert!(migrations.join("closed.txt").exists());
}

// ----- programmatic backends -----

#[derive(Default)]
struct Recorded {
    version: Version,
    statements: Vec<String>,
    writes: Vec<Version>,
    hook_threads: Vec<std::thread::ThreadId>,
}

/// Async in-memory adapter recording every call
struct RecordingBackend {
    state: Arc<Mutex<Recorded>>,
}

impl RecordingBackend {
    fn touch(&self) {
        self.state
            .lock()
            .unwrap()
            .hook_threads
            .push(std::thread::current().id());
    }
}

impl Backend for RecordingBackend {
    type Connection = ();

    fn get_connection<'a>(&'a self, _target: &'a str) -> Deferred<'a, ()> {
        Deferred::pending(async move {
            tokio::task::yield_now().await;
            self.touch();
            Ok(())
        })
    }

    fn ensure_meta_table<'a>(&'a self, _conn: &'a mut ()) -> Deferred<'a, ()> {
        self.touch();
        Deferred::ready(Ok(()))
    }

    fn get_version<'a>(&'a self, _conn: &'a mut ()) -> Deferred<'a, Version> {
        Deferred::pending(async move {
            self.touch();
            Ok(self.state.lock().unwrap().version)
        })
    }

    fn set_version<'a>(&'a self, _conn: &'a mut (), version: Version) -> Deferred<'a, ()> {
        Deferred::pending(async move {
            tokio::task::yield_now().await;
            self.touch();
            let mut state = self.state.lock().unwrap();
            state.version = version;
            state.writes.push(version);
            Ok(())
        })
    }

    fn execute_sql<'a>(&'a self, _conn: &'a mut (), sql: &'a str) -> Deferred<'a, ()> {
        Deferred::pending(async move {
            self.touch();
            if sql.contains("BROKEN") {
                return Err(HookError::new("syntax error"));
            }
            self.state.lock().unwrap().statements.push(sql.to_string());
            Ok(())
        })
    }
}

#[tokio::test]
async fn test_programmatic_backend_drives_run() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("0001-a.sql"), "CREATE TABLE a (id INTEGER);").unwrap();
    fs::write(dir.path().join("0002-b.sql"), "CREATE TABLE b (id INTEGER);").unwrap();
    fs::write(dir.path().join("0003-c.sql"), "BROKEN").unwrap();
    // Ignored: programmatic backends take precedence over backend.yml
    fs::write(dir.path().join(BACKEND_FILE), "not: [valid").unwrap();

    let state = Arc::new(Mutex::new(Recorded::default()));
    let backend = RecordingBackend {
        state: Arc::clone(&state),
    };
    let report = run_migrations_with_backend("mem", dir.path(), &backend, &RunOptions::default())
        .await
        .unwrap();

    assert_eq!(report.applied, vec![1, 2]);
    let failed = report.failed.unwrap();
    assert_eq!(failed.version, 3);
    assert!(failed.reason.contains("syntax error"));

    let state = state.lock().unwrap();
    assert_eq!(state.writes, vec![1, 2]);
    assert_eq!(state.version, 2);
    assert_eq!(
        state.statements,
        vec!["CREATE TABLE a (id INTEGER);", "CREATE TABLE b (id INTEGER);"]
    );
    let first = state.hook_threads[0];
    assert!(state.hook_threads.iter().all(|id| *id == first));
}
