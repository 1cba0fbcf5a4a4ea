use super::*;
use clap::CommandFactory;

#[test]
fn verify_cli_args() {
    // Validates the entire command tree: short flag conflicts,
    // duplicate args, and other clap definition errors.
    Cli::command().debug_assert();
}

#[test]
fn test_global_flags_after_subcommand() {
    let cli = Cli::try_parse_from([
        "fastmigrate",
        "run",
        "--db",
        "app.duckdb",
        "--migrations",
        "db/migrations",
        "--dry-run",
        "-v",
    ])
    .unwrap();

    assert!(cli.global.verbose);
    assert_eq!(cli.global.db.as_deref(), Some("app.duckdb"));
    assert_eq!(cli.global.migrations.as_deref(), Some("db/migrations"));
    match cli.command {
        Commands::Run(args) => assert!(args.dry_run),
        other => panic!("expected run, got {other:?}"),
    }
}

#[test]
fn test_enroll_args() {
    let cli = Cli::try_parse_from([
        "fastmigrate",
        "enroll-db",
        "--version",
        "5",
        "--err-if-versioned",
    ])
    .unwrap();
    match cli.command {
        Commands::EnrollDb(args) => {
            assert_eq!(args.version, 5);
            assert!(args.err_if_versioned);
        }
        other => panic!("expected enroll-db, got {other:?}"),
    }

    assert!(Cli::try_parse_from(["fastmigrate", "enroll-db", "--version", "-1"]).is_err());
}

#[test]
fn test_subcommand_names() {
    for name in ["create-db", "check-version", "backup-db"] {
        assert!(Cli::try_parse_from(["fastmigrate", name]).is_ok(), "{name}");
    }
}
