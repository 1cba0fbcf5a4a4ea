//! fastmigrate CLI - versioned migrations for DuckDB databases

use clap::Parser;

mod cli;
mod commands;

use cli::Cli;
use commands::{backup_db, check_version, common, create_db, enroll_db, run};

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp(None)
        .init();
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    init_logging(cli.global.verbose);

    let result = match &cli.command {
        cli::Commands::Run(args) => run::execute(args, &cli.global).await,
        cli::Commands::CreateDb => create_db::execute(&cli.global).await,
        cli::Commands::CheckVersion => check_version::execute(&cli.global).await,
        cli::Commands::EnrollDb(args) => enroll_db::execute(args, &cli.global).await,
        cli::Commands::BackupDb => backup_db::execute(&cli.global).await,
    };

    match result {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(err) => match err.downcast_ref::<common::ExitCode>() {
            Some(common::ExitCode(code)) => {
                std::process::ExitCode::from(u8::try_from(*code).unwrap_or(1))
            }
            None => {
                eprintln!("Error: {err:#}");
                std::process::ExitCode::FAILURE
            }
        },
    }
}
