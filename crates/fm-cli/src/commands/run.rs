//! Run command implementation

use anyhow::Result;
use fm_engine::{run_migrations_async, RunOptions};

use crate::cli::{GlobalArgs, RunArgs};
use crate::commands::common::{resolve_settings, ExitCode};

/// Execute the run command
pub async fn execute(args: &RunArgs, global: &GlobalArgs) -> Result<()> {
    let settings = resolve_settings(global)?;
    let options = RunOptions {
        verbose: global.verbose,
        dry_run: args.dry_run,
        interpreters: settings.interpreters.clone(),
    };

    if args.dry_run {
        println!("Dry run - no migrations will be executed");
    }
    if !run_migrations_async(&settings.db, &settings.migrations, &options).await {
        return Err(ExitCode(1).into());
    }
    Ok(())
}
