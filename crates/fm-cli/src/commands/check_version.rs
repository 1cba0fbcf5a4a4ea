//! Check-version command implementation

use anyhow::Result;

use crate::cli::GlobalArgs;
use crate::commands::common::{fail, resolve_settings};

/// Execute the check-version command
pub async fn execute(global: &GlobalArgs) -> Result<()> {
    let settings = resolve_settings(global)?;
    if global.verbose {
        println!("fastmigrate {}", env!("CARGO_PKG_VERSION"));
    }

    let version = fm_db::get_db_version(settings.db_path()).map_err(fail)?;
    println!("Database version: {version}");
    Ok(())
}
