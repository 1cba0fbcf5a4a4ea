//! Backup-db command implementation

use anyhow::Result;

use crate::cli::GlobalArgs;
use crate::commands::common::{fail, resolve_settings};

/// Execute the backup-db command
pub async fn execute(global: &GlobalArgs) -> Result<()> {
    let settings = resolve_settings(global)?;
    let backup = fm_db::create_db_backup(settings.db_path()).map_err(fail)?;
    println!("Backup created: {}", backup.display());
    Ok(())
}
