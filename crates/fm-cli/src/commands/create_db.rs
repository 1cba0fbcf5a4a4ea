//! Create-db command implementation

use anyhow::Result;

use crate::cli::GlobalArgs;
use crate::commands::common::{fail, resolve_settings};

/// Execute the create-db command
pub async fn execute(global: &GlobalArgs) -> Result<()> {
    let settings = resolve_settings(global)?;
    let path = settings.db_path();
    let existed = path.exists();

    let version = fm_db::create_db(path).map_err(fail)?;
    if existed {
        println!(
            "Database already exists at {} (version {version})",
            path.display()
        );
    } else {
        println!("Created new versioned database at {}", path.display());
    }
    Ok(())
}
