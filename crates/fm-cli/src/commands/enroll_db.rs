//! Enroll-db command implementation

use anyhow::Result;
use fm_db::EnrollOptions;

use crate::cli::{EnrollArgs, GlobalArgs};
use crate::commands::common::{fail, resolve_settings};

/// Execute the enroll-db command
pub async fn execute(args: &EnrollArgs, global: &GlobalArgs) -> Result<()> {
    let settings = resolve_settings(global)?;
    let path = settings.db_path();
    let options = EnrollOptions {
        err_if_versioned: args.err_if_versioned,
        version: args.version,
    };

    if fm_db::enroll_db(path, options).map_err(fail)? {
        println!(
            "Enrolled database at {} (version {})",
            path.display(),
            args.version
        );
    } else {
        let current = fm_db::get_db_version(path).map_err(fail)?;
        println!(
            "Database at {} is already versioned (version {current})",
            path.display()
        );
    }
    Ok(())
}
