//! CLI command implementations

pub(crate) mod backup_db;
pub(crate) mod check_version;
pub(crate) mod common;
pub(crate) mod create_db;
pub(crate) mod enroll_db;
pub(crate) mod run;
