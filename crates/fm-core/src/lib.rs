//! fm-core - Core library for fastmigrate
//!
//! This crate provides the migration script model, filename/version parsing,
//! the script locator, and configuration file parsing shared by the other
//! fastmigrate crates.

pub mod config;
pub mod error;
pub mod locator;
pub mod script;

pub use config::{Config, Interpreters};
pub use error::{CoreError, CoreResult};
pub use locator::{get_migration_scripts, ScriptSet};
pub use script::{extract_version_from_filename, MigrationScript, ScriptKind, Version};
