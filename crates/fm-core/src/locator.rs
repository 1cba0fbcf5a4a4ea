//! Migration script discovery
//!
//! The migrations directory is the source of truth: scripts are discovered
//! fresh on every call and nothing is cached between runs.

use crate::error::{CoreError, CoreResult};
use crate::script::{MigrationScript, Version};
use std::collections::btree_map::{self, BTreeMap};
use std::path::Path;

/// Migration scripts keyed by version, iterated in ascending version order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScriptSet {
    scripts: BTreeMap<Version, MigrationScript>,
}

impl ScriptSet {
    /// Create an empty script set
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a script, failing if its version is already taken
    pub fn insert(&mut self, script: MigrationScript) -> CoreResult<()> {
        match self.scripts.entry(script.version) {
            btree_map::Entry::Occupied(existing) => Err(CoreError::DuplicateVersion {
                version: script.version,
                first: existing.get().path.display().to_string(),
                second: script.path.display().to_string(),
            }),
            btree_map::Entry::Vacant(slot) => {
                slot.insert(script);
                Ok(())
            }
        }
    }

    /// Number of scripts in the set
    pub fn len(&self) -> usize {
        self.scripts.len()
    }

    /// Whether the set has no scripts
    pub fn is_empty(&self) -> bool {
        self.scripts.is_empty()
    }

    /// Look up a script by version
    pub fn get(&self, version: Version) -> Option<&MigrationScript> {
        self.scripts.get(&version)
    }

    /// All versions, ascending
    pub fn versions(&self) -> Vec<Version> {
        self.scripts.keys().copied().collect()
    }

    /// Highest known version, if any
    pub fn latest_version(&self) -> Option<Version> {
        self.scripts.keys().next_back().copied()
    }

    /// Iterate over all scripts in ascending version order
    pub fn iter(&self) -> impl Iterator<Item = &MigrationScript> {
        self.scripts.values()
    }

    /// Scripts whose version is greater than `current`, ascending
    pub fn pending(&self, current: Version) -> Vec<&MigrationScript> {
        self.scripts
            .range((std::ops::Bound::Excluded(current), std::ops::Bound::Unbounded))
            .map(|(_, script)| script)
            .collect()
    }
}

/// Collect all valid migration scripts from `migrations_dir`.
///
/// A missing directory yields an empty set. Only regular files directly
/// inside the directory are considered; anything whose name does not follow
/// the `NNNN-slug.{sql,py,sh}` contract is skipped. Two scripts with the same
/// version fail with [`CoreError::DuplicateVersion`] naming both paths.
pub fn get_migration_scripts(migrations_dir: &Path) -> CoreResult<ScriptSet> {
    let mut set = ScriptSet::new();

    if !migrations_dir.exists() {
        log::debug!(
            "Migrations directory {} does not exist",
            migrations_dir.display()
        );
        return Ok(set);
    }

    let io_err = |source: std::io::Error| CoreError::IoWithPath {
        path: migrations_dir.display().to_string(),
        source,
    };

    let mut entries = Vec::new();
    for entry in std::fs::read_dir(migrations_dir).map_err(io_err)? {
        let entry = entry.map_err(io_err)?;
        let file_type = entry.file_type().map_err(io_err)?;
        if file_type.is_file() || (file_type.is_symlink() && entry.path().is_file()) {
            entries.push(entry.path());
        }
    }
    // Directory iteration order is platform-defined; sort so duplicate
    // reports are stable.
    entries.sort();

    for path in entries {
        if let Some(script) = MigrationScript::from_path(&path) {
            set.insert(script)?;
        }
    }

    log::debug!(
        "Found {} migration script(s) in {}",
        set.len(),
        migrations_dir.display()
    );
    Ok(set)
}

#[cfg(test)]
#[path = "locator_test.rs"]
mod tests;
