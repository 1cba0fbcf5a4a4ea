//! Timestamped database backups

use crate::error::{DbError, DbResult};
use std::path::{Path, PathBuf};

/// Build the backup path `<db>.<YYYYMMDD-HHMMSS>.backup`
fn backup_path_for(db_path: &Path, timestamp: &str) -> PathBuf {
    let mut name = db_path.as_os_str().to_os_string();
    name.push(format!(".{timestamp}.backup"));
    PathBuf::from(name)
}

/// DuckDB keeps uncheckpointed changes in `<db>.wal` next to the file
fn wal_path_for(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".wal");
    PathBuf::from(name)
}

fn copy_verified(from: &Path, to: &Path) -> DbResult<()> {
    let io_err = |path: &Path| {
        let path = path.display().to_string();
        move |source| DbError::Io { path, source }
    };

    std::fs::copy(from, to).map_err(io_err(to))?;

    let expected = std::fs::metadata(from).map_err(io_err(from))?.len();
    let actual = match std::fs::metadata(to) {
        Ok(meta) => meta.len(),
        Err(_) => {
            return Err(DbError::BackupVerification {
                path: to.display().to_string(),
                message: "backup file is missing after copy".to_string(),
            })
        }
    };
    if actual != expected {
        let _ = std::fs::remove_file(to);
        return Err(DbError::BackupVerification {
            path: to.display().to_string(),
            message: format!("expected {expected} bytes, found {actual}"),
        });
    }
    Ok(())
}

/// Copy the database at `db_path` to a timestamped backup next to it.
///
/// Refuses to overwrite an existing backup. The copy is verified by size
/// before its path is returned.
pub fn create_db_backup(db_path: &Path) -> DbResult<PathBuf> {
    if !db_path.is_file() {
        return Err(DbError::DatabaseNotFound {
            path: db_path.display().to_string(),
        });
    }

    let timestamp = chrono::Local::now().format("%Y%m%d-%H%M%S").to_string();
    let backup_path = backup_path_for(db_path, &timestamp);
    if backup_path.exists() {
        return Err(DbError::AlreadyExists {
            what: "Backup file".to_string(),
            path: backup_path.display().to_string(),
        });
    }

    copy_verified(db_path, &backup_path)?;

    let wal = wal_path_for(db_path);
    if wal.is_file() {
        let backup_wal = wal_path_for(&backup_path);
        if let Err(e) = copy_verified(&wal, &backup_wal) {
            let _ = std::fs::remove_file(&backup_path);
            return Err(e);
        }
    }

    log::debug!(
        "Backed up {} to {}",
        db_path.display(),
        backup_path.display()
    );
    Ok(backup_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use duckdb::Connection;
    use tempfile::tempdir;

    #[test]
    fn test_backup_copies_database() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("app.duckdb");
        {
            let conn = Connection::open(&db_path).unwrap();
            conn.execute_batch(
                "CREATE TABLE test (id INTEGER, name VARCHAR); INSERT INTO test VALUES (1, 'original');",
            )
            .unwrap();
        }

        let backup = create_db_backup(&db_path).unwrap();
        assert!(backup.exists());
        let name = backup.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("app.duckdb."));
        assert!(name.ends_with(".backup"));

        // Modify the original; the backup keeps the old contents
        {
            let conn = Connection::open(&db_path).unwrap();
            conn.execute("INSERT INTO test VALUES (2, 'modified')", [])
                .unwrap();
        }
        let conn = Connection::open(&backup).unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM test", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_backup_missing_database() {
        let dir = tempdir().unwrap();
        let err = create_db_backup(&dir.path().join("missing.duckdb")).unwrap_err();
        assert!(matches!(err, DbError::DatabaseNotFound { .. }));
    }

    #[test]
    fn test_backup_path_format() {
        let path = backup_path_for(Path::new("/data/app.duckdb"), "20260101-120000");
        assert_eq!(
            path,
            PathBuf::from("/data/app.duckdb.20260101-120000.backup")
        );
    }
}
