//! Backup retention cleanup.
//!
//! Deletes expired archives from the backup folder. Only files this tool
//! produced are candidates: plain files named `BACKUP_*.zip`. Everything
//! else in the folder is left alone, whatever its age.

use crate::error::FinbackError;

use std::fs;
use std::path::Path;
use std::time::{Duration, SystemTime};

/// Filename prefix of every backup archive.
pub const ARCHIVE_PREFIX: &str = "BACKUP_";
/// Filename extension of every backup archive.
pub const ARCHIVE_SUFFIX: &str = ".zip";

/// Delete archives older than the retention window, returning how many
/// were removed.
///
/// `keep_days <= 0` means unlimited retention: nothing is touched, the
/// filesystem is not even consulted. A missing or invalid folder is an
/// error; per-file stat or delete failures are logged and skipped so one
/// stubborn file cannot block the rest of the cleanup.
pub fn cleanup_old_backups(backup_dir: &str, keep_days: i32) -> Result<usize, FinbackError> {
    if keep_days <= 0 {
        tracing::debug!("Retention is unlimited, skipping cleanup");
        return Ok(0);
    }

    let dir = Path::new(backup_dir);
    if !dir.exists() || !dir.is_dir() {
        return Err(FinbackError::storage(
            format!("Backup folder '{backup_dir}' does not exist or is not a directory"),
            Some("Check the backup folder setting."),
        ));
    }

    let cutoff = SystemTime::now()
        .checked_sub(Duration::from_secs(keep_days as u64 * 24 * 60 * 60))
        .ok_or_else(|| FinbackError::internal("Retention window is out of range"))?;

    let entries = fs::read_dir(dir)
        .map_err(|e| FinbackError::storage(format!("Failed to read backup folder: {e}"), None))?;

    let mut deleted = 0usize;
    for entry in entries {
        let entry = entry.map_err(|e| {
            FinbackError::storage(format!("Failed to read backup folder entry: {e}"), None)
        })?;
        let path = entry.path();

        if !path.is_file() {
            continue;
        }
        let Some(name) = path.file_name().map(|n| n.to_string_lossy().into_owned()) else {
            continue;
        };
        if !name.starts_with(ARCHIVE_PREFIX) || !name.ends_with(ARCHIVE_SUFFIX) {
            continue;
        }

        let modified = match fs::metadata(&path).and_then(|m| m.modified()) {
            Ok(time) => time,
            Err(e) => {
                tracing::warn!(file = %path.display(), error = %e, "Could not stat archive, leaving it");
                continue;
            }
        };

        if modified <= cutoff {
            match fs::remove_file(&path) {
                Ok(()) => {
                    tracing::info!(file = %path.display(), "Deleted expired backup archive");
                    deleted += 1;
                }
                Err(e) => {
                    tracing::warn!(file = %path.display(), error = %e, "Failed to delete expired archive");
                }
            }
        }
    }

    if deleted > 0 {
        tracing::info!(deleted, keep_days, "Retention cleanup finished");
    }
    Ok(deleted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write_aged(dir: &Path, name: &str, age_days: u64) {
        let path = dir.join(name);
        fs::write(&path, b"zip bytes").unwrap();
        let past = SystemTime::now() - Duration::from_secs(age_days * 24 * 60 * 60);
        let file = fs::OpenOptions::new().append(true).open(&path).unwrap();
        file.set_modified(past).unwrap();
    }

    #[test]
    fn test_unlimited_retention_never_touches_the_filesystem() {
        // The folder does not exist; with keep_days <= 0 that must not matter
        assert_eq!(cleanup_old_backups("/no/such/folder", 0).unwrap(), 0);
        assert_eq!(cleanup_old_backups("/no/such/folder", -7).unwrap(), 0);
    }

    #[test]
    fn test_missing_folder_is_an_error() {
        let err = cleanup_old_backups("/no/such/folder", 7).unwrap_err();
        assert_eq!(err.category(), "Storage");
    }

    #[test]
    fn test_deletes_only_expired_archives() {
        let dir = tempdir().unwrap();
        write_aged(dir.path(), "BACKUP_2025-01-01_02-00.zip", 10);
        write_aged(dir.path(), "BACKUP_2025-02-01_02-00.zip", 1);
        write_aged(dir.path(), "notes.txt", 10);
        write_aged(dir.path(), "BACKUP_2024-12-01_02-00.tar", 10);
        write_aged(dir.path(), "my_BACKUP_2024-12-01_02-00.zip", 10);

        let deleted = cleanup_old_backups(dir.path().to_str().unwrap(), 7).unwrap();
        assert_eq!(deleted, 1);

        assert!(!dir.path().join("BACKUP_2025-01-01_02-00.zip").exists());
        assert!(dir.path().join("BACKUP_2025-02-01_02-00.zip").exists());
        assert!(dir.path().join("notes.txt").exists());
        assert!(dir.path().join("BACKUP_2024-12-01_02-00.tar").exists());
        assert!(dir.path().join("my_BACKUP_2024-12-01_02-00.zip").exists());
    }

    #[test]
    fn test_archive_exactly_at_the_window_edge_is_deleted() {
        let dir = tempdir().unwrap();
        write_aged(dir.path(), "BACKUP_2025-01-08_02-00.zip", 7);

        let deleted = cleanup_old_backups(dir.path().to_str().unwrap(), 7).unwrap();
        assert_eq!(deleted, 1);
    }

    #[test]
    fn test_fresh_archives_survive() {
        let dir = tempdir().unwrap();
        write_aged(dir.path(), "BACKUP_2025-03-01_02-00.zip", 3);

        let deleted = cleanup_old_backups(dir.path().to_str().unwrap(), 7).unwrap();
        assert_eq!(deleted, 0);
        assert!(dir.path().join("BACKUP_2025-03-01_02-00.zip").exists());
    }

    #[test]
    fn test_directories_are_never_candidates() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("BACKUP_2020-01-01_02-00.zip")).unwrap();

        let deleted = cleanup_old_backups(dir.path().to_str().unwrap(), 7).unwrap();
        assert_eq!(deleted, 0);
        assert!(dir.path().join("BACKUP_2020-01-01_02-00.zip").exists());
    }
}
