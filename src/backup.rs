//! Snapshots of the database file and restoring from them.
//!
//! Backups are named `<db file name>.<description>.<YYYYmmdd_HHMMSS>.bak` and
//! live in a single directory. Timestamps in names are UTC.

use std::{
    fs,
    path::{Path, PathBuf},
};

use rusqlite::{Connection, OpenFlags};
use serde::Serialize;
use time::{
    Duration, OffsetDateTime, PrimitiveDateTime, format_description::BorrowedFormatItem,
    macros::format_description,
};

use crate::{
    Error,
    system_config::{self, ConfigValue},
};

const TIMESTAMP_FORMAT: &[BorrowedFormatItem<'_>] =
    format_description!("[year][month][day]_[hour][minute][second]");

/// The system configuration key holding the time of the last backup.
pub const LAST_BACKUP_KEY: &str = "backup.last_backup_at";

/// The longest allowed automatic backup interval, one year.
pub const MAX_INTERVAL_HOURS: f64 = 24.0 * 366.0;

/// A backup file found in the backup directory.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BackupInfo {
    /// The full path of the file.
    pub path: PathBuf,
    /// The file name.
    pub file_name: String,
    /// The description from the file name, e.g. "manual".
    pub description: String,
    /// When the backup was taken.
    pub created_at: OffsetDateTime,
    /// The file size in bytes.
    pub size: u64,
}

/// Creates, lists, restores and prunes backups of one database file.
#[derive(Debug, Clone)]
pub struct BackupManager {
    db_path: PathBuf,
    backup_dir: PathBuf,
}

impl BackupManager {
    /// Manage backups of `db_path`, stored in `backup_dir`.
    pub fn new(db_path: impl Into<PathBuf>, backup_dir: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
            backup_dir: backup_dir.into(),
        }
    }

    /// The directory backups are written to.
    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }

    /// Write a consistent snapshot of the database behind `connection`.
    ///
    /// Characters in `description` other than ASCII letters, digits, `_` and
    /// `-` are replaced with `_`. If a backup with the same name already exists,
    /// a numeric suffix is added.
    ///
    /// # Errors
    /// Returns [Error::IoError] if the backup directory cannot be created, or an
    /// SQL error if the snapshot fails.
    pub fn create_backup(
        &self,
        connection: &Connection,
        description: &str,
        now: OffsetDateTime,
    ) -> Result<PathBuf, Error> {
        fs::create_dir_all(&self.backup_dir)?;

        let timestamp = now
            .to_offset(time::UtcOffset::UTC)
            .format(TIMESTAMP_FORMAT)
            .map_err(|error| Error::IoError(error.to_string()))?;
        let stem = format!(
            "{}.{}.{timestamp}",
            self.db_file_name(),
            sanitize_description(description)
        );

        let mut backup_path = self.backup_dir.join(format!("{stem}.bak"));
        let mut suffix = 1;

        while backup_path.exists() {
            backup_path = self.backup_dir.join(format!("{stem}-{suffix}.bak"));
            suffix += 1;
        }

        let target = backup_path.to_str().ok_or_else(|| {
            Error::IoError(format!("{} is not valid UTF-8", backup_path.display()))
        })?;
        connection.execute("VACUUM INTO ?1", [target])?;

        tracing::info!("created backup {}", backup_path.display());

        Ok(backup_path)
    }

    /// Replace the database file with a backup.
    ///
    /// The current database is snapshotted first with the description
    /// `pre_restore`. If copying the backup fails, that snapshot is copied back.
    /// Connections to the database must be closed before calling this and
    /// reopened afterwards.
    ///
    /// # Errors
    /// Returns [Error::BackupNotFound] if `backup_path` does not exist, or
    /// [Error::IoError] if it is not a readable database or cannot be copied.
    pub fn restore_from_backup(
        &self,
        backup_path: &Path,
        now: OffsetDateTime,
    ) -> Result<(), Error> {
        if !backup_path.is_file() {
            return Err(Error::BackupNotFound(backup_path.to_owned()));
        }

        check_database_file(backup_path)?;

        let snapshot = if self.db_path.exists() {
            let connection = Connection::open(&self.db_path)?;
            let snapshot = self.create_backup(&connection, "pre_restore", now)?;
            connection.close().map_err(|(_, error)| Error::from(error))?;
            Some(snapshot)
        } else {
            None
        };

        if let Err(error) = fs::copy(backup_path, &self.db_path) {
            tracing::error!("could not restore {}: {error}", backup_path.display());

            if let Some(snapshot) = &snapshot {
                match fs::copy(snapshot, &self.db_path) {
                    Ok(_) => tracing::warn!("rolled back to {}", snapshot.display()),
                    Err(rollback_error) => tracing::error!(
                        "rolling back to {} also failed: {rollback_error}",
                        snapshot.display()
                    ),
                }
            }

            return Err(error.into());
        }

        tracing::info!(
            "restored {} from {}",
            self.db_path.display(),
            backup_path.display()
        );

        Ok(())
    }

    /// Every `.bak` file in the backup directory, newest first.
    ///
    /// A missing directory has no backups.
    pub fn list_backups(&self) -> Result<Vec<BackupInfo>, Error> {
        if !self.backup_dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut backups = Vec::new();

        for entry in fs::read_dir(&self.backup_dir)? {
            let entry = entry?;
            let path = entry.path();
            let file_name = entry.file_name().to_string_lossy().into_owned();

            if !path.is_file() || !file_name.ends_with(".bak") {
                continue;
            }

            let metadata = entry.metadata()?;
            let (description, timestamp) = parse_backup_name(&file_name);
            let created_at = match timestamp {
                Some(created_at) => created_at,
                None => OffsetDateTime::from(metadata.modified()?),
            };

            backups.push(BackupInfo {
                path,
                file_name,
                description,
                created_at,
                size: metadata.len(),
            });
        }

        backups.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.file_name.cmp(&a.file_name))
        });

        Ok(backups)
    }

    /// Delete one backup file.
    ///
    /// Returns `false` if the file does not exist.
    ///
    /// # Errors
    /// Returns [Error::BackupOutsideDirectory] if `backup_path` is not directly
    /// inside the backup directory.
    pub fn delete_backup(&self, backup_path: &Path) -> Result<bool, Error> {
        if !backup_path.exists() {
            tracing::warn!("backup {} does not exist", backup_path.display());
            return Ok(false);
        }

        let backup_dir = fs::canonicalize(&self.backup_dir)?;
        let is_inside = fs::canonicalize(backup_path)?
            .parent()
            .is_some_and(|parent| parent == backup_dir);

        if !is_inside {
            return Err(Error::BackupOutsideDirectory(backup_path.to_owned()));
        }

        fs::remove_file(backup_path)?;
        tracing::info!("deleted backup {}", backup_path.display());

        Ok(true)
    }

    /// Delete backups older than `days`, always keeping the newest `keep_min`.
    ///
    /// Returns the number of files deleted.
    pub fn cleanup_old_backups(
        &self,
        days: u32,
        keep_min: usize,
        now: OffsetDateTime,
    ) -> Result<usize, Error> {
        let backups = self.list_backups()?;

        if backups.len() <= keep_min {
            tracing::debug!(
                "{} backups, at most {keep_min} to keep, nothing to clean up",
                backups.len()
            );
            return Ok(0);
        }

        let cutoff = now - Duration::days(i64::from(days));
        let mut deleted = 0;

        for backup in backups.iter().skip(keep_min) {
            if backup.created_at >= cutoff {
                continue;
            }

            match self.delete_backup(&backup.path) {
                Ok(true) => deleted += 1,
                Ok(false) => {}
                Err(error) => {
                    tracing::error!("could not delete {}: {error}", backup.path.display())
                }
            }
        }

        tracing::info!("cleaned up {deleted} old backups");

        Ok(deleted)
    }

    fn db_file_name(&self) -> String {
        self.db_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "database".to_owned())
    }
}

/// Whether a backup is due, given when the last one was taken.
///
/// # Errors
/// Returns [Error::InvalidConfigValue] if `interval_hours` is not a number
/// between 0 and [MAX_INTERVAL_HOURS].
pub fn is_backup_due(
    last_backup_at: Option<OffsetDateTime>,
    interval_hours: f64,
    now: OffsetDateTime,
) -> Result<bool, Error> {
    let interval = (0.0..=MAX_INTERVAL_HOURS)
        .contains(&interval_hours)
        .then(|| Duration::checked_seconds_f64(interval_hours * 3600.0))
        .flatten()
        .ok_or_else(|| Error::InvalidConfigValue {
            key: "backup.interval_hours".to_owned(),
            reason: format!(
                "expected a number of hours up to {MAX_INTERVAL_HOURS}, got {interval_hours}"
            ),
        })?;

    Ok(match last_backup_at {
        None => true,
        Some(last) => now - last >= interval,
    })
}

/// Store the time of the latest backup in the system configuration.
pub fn record_backup_time(now: OffsetDateTime, connection: &Connection) -> Result<(), Error> {
    let timestamp = now
        .format(&time::format_description::well_known::Rfc3339)
        .map_err(|error| Error::InvalidConfigValue {
            key: LAST_BACKUP_KEY.to_owned(),
            reason: error.to_string(),
        })?;

    system_config::set_config(
        LAST_BACKUP_KEY,
        &ConfigValue::String(timestamp),
        Some("When the last backup was taken"),
        connection,
    )
}

/// The time of the latest backup, if one has been recorded.
///
/// An unreadable value is logged and treated as no backup.
pub fn last_backup_time(connection: &Connection) -> Result<Option<OffsetDateTime>, Error> {
    let Some(ConfigValue::String(raw)) = system_config::get_config(LAST_BACKUP_KEY, connection)?
    else {
        return Ok(None);
    };

    match OffsetDateTime::parse(&raw, &time::format_description::well_known::Rfc3339) {
        Ok(last) => Ok(Some(last)),
        Err(error) => {
            tracing::warn!("ignoring unreadable {LAST_BACKUP_KEY} \"{raw}\": {error}");
            Ok(None)
        }
    }
}

/// Format a byte count, e.g. "1.50 KB".
pub fn format_size(size: u64) -> String {
    let mut size = size as f64;

    for unit in ["B", "KB", "MB"] {
        if size < 1024.0 {
            return format!("{size:.2} {unit}");
        }
        size /= 1024.0;
    }

    format!("{size:.2} GB")
}

fn sanitize_description(description: &str) -> String {
    let sanitized: String = description
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if sanitized.is_empty() {
        "manual".to_owned()
    } else {
        sanitized
    }
}

/// Split a backup file name into its description and timestamp.
fn parse_backup_name(file_name: &str) -> (String, Option<OffsetDateTime>) {
    let stem = file_name.trim_end_matches(".bak");

    let Some((rest, timestamp)) = stem.rsplit_once('.') else {
        return ("manual".to_owned(), None);
    };

    let description = rest
        .rsplit_once('.')
        .map(|(_, description)| description.to_owned())
        .unwrap_or_else(|| "manual".to_owned());

    // Drop the collision suffix, e.g. "20250115_093000-2".
    let timestamp = timestamp.split('-').next().unwrap_or(timestamp);
    let created_at = PrimitiveDateTime::parse(timestamp, TIMESTAMP_FORMAT)
        .ok()
        .map(PrimitiveDateTime::assume_utc);

    (description, created_at)
}

fn check_database_file(path: &Path) -> Result<(), Error> {
    let invalid = |reason: String| {
        Error::IoError(format!("{} is not a usable backup: {reason}", path.display()))
    };

    let connection = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)
        .map_err(|error| invalid(error.to_string()))?;
    let result: String = connection
        .query_row("PRAGMA quick_check", [], |row| row.get(0))
        .map_err(|error| invalid(error.to_string()))?;

    if result != "ok" {
        return Err(invalid(result));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use time::{Duration, macros::datetime};

    use crate::{
        Error,
        account::{AccountFilter, AccountType, NewAccount, create_account, get_all_accounts},
        db::{initialize, open_database},
        test_utils::{TEST_NOW, get_test_connection},
    };

    use super::{
        BackupManager, MAX_INTERVAL_HOURS, format_size, is_backup_due, last_backup_time,
        parse_backup_name, record_backup_time, sanitize_description,
    };

    #[test]
    fn create_and_list_backups() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("fintrack.db");
        let connection = open_database(&db_path).unwrap();
        initialize(&connection).unwrap();
        let manager = BackupManager::new(&db_path, dir.path().join("backups"));

        let first = manager.create_backup(&connection, "before import!", TEST_NOW).unwrap();
        let second = manager.create_backup(&connection, "before import!", TEST_NOW).unwrap();
        let later = manager
            .create_backup(&connection, "auto", TEST_NOW + Duration::hours(1))
            .unwrap();

        assert_eq!(
            first.file_name().unwrap().to_str().unwrap(),
            "fintrack.db.before_import_.20250115_093000.bak"
        );
        assert_ne!(first, second);

        let backups = manager.list_backups().unwrap();
        assert_eq!(backups.len(), 3);
        assert_eq!(backups[0].path, later);
        assert_eq!(backups[0].description, "auto");
        assert_eq!(backups[1].created_at, TEST_NOW);
        assert!(backups.iter().all(|backup| backup.size > 0));
    }

    #[test]
    fn list_without_directory_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let manager = BackupManager::new(dir.path().join("fintrack.db"), dir.path().join("none"));

        assert_eq!(manager.list_backups(), Ok(Vec::new()));
    }

    #[test]
    fn restore_replaces_database() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("fintrack.db");
        let manager = BackupManager::new(&db_path, dir.path().join("backups"));
        let backup = {
            let connection = open_database(&db_path).unwrap();
            initialize(&connection).unwrap();
            let backup = manager.create_backup(&connection, "clean", TEST_NOW).unwrap();
            create_account(
                NewAccount {
                    name: "Added Later".to_owned(),
                    account_type: AccountType::Asset,
                    currency: "CNY".to_owned(),
                    initial_balance: 0.0,
                    description: None,
                },
                None,
                TEST_NOW,
                &connection,
            )
            .unwrap();
            backup
        };

        manager
            .restore_from_backup(&backup, TEST_NOW + Duration::minutes(5))
            .unwrap();

        let connection = open_database(&db_path).unwrap();
        let accounts = get_all_accounts(&AccountFilter::default(), &connection).unwrap();
        assert!(accounts.iter().all(|account| account.name != "Added Later"));
        let backups = manager.list_backups().unwrap();
        assert_eq!(backups.len(), 2);
        assert_eq!(backups[0].description, "pre_restore");
    }

    #[test]
    fn restore_rejects_missing_and_invalid_files() {
        let dir = tempfile::tempdir().unwrap();
        let manager = BackupManager::new(dir.path().join("fintrack.db"), dir.path());
        let missing = dir.path().join("missing.bak");
        let garbage = dir.path().join("garbage.bak");
        fs::write(&garbage, "this is not a database, just some text").unwrap();

        assert_eq!(
            manager.restore_from_backup(&missing, TEST_NOW),
            Err(Error::BackupNotFound(missing.clone()))
        );
        assert!(matches!(
            manager.restore_from_backup(&garbage, TEST_NOW),
            Err(Error::IoError(_))
        ));
    }

    #[test]
    fn delete_only_inside_backup_directory() {
        let dir = tempfile::tempdir().unwrap();
        let backup_dir = dir.path().join("backups");
        fs::create_dir_all(&backup_dir).unwrap();
        let inside = backup_dir.join("fintrack.db.manual.20250101_000000.bak");
        let outside = dir.path().join("fintrack.db.manual.20250101_000000.bak");
        fs::write(&inside, "x").unwrap();
        fs::write(&outside, "x").unwrap();
        let manager = BackupManager::new(dir.path().join("fintrack.db"), &backup_dir);

        assert_eq!(
            manager.delete_backup(&outside),
            Err(Error::BackupOutsideDirectory(outside.clone()))
        );
        assert_eq!(manager.delete_backup(&inside), Ok(true));
        assert_eq!(manager.delete_backup(&inside), Ok(false));
        assert!(outside.exists());
    }

    #[test]
    fn cleanup_keeps_newest_backups() {
        let dir = tempfile::tempdir().unwrap();
        let manager = BackupManager::new(dir.path().join("fintrack.db"), dir.path());
        for day in 1..=6 {
            fs::write(
                dir.path().join(format!("fintrack.db.auto.202501{day:02}_000000.bak")),
                "x",
            )
            .unwrap();
        }
        let now = datetime!(2025-01-10 00:00 UTC);

        // Everything is older than one day, but the newest three stay.
        let deleted = manager.cleanup_old_backups(1, 3, now).unwrap();

        assert_eq!(deleted, 3);
        let remaining: Vec<_> = manager
            .list_backups()
            .unwrap()
            .into_iter()
            .map(|backup| backup.file_name)
            .collect();
        assert_eq!(
            remaining,
            [
                "fintrack.db.auto.20250106_000000.bak",
                "fintrack.db.auto.20250105_000000.bak",
                "fintrack.db.auto.20250104_000000.bak",
            ]
        );
        assert_eq!(manager.cleanup_old_backups(1, 3, now), Ok(0));
    }

    #[test]
    fn cleanup_spares_recent_backups() {
        let dir = tempfile::tempdir().unwrap();
        let manager = BackupManager::new(dir.path().join("fintrack.db"), dir.path());
        for day in 1..=4 {
            fs::write(
                dir.path().join(format!("fintrack.db.auto.202501{day:02}_000000.bak")),
                "x",
            )
            .unwrap();
        }

        let deleted = manager
            .cleanup_old_backups(7, 1, datetime!(2025-01-05 00:00 UTC))
            .unwrap();

        assert_eq!(deleted, 0);
    }

    #[test]
    fn backup_due_after_interval() {
        assert_eq!(is_backup_due(None, 24.0, TEST_NOW), Ok(true));
        assert_eq!(
            is_backup_due(Some(TEST_NOW - Duration::hours(23)), 24.0, TEST_NOW),
            Ok(false)
        );
        assert_eq!(
            is_backup_due(Some(TEST_NOW - Duration::hours(24)), 24.0, TEST_NOW),
            Ok(true)
        );
        assert_eq!(
            is_backup_due(Some(TEST_NOW - Duration::minutes(30)), 0.5, TEST_NOW),
            Ok(true)
        );
    }

    #[test]
    fn backup_due_rejects_out_of_range_intervals() {
        for interval_hours in [f64::NAN, f64::INFINITY, -1.0, 1e300, i64::MAX as f64] {
            let result = is_backup_due(Some(TEST_NOW), interval_hours, TEST_NOW);

            let Err(Error::InvalidConfigValue { key, .. }) = result else {
                panic!("got {result:?} for an interval of {interval_hours} hours");
            };
            assert_eq!(key, "backup.interval_hours");
        }

        assert_eq!(is_backup_due(None, MAX_INTERVAL_HOURS, TEST_NOW), Ok(true));
    }

    #[test]
    fn last_backup_time_round_trips_through_config() {
        let connection = get_test_connection();

        assert_eq!(last_backup_time(&connection), Ok(None));

        record_backup_time(TEST_NOW, &connection).unwrap();

        assert_eq!(last_backup_time(&connection), Ok(Some(TEST_NOW)));
    }

    #[test]
    fn parses_backup_names() {
        let (description, created_at) =
            parse_backup_name("fintrack.db.pre_restore.20250115_093000-2.bak");
        let (fallback, none) = parse_backup_name("odd.bak");

        assert_eq!(description, "pre_restore");
        assert_eq!(created_at, Some(TEST_NOW));
        assert_eq!(fallback, "manual");
        assert_eq!(none, None);
    }

    #[test]
    fn sanitizes_descriptions() {
        assert_eq!(sanitize_description("weekly/full backup"), "weekly_full_backup");
        assert_eq!(sanitize_description("  "), "manual");
    }

    #[test]
    fn formats_sizes() {
        assert_eq!(format_size(512), "512.00 B");
        assert_eq!(format_size(1536), "1.50 KB");
        assert_eq!(format_size(3 * 1024 * 1024 * 1024), "3.00 GB");
    }
}
