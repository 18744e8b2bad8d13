//! The application config file.
//!
//! The file is JSON. Missing sections and keys fall back to their defaults, so an
//! empty object (or no file at all) is a valid config.

use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::{
    Error, backup::MAX_INTERVAL_HOURS, logging::parse_level, timezone::get_local_offset,
};

/// Where the config file is looked for when no path is given.
pub const DEFAULT_CONFIG_PATH: &str = "config/fintrack.json";

/// All application settings that are read before the database is opened.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Database location and backup schedule.
    pub database: DatabaseConfig,
    /// Log level and log file.
    pub logging: LoggingConfig,
    /// Display settings.
    pub app: AppSettings,
    /// Password settings.
    pub security: SecurityConfig,
}

/// Database location and backup schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    pub path: PathBuf,
    /// Automatic backup settings.
    pub backup: BackupConfig,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/fintrack.db"),
            backup: BackupConfig::default(),
        }
    }
}

/// Automatic backup settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackupConfig {
    /// Whether `backup auto` should create backups.
    pub enabled: bool,
    /// Minimum number of hours between automatic backups.
    pub interval_hours: f64,
    /// Backups older than this many days may be removed by cleanup.
    pub keep_days: u32,
    /// Cleanup never removes the newest `min_keep` backups.
    pub min_keep: usize,
    /// Directory the backups are written to.
    pub folder: PathBuf,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_hours: 24.0,
            keep_days: 7,
            min_keep: 5,
            folder: PathBuf::from("data/backups"),
        }
    }
}

/// Log level and log file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// One of DEBUG, INFO, WARNING, ERROR or CRITICAL.
    pub level: String,
    /// File that receives debug level logs.
    pub file: PathBuf,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "INFO".to_owned(),
            file: PathBuf::from("logs/fintrack.log"),
        }
    }
}

/// Display settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    /// The application name shown in headers.
    pub name: String,
    /// The symbol placed in front of amounts.
    pub currency_symbol: String,
    /// The largest page size for listings.
    pub max_records_per_page: u64,
    /// Canonical timezone name used for "today" and timestamps.
    pub local_timezone: String,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            name: "Fintrack".to_owned(),
            currency_symbol: "¥".to_owned(),
            max_records_per_page: 50,
            local_timezone: "Etc/UTC".to_owned(),
        }
    }
}

/// Password settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Minimum password length written to the database on `init`.
    pub password_min_length: usize,
    /// bcrypt cost for new password hashes.
    pub bcrypt_cost: u32,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            password_min_length: 8,
            bcrypt_cost: bcrypt::DEFAULT_COST,
        }
    }
}

impl AppConfig {
    /// Load the config from `path`, or the defaults if the file does not exist.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, is not valid JSON, or fails
    /// [AppConfig::validate].
    pub fn load(path: &Path) -> Result<Self, Error> {
        if !path.exists() {
            tracing::debug!("config file {} not found, using defaults", path.display());
            return Ok(Self::default());
        }

        let text = fs::read_to_string(path)?;
        let config: AppConfig = serde_json::from_str(&text)?;
        config.validate()?;

        Ok(config)
    }

    /// Write the config to `path` as pretty JSON, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), Error> {
        self.validate()?;

        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        fs::write(path, serde_json::to_string_pretty(self)?)?;

        Ok(())
    }

    /// Check that every value is within its allowed range.
    ///
    /// # Errors
    /// Returns [Error::InvalidAppConfig] describing the first bad value.
    pub fn validate(&self) -> Result<(), Error> {
        let backup = &self.database.backup;

        if self.database.path.as_os_str().is_empty() {
            return invalid("database.path must not be empty");
        }

        if !(0.1..=MAX_INTERVAL_HOURS).contains(&backup.interval_hours) {
            return invalid(&format!(
                "database.backup.interval_hours must be between 0.1 and {MAX_INTERVAL_HOURS}"
            ));
        }

        if backup.keep_days < 1 {
            return invalid("database.backup.keep_days must be at least 1");
        }

        if backup.min_keep < 1 {
            return invalid("database.backup.min_keep must be at least 1");
        }

        if parse_level(&self.logging.level).is_err() {
            return invalid(&format!(
                "logging.level {:?} is not one of DEBUG, INFO, WARNING, ERROR, CRITICAL",
                self.logging.level
            ));
        }

        if self.app.max_records_per_page < 1 {
            return invalid("app.max_records_per_page must be at least 1");
        }

        if get_local_offset(&self.app.local_timezone).is_none() {
            return invalid(&format!(
                "app.local_timezone {:?} is not a valid timezone",
                self.app.local_timezone
            ));
        }

        if self.security.password_min_length < 4 {
            return invalid("security.password_min_length must be at least 4");
        }

        if !(4..=31).contains(&self.security.bcrypt_cost) {
            return invalid("security.bcrypt_cost must be between 4 and 31");
        }

        Ok(())
    }
}

fn invalid(message: &str) -> Result<(), Error> {
    Err(Error::InvalidAppConfig(message.to_owned()))
}

#[cfg(test)]
mod tests {
    use std::fs;

    use crate::Error;

    use super::AppConfig;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();

        let config = AppConfig::load(&dir.path().join("missing.json")).unwrap();

        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn defaults_are_valid() {
        assert_eq!(AppConfig::default().validate(), Ok(()));
    }

    #[test]
    fn partial_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{"app": {"currency_symbol": "$"}, "database": {"backup": {"keep_days": 30}}}"#,
        )
        .unwrap();

        let config = AppConfig::load(&path).unwrap();

        assert_eq!(config.app.currency_symbol, "$");
        assert_eq!(config.app.max_records_per_page, 50);
        assert_eq!(config.database.backup.keep_days, 30);
        assert_eq!(config.database.backup.min_keep, 5);
    }

    #[test]
    fn save_then_load_keeps_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let mut config = AppConfig::default();
        config.logging.level = "DEBUG".to_owned();
        config.security.bcrypt_cost = 10;

        config.save(&path).unwrap();

        assert_eq!(AppConfig::load(&path), Ok(config));
    }

    #[test]
    fn load_rejects_invalid_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();

        let result = AppConfig::load(&path);

        assert!(matches!(result, Err(Error::JSONSerializationError(_))));
    }

    #[test]
    fn validate_rejects_out_of_range_values() {
        let mut short_interval = AppConfig::default();
        short_interval.database.backup.interval_hours = 0.05;

        let mut long_interval = AppConfig::default();
        long_interval.database.backup.interval_hours = 1e300;

        let mut nan_interval = AppConfig::default();
        nan_interval.database.backup.interval_hours = f64::NAN;

        let mut bad_level = AppConfig::default();
        bad_level.logging.level = "CHATTY".to_owned();

        let mut bad_timezone = AppConfig::default();
        bad_timezone.app.local_timezone = "Nowhere/Special".to_owned();

        let mut bad_cost = AppConfig::default();
        bad_cost.security.bcrypt_cost = 3;

        for config in [
            short_interval,
            long_interval,
            nan_interval,
            bad_level,
            bad_timezone,
            bad_cost,
        ] {
            assert!(matches!(
                config.validate(),
                Err(Error::InvalidAppConfig(_))
            ));
        }
    }
}
