//! Typed key/value settings stored in the database.
//!
//! Values are stored as text next to their declared type and parsed back into a
//! [ConfigValue] when read.

use std::{collections::BTreeMap, fmt::Display, str::FromStr};

use rusqlite::{Connection, OptionalExtension};
use serde_json::Value;

use crate::Error;

/// The declared type of a stored setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigType {
    /// Free text.
    String,
    /// A 64 bit signed integer.
    Integer,
    /// A floating point number.
    Float,
    /// true or false.
    Boolean,
    /// Any JSON value.
    Json,
}

impl ConfigType {
    /// The text stored in the `type` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigType::String => "string",
            ConfigType::Integer => "integer",
            ConfigType::Float => "float",
            ConfigType::Boolean => "boolean",
            ConfigType::Json => "json",
        }
    }
}

impl FromStr for ConfigType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "string" | "str" => Ok(ConfigType::String),
            "integer" | "int" => Ok(ConfigType::Integer),
            "float" => Ok(ConfigType::Float),
            "boolean" | "bool" => Ok(ConfigType::Boolean),
            "json" => Ok(ConfigType::Json),
            other => Err(Error::InvalidConfigValue {
                key: String::new(),
                reason: format!("unknown config type {other:?}"),
            }),
        }
    }
}

impl Display for ConfigType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A typed setting value.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValue {
    /// Free text.
    String(String),
    /// A 64 bit signed integer.
    Integer(i64),
    /// A floating point number.
    Float(f64),
    /// true or false.
    Boolean(bool),
    /// Any JSON value.
    Json(Value),
}

impl ConfigValue {
    /// The declared type of the value.
    pub fn config_type(&self) -> ConfigType {
        match self {
            ConfigValue::String(_) => ConfigType::String,
            ConfigValue::Integer(_) => ConfigType::Integer,
            ConfigValue::Float(_) => ConfigType::Float,
            ConfigValue::Boolean(_) => ConfigType::Boolean,
            ConfigValue::Json(_) => ConfigType::Json,
        }
    }

    /// Pick the narrowest type that holds a JSON value.
    pub fn detect(value: Value) -> Self {
        match value {
            Value::Bool(flag) => ConfigValue::Boolean(flag),
            Value::String(text) => ConfigValue::String(text),
            Value::Number(number) => match number.as_i64() {
                Some(integer) => ConfigValue::Integer(integer),
                None => ConfigValue::Float(number.as_f64().unwrap_or_default()),
            },
            other => ConfigValue::Json(other),
        }
    }

    /// Interpret text typed by a person: valid JSON is detected with
    /// [ConfigValue::detect], anything else is a string.
    pub fn infer(raw: &str) -> Self {
        match serde_json::from_str(raw) {
            Ok(value) => Self::detect(value),
            Err(_) => ConfigValue::String(raw.to_owned()),
        }
    }

    /// Parse stored text as `config_type`.
    ///
    /// # Errors
    /// Returns [Error::InvalidConfigValue] if `raw` is not a valid `config_type`.
    pub fn parse(key: &str, raw: &str, config_type: ConfigType) -> Result<Self, Error> {
        let invalid = |reason: String| Error::InvalidConfigValue {
            key: key.to_owned(),
            reason,
        };

        match config_type {
            ConfigType::String => Ok(ConfigValue::String(raw.to_owned())),
            ConfigType::Integer => raw
                .trim()
                .parse()
                .map(ConfigValue::Integer)
                .map_err(|_| invalid(format!("{raw:?} is not an integer"))),
            ConfigType::Float => raw
                .trim()
                .parse()
                .map(ConfigValue::Float)
                .map_err(|_| invalid(format!("{raw:?} is not a number"))),
            ConfigType::Boolean => match raw.trim().to_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => Ok(ConfigValue::Boolean(true)),
                "false" | "0" | "no" | "off" => Ok(ConfigValue::Boolean(false)),
                _ => Err(invalid(format!("{raw:?} is not a boolean"))),
            },
            ConfigType::Json => serde_json::from_str(raw)
                .map(ConfigValue::Json)
                .map_err(|error| invalid(error.to_string())),
        }
    }

    /// The text stored in the `value` column.
    pub fn to_db_text(&self) -> String {
        match self {
            ConfigValue::String(text) => text.clone(),
            ConfigValue::Integer(integer) => integer.to_string(),
            ConfigValue::Float(float) => float.to_string(),
            ConfigValue::Boolean(flag) => flag.to_string(),
            ConfigValue::Json(value) => value.to_string(),
        }
    }

    /// The value as JSON.
    pub fn to_json(&self) -> Value {
        match self {
            ConfigValue::String(text) => Value::String(text.clone()),
            ConfigValue::Integer(integer) => Value::from(*integer),
            ConfigValue::Float(float) => Value::from(*float),
            ConfigValue::Boolean(flag) => Value::Bool(*flag),
            ConfigValue::Json(value) => value.clone(),
        }
    }
}

impl Display for ConfigValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_db_text())
    }
}

/// The settings written into a new database.
const DEFAULT_CONFIGS: [(&str, &str, ConfigType, &str); 11] = [
    ("app.name", "Fintrack", ConfigType::String, "Application name"),
    ("app.version", "1.0.0", ConfigType::String, "Application version"),
    ("app.currency_symbol", "¥", ConfigType::String, "Currency symbol"),
    ("app.date_format", "YYYY-MM-DD", ConfigType::String, "Date format"),
    ("app.max_records_per_page", "50", ConfigType::Integer, "Maximum rows per page"),
    ("security.password_min_length", "8", ConfigType::Integer, "Minimum password length"),
    (
        "security.require_strong_password",
        "false",
        ConfigType::Boolean,
        "Reject easily guessed passwords",
    ),
    (
        "security.login_attempts",
        "5",
        ConfigType::Integer,
        "Failed log-ins before an account is locked, 0 disables locking",
    ),
    ("backup.enabled", "true", ConfigType::Boolean, "Enable automatic backups"),
    ("backup.interval_hours", "24", ConfigType::Integer, "Hours between automatic backups"),
    ("notification.email_enabled", "false", ConfigType::Boolean, "Enable email notifications"),
];

/// Create the settings table.
pub fn create_system_config_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS system_config (
            id INTEGER PRIMARY KEY,
            key TEXT NOT NULL UNIQUE,
            value TEXT NOT NULL,
            type TEXT NOT NULL DEFAULT 'string',
            description TEXT,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        );",
    )?;

    Ok(())
}

/// Insert the default settings if the table is empty.
pub fn seed_default_configs(connection: &Connection) -> Result<(), Error> {
    let count: i64 = connection.query_row("SELECT COUNT(id) FROM system_config", [], |row| {
        row.get(0)
    })?;

    if count > 0 {
        return Ok(());
    }

    let mut statement = connection.prepare(
        "INSERT INTO system_config (key, value, type, description) VALUES (?1, ?2, ?3, ?4)",
    )?;

    for (key, value, config_type, description) in DEFAULT_CONFIGS {
        statement.execute((key, value, config_type.as_str(), description))?;
    }

    Ok(())
}

/// Get a setting, or `None` if it is not set.
///
/// # Errors
/// Returns [Error::InvalidConfigValue] if the stored text does not match its type.
pub fn get_config(key: &str, connection: &Connection) -> Result<Option<ConfigValue>, Error> {
    let row: Option<(String, String)> = connection
        .query_row(
            "SELECT value, type FROM system_config WHERE key = ?1",
            [key],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;

    match row {
        Some((raw, raw_type)) => {
            let config_type = raw_type.parse().map_err(|_| Error::InvalidConfigValue {
                key: key.to_owned(),
                reason: format!("unknown config type {raw_type:?}"),
            })?;
            ConfigValue::parse(key, &raw, config_type).map(Some)
        }
        None => Ok(None),
    }
}

/// Get a setting, or `default` if it is not set.
pub fn get_config_or(
    key: &str,
    default: ConfigValue,
    connection: &Connection,
) -> Result<ConfigValue, Error> {
    Ok(get_config(key, connection)?.unwrap_or(default))
}

/// Get an integer setting, or `default` if it is not set.
///
/// # Errors
/// Returns [Error::InvalidConfigValue] if the setting is not a whole number.
pub fn get_integer_or(key: &str, default: i64, connection: &Connection) -> Result<i64, Error> {
    match get_config(key, connection)? {
        None => Ok(default),
        Some(ConfigValue::Integer(integer)) => Ok(integer),
        Some(ConfigValue::Float(float)) if float.fract() == 0.0 => Ok(float as i64),
        Some(ConfigValue::String(text)) => ConfigValue::parse(key, &text, ConfigType::Integer)
            .map(|value| match value {
                ConfigValue::Integer(integer) => integer,
                _ => default,
            }),
        Some(other) => Err(Error::InvalidConfigValue {
            key: key.to_owned(),
            reason: format!("expected an integer, got {other}"),
        }),
    }
}

/// Get a boolean setting, or `default` if it is not set.
///
/// # Errors
/// Returns [Error::InvalidConfigValue] if the setting is not a boolean.
pub fn get_bool_or(key: &str, default: bool, connection: &Connection) -> Result<bool, Error> {
    match get_config(key, connection)? {
        None => Ok(default),
        Some(ConfigValue::Boolean(flag)) => Ok(flag),
        Some(other) => match ConfigValue::parse(key, &other.to_db_text(), ConfigType::Boolean)? {
            ConfigValue::Boolean(flag) => Ok(flag),
            _ => Ok(default),
        },
    }
}

/// Insert or replace a setting. An existing description is kept if `description` is `None`.
///
/// # Errors
/// Returns [Error::EmptyConfigKey] if `key` is blank.
pub fn set_config(
    key: &str,
    value: &ConfigValue,
    description: Option<&str>,
    connection: &Connection,
) -> Result<(), Error> {
    let key = key.trim();

    if key.is_empty() {
        return Err(Error::EmptyConfigKey);
    }

    connection.execute(
        "INSERT INTO system_config (key, value, type, description) VALUES (?1, ?2, ?3, ?4)
        ON CONFLICT(key) DO UPDATE SET
            value = excluded.value,
            type = excluded.type,
            description = COALESCE(excluded.description, system_config.description),
            updated_at = CURRENT_TIMESTAMP",
        (
            key,
            value.to_db_text(),
            value.config_type().as_str(),
            description,
        ),
    )?;

    tracing::debug!("set config {key} = {value}");

    Ok(())
}

/// Remove a setting. Returns whether it existed.
pub fn delete_config(key: &str, connection: &Connection) -> Result<bool, Error> {
    let rows_affected = connection.execute("DELETE FROM system_config WHERE key = ?1", [key])?;

    Ok(rows_affected > 0)
}

/// Get every setting, ordered by key.
pub fn get_all_configs(connection: &Connection) -> Result<BTreeMap<String, ConfigValue>, Error> {
    get_configs_by_prefix("", connection)
}

/// Get every setting whose key starts with `prefix`, e.g. "security.".
pub fn get_configs_by_prefix(
    prefix: &str,
    connection: &Connection,
) -> Result<BTreeMap<String, ConfigValue>, Error> {
    let rows: Vec<(String, String, String)> = connection
        .prepare(
            "SELECT key, value, type FROM system_config
            WHERE substr(key, 1, length(?1)) = ?1
            ORDER BY key",
        )?
        .query_map([prefix], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
        .collect::<Result<_, _>>()?;

    rows.into_iter()
        .map(|(key, raw, raw_type)| {
            let config_type = raw_type.parse().map_err(|_| Error::InvalidConfigValue {
                key: key.clone(),
                reason: format!("unknown config type {raw_type:?}"),
            })?;
            let value = ConfigValue::parse(&key, &raw, config_type)?;
            Ok((key, value))
        })
        .collect()
}

/// Set several settings at once. Either all of them are written or none are.
pub fn update_multiple_configs(
    configs: &BTreeMap<String, ConfigValue>,
    connection: &Connection,
) -> Result<(), Error> {
    let transaction = connection.unchecked_transaction()?;

    for (key, value) in configs {
        set_config(key, value, None, &transaction)?;
    }

    transaction.commit()?;

    Ok(())
}

/// Export every setting as a pretty printed JSON object.
pub fn export_configs(connection: &Connection) -> Result<String, Error> {
    let object: serde_json::Map<String, Value> = get_all_configs(connection)?
        .into_iter()
        .map(|(key, value)| (key, value.to_json()))
        .collect();

    serde_json::to_string_pretty(&object).map_err(|error| error.into())
}

/// Import settings from a JSON object, returning how many were written.
///
/// Existing keys are skipped unless `overwrite` is true. The import is atomic.
///
/// # Errors
/// Returns [Error::JSONSerializationError] if `json` is not a JSON object.
pub fn import_configs(
    json: &str,
    overwrite: bool,
    connection: &Connection,
) -> Result<usize, Error> {
    let object: serde_json::Map<String, Value> = serde_json::from_str(json)?;

    let transaction = connection.unchecked_transaction()?;
    let mut written = 0;

    for (key, value) in object {
        if !overwrite && get_config(&key, &transaction)?.is_some() {
            continue;
        }

        set_config(&key, &ConfigValue::detect(value), None, &transaction)?;
        written += 1;
    }

    transaction.commit()?;

    Ok(written)
}
