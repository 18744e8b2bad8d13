//! User Preferences Management
//!
//! This module handles saving and loading per-user preferences, such as the
//! default report period or how many rows to show per page. Preferences are a
//! free-form JSON object stored as one row per user.

use rusqlite::{Connection, OptionalExtension};
use serde_json::{Map, Value};
use time::OffsetDateTime;

use crate::{Error, UserID};

/// Create the user_preferences table in the database.
///
/// Uses user_id as the primary key so each user has at most one row.
///
/// # Errors
/// Returns an error if the table cannot be created or if there is an SQL error.
pub fn create_preferences_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS user_preferences (
            user_id INTEGER PRIMARY KEY,
            preferences TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            FOREIGN KEY(user_id) REFERENCES user(id) ON UPDATE CASCADE ON DELETE CASCADE
        )",
        (),
    )?;

    Ok(())
}

/// Gets the preferences of a user.
///
/// Returns an empty map if the user has never saved preferences. A row that does
/// not hold a JSON object is logged and treated as empty.
///
/// # Errors
/// Returns [Error::SqlError] if the SQL query fails.
pub fn load_user_preferences(
    user_id: UserID,
    connection: &Connection,
) -> Result<Map<String, Value>, Error> {
    let raw: Option<String> = connection
        .query_row(
            "SELECT preferences FROM user_preferences WHERE user_id = ?1",
            [user_id.as_i64()],
            |row| row.get(0),
        )
        .optional()?;

    let Some(raw) = raw else {
        return Ok(Map::new());
    };

    match serde_json::from_str(&raw) {
        Ok(preferences) => Ok(preferences),
        Err(error) => {
            tracing::warn!("ignoring corrupt preferences for user {user_id}: {error}");
            Ok(Map::new())
        }
    }
}

/// Saves the preferences of a user, replacing any previous preferences.
///
/// # Errors
/// Returns [Error::SqlError] if the SQL query fails, for example because the user
/// does not exist.
pub fn save_user_preferences(
    user_id: UserID,
    preferences: &Map<String, Value>,
    now: OffsetDateTime,
    connection: &Connection,
) -> Result<(), Error> {
    let text = serde_json::to_string(preferences)?;

    connection.execute(
        "INSERT INTO user_preferences (user_id, preferences, updated_at) VALUES (?1, ?2, ?3)
        ON CONFLICT(user_id) DO UPDATE SET
            preferences = excluded.preferences,
            updated_at = excluded.updated_at",
        (user_id.as_i64(), text, now),
    )?;

    Ok(())
}

/// Set a single preference, keeping the others.
pub fn update_user_setting(
    user_id: UserID,
    key: &str,
    value: Value,
    now: OffsetDateTime,
    connection: &Connection,
) -> Result<(), Error> {
    let transaction = connection.unchecked_transaction()?;

    let mut preferences = load_user_preferences(user_id, &transaction)?;
    preferences.insert(key.to_owned(), value);
    save_user_preferences(user_id, &preferences, now, &transaction)?;

    transaction.commit()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::{Map, json};

    use crate::{
        Role,
        test_utils::{TEST_NOW, create_test_user, get_test_connection},
    };

    use super::{load_user_preferences, save_user_preferences, update_user_setting};

    #[test]
    fn missing_preferences_are_empty() {
        let connection = get_test_connection();
        let user = create_test_user("alice", Role::User, &connection);

        let preferences = load_user_preferences(user.id, &connection).unwrap();

        assert!(preferences.is_empty());
    }

    #[test]
    fn save_then_load() {
        let connection = get_test_connection();
        let user = create_test_user("alice", Role::User, &connection);
        let mut preferences = Map::new();
        preferences.insert("page_size".to_owned(), json!(25));

        save_user_preferences(user.id, &preferences, TEST_NOW, &connection).unwrap();

        assert_eq!(load_user_preferences(user.id, &connection), Ok(preferences));
    }

    #[test]
    fn update_user_setting_merges_keys() {
        let connection = get_test_connection();
        let user = create_test_user("alice", Role::User, &connection);

        update_user_setting(user.id, "theme", json!("dark"), TEST_NOW, &connection).unwrap();
        update_user_setting(user.id, "page_size", json!(10), TEST_NOW, &connection).unwrap();
        update_user_setting(user.id, "theme", json!("light"), TEST_NOW, &connection).unwrap();

        let preferences = load_user_preferences(user.id, &connection).unwrap();
        assert_eq!(preferences.len(), 2);
        assert_eq!(preferences["theme"], json!("light"));
        assert_eq!(preferences["page_size"], json!(10));
    }

    #[test]
    fn corrupt_preferences_are_treated_as_empty() {
        let connection = get_test_connection();
        let user = create_test_user("alice", Role::User, &connection);
        connection
            .execute(
                "INSERT INTO user_preferences (user_id, preferences, updated_at)
                VALUES (?1, '{not json', '2025-01-01')",
                [user.id.as_i64()],
            )
            .unwrap();

        let preferences = load_user_preferences(user.id, &connection).unwrap();

        assert!(preferences.is_empty());
    }
}
