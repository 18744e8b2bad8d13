//! Opening the application database and creating its schema.

use std::{path::Path, str::FromStr};

use rusqlite::{Connection, Row, Transaction as SqlTransaction, TransactionBehavior};
use time::OffsetDateTime;

use crate::{
    Error, PasswordHash, Role, User,
    account::{create_account_table, seed_default_accounts},
    category::{create_category_table, seed_default_categories},
    operation_log::create_operation_log_table,
    permission::create_permission_table,
    preferences::create_preferences_table,
    system_config::{create_system_config_table, seed_default_configs},
    transaction::create_transaction_table,
    user::{NewUser, count_active_admins, create_user, create_user_table},
};

/// The schema version written to `PRAGMA user_version` by [initialize].
pub const SCHEMA_VERSION: i64 = 1;

/// Open the database file at `path`, creating it if it does not exist.
///
/// Foreign key enforcement is switched on for the returned connection.
///
/// # Errors
/// Returns [Error::SchemaTooNew] if the file was written by a newer version of the
/// application, or an SQL error if the file could not be opened.
pub fn open_database(path: &Path) -> Result<Connection, Error> {
    let connection = Connection::open(path)?;
    connection.execute_batch("PRAGMA foreign_keys = ON;")?;

    let version = schema_version(&connection)?;

    if version > SCHEMA_VERSION {
        return Err(Error::SchemaTooNew(version));
    }

    tracing::debug!("opened database {} (schema version {version})", path.display());

    Ok(connection)
}

/// Read the schema version stored in the database header.
pub fn schema_version(connection: &Connection) -> Result<i64, Error> {
    connection
        .query_row("PRAGMA user_version", [], |row| row.get(0))
        .map_err(|error| error.into())
}

/// Create the application tables and seed the default accounts, categories and
/// system settings.
///
/// Safe to call on an existing database: tables are only created if missing and
/// seed rows are only inserted into empty tables.
///
/// # Errors
/// Returns an error if any of the tables could not be created.
pub fn initialize(connection: &Connection) -> Result<(), Error> {
    // Has no effect inside a transaction.
    connection.execute_batch("PRAGMA foreign_keys = ON;")?;

    let transaction = SqlTransaction::new_unchecked(connection, TransactionBehavior::Exclusive)?;

    create_user_table(&transaction)?;
    create_permission_table(&transaction)?;
    create_operation_log_table(&transaction)?;
    create_account_table(&transaction)?;
    create_category_table(&transaction)?;
    create_transaction_table(&transaction)?;
    create_system_config_table(&transaction)?;
    create_preferences_table(&transaction)?;

    let now = OffsetDateTime::now_utc();
    seed_default_accounts(now, &transaction)?;
    seed_default_categories(now, &transaction)?;
    seed_default_configs(&transaction)?;

    transaction.execute_batch(&format!("PRAGMA user_version = {SCHEMA_VERSION};"))?;
    transaction.commit()?;

    Ok(())
}

/// Create an admin with the given credentials if there is no active admin yet.
///
/// Returns the new admin, or `None` if an active admin already exists.
///
/// # Errors
/// Returns [Error::DuplicateUsername] if `username` is taken by a non-admin or an
/// inactive admin.
pub fn ensure_admin_user(
    username: &str,
    password_hash: PasswordHash,
    now: OffsetDateTime,
    connection: &Connection,
) -> Result<Option<User>, Error> {
    if count_active_admins(connection)? > 0 {
        return Ok(None);
    }

    let admin = create_user(
        NewUser {
            username: username.to_owned(),
            password_hash,
            fullname: "Administrator".to_owned(),
            email: None,
            role: Role::Admin,
            created_at: now,
        },
        connection,
    )?;

    tracing::info!("created admin user \"{}\"", admin.username);

    Ok(Some(admin))
}

/// Read a text column and parse it with [FromStr].
pub(crate) fn parse_column<T>(row: &Row, index: usize) -> Result<T, rusqlite::Error>
where
    T: FromStr<Err = Error>,
{
    let raw: String = row.get(index)?;

    raw.parse().map_err(|error| {
        rusqlite::Error::FromSqlConversionFailure(
            index,
            rusqlite::types::Type::Text,
            Box::new(error),
        )
    })
}

/// Read a `COUNT(..)` column, which SQLite returns as a signed integer.
pub(crate) fn count_column(row: &Row, index: usize) -> Result<usize, rusqlite::Error> {
    let count: i64 = row.get(index)?;

    usize::try_from(count).map_err(|error| {
        rusqlite::Error::FromSqlConversionFailure(
            index,
            rusqlite::types::Type::Integer,
            Box::new(error),
        )
    })
}
