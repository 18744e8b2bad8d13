//! Fintrack is a finance tracker for individuals and small businesses.
//!
//! The library keeps a ledger of accounts, categories and transactions in a
//! local SQLite database, and guards it with users, roles and per-resource
//! permission grants. The `fintrack` binary is a thin command line shell over
//! these operations.

#![warn(missing_docs)]

use std::path::PathBuf;

pub mod account;
pub mod auth;
pub mod backup;
pub mod category;
pub mod config;
pub mod database_id;
pub mod db;
pub mod format;
pub mod logging;
pub mod operation_log;
pub mod pagination;
pub mod password;
pub mod permission;
pub mod preferences;
pub mod report;
pub mod system_config;
pub mod timezone;
pub mod transaction;
pub mod user;

#[cfg(test)]
mod test_utils;

pub use auth::Session;
pub use config::AppConfig;
pub use db::{initialize as initialize_db, open_database};
pub use password::{PasswordHash, PasswordPolicy, ValidatedPassword};
pub use user::{Role, User, UserID, UserStatus};

/// The errors that may occur in the application.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// The username or password was left empty when logging in.
    #[error("username and password cannot be empty")]
    MissingCredentials,

    /// The username does not exist or the password does not match.
    ///
    /// The two cases are deliberately indistinguishable to the caller.
    #[error("incorrect username or password")]
    InvalidCredentials,

    /// The user exists but has been deactivated.
    #[error("this account is inactive, contact an administrator")]
    AccountInactive,

    /// The user has reached the maximum number of failed log-in attempts.
    #[error("this account is locked after too many failed log-in attempts")]
    AccountLocked,

    /// The operation needs a logged in user.
    #[error("you must be logged in to do that")]
    NotAuthenticated,

    /// The logged in user does not have the role or grant needed.
    #[error("you do not have permission to do that")]
    PermissionDenied,

    /// One or more required registration fields were empty.
    #[error("all required fields must be filled in")]
    MissingFields,

    /// A new password and its confirmation did not match.
    #[error("the passwords do not match")]
    PasswordMismatch,

    /// An empty password was given where one is required.
    #[error("password cannot be empty")]
    EmptyPassword,

    /// The user provided a password that is too easy to guess.
    #[error("password is too weak: {0}")]
    TooWeak(String),

    /// An unexpected error occurred with the underlying hashing library, or a
    /// stored hash could not be parsed.
    ///
    /// The error string should only be logged, never shown to a user.
    #[error("hashing failed: {0}")]
    HashingError(String),

    /// The username is already taken.
    #[error("the username \"{0}\" already exists")]
    DuplicateUsername(String),

    /// An empty string was used as a username.
    #[error("username cannot be empty")]
    EmptyUsername,

    /// An empty string was used as a user's full name.
    #[error("full name cannot be empty")]
    EmptyFullname,

    /// A string could not be parsed as a [Role].
    #[error("\"{0}\" is not a valid role")]
    InvalidRole(String),

    /// A string could not be parsed as a status.
    #[error("\"{0}\" is not a valid status")]
    InvalidStatus(String),

    /// An update was requested without any fields to change.
    #[error("there are no fields to update")]
    NoFieldsToUpdate,

    /// A user tried to delete their own account.
    #[error("you cannot delete your own account")]
    CannotDeleteSelf,

    /// The change would leave the system without an active administrator.
    #[error("at least one active administrator must remain")]
    LastAdmin,

    /// Tried to update a user that does not exist
    #[error("tried to update a user that is not in the database")]
    UpdateMissingUser,

    /// A string could not be parsed as a permission or resource type.
    #[error("\"{0}\" is not a valid permission or resource type")]
    InvalidPermission(String),

    /// An empty string was used to create an account name.
    #[error("account name cannot be empty")]
    EmptyAccountName,

    /// The specified account name already exists in the database.
    #[error("the account \"{0}\" already exists in the database")]
    DuplicateAccountName(String),

    /// A string could not be parsed as an account type.
    #[error("\"{0}\" is not a valid account type")]
    InvalidAccountType(String),

    /// The account ID does not refer to a real account.
    #[error("the account ID {0} does not refer to a valid account")]
    InvalidAccount(i64),

    /// The account still has transactions and cannot be deleted.
    #[error("the account has transactions and cannot be deleted")]
    AccountHasTransactions,

    /// Tried to update an account that does not exist
    #[error("tried to update an account that is not in the database")]
    UpdateMissingAccount,

    /// Tried to delete an account that does not exist
    #[error("tried to delete an account that is not in the database")]
    DeleteMissingAccount,

    /// An empty string was used to create a category name.
    #[error("category name cannot be empty")]
    EmptyCategoryName,

    /// A string could not be parsed as a category or transaction type.
    #[error("\"{0}\" is not a valid category type")]
    InvalidCategoryType(String),

    /// The category ID does not refer to a real category.
    #[error("the category ID {0} does not refer to a valid category")]
    InvalidCategory(i64),

    /// The parent category does not exist.
    #[error("the parent category {0} does not exist")]
    InvalidParentCategory(i64),

    /// A category was paired with a parent or transaction of a different type.
    #[error("the category type does not match")]
    CategoryTypeMismatch,

    /// The new parent would make a category its own ancestor.
    #[error("a category cannot be moved underneath itself")]
    CategoryCycle,

    /// The category type cannot change while it has children or transactions.
    #[error("the category is in use and its type cannot be changed")]
    CategoryInUse,

    /// The category has child categories and cannot be deleted.
    #[error("the category has child categories and cannot be deleted")]
    CategoryHasChildren,

    /// The category has transactions and cannot be deleted.
    #[error("the category has transactions and cannot be deleted")]
    CategoryHasTransactions,

    /// Built-in categories cannot be deleted.
    #[error("system categories cannot be deleted")]
    SystemCategory,

    /// Tried to update a category that does not exist
    #[error("tried to update a category that is not in the database")]
    UpdateMissingCategory,

    /// Tried to delete a category that does not exist
    #[error("tried to delete a category that is not in the database")]
    DeleteMissingCategory,

    /// The transaction amount was zero or not a finite number.
    #[error("the amount must be a non-zero number")]
    InvalidAmount,

    /// Tried to update a transaction that does not exist
    #[error("tried to update a transaction that is not in the database")]
    UpdateMissingTransaction,

    /// Tried to delete a transaction that does not exist
    #[error("tried to delete a transaction that is not in the database")]
    DeleteMissingTransaction,

    /// The end of a date range is before its start.
    #[error("the end date must not be before the start date")]
    InvalidDateRange,

    /// An empty string was used as a config key.
    #[error("config key cannot be empty")]
    EmptyConfigKey,

    /// A config value could not be parsed as its declared type.
    #[error("invalid value for config \"{key}\": {reason}")]
    InvalidConfigValue {
        /// The config key.
        key: String,
        /// Why the value was rejected.
        reason: String,
    },

    /// The application config file is invalid.
    #[error("invalid configuration: {0}")]
    InvalidAppConfig(String),

    /// An error occurred while serializing or deserializing JSON.
    #[error("could not (de)serialize JSON: {0}")]
    JSONSerializationError(String),

    /// An error occurred while getting the local timezone from a canonical timezone string.
    #[error("invalid timezone {0}")]
    InvalidTimezoneError(String),

    /// The backup file does not exist.
    #[error("the backup {0:?} does not exist")]
    BackupNotFound(PathBuf),

    /// The path is not inside the backup directory.
    #[error("{0:?} is not inside the backup directory")]
    BackupOutsideDirectory(PathBuf),

    /// A filesystem operation failed.
    #[error("I/O error: {0}")]
    IoError(String),

    /// The database was created by a newer version of the application.
    #[error("the database schema version {0} is newer than this program supports")]
    SchemaTooNew(i64),

    /// The requested resource was not found.
    ///
    /// Internally, this error may occur when a query returns no rows.
    #[error("the requested resource could not be found")]
    NotFound,

    /// An unhandled/unexpected SQL error.
    #[error("an unexpected SQL error occurred: {0}")]
    SqlError(rusqlite::Error),
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            rusqlite::Error::QueryReturnedNoRows => Error::NotFound,
            error => {
                tracing::error!("an unhandled SQL error occurred: {}", error);
                Error::SqlError(error)
            }
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Error::IoError(value.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(value: serde_json::Error) -> Self {
        Error::JSONSerializationError(value.to_string())
    }
}

/// Returns true if `error` is a SQLite constraint violation with the given
/// extended result code, e.g. [rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE].
pub(crate) fn is_constraint_error(error: &rusqlite::Error, extended_code: i32) -> bool {
    matches!(
        error,
        rusqlite::Error::SqliteFailure(rusqlite::ffi::Error { extended_code: code, .. }, _)
            if *code == extended_code
    )
}
