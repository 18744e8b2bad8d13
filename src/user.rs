//! Code for creating the user table and fetching users from the database.

use std::{fmt::Display, str::FromStr};

use rusqlite::{Connection, Row, ToSql, params_from_iter};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{
    Error, PasswordHash,
    db::{count_column, parse_column},
    is_constraint_error,
};

/// A newtype wrapper for integer user IDs.
///
/// This helps disambiguate user IDs from other types of IDs, leading to better compile time
/// errors, and more flexible generics that can have distinct implementations for multiple ID types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct UserID(i64);

impl UserID {
    /// Create a new user ID.
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Cast the user ID to a 64 bit integer.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl Display for UserID {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// What a user is allowed to do by default.
///
/// [Role::Admin] passes every role check, the other roles only pass checks for themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Full access, including user management and system settings.
    Admin,
    /// May manage accounts, categories and transactions.
    Manager,
    /// A regular user.
    User,
}

impl Role {
    /// The text stored in the database for this role.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Manager => "manager",
            Role::User => "user",
        }
    }
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "manager" => Ok(Role::Manager),
            "user" => Ok(Role::User),
            _ => Err(Error::InvalidRole(s.to_owned())),
        }
    }
}

impl Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Whether a user may log in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    /// The user may log in.
    Active,
    /// The user has been deactivated (soft deleted).
    Inactive,
}

impl UserStatus {
    /// The text stored in the database for this status.
    pub fn as_str(&self) -> &'static str {
        match self {
            UserStatus::Active => "active",
            UserStatus::Inactive => "inactive",
        }
    }
}

impl FromStr for UserStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "active" => Ok(UserStatus::Active),
            "inactive" => Ok(UserStatus::Inactive),
            _ => Err(Error::InvalidStatus(s.to_owned())),
        }
    }
}

impl Display for UserStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A user of the application.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct User {
    /// The user's ID in the application database.
    pub id: UserID,
    /// The name the user logs in with.
    pub username: String,
    /// The user's password hash.
    #[serde(skip_serializing)]
    pub password_hash: PasswordHash,
    /// The user's display name.
    pub fullname: String,
    /// An optional contact email.
    pub email: Option<String>,
    /// The user's role.
    pub role: Role,
    /// Whether the user may log in.
    pub status: UserStatus,
    /// When the user was created.
    pub created_at: OffsetDateTime,
    /// When the user last logged in successfully.
    pub last_login: Option<OffsetDateTime>,
    /// How many failed log-in attempts have been made since the last successful one.
    pub failed_login_attempts: u32,
}

impl User {
    /// Whether the user has the admin role.
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Whether the user may log in.
    pub fn is_active(&self) -> bool {
        self.status == UserStatus::Active
    }
}

/// The data needed to insert a new user.
#[derive(Debug, Clone)]
pub struct NewUser {
    /// The name the user logs in with. Leading and trailing whitespace is removed.
    pub username: String,
    /// The hash of the user's password.
    pub password_hash: PasswordHash,
    /// The user's display name.
    pub fullname: String,
    /// An optional contact email.
    pub email: Option<String>,
    /// The user's role.
    pub role: Role,
    /// When the user was created.
    pub created_at: OffsetDateTime,
}

/// The fields of a user that may be changed after creation.
///
/// `None` leaves the field as it is.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UserUpdate {
    /// A new display name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fullname: Option<String>,
    /// A new contact email.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// A new role.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    /// A new status.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<UserStatus>,
}

impl UserUpdate {
    /// Whether no fields are set.
    pub fn is_empty(&self) -> bool {
        self.fullname.is_none()
            && self.email.is_none()
            && self.role.is_none()
            && self.status.is_none()
    }
}

/// Optional criteria for listing users.
#[derive(Debug, Clone, Copy, Default)]
pub struct UserFilter {
    /// Only list users with this role.
    pub role: Option<Role>,
    /// Only list users with this status.
    pub status: Option<UserStatus>,
}

const USER_COLUMNS: &str = "id, username, password, fullname, email, role, status, created_at, \
    last_login, failed_login_attempts";

/// Create the user table.
///
/// # Errors
///
/// This function will return an error if the SQL query failed.
pub fn create_user_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS user (
            id INTEGER PRIMARY KEY,
            username TEXT NOT NULL UNIQUE,
            password TEXT NOT NULL,
            fullname TEXT NOT NULL,
            email TEXT,
            role TEXT NOT NULL DEFAULT 'user' CHECK (role IN ('admin', 'manager', 'user')),
            status TEXT NOT NULL DEFAULT 'active' CHECK (status IN ('active', 'inactive')),
            created_at TEXT NOT NULL,
            last_login TEXT,
            failed_login_attempts INTEGER NOT NULL DEFAULT 0
        );

        CREATE INDEX IF NOT EXISTS idx_user_username ON user(username);",
    )?;

    Ok(())
}

/// Create and insert a new user into the database.
///
/// # Errors
///
/// Returns:
/// - [Error::EmptyUsername] or [Error::EmptyFullname] if either is blank,
/// - [Error::DuplicateUsername] if the username is taken,
/// - [Error::SqlError] if an SQL related error occurred.
pub fn create_user(new_user: NewUser, connection: &Connection) -> Result<User, Error> {
    let username = new_user.username.trim();

    if username.is_empty() {
        return Err(Error::EmptyUsername);
    }

    let fullname = new_user.fullname.trim();

    if fullname.is_empty() {
        return Err(Error::EmptyFullname);
    }

    let email = new_user
        .email
        .as_deref()
        .map(str::trim)
        .filter(|email| !email.is_empty());

    connection
        .execute(
            "INSERT INTO user (username, password, fullname, email, role, status, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, 'active', ?6)",
            (
                username,
                new_user.password_hash.as_ref(),
                fullname,
                email,
                new_user.role.as_str(),
                new_user.created_at,
            ),
        )
        .map_err(|error| {
            if is_constraint_error(&error, rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE) {
                Error::DuplicateUsername(username.to_owned())
            } else {
                error.into()
            }
        })?;

    let id = UserID::new(connection.last_insert_rowid());

    Ok(User {
        id,
        username: username.to_owned(),
        password_hash: new_user.password_hash,
        fullname: fullname.to_owned(),
        email: email.map(str::to_owned),
        role: new_user.role,
        status: UserStatus::Active,
        created_at: new_user.created_at,
        last_login: None,
        failed_login_attempts: 0,
    })
}

/// Get the user from the database with an ID equal to `user_id`.
///
/// # Errors
///
/// This function will return an error if:
/// - `user_id` does not belong to a registered user.
/// - there was an error trying to access the store.
pub fn get_user_by_id(user_id: UserID, connection: &Connection) -> Result<User, Error> {
    connection
        .prepare(&format!("SELECT {USER_COLUMNS} FROM user WHERE id = :id"))?
        .query_row(&[(":id", &user_id.as_i64())], map_row)
        .map_err(|error| error.into())
}

/// Get the user with the given username.
///
/// # Errors
///
/// Returns [Error::NotFound] if there is no such user.
pub fn get_user_by_username(username: &str, connection: &Connection) -> Result<User, Error> {
    connection
        .prepare(&format!(
            "SELECT {USER_COLUMNS} FROM user WHERE username = :username"
        ))?
        .query_row(&[(":username", username.trim())], map_row)
        .map_err(|error| error.into())
}

/// Get every user matching `filter`, ordered by username.
pub fn get_all_users(filter: UserFilter, connection: &Connection) -> Result<Vec<User>, Error> {
    let mut clauses = Vec::new();
    let mut params: Vec<&dyn ToSql> = Vec::new();

    let role = filter.role.map(|role| role.as_str());
    let status = filter.status.map(|status| status.as_str());

    if let Some(role) = &role {
        params.push(role);
        clauses.push(format!("role = ?{}", params.len()));
    }

    if let Some(status) = &status {
        params.push(status);
        clauses.push(format!("status = ?{}", params.len()));
    }

    let where_clause = if clauses.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", clauses.join(" AND "))
    };

    connection
        .prepare(&format!(
            "SELECT {USER_COLUMNS} FROM user {where_clause} ORDER BY username ASC"
        ))?
        .query_map(params_from_iter(params), map_row)?
        .map(|maybe_user| maybe_user.map_err(|error| error.into()))
        .collect()
}

/// Change the fullname, email, role and/or status of a user.
///
/// # Errors
///
/// Returns:
/// - [Error::NoFieldsToUpdate] if `update` is empty,
/// - [Error::EmptyFullname] if the new fullname is blank,
/// - [Error::UpdateMissingUser] if the user does not exist.
pub fn update_user(
    user_id: UserID,
    update: &UserUpdate,
    connection: &Connection,
) -> Result<(), Error> {
    if update.is_empty() {
        return Err(Error::NoFieldsToUpdate);
    }

    let fullname = update.fullname.as_deref().map(str::trim);

    if fullname.is_some_and(str::is_empty) {
        return Err(Error::EmptyFullname);
    }

    let email = update.email.as_deref().map(str::trim);
    let role = update.role.map(|role| role.as_str());
    let status = update.status.map(|status| status.as_str());

    let mut assignments = Vec::new();
    let mut params: Vec<&dyn ToSql> = Vec::new();

    if let Some(fullname) = &fullname {
        params.push(fullname);
        assignments.push(format!("fullname = ?{}", params.len()));
    }

    if let Some(email) = &email {
        params.push(email);
        assignments.push(format!("email = NULLIF(?{}, '')", params.len()));
    }

    if let Some(role) = &role {
        params.push(role);
        assignments.push(format!("role = ?{}", params.len()));
    }

    if let Some(status) = &status {
        params.push(status);
        assignments.push(format!("status = ?{}", params.len()));
    }

    let id = user_id.as_i64();
    params.push(&id);
    let query = format!(
        "UPDATE user SET {} WHERE id = ?{}",
        assignments.join(", "),
        params.len()
    );

    let rows_affected = connection.execute(&query, params_from_iter(params))?;

    if rows_affected == 0 {
        return Err(Error::UpdateMissingUser);
    }

    Ok(())
}

/// Replace the stored password hash of a user.
///
/// # Errors
///
/// Returns [Error::UpdateMissingUser] if the user does not exist.
pub fn set_password_hash(
    user_id: UserID,
    password_hash: &PasswordHash,
    connection: &Connection,
) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "UPDATE user SET password = ?1 WHERE id = ?2",
        (password_hash.as_ref(), user_id.as_i64()),
    )?;

    if rows_affected == 0 {
        return Err(Error::UpdateMissingUser);
    }

    Ok(())
}

/// Set the last log-in time of a user and reset their failed attempt counter.
pub fn record_successful_login(
    user_id: UserID,
    now: OffsetDateTime,
    connection: &Connection,
) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "UPDATE user SET last_login = ?1, failed_login_attempts = 0 WHERE id = ?2",
        (now, user_id.as_i64()),
    )?;

    if rows_affected == 0 {
        return Err(Error::UpdateMissingUser);
    }

    Ok(())
}

/// Increment the failed log-in counter of a user and return the new count.
pub fn record_failed_login(user_id: UserID, connection: &Connection) -> Result<u32, Error> {
    connection
        .query_row(
            "UPDATE user SET failed_login_attempts = failed_login_attempts + 1
            WHERE id = ?1
            RETURNING failed_login_attempts",
            [user_id.as_i64()],
            |row| row.get(0),
        )
        .map_err(|error| match error {
            rusqlite::Error::QueryReturnedNoRows => Error::UpdateMissingUser,
            error => error.into(),
        })
}

/// Reset the failed log-in counter of a user, unlocking them.
pub fn clear_failed_logins(user_id: UserID, connection: &Connection) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "UPDATE user SET failed_login_attempts = 0 WHERE id = ?1",
        [user_id.as_i64()],
    )?;

    if rows_affected == 0 {
        return Err(Error::UpdateMissingUser);
    }

    Ok(())
}

/// Soft delete a user by setting their status to inactive.
pub fn deactivate_user(user_id: UserID, connection: &Connection) -> Result<(), Error> {
    update_user(
        user_id,
        &UserUpdate {
            status: Some(UserStatus::Inactive),
            ..Default::default()
        },
        connection,
    )
}

/// Get the number of users in the database.
///
/// # Errors
///
/// Returns a [Error::SqlError] if an SQL related error occurred.
pub fn count_users(connection: &Connection) -> Result<usize, Error> {
    connection
        .query_row("SELECT COUNT(id) FROM user;", [], |row| count_column(row, 0))
        .map_err(|error| error.into())
}

/// Get the number of active users with the admin role.
pub fn count_active_admins(connection: &Connection) -> Result<usize, Error> {
    connection
        .query_row(
            "SELECT COUNT(id) FROM user WHERE role = 'admin' AND status = 'active';",
            [],
            |row| count_column(row, 0),
        )
        .map_err(|error| error.into())
}

fn map_row(row: &Row) -> Result<User, rusqlite::Error> {
    let raw_password_hash: String = row.get(2)?;

    Ok(User {
        id: UserID::new(row.get(0)?),
        username: row.get(1)?,
        password_hash: PasswordHash::new_unchecked(&raw_password_hash),
        fullname: row.get(3)?,
        email: row.get(4)?,
        role: parse_column(row, 5)?,
        status: parse_column(row, 6)?,
        created_at: row.get(7)?,
        last_login: row.get(8)?,
        failed_login_attempts: row.get(9)?,
    })
}

#[cfg(test)]
mod role_tests {
    use std::str::FromStr;

    use crate::{Error, Role, UserStatus};

    #[test]
    fn parses_roles_case_insensitively() {
        assert_eq!(Role::from_str("Admin"), Ok(Role::Admin));
        assert_eq!(Role::from_str("manager"), Ok(Role::Manager));
        assert_eq!(Role::from_str(" USER "), Ok(Role::User));
    }

    #[test]
    fn rejects_unknown_role() {
        assert_eq!(
            Role::from_str("superuser"),
            Err(Error::InvalidRole("superuser".to_owned()))
        );
    }

    #[test]
    fn rejects_unknown_status() {
        assert_eq!(
            UserStatus::from_str("banned"),
            Err(Error::InvalidStatus("banned".to_owned()))
        );
    }

    #[test]
    fn display_matches_column_text() {
        assert_eq!(Role::Manager.to_string(), "manager");
        assert_eq!(UserStatus::Inactive.to_string(), "inactive");
    }
}

#[cfg(test)]
mod user_tests {
    use rusqlite::Connection;
    use time::macros::datetime;

    use crate::{
        Error, PasswordHash, Role, UserID, UserStatus,
        user::{
            NewUser, UserFilter, UserUpdate, clear_failed_logins, count_active_admins,
            count_users, create_user, deactivate_user, get_all_users, get_user_by_id,
            get_user_by_username, record_failed_login, record_successful_login,
            set_password_hash, update_user,
        },
    };

    use super::create_user_table;

    fn get_db_connection() -> Connection {
        let conn =
            Connection::open_in_memory().expect("Could not create in-memory SQLite database");
        create_user_table(&conn).expect("Could not create user table");

        conn
    }

    fn new_user(username: &str, role: Role) -> NewUser {
        NewUser {
            username: username.to_owned(),
            password_hash: PasswordHash::new_unchecked("hunter2"),
            fullname: format!("{username} smith"),
            email: None,
            role,
            created_at: datetime!(2025-01-01 09:00 UTC),
        }
    }

    #[test]
    fn insert_user_succeeds() {
        let db_connection = get_db_connection();

        let inserted_user = create_user(new_user("alice", Role::User), &db_connection).unwrap();

        assert!(inserted_user.id.as_i64() > 0);
        assert_eq!(inserted_user.username, "alice");
        assert_eq!(inserted_user.password_hash, PasswordHash::new_unchecked("hunter2"));
        assert_eq!(inserted_user.status, UserStatus::Active);
        assert_eq!(inserted_user.failed_login_attempts, 0);
    }

    #[test]
    fn insert_user_trims_username() {
        let db_connection = get_db_connection();

        let inserted_user =
            create_user(new_user("  bob ", Role::User), &db_connection).unwrap();

        assert_eq!(inserted_user.username, "bob");
    }

    #[test]
    fn insert_user_fails_on_empty_username() {
        let db_connection = get_db_connection();

        let result = create_user(new_user(" ", Role::User), &db_connection);

        assert_eq!(result, Err(Error::EmptyUsername));
    }

    #[test]
    fn insert_user_fails_on_empty_fullname() {
        let db_connection = get_db_connection();
        let mut user = new_user("carol", Role::User);
        user.fullname = "\t".to_owned();

        let result = create_user(user, &db_connection);

        assert_eq!(result, Err(Error::EmptyFullname));
    }

    #[test]
    fn insert_user_fails_on_duplicate_username() {
        let db_connection = get_db_connection();
        create_user(new_user("dave", Role::User), &db_connection).unwrap();

        let result = create_user(new_user("dave", Role::Manager), &db_connection);

        assert_eq!(result, Err(Error::DuplicateUsername("dave".to_owned())));
    }

    #[test]
    fn get_user_by_id_succeeds() {
        let db_connection = get_db_connection();
        let inserted_user = create_user(new_user("erin", Role::User), &db_connection).unwrap();

        let user = get_user_by_id(inserted_user.id, &db_connection).unwrap();

        assert_eq!(user, inserted_user);
    }

    #[test]
    fn get_user_fails_with_non_existent_id() {
        let db_connection = get_db_connection();

        let result = get_user_by_id(UserID::new(42), &db_connection);

        assert_eq!(result, Err(Error::NotFound));
    }

    #[test]
    fn get_user_by_username_succeeds() {
        let db_connection = get_db_connection();
        let inserted_user = create_user(new_user("frank", Role::User), &db_connection).unwrap();

        let user = get_user_by_username("frank", &db_connection).unwrap();

        assert_eq!(user, inserted_user);
        assert_eq!(
            get_user_by_username("nobody", &db_connection),
            Err(Error::NotFound)
        );
    }

    #[test]
    fn get_all_users_filters_and_orders_by_username() {
        let db_connection = get_db_connection();
        create_user(new_user("zoe", Role::Manager), &db_connection).unwrap();
        create_user(new_user("adam", Role::User), &db_connection).unwrap();
        let mike = create_user(new_user("mike", Role::Manager), &db_connection).unwrap();
        deactivate_user(mike.id, &db_connection).unwrap();

        let all_users = get_all_users(UserFilter::default(), &db_connection).unwrap();
        let active_managers = get_all_users(
            UserFilter {
                role: Some(Role::Manager),
                status: Some(UserStatus::Active),
            },
            &db_connection,
        )
        .unwrap();

        let names: Vec<_> = all_users.iter().map(|user| user.username.as_str()).collect();
        assert_eq!(names, ["adam", "mike", "zoe"]);
        assert_eq!(active_managers.len(), 1);
        assert_eq!(active_managers[0].username, "zoe");
    }

    #[test]
    fn update_user_changes_only_given_fields() {
        let db_connection = get_db_connection();
        let user = create_user(new_user("gina", Role::User), &db_connection).unwrap();

        update_user(
            user.id,
            &UserUpdate {
                email: Some("gina@example.com".to_owned()),
                role: Some(Role::Manager),
                ..Default::default()
            },
            &db_connection,
        )
        .unwrap();

        let got = get_user_by_id(user.id, &db_connection).unwrap();
        assert_eq!(got.fullname, user.fullname);
        assert_eq!(got.email.as_deref(), Some("gina@example.com"));
        assert_eq!(got.role, Role::Manager);
        assert_eq!(got.status, UserStatus::Active);
    }

    #[test]
    fn update_user_fails_without_fields() {
        let db_connection = get_db_connection();
        let user = create_user(new_user("hank", Role::User), &db_connection).unwrap();

        let result = update_user(user.id, &UserUpdate::default(), &db_connection);

        assert_eq!(result, Err(Error::NoFieldsToUpdate));
    }

    #[test]
    fn update_user_fails_on_missing_user() {
        let db_connection = get_db_connection();

        let result = update_user(
            UserID::new(99),
            &UserUpdate {
                fullname: Some("Nobody".to_owned()),
                ..Default::default()
            },
            &db_connection,
        );

        assert_eq!(result, Err(Error::UpdateMissingUser));
    }

    #[test]
    fn set_password_hash_replaces_hash() {
        let db_connection = get_db_connection();
        let user = create_user(new_user("iris", Role::User), &db_connection).unwrap();
        let new_hash = PasswordHash::new_unchecked("hunter3");

        set_password_hash(user.id, &new_hash, &db_connection).unwrap();

        let got = get_user_by_id(user.id, &db_connection).unwrap();
        assert_eq!(got.password_hash, new_hash);
    }

    #[test]
    fn failed_logins_are_counted_and_reset() {
        let db_connection = get_db_connection();
        let user = create_user(new_user("jack", Role::User), &db_connection).unwrap();

        assert_eq!(record_failed_login(user.id, &db_connection), Ok(1));
        assert_eq!(record_failed_login(user.id, &db_connection), Ok(2));

        clear_failed_logins(user.id, &db_connection).unwrap();
        assert_eq!(
            get_user_by_id(user.id, &db_connection)
                .unwrap()
                .failed_login_attempts,
            0
        );

        record_failed_login(user.id, &db_connection).unwrap();
        let login_time = datetime!(2025-02-03 10:30 UTC);
        record_successful_login(user.id, login_time, &db_connection).unwrap();

        let got = get_user_by_id(user.id, &db_connection).unwrap();
        assert_eq!(got.failed_login_attempts, 0);
        assert_eq!(got.last_login, Some(login_time));
    }

    #[test]
    fn record_failed_login_fails_on_missing_user() {
        let db_connection = get_db_connection();

        let result = record_failed_login(UserID::new(7), &db_connection);

        assert_eq!(result, Err(Error::UpdateMissingUser));
    }

    #[test]
    fn counts_users_and_active_admins() {
        let db_connection = get_db_connection();
        create_user(new_user("root", Role::Admin), &db_connection).unwrap();
        let second_admin = create_user(new_user("root2", Role::Admin), &db_connection).unwrap();
        create_user(new_user("kim", Role::User), &db_connection).unwrap();
        deactivate_user(second_admin.id, &db_connection).unwrap();

        assert_eq!(count_users(&db_connection), Ok(3));
        assert_eq!(count_active_admins(&db_connection), Ok(1));
    }
}
