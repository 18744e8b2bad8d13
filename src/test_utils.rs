#![allow(missing_docs)]

use rusqlite::Connection;
use time::{OffsetDateTime, macros::datetime};

use crate::{
    PasswordHash, Role, Session, User, ValidatedPassword, initialize_db,
    user::{NewUser, create_user},
};

/// The password every test user is created with.
pub(crate) const TEST_PASSWORD: &str = "correcthorsebatterystaple";

/// bcrypt cost used in tests. The minimum bcrypt allows.
pub(crate) const TEST_HASH_COST: u32 = 4;

/// A fixed point in time for tests that record timestamps.
pub(crate) const TEST_NOW: OffsetDateTime = datetime!(2025-01-15 09:30 UTC);

/// An in-memory database with the schema and seed data.
pub(crate) fn get_test_connection() -> Connection {
    let connection =
        Connection::open_in_memory().expect("Could not create in-memory SQLite database");
    initialize_db(&connection).expect("Could not initialize database");

    connection
}

/// Insert an active user with [TEST_PASSWORD].
pub(crate) fn create_test_user(username: &str, role: Role, connection: &Connection) -> User {
    let password_hash = PasswordHash::new(
        ValidatedPassword::new_unchecked(TEST_PASSWORD),
        TEST_HASH_COST,
    )
    .expect("Could not hash test password");

    create_user(
        NewUser {
            username: username.to_owned(),
            password_hash,
            fullname: format!("Test {username}"),
            email: None,
            role,
            created_at: TEST_NOW,
        },
        connection,
    )
    .expect("Could not create test user")
}

/// Insert a user and return a session logged in as them.
pub(crate) fn logged_in_session(
    username: &str,
    role: Role,
    connection: &Connection,
) -> (Session, User) {
    create_test_user(username, role, connection);

    let mut session = Session::new(TEST_HASH_COST);
    let user = session
        .log_in(username, TEST_PASSWORD, None, TEST_NOW, connection)
        .expect("Could not log in test user");

    (session, user)
}
