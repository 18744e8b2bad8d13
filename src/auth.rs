//! The logged in session and the rules for who may do what.
//!
//! A [Session] holds at most one logged in [User]. Every user management
//! operation checks the session's role before touching the database and
//! records what it did in the operation log.

use rusqlite::Connection;
use serde::Deserialize;
use time::OffsetDateTime;

use crate::{
    Error, PasswordHash, PasswordPolicy, Role, User, UserID, ValidatedPassword,
    database_id::DatabaseId,
    operation_log::{self, NewOperation},
    permission::{self, Grant, Permission, ResourceType},
    system_config,
    user::{
        NewUser, UserFilter, UserStatus, UserUpdate, clear_failed_logins, count_active_admins,
        count_users, create_user, deactivate_user, get_all_users, get_user_by_id,
        get_user_by_username, record_failed_login, record_successful_login, set_password_hash,
        update_user,
    },
};

/// Failed log-in attempts allowed before an account locks, when the system
/// configuration does not say otherwise.
pub const DEFAULT_LOGIN_ATTEMPTS: i64 = 5;

/// The details entered when registering a new user.
#[derive(Debug, Clone, Deserialize)]
pub struct Registration {
    /// The name the user will log in with.
    pub username: String,
    /// The new password.
    pub password: String,
    /// The new password again.
    pub confirm_password: String,
    /// The user's display name.
    pub fullname: String,
    /// An optional contact email.
    pub email: Option<String>,
    /// The role of the new user.
    pub role: Role,
}

/// The user currently logged in, if any.
#[derive(Debug, Clone)]
pub struct Session {
    current_user: Option<User>,
    hash_cost: u32,
}

impl Session {
    /// Create a session with nobody logged in.
    ///
    /// `hash_cost` is the bcrypt cost used for any password this session hashes.
    pub fn new(hash_cost: u32) -> Self {
        Self {
            current_user: None,
            hash_cost,
        }
    }

    /// The logged in user.
    pub fn current_user(&self) -> Option<&User> {
        self.current_user.as_ref()
    }

    /// Whether someone is logged in.
    pub fn is_authenticated(&self) -> bool {
        self.current_user.is_some()
    }

    /// Check a username and password and make that user the current user.
    ///
    /// The stored hash is upgraded to bcrypt if it uses an older format.
    ///
    /// # Errors
    /// This function will return a:
    /// - [Error::MissingCredentials] if the username or password is empty,
    /// - [Error::InvalidCredentials] if the username is unknown or the password is wrong,
    /// - [Error::AccountInactive] if the user has been deactivated,
    /// - [Error::AccountLocked] if the user has too many failed attempts,
    /// - or [Error::SqlError] if there is some SQL error.
    pub fn log_in(
        &mut self,
        username: &str,
        password: &str,
        ip_address: Option<&str>,
        now: OffsetDateTime,
        connection: &Connection,
    ) -> Result<User, Error> {
        let username = username.trim();

        if username.is_empty() || password.is_empty() {
            return Err(Error::MissingCredentials);
        }

        let failed = |user_id: Option<UserID>, details: &str| {
            operation_log::record(
                &NewOperation {
                    user_id,
                    action: "login_failed",
                    details: Some(details),
                    target_table: Some("user"),
                    ip_address,
                },
                connection,
            );
        };

        let user = match get_user_by_username(username, connection) {
            Ok(user) => user,
            Err(Error::NotFound) => {
                tracing::info!("log-in attempt for unknown user \"{username}\"");
                failed(None, &format!("unknown username \"{username}\""));
                return Err(Error::InvalidCredentials);
            }
            Err(error) => return Err(error),
        };

        if !user.is_active() {
            failed(Some(user.id), "account inactive");
            return Err(Error::AccountInactive);
        }

        let max_attempts = match system_config::get_integer_or(
            "security.login_attempts",
            DEFAULT_LOGIN_ATTEMPTS,
            connection,
        ) {
            Ok(max_attempts) => max_attempts,
            Err(Error::InvalidConfigValue { key, reason }) => {
                tracing::warn!("ignoring {key} ({reason}), using {DEFAULT_LOGIN_ATTEMPTS}");
                DEFAULT_LOGIN_ATTEMPTS
            }
            Err(error) => return Err(error),
        };

        if max_attempts > 0 && i64::from(user.failed_login_attempts) >= max_attempts {
            failed(Some(user.id), "account locked");
            return Err(Error::AccountLocked);
        }

        let is_password_valid = user.password_hash.verify(password).inspect_err(|error| {
            tracing::error!("Unhandled error while verifying credentials: {error}");
        })?;

        if !is_password_valid {
            let attempts = record_failed_login(user.id, connection)?;
            tracing::info!("wrong password for \"{username}\" (attempt {attempts})");
            failed(Some(user.id), &format!("wrong password, attempt {attempts}"));
            return Err(Error::InvalidCredentials);
        }

        record_successful_login(user.id, now, connection)?;

        if user.password_hash.needs_rehash() {
            self.upgrade_hash(user.id, password, connection);
        }

        let user = get_user_by_id(user.id, connection)?;
        self.current_user = Some(user.clone());

        operation_log::record(
            &NewOperation {
                user_id: Some(user.id),
                action: "login",
                details: Some("logged in"),
                target_table: Some("user"),
                ip_address,
            },
            connection,
        );
        tracing::info!("\"{}\" logged in", user.username);

        Ok(user)
    }

    fn upgrade_hash(&self, user_id: UserID, password: &str, connection: &Connection) {
        let result = PasswordHash::new(ValidatedPassword::new_unchecked(password), self.hash_cost)
            .and_then(|password_hash| set_password_hash(user_id, &password_hash, connection));

        match result {
            Ok(()) => tracing::info!("upgraded the password hash of user {user_id} to bcrypt"),
            Err(error) => {
                tracing::warn!("could not upgrade the password hash of user {user_id}: {error}")
            }
        }
    }

    /// Clear the session. Does nothing if nobody is logged in.
    pub fn log_out(&mut self, ip_address: Option<&str>, connection: &Connection) {
        if let Some(user) = self.current_user.take() {
            operation_log::record(
                &NewOperation {
                    user_id: Some(user.id),
                    action: "logout",
                    details: Some("logged out"),
                    target_table: Some("user"),
                    ip_address,
                },
                connection,
            );
            tracing::info!("\"{}\" logged out", user.username);
        }
    }

    /// Whether the current user has `required_role`. Admins have every role.
    pub fn check_permission(&self, required_role: Role) -> bool {
        self.current_user
            .as_ref()
            .is_some_and(|user| user.is_admin() || user.role == required_role)
    }

    /// The current user, or [Error::NotAuthenticated].
    pub fn require_login(&self) -> Result<&User, Error> {
        self.current_user.as_ref().ok_or(Error::NotAuthenticated)
    }

    /// The current user if they have `required_role`.
    ///
    /// # Errors
    /// Returns [Error::NotAuthenticated] or [Error::PermissionDenied].
    pub fn require_role(&self, required_role: Role) -> Result<&User, Error> {
        self.require_any_role(&[required_role])
    }

    /// The current user if they have any of `roles`.
    ///
    /// # Errors
    /// Returns [Error::NotAuthenticated] or [Error::PermissionDenied].
    pub fn require_any_role(&self, roles: &[Role]) -> Result<&User, Error> {
        let user = self.require_login()?;

        if roles.iter().any(|&role| self.check_permission(role)) {
            Ok(user)
        } else {
            Err(Error::PermissionDenied)
        }
    }

    /// Whether the current user may act on one resource. Admins may act on
    /// everything, other users need a grant.
    pub fn has_resource_permission(
        &self,
        resource_type: ResourceType,
        resource_id: DatabaseId,
        permission: Permission,
        connection: &Connection,
    ) -> Result<bool, Error> {
        let Some(user) = &self.current_user else {
            return Ok(false);
        };

        if user.is_admin() {
            return Ok(true);
        }

        permission::has_grant(
            &Grant {
                user_id: user.id,
                resource_type,
                resource_id,
                permission,
            },
            connection,
        )
    }

    /// Create a new user.
    ///
    /// Anyone may register a plain user. Other roles need an admin to be logged
    /// in, unless the database has no users yet.
    ///
    /// # Errors
    /// This function will return a:
    /// - [Error::MissingFields] if a required field is blank,
    /// - [Error::PasswordMismatch] if the password confirmation differs,
    /// - [Error::EmptyPassword] or [Error::TooWeak] if the password breaks the policy,
    /// - [Error::NotAuthenticated] or [Error::PermissionDenied] for an elevated role,
    /// - [Error::DuplicateUsername] if the username is taken.
    pub fn register(
        &self,
        registration: &Registration,
        ip_address: Option<&str>,
        now: OffsetDateTime,
        connection: &Connection,
    ) -> Result<User, Error> {
        if registration.username.trim().is_empty()
            || registration.password.is_empty()
            || registration.confirm_password.is_empty()
            || registration.fullname.trim().is_empty()
        {
            return Err(Error::MissingFields);
        }

        if registration.password != registration.confirm_password {
            return Err(Error::PasswordMismatch);
        }

        if registration.role != Role::User && count_users(connection)? > 0 {
            self.require_role(Role::Admin)?;
        }

        let policy = PasswordPolicy::from_system_config(connection)?;
        let password_hash =
            PasswordHash::from_raw_password(&registration.password, &policy, self.hash_cost)?;

        let user = create_user(
            NewUser {
                username: registration.username.clone(),
                password_hash,
                fullname: registration.fullname.trim().to_owned(),
                email: registration
                    .email
                    .as_deref()
                    .map(str::trim)
                    .filter(|email| !email.is_empty())
                    .map(str::to_owned),
                role: registration.role,
                created_at: now,
            },
            connection,
        )?;

        operation_log::record(
            &NewOperation {
                user_id: Some(self.current_user.as_ref().map_or(user.id, |actor| actor.id)),
                action: "register",
                details: Some(&format!(
                    "registered \"{}\" with role {}",
                    user.username, user.role
                )),
                target_table: Some("user"),
                ip_address,
            },
            connection,
        );
        tracing::info!("registered user \"{}\"", user.username);

        Ok(user)
    }

    /// Change the current user's password.
    ///
    /// # Errors
    /// Returns [Error::NotAuthenticated] if nobody is logged in,
    /// [Error::InvalidCredentials] if `old_password` is wrong,
    /// [Error::PasswordMismatch] if the confirmation differs, and the password
    /// policy errors of [ValidatedPassword::new].
    pub fn change_password(
        &mut self,
        old_password: &str,
        new_password: &str,
        confirm_password: &str,
        connection: &Connection,
    ) -> Result<(), Error> {
        let user_id = self.require_login()?.id;
        let stored = get_user_by_id(user_id, connection)?;

        if !stored.password_hash.verify(old_password)? {
            return Err(Error::InvalidCredentials);
        }

        if new_password != confirm_password {
            return Err(Error::PasswordMismatch);
        }

        let policy = PasswordPolicy::from_system_config(connection)?;
        let password_hash = PasswordHash::from_raw_password(new_password, &policy, self.hash_cost)?;
        set_password_hash(user_id, &password_hash, connection)?;

        self.current_user = Some(get_user_by_id(user_id, connection)?);
        self.audit("change_password", "changed own password", connection);

        Ok(())
    }

    /// Set another user's password without knowing the old one, and unlock them.
    ///
    /// Only admins may do this.
    pub fn reset_password(
        &self,
        user_id: UserID,
        new_password: &str,
        confirm_password: &str,
        connection: &Connection,
    ) -> Result<(), Error> {
        self.require_role(Role::Admin)?;

        if new_password != confirm_password {
            return Err(Error::PasswordMismatch);
        }

        let policy = PasswordPolicy::from_system_config(connection)?;
        let password_hash = PasswordHash::from_raw_password(new_password, &policy, self.hash_cost)?;

        let sql_transaction = connection.unchecked_transaction()?;
        set_password_hash(user_id, &password_hash, &sql_transaction)?;
        clear_failed_logins(user_id, &sql_transaction)?;
        sql_transaction.commit()?;

        self.audit(
            "reset_password",
            &format!("reset the password of user {user_id}"),
            connection,
        );

        Ok(())
    }

    /// Clear a user's failed log-in counter. Only admins may do this.
    pub fn unlock_user(&self, user_id: UserID, connection: &Connection) -> Result<(), Error> {
        self.require_role(Role::Admin)?;

        clear_failed_logins(user_id, connection)?;
        self.audit("unlock_user", &format!("unlocked user {user_id}"), connection);

        Ok(())
    }

    /// Look up a user. Any logged in user may do this.
    pub fn get_user(&self, user_id: UserID, connection: &Connection) -> Result<User, Error> {
        self.require_login()?;

        get_user_by_id(user_id, connection)
    }

    /// List users. Only admins may do this.
    pub fn list_users(
        &self,
        filter: UserFilter,
        connection: &Connection,
    ) -> Result<Vec<User>, Error> {
        self.require_role(Role::Admin)?;

        get_all_users(filter, connection)
    }

    /// Change a user's details.
    ///
    /// Admins may change anything about anyone. Other users may only change
    /// their own full name and email.
    ///
    /// # Errors
    /// This function will return a:
    /// - [Error::NotAuthenticated] if nobody is logged in,
    /// - [Error::PermissionDenied] if a non-admin goes beyond their own name and email,
    /// - [Error::LastAdmin] if the change would leave no active admin,
    /// - [Error::UpdateMissingUser] if the user does not exist.
    pub fn update_user_info(
        &mut self,
        user_id: UserID,
        update: &UserUpdate,
        connection: &Connection,
    ) -> Result<(), Error> {
        let actor = self.require_login()?;
        let actor_id = actor.id;

        if !actor.is_admin()
            && (actor_id != user_id || update.role.is_some() || update.status.is_some())
        {
            return Err(Error::PermissionDenied);
        }

        let target = get_user_by_id(user_id, connection).map_err(|error| match error {
            Error::NotFound => Error::UpdateMissingUser,
            error => error,
        })?;

        let loses_admin = update.role.is_some_and(|role| role != Role::Admin)
            || update.status.is_some_and(|status| status != UserStatus::Active);

        if target.is_admin()
            && target.is_active()
            && loses_admin
            && count_active_admins(connection)? <= 1
        {
            return Err(Error::LastAdmin);
        }

        update_user(user_id, update, connection)?;

        if actor_id == user_id {
            self.current_user = Some(get_user_by_id(user_id, connection)?);
        }

        let changes = serde_json::to_string(update)?;
        self.audit(
            "update_user",
            &format!("updated user {user_id}: {changes}"),
            connection,
        );

        Ok(())
    }

    /// Deactivate a user. Only admins may do this, and not to themselves.
    ///
    /// # Errors
    /// Returns [Error::CannotDeleteSelf] or [Error::LastAdmin] as well as the
    /// role errors of [Session::require_role].
    pub fn delete_user(&self, user_id: UserID, connection: &Connection) -> Result<(), Error> {
        let actor = self.require_role(Role::Admin)?;

        if actor.id == user_id {
            return Err(Error::CannotDeleteSelf);
        }

        let target = get_user_by_id(user_id, connection)?;

        if target.is_admin() && target.is_active() && count_active_admins(connection)? <= 1 {
            return Err(Error::LastAdmin);
        }

        deactivate_user(user_id, connection)?;
        self.audit(
            "delete_user",
            &format!("deactivated user \"{}\"", target.username),
            connection,
        );

        Ok(())
    }

    /// Give a user a permission on one resource. Only admins may do this.
    ///
    /// Returns `false` if the user already had the grant.
    pub fn grant_permission(&self, grant: &Grant, connection: &Connection) -> Result<bool, Error> {
        self.require_role(Role::Admin)?;

        let added = permission::grant_permission(grant, connection)?;
        self.audit(
            "grant_permission",
            &format!(
                "granted {} on {} {} to user {}",
                grant.permission, grant.resource_type, grant.resource_id, grant.user_id
            ),
            connection,
        );

        Ok(added)
    }

    /// Take a permission away from a user. Only admins may do this.
    ///
    /// Returns `false` if the user did not have the grant.
    pub fn revoke_permission(&self, grant: &Grant, connection: &Connection) -> Result<bool, Error> {
        self.require_role(Role::Admin)?;

        let removed = permission::revoke_permission(grant, connection)?;
        self.audit(
            "revoke_permission",
            &format!(
                "revoked {} on {} {} from user {}",
                grant.permission, grant.resource_type, grant.resource_id, grant.user_id
            ),
            connection,
        );

        Ok(removed)
    }

    /// List a user's grants. Admins may list anyone's, other users only their own.
    pub fn get_user_permissions(
        &self,
        user_id: UserID,
        connection: &Connection,
    ) -> Result<Vec<Grant>, Error> {
        let actor = self.require_login()?;

        if !actor.is_admin() && actor.id != user_id {
            return Err(Error::PermissionDenied);
        }

        permission::get_user_permissions(user_id, connection)
    }

    fn audit(&self, action: &str, details: &str, connection: &Connection) {
        operation_log::record(
            &NewOperation {
                user_id: self.current_user.as_ref().map(|user| user.id),
                action,
                details: Some(details),
                target_table: Some("user"),
                ip_address: None,
            },
            connection,
        );
    }
}

#[cfg(test)]
mod log_in_tests {
    use sha2::{Digest, Sha256};

    use crate::{
        Error, PasswordHash, Role, UserStatus,
        operation_log::{OperationLogFilter, get_operation_logs},
        system_config::{ConfigValue, set_config},
        test_utils::{
            TEST_HASH_COST, TEST_NOW, TEST_PASSWORD, create_test_user, get_test_connection,
        },
        user::{UserUpdate, get_user_by_id, set_password_hash, update_user},
    };

    use super::{DEFAULT_LOGIN_ATTEMPTS, Session};

    fn last_action(connection: &rusqlite::Connection) -> String {
        get_operation_logs(&OperationLogFilter::default(), connection).unwrap()[0]
            .action
            .clone()
    }

    #[test]
    fn log_in_succeeds_with_valid_credentials() {
        let connection = get_test_connection();
        let user = create_test_user("alice", Role::User, &connection);
        let mut session = Session::new(TEST_HASH_COST);

        let logged_in = session
            .log_in(" alice ", TEST_PASSWORD, Some("10.0.0.1"), TEST_NOW, &connection)
            .unwrap();

        assert_eq!(logged_in.id, user.id);
        assert_eq!(logged_in.last_login, Some(TEST_NOW));
        assert!(session.is_authenticated());
        assert_eq!(session.current_user(), Some(&logged_in));

        let logs = get_operation_logs(&OperationLogFilter::default(), &connection).unwrap();
        assert_eq!(logs[0].action, "login");
        assert_eq!(logs[0].ip_address.as_deref(), Some("10.0.0.1"));
    }

    #[test]
    fn log_in_fails_with_missing_credentials() {
        let connection = get_test_connection();
        let mut session = Session::new(TEST_HASH_COST);

        assert_eq!(
            session.log_in("  ", TEST_PASSWORD, None, TEST_NOW, &connection),
            Err(Error::MissingCredentials)
        );
        assert_eq!(
            session.log_in("alice", "", None, TEST_NOW, &connection),
            Err(Error::MissingCredentials)
        );
    }

    #[test]
    fn unknown_user_and_wrong_password_look_the_same() {
        let connection = get_test_connection();
        create_test_user("alice", Role::User, &connection);
        let mut session = Session::new(TEST_HASH_COST);

        let unknown = session.log_in("mallory", TEST_PASSWORD, None, TEST_NOW, &connection);
        let logs = get_operation_logs(&OperationLogFilter::default(), &connection).unwrap();
        assert_eq!(logs[0].action, "login_failed");
        assert_eq!(logs[0].user_id, None);

        let wrong = session.log_in("alice", "hunter22", None, TEST_NOW, &connection);

        assert_eq!(unknown, Err(Error::InvalidCredentials));
        assert_eq!(wrong, Err(Error::InvalidCredentials));
        assert!(!session.is_authenticated());
    }

    #[test]
    fn wrong_passwords_lock_the_account() {
        let connection = get_test_connection();
        let user = create_test_user("alice", Role::User, &connection);
        set_config("security.login_attempts", &ConfigValue::Integer(3), None, &connection).unwrap();
        let mut session = Session::new(TEST_HASH_COST);

        for _ in 0..3 {
            assert_eq!(
                session.log_in("alice", "wrong password", None, TEST_NOW, &connection),
                Err(Error::InvalidCredentials)
            );
        }

        assert_eq!(
            get_user_by_id(user.id, &connection)
                .unwrap()
                .failed_login_attempts,
            3
        );
        assert_eq!(
            session.log_in("alice", TEST_PASSWORD, None, TEST_NOW, &connection),
            Err(Error::AccountLocked)
        );
    }

    #[test]
    fn successful_log_in_resets_counter() {
        let connection = get_test_connection();
        let user = create_test_user("alice", Role::User, &connection);
        let mut session = Session::new(TEST_HASH_COST);

        session
            .log_in("alice", "wrong password", None, TEST_NOW, &connection)
            .unwrap_err();
        let logged_in = session
            .log_in("alice", TEST_PASSWORD, None, TEST_NOW, &connection)
            .unwrap();

        assert_eq!(logged_in.failed_login_attempts, 0);
        assert_eq!(
            get_user_by_id(user.id, &connection)
                .unwrap()
                .failed_login_attempts,
            0
        );
    }

    #[test]
    fn unreadable_login_attempts_falls_back_to_default() {
        let connection = get_test_connection();
        let user = create_test_user("ada", Role::Admin, &connection);
        set_config(
            "security.login_attempts",
            &ConfigValue::infer("2.5"),
            None,
            &connection,
        )
        .unwrap();
        let mut session = Session::new(TEST_HASH_COST);

        assert_eq!(
            session
                .log_in("ada", TEST_PASSWORD, None, TEST_NOW, &connection)
                .map(|logged_in| logged_in.id),
            Ok(user.id)
        );
        session.log_out(None, &connection);

        for _ in 0..DEFAULT_LOGIN_ATTEMPTS {
            assert_eq!(
                session.log_in("ada", "wrong password", None, TEST_NOW, &connection),
                Err(Error::InvalidCredentials)
            );
        }

        assert_eq!(
            session.log_in("ada", TEST_PASSWORD, None, TEST_NOW, &connection),
            Err(Error::AccountLocked)
        );
    }

    #[test]
    fn zero_login_attempts_disables_lockout() {
        let connection = get_test_connection();
        create_test_user("alice", Role::User, &connection);
        set_config("security.login_attempts", &ConfigValue::Integer(0), None, &connection).unwrap();
        let mut session = Session::new(TEST_HASH_COST);

        for _ in 0..6 {
            session
                .log_in("alice", "wrong password", None, TEST_NOW, &connection)
                .unwrap_err();
        }

        assert!(session
            .log_in("alice", TEST_PASSWORD, None, TEST_NOW, &connection)
            .is_ok());
    }

    #[test]
    fn inactive_user_cannot_log_in() {
        let connection = get_test_connection();
        let user = create_test_user("alice", Role::User, &connection);
        update_user(
            user.id,
            &UserUpdate {
                status: Some(UserStatus::Inactive),
                ..Default::default()
            },
            &connection,
        )
        .unwrap();
        let mut session = Session::new(TEST_HASH_COST);

        assert_eq!(
            session.log_in("alice", TEST_PASSWORD, None, TEST_NOW, &connection),
            Err(Error::AccountInactive)
        );
    }

    #[test]
    fn legacy_hash_is_upgraded_on_log_in() {
        let connection = get_test_connection();
        let user = create_test_user("alice", Role::User, &connection);
        let legacy = hex::encode(Sha256::digest(format!("{TEST_PASSWORD}finance_system_salt")));
        set_password_hash(user.id, &PasswordHash::new_unchecked(&legacy), &connection).unwrap();
        let mut session = Session::new(TEST_HASH_COST);

        session
            .log_in("alice", TEST_PASSWORD, None, TEST_NOW, &connection)
            .unwrap();

        let stored = get_user_by_id(user.id, &connection).unwrap().password_hash;
        assert!(!stored.needs_rehash());
        assert_eq!(stored.verify(TEST_PASSWORD), Ok(true));
    }

    #[test]
    fn log_out_clears_session() {
        let connection = get_test_connection();
        create_test_user("alice", Role::User, &connection);
        let mut session = Session::new(TEST_HASH_COST);
        session
            .log_in("alice", TEST_PASSWORD, None, TEST_NOW, &connection)
            .unwrap();

        session.log_out(None, &connection);

        assert!(!session.is_authenticated());
        assert_eq!(last_action(&connection), "logout");

        // Logging out twice is fine and records nothing new.
        let before = get_operation_logs(&OperationLogFilter::default(), &connection)
            .unwrap()
            .len();
        session.log_out(None, &connection);
        let after = get_operation_logs(&OperationLogFilter::default(), &connection)
            .unwrap()
            .len();
        assert_eq!(before, after);
    }
}
