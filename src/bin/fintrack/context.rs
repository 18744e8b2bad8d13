use rusqlite::Connection;
use serde::Serialize;
use time::{Date, OffsetDateTime};

use fintrack::{
    AppConfig, Error, Role, Session, UserID,
    database_id::AccountId,
    format::format_currency,
    pagination::PaginationConfig,
    permission::{Permission, ResourceType},
    system_config::{self, ConfigValue},
};

/// Everything a command needs once the user has logged in.
pub struct Context {
    pub config: AppConfig,
    pub connection: Connection,
    pub session: Session,
    /// The current time in the configured timezone.
    pub now: OffsetDateTime,
    pub json: bool,
}

impl Context {
    /// The logged in user's ID.
    pub fn user_id(&self) -> Result<UserID, Error> {
        self.session.require_login().map(|user| user.id)
    }

    pub fn today(&self) -> Date {
        self.now.date()
    }

    /// Format an amount with the currency symbol from the database, falling back
    /// to the config file.
    pub fn money(&self, amount: f64) -> String {
        let symbol = match system_config::get_config("app.currency_symbol", &self.connection) {
            Ok(Some(ConfigValue::String(symbol))) => symbol,
            _ => self.config.app.currency_symbol.clone(),
        };

        format_currency(amount, &symbol)
    }

    pub fn pagination(&self) -> Result<PaginationConfig, Error> {
        let max_page_size = system_config::get_integer_or(
            "app.max_records_per_page",
            self.config.app.max_records_per_page as i64,
            &self.connection,
        )?;

        Ok(PaginationConfig::with_max_page_size(max_page_size.max(1) as u64))
    }

    /// Managers may change any account's transactions, other users need a grant
    /// on the account.
    pub fn require_account_access(
        &self,
        account_id: AccountId,
        permission: Permission,
    ) -> Result<(), Error> {
        self.session.require_login()?;

        if self.session.check_permission(Role::Manager)
            || self.session.has_resource_permission(
                ResourceType::Account,
                account_id,
                permission,
                &self.connection,
            )?
        {
            return Ok(());
        }

        tracing::warn!("denied {permission} on account {account_id}");
        Err(Error::PermissionDenied)
    }

    /// Print `value` as JSON when `--json` is set, otherwise hand it to `text`.
    pub fn emit<T: Serialize>(&self, value: &T, text: impl FnOnce(&T)) -> Result<(), Error> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(value)?);
        } else {
            text(value);
        }

        Ok(())
    }

    /// Print a confirmation, or `{"ok": true, "message": ...}` with `--json`.
    pub fn done(&self, message: &str) -> Result<(), Error> {
        self.emit(
            &serde_json::json!({ "ok": true, "message": message }),
            |_| println!("{message}"),
        )
    }
}

#[cfg(test)]
mod tests {
    use rusqlite::Connection;
    use time::macros::datetime;

    use fintrack::{
        AppConfig, Error, PasswordHash, Role, Session, ValidatedPassword, initialize_db,
        permission::{Grant, Permission, ResourceType, grant_permission},
        user::{NewUser, create_user},
    };

    use super::Context;

    const PASSWORD: &str = "correcthorsebatterystaple";

    fn logged_in_context(role: Role) -> Context {
        let connection = Connection::open_in_memory().unwrap();
        initialize_db(&connection).unwrap();

        let now = datetime!(2025-01-15 09:30 UTC);
        create_user(
            NewUser {
                username: "someone".to_owned(),
                password_hash: PasswordHash::new(ValidatedPassword::new_unchecked(PASSWORD), 4)
                    .unwrap(),
                fullname: "Some One".to_owned(),
                email: None,
                role,
                created_at: now,
            },
            &connection,
        )
        .unwrap();

        let mut session = Session::new(4);
        session
            .log_in("someone", PASSWORD, None, now, &connection)
            .unwrap();

        Context {
            config: AppConfig::default(),
            connection,
            session,
            now,
            json: false,
        }
    }

    #[test]
    fn managers_may_change_any_account() {
        let context = logged_in_context(Role::Manager);

        assert_eq!(context.require_account_access(1, Permission::Write), Ok(()));
        assert_eq!(context.require_account_access(2, Permission::Delete), Ok(()));
    }

    #[test]
    fn users_need_a_grant_on_the_account() {
        let context = logged_in_context(Role::User);
        let user_id = context.user_id().unwrap();

        assert_eq!(
            context.require_account_access(1, Permission::Write),
            Err(Error::PermissionDenied)
        );

        grant_permission(
            &Grant {
                user_id,
                resource_type: ResourceType::Account,
                resource_id: 1,
                permission: Permission::Write,
            },
            &context.connection,
        )
        .unwrap();

        assert_eq!(context.require_account_access(1, Permission::Write), Ok(()));
        assert_eq!(
            context.require_account_access(1, Permission::Delete),
            Err(Error::PermissionDenied)
        );
        assert_eq!(
            context.require_account_access(2, Permission::Write),
            Err(Error::PermissionDenied)
        );
    }

    #[test]
    fn amounts_use_the_configured_currency_symbol() {
        let context = logged_in_context(Role::User);

        assert_eq!(context.money(-1234.5), "-¥1,234.50");
    }
}
