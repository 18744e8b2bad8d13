//! Ledger accounts (cash, bank deposits, payables and so on) and their balances.

use std::{fmt::Display, str::FromStr};

use rusqlite::{Connection, Row, ToSql, params_from_iter};
use serde::Serialize;
use time::OffsetDateTime;

use crate::{
    Error, UserID,
    database_id::AccountId,
    db::{count_column, parse_column},
    is_constraint_error,
    operation_log::{self, NewOperation},
};

/// The accounting class of an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    /// Something owned, e.g. cash.
    Asset,
    /// Something owed, e.g. accounts payable.
    Liability,
    /// Owner's capital.
    Equity,
    /// Revenue.
    Income,
    /// Costs.
    Expense,
}

impl AccountType {
    /// The text stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountType::Asset => "asset",
            AccountType::Liability => "liability",
            AccountType::Equity => "equity",
            AccountType::Income => "income",
            AccountType::Expense => "expense",
        }
    }
}

impl FromStr for AccountType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "asset" => Ok(AccountType::Asset),
            "liability" => Ok(AccountType::Liability),
            "equity" => Ok(AccountType::Equity),
            "income" => Ok(AccountType::Income),
            "expense" => Ok(AccountType::Expense),
            _ => Err(Error::InvalidAccountType(s.to_owned())),
        }
    }
}

impl Display for AccountType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Whether an account is in use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    /// In use.
    Active,
    /// Hidden from summaries and transaction entry.
    Inactive,
}

impl AccountStatus {
    /// The text stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountStatus::Active => "active",
            AccountStatus::Inactive => "inactive",
        }
    }
}

impl FromStr for AccountStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "active" => Ok(AccountStatus::Active),
            "inactive" => Ok(AccountStatus::Inactive),
            _ => Err(Error::InvalidStatus(s.to_owned())),
        }
    }
}

impl Display for AccountStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An account and its running balance.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Account {
    /// The id for the account.
    pub id: AccountId,
    /// The unique name of the account.
    pub name: String,
    /// The accounting class.
    pub account_type: AccountType,
    /// The currency code, e.g. "CNY".
    pub currency: String,
    /// The initial balance plus the sum of the account's transactions.
    pub balance: f64,
    /// Optional notes.
    pub description: Option<String>,
    /// Whether the account is in use.
    pub status: AccountStatus,
    /// The user that created the account. `None` for built-in accounts.
    pub created_by: Option<UserID>,
    /// When the account was created.
    pub created_at: OffsetDateTime,
    /// When the account was last changed.
    pub updated_at: OffsetDateTime,
}

/// The data needed to create an account.
#[derive(Debug, Clone)]
pub struct NewAccount {
    /// The unique name of the account.
    pub name: String,
    /// The accounting class.
    pub account_type: AccountType,
    /// The currency code.
    pub currency: String,
    /// The starting balance.
    pub initial_balance: f64,
    /// Optional notes.
    pub description: Option<String>,
}

/// The fields of an account that may be changed. The balance is not one of them.
#[derive(Debug, Clone, Default)]
pub struct AccountUpdate {
    /// A new name.
    pub name: Option<String>,
    /// A new accounting class.
    pub account_type: Option<AccountType>,
    /// New notes.
    pub description: Option<String>,
    /// A new status.
    pub status: Option<AccountStatus>,
}

/// Criteria for listing accounts.
#[derive(Debug, Clone, Default)]
pub struct AccountFilter {
    /// Only accounts of this class.
    pub account_type: Option<AccountType>,
    /// Only accounts with this status.
    pub status: Option<AccountStatus>,
    /// Only accounts whose name contains this text.
    pub name_contains: Option<String>,
}

/// Totals of the active accounts by class.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AccountBalanceSummary {
    /// Sum of asset balances.
    pub total_assets: f64,
    /// Sum of liability balances.
    pub total_liabilities: f64,
    /// Sum of equity balances.
    pub total_equity: f64,
    /// Sum of income account balances.
    pub total_income: f64,
    /// Sum of expense account balances.
    pub total_expense: f64,
    /// Assets minus liabilities plus equity.
    pub net_worth: f64,
    /// Number of active accounts.
    pub account_count: usize,
}

const ACCOUNT_COLUMNS: &str = "id, name, account_type, currency, balance, description, status, \
    created_by, created_at, updated_at";

/// Create the account table.
pub fn create_account_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS account (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            account_type TEXT NOT NULL
                CHECK (account_type IN ('asset', 'liability', 'equity', 'income', 'expense')),
            currency TEXT NOT NULL DEFAULT 'CNY',
            balance REAL NOT NULL DEFAULT 0,
            description TEXT,
            status TEXT NOT NULL DEFAULT 'active' CHECK (status IN ('active', 'inactive')),
            created_by INTEGER REFERENCES user(id) ON DELETE SET NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_account_status ON account(status);",
    )?;

    Ok(())
}

/// Insert the built-in accounts if the table is empty.
pub fn seed_default_accounts(now: OffsetDateTime, connection: &Connection) -> Result<(), Error> {
    let count: i64 = connection.query_row("SELECT COUNT(id) FROM account", [], |row| row.get(0))?;

    if count > 0 {
        return Ok(());
    }

    let defaults = [
        ("Cash", AccountType::Asset, "Cash on hand"),
        ("Bank Deposits", AccountType::Asset, "Money held in bank accounts"),
        ("Accounts Receivable", AccountType::Asset, "Money owed by customers"),
        ("Accounts Payable", AccountType::Liability, "Money owed to suppliers"),
        ("Share Capital", AccountType::Equity, "Capital contributed by the owners"),
    ];

    let mut statement = connection.prepare(
        "INSERT INTO account (name, account_type, currency, balance, description, status, created_at, updated_at)
        VALUES (?1, ?2, 'CNY', 0, ?3, 'active', ?4, ?4)",
    )?;

    for (name, account_type, description) in defaults {
        statement.execute((name, account_type.as_str(), description, now))?;
    }

    Ok(())
}

/// Create an account whose balance starts at `new_account.initial_balance`.
///
/// # Errors
/// Returns [Error::EmptyAccountName] if the name is blank or
/// [Error::DuplicateAccountName] if it is taken.
pub fn create_account(
    new_account: NewAccount,
    user_id: Option<UserID>,
    now: OffsetDateTime,
    connection: &Connection,
) -> Result<Account, Error> {
    let name = new_account.name.trim();

    if name.is_empty() {
        return Err(Error::EmptyAccountName);
    }

    let currency = match new_account.currency.trim() {
        "" => "CNY".to_owned(),
        currency => currency.to_uppercase(),
    };

    let account = connection
        .prepare(&format!(
            "INSERT INTO account (name, account_type, currency, balance, description, status, created_by, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, 'active', ?6, ?7, ?7)
            RETURNING {ACCOUNT_COLUMNS}"
        ))?
        .query_row(
            (
                name,
                new_account.account_type.as_str(),
                currency,
                new_account.initial_balance,
                new_account.description.as_deref(),
                user_id.map(|id| id.as_i64()),
                now,
            ),
            map_row,
        )
        .map_err(|error| map_unique_name_error(error, name))?;

    operation_log::record(
        &NewOperation {
            user_id,
            action: "create_account",
            details: Some(&format!("created account \"{}\"", account.name)),
            target_table: Some("account"),
            ip_address: None,
        },
        connection,
    );

    Ok(account)
}

/// Change the name, class, description and/or status of an account.
///
/// # Errors
/// Returns [Error::NoFieldsToUpdate] for an empty update,
/// [Error::EmptyAccountName] or [Error::DuplicateAccountName] for a bad name, and
/// [Error::UpdateMissingAccount] if the account does not exist.
pub fn update_account(
    account_id: AccountId,
    update: &AccountUpdate,
    user_id: Option<UserID>,
    now: OffsetDateTime,
    connection: &Connection,
) -> Result<(), Error> {
    let name = update.name.as_deref().map(str::trim);

    if name.is_some_and(str::is_empty) {
        return Err(Error::EmptyAccountName);
    }

    let account_type = update.account_type.map(|account_type| account_type.as_str());
    let status = update.status.map(|status| status.as_str());

    let mut assignments = Vec::new();
    let mut params: Vec<&dyn ToSql> = Vec::new();

    if let Some(name) = &name {
        params.push(name);
        assignments.push(format!("name = ?{}", params.len()));
    }

    if let Some(account_type) = &account_type {
        params.push(account_type);
        assignments.push(format!("account_type = ?{}", params.len()));
    }

    if let Some(description) = &update.description {
        params.push(description);
        assignments.push(format!("description = ?{}", params.len()));
    }

    if let Some(status) = &status {
        params.push(status);
        assignments.push(format!("status = ?{}", params.len()));
    }

    if assignments.is_empty() {
        return Err(Error::NoFieldsToUpdate);
    }

    params.push(&now);
    assignments.push(format!("updated_at = ?{}", params.len()));
    params.push(&account_id);
    let query = format!(
        "UPDATE account SET {} WHERE id = ?{}",
        assignments.join(", "),
        params.len()
    );

    let rows_affected = connection
        .execute(&query, params_from_iter(params))
        .map_err(|error| map_unique_name_error(error, name.unwrap_or_default()))?;

    if rows_affected == 0 {
        return Err(Error::UpdateMissingAccount);
    }

    operation_log::record(
        &NewOperation {
            user_id,
            action: "update_account",
            details: Some(&format!("updated account {account_id}")),
            target_table: Some("account"),
            ip_address: None,
        },
        connection,
    );

    Ok(())
}

/// Delete an account that has no transactions.
///
/// # Errors
/// Returns [Error::AccountHasTransactions] if any transaction uses the account and
/// [Error::DeleteMissingAccount] if it does not exist.
pub fn delete_account(
    account_id: AccountId,
    user_id: Option<UserID>,
    connection: &Connection,
) -> Result<(), Error> {
    let transaction_count: i64 = connection.query_row(
        "SELECT COUNT(id) FROM \"transaction\" WHERE account_id = ?1",
        [account_id],
        |row| row.get(0),
    )?;

    if transaction_count > 0 {
        return Err(Error::AccountHasTransactions);
    }

    let rows_affected = connection.execute("DELETE FROM account WHERE id = ?1", [account_id])?;

    if rows_affected == 0 {
        return Err(Error::DeleteMissingAccount);
    }

    operation_log::record(
        &NewOperation {
            user_id,
            action: "delete_account",
            details: Some(&format!("deleted account {account_id}")),
            target_table: Some("account"),
            ip_address: None,
        },
        connection,
    );

    Ok(())
}

/// Retrieve a single account by ID.
pub fn get_account(account_id: AccountId, connection: &Connection) -> Result<Account, Error> {
    connection
        .prepare(&format!("SELECT {ACCOUNT_COLUMNS} FROM account WHERE id = :id"))?
        .query_row(&[(":id", &account_id)], map_row)
        .map_err(|error| error.into())
}

/// Retrieve the accounts matching `filter`, ordered by name.
pub fn get_all_accounts(
    filter: &AccountFilter,
    connection: &Connection,
) -> Result<Vec<Account>, Error> {
    let mut clauses = Vec::new();
    let mut params: Vec<&dyn ToSql> = Vec::new();

    let account_type = filter.account_type.map(|account_type| account_type.as_str());
    let status = filter.status.map(|status| status.as_str());

    if let Some(account_type) = &account_type {
        params.push(account_type);
        clauses.push(format!("account_type = ?{}", params.len()));
    }

    if let Some(status) = &status {
        params.push(status);
        clauses.push(format!("status = ?{}", params.len()));
    }

    if let Some(name) = &filter.name_contains {
        params.push(name);
        clauses.push(format!("name LIKE '%' || ?{} || '%'", params.len()));
    }

    let where_clause = if clauses.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", clauses.join(" AND "))
    };

    connection
        .prepare(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM account {where_clause} ORDER BY name ASC"
        ))?
        .query_map(params_from_iter(params), map_row)?
        .map(|maybe_account| maybe_account.map_err(|error| error.into()))
        .collect()
}

/// The number of active accounts.
pub fn get_accounts_count(connection: &Connection) -> Result<usize, Error> {
    connection
        .query_row(
            "SELECT COUNT(id) FROM account WHERE status = 'active'",
            [],
            |row| count_column(row, 0),
        )
        .map_err(|error| error.into())
}

/// Totals of the active accounts by class.
///
/// # Errors
/// Returns [Error::SqlError] if the SQL query fails.
pub fn get_account_balance_summary(
    connection: &Connection,
) -> Result<AccountBalanceSummary, Error> {
    let rows: Vec<(AccountType, f64, usize)> = connection
        .prepare(
            "SELECT account_type, COALESCE(SUM(balance), 0), COUNT(id) FROM account
            WHERE status = 'active'
            GROUP BY account_type",
        )?
        .query_map([], |row| {
            Ok((parse_column(row, 0)?, row.get(1)?, count_column(row, 2)?))
        })?
        .collect::<Result<_, _>>()?;

    let mut summary = AccountBalanceSummary::default();

    for (account_type, total, count) in rows {
        match account_type {
            AccountType::Asset => summary.total_assets = total,
            AccountType::Liability => summary.total_liabilities = total,
            AccountType::Equity => summary.total_equity = total,
            AccountType::Income => summary.total_income = total,
            AccountType::Expense => summary.total_expense = total,
        }

        summary.account_count += count;
    }

    summary.net_worth = summary.total_assets - summary.total_liabilities + summary.total_equity;

    Ok(summary)
}

/// Active asset and liability accounts, the accounts money can move through.
pub fn get_active_accounts_for_transaction(connection: &Connection) -> Result<Vec<Account>, Error> {
    connection
        .prepare(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM account
            WHERE status = 'active' AND account_type IN ('asset', 'liability')
            ORDER BY name ASC"
        ))?
        .query_map([], map_row)?
        .map(|maybe_account| maybe_account.map_err(|error| error.into()))
        .collect()
}

/// Add `amount` to the balance of an account.
///
/// # Errors
/// Returns [Error::InvalidAccount] if the account does not exist.
pub(crate) fn adjust_balance(
    account_id: AccountId,
    amount: f64,
    now: OffsetDateTime,
    connection: &Connection,
) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "UPDATE account SET balance = balance + ?1, updated_at = ?2 WHERE id = ?3",
        (amount, now, account_id),
    )?;

    if rows_affected == 0 {
        return Err(Error::InvalidAccount(account_id));
    }

    Ok(())
}

fn map_unique_name_error(error: rusqlite::Error, name: &str) -> Error {
    if is_constraint_error(&error, rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE) {
        Error::DuplicateAccountName(name.to_owned())
    } else {
        error.into()
    }
}

fn map_row(row: &Row) -> Result<Account, rusqlite::Error> {
    let created_by: Option<i64> = row.get(7)?;

    Ok(Account {
        id: row.get(0)?,
        name: row.get(1)?,
        account_type: parse_column(row, 2)?,
        currency: row.get(3)?,
        balance: row.get(4)?,
        description: row.get(5)?,
        status: parse_column(row, 6)?,
        created_by: created_by.map(UserID::new),
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}
