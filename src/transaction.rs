//! Income and expense transactions and the account balances they move.
//!
//! Expense amounts are stored as negative numbers and income amounts as
//! positive numbers. Creating, editing or deleting a transaction updates the
//! balance of its account in the same SQL transaction as the row change.

use rusqlite::{Connection, OptionalExtension, Row, params_from_iter, types::Value};
use serde::Serialize;
use time::{Date, Month, OffsetDateTime};

use crate::{
    Error, UserID,
    account::adjust_balance,
    category::{CategoryType, get_category},
    database_id::{AccountId, CategoryId, TransactionId},
    db::{count_column, parse_column},
    operation_log::{self, NewOperation},
};

/// Whether a transaction is money coming in or going out.
pub type TransactionType = CategoryType;

// ============================================================================
// MODELS
// ============================================================================

/// An income or expense recorded against an account and a category.
///
/// To create a new `Transaction`, use [Transaction::build].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transaction {
    /// The ID of the transaction.
    pub id: TransactionId,
    /// Income or expense.
    pub transaction_type: TransactionType,
    /// The signed amount: positive for income, negative for expenses.
    pub amount: f64,
    /// The account the money moved through.
    pub account_id: AccountId,
    /// The category of the transaction.
    pub category_id: CategoryId,
    /// When the transaction happened.
    pub date: Date,
    /// What the transaction was for.
    pub description: Option<String>,
    /// An invoice or receipt number.
    pub reference_number: Option<String>,
    /// The user that recorded the transaction.
    pub created_by: Option<UserID>,
    /// When the transaction was recorded.
    pub created_at: OffsetDateTime,
    /// When the transaction was last changed.
    pub updated_at: OffsetDateTime,
}

impl Transaction {
    /// Start describing a new transaction.
    ///
    /// The sign of `amount` is ignored, it is set from `transaction_type`.
    pub fn build(
        transaction_type: TransactionType,
        amount: f64,
        account_id: AccountId,
        category_id: CategoryId,
        date: Date,
    ) -> NewTransaction {
        NewTransaction {
            transaction_type,
            amount,
            account_id,
            category_id,
            date,
            description: None,
            reference_number: None,
        }
    }
}

/// A transaction with the names of its account and category.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransactionDetail {
    /// The transaction.
    #[serde(flatten)]
    pub transaction: Transaction,
    /// The name of the transaction's account.
    pub account_name: String,
    /// The name of the transaction's category.
    pub category_name: String,
}

/// The data needed to create or replace a transaction.
///
/// Use [Transaction::build] and the setters to fill it in.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTransaction {
    /// Income or expense.
    pub transaction_type: TransactionType,
    /// The amount. Only its magnitude is used.
    pub amount: f64,
    /// The account the money moved through.
    pub account_id: AccountId,
    /// The category, which must have the same type as the transaction.
    pub category_id: CategoryId,
    /// When the transaction happened.
    pub date: Date,
    /// What the transaction was for.
    pub description: Option<String>,
    /// An invoice or receipt number.
    pub reference_number: Option<String>,
}

impl NewTransaction {
    /// Set the description.
    pub fn description(mut self, description: Option<String>) -> Self {
        self.description = description;
        self
    }

    /// Set the reference number.
    pub fn reference_number(mut self, reference_number: Option<String>) -> Self {
        self.reference_number = reference_number;
        self
    }

    /// The amount as it is stored: negative for expenses, positive for income.
    pub fn signed_amount(&self) -> f64 {
        signed_amount(self.transaction_type, self.amount)
    }
}

/// Apply the sign convention to `amount`.
pub fn signed_amount(transaction_type: TransactionType, amount: f64) -> f64 {
    match transaction_type {
        TransactionType::Income => amount.abs(),
        TransactionType::Expense => -amount.abs(),
    }
}

/// Criteria for listing transactions. Dates are inclusive.
#[derive(Debug, Clone, Default)]
pub struct TransactionFilter {
    /// Only transactions on or after this date.
    pub start_date: Option<Date>,
    /// Only transactions on or before this date.
    pub end_date: Option<Date>,
    /// Only transactions on this account.
    pub account_id: Option<AccountId>,
    /// Only transactions in this category.
    pub category_id: Option<CategoryId>,
    /// Only income or only expenses.
    pub transaction_type: Option<TransactionType>,
    /// Only transactions whose description contains this text.
    pub description_contains: Option<String>,
}

impl TransactionFilter {
    /// Build the WHERE clause and its parameters.
    fn to_sql(&self) -> Result<(String, Vec<Value>), Error> {
        if let (Some(start), Some(end)) = (self.start_date, self.end_date)
            && end < start
        {
            return Err(Error::InvalidDateRange);
        }

        let mut clauses = Vec::new();
        let mut params = Vec::new();

        if let Some(start) = self.start_date {
            params.push(Value::Text(start.to_string()));
            clauses.push(format!("t.date >= ?{}", params.len()));
        }

        if let Some(end) = self.end_date {
            params.push(Value::Text(end.to_string()));
            clauses.push(format!("t.date <= ?{}", params.len()));
        }

        if let Some(account_id) = self.account_id {
            params.push(Value::Integer(account_id));
            clauses.push(format!("t.account_id = ?{}", params.len()));
        }

        if let Some(category_id) = self.category_id {
            params.push(Value::Integer(category_id));
            clauses.push(format!("t.category_id = ?{}", params.len()));
        }

        if let Some(transaction_type) = self.transaction_type {
            params.push(Value::Text(transaction_type.as_str().to_owned()));
            clauses.push(format!("t.transaction_type = ?{}", params.len()));
        }

        if let Some(text) = &self.description_contains {
            params.push(Value::Text(text.clone()));
            clauses.push(format!("t.description LIKE '%' || ?{} || '%'", params.len()));
        }

        let where_clause = if clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", clauses.join(" AND "))
        };

        Ok((where_clause, params))
    }
}

/// Income, expenses and profit for one calendar month.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlySummary {
    /// The year.
    pub year: i32,
    /// The month.
    pub month: Month,
    /// The sum of income.
    pub total_income: f64,
    /// The sum of expenses as a positive number.
    pub total_expense: f64,
    /// Income minus expenses.
    pub profit: f64,
    /// The number of transactions in the month.
    pub transaction_count: usize,
}

/// Income and expense totals over a date range.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub(crate) struct Totals {
    pub income: f64,
    /// Positive.
    pub expense: f64,
    pub count: usize,
}

// ============================================================================
// DATABASE FUNCTIONS
// ============================================================================

const SELECT_DETAIL: &str = "SELECT t.id, t.transaction_type, t.amount, t.account_id, t.category_id, \
    t.date, t.description, t.reference_number, t.created_by, t.created_at, t.updated_at, \
    a.name, c.name
    FROM \"transaction\" t
    JOIN account a ON a.id = t.account_id
    JOIN category c ON c.id = t.category_id";

/// Create the transaction table in the database.
///
/// # Errors
/// Returns an error if the table cannot be created or if there is an SQL error.
pub fn create_transaction_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS \"transaction\" (
            id INTEGER PRIMARY KEY,
            transaction_type TEXT NOT NULL CHECK (transaction_type IN ('income', 'expense')),
            amount REAL NOT NULL,
            account_id INTEGER NOT NULL REFERENCES account(id) ON DELETE RESTRICT,
            category_id INTEGER NOT NULL REFERENCES category(id) ON DELETE RESTRICT,
            date TEXT NOT NULL,
            description TEXT,
            reference_number TEXT,
            created_by INTEGER REFERENCES user(id) ON DELETE SET NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_transaction_date ON \"transaction\"(date);
        CREATE INDEX IF NOT EXISTS idx_transaction_account ON \"transaction\"(account_id);
        CREATE INDEX IF NOT EXISTS idx_transaction_category ON \"transaction\"(category_id);
        CREATE INDEX IF NOT EXISTS idx_transaction_type ON \"transaction\"(transaction_type);",
    )?;

    Ok(())
}

/// Record a transaction and add its amount to the account balance.
///
/// # Errors
/// This function will return a:
/// - [Error::InvalidAmount] if the amount is zero or not a finite number,
/// - [Error::InvalidAccount] or [Error::InvalidCategory] if either does not exist,
/// - [Error::CategoryTypeMismatch] if the category type differs from the transaction type,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn create_transaction(
    new_transaction: NewTransaction,
    user_id: Option<UserID>,
    now: OffsetDateTime,
    connection: &Connection,
) -> Result<Transaction, Error> {
    let sql_transaction = connection.unchecked_transaction()?;

    let amount = validate(&new_transaction, &sql_transaction)?;

    let transaction = sql_transaction
        .prepare(
            "INSERT INTO \"transaction\" (transaction_type, amount, account_id, category_id, date,
                description, reference_number, created_by, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)
            RETURNING id, transaction_type, amount, account_id, category_id, date, description,
                reference_number, created_by, created_at, updated_at",
        )?
        .query_row(
            (
                new_transaction.transaction_type.as_str(),
                amount,
                new_transaction.account_id,
                new_transaction.category_id,
                new_transaction.date,
                new_transaction.description.as_deref(),
                new_transaction.reference_number.as_deref(),
                user_id.map(|id| id.as_i64()),
                now,
            ),
            map_row,
        )?;

    adjust_balance(transaction.account_id, amount, now, &sql_transaction)?;
    sql_transaction.commit()?;

    operation_log::record(
        &NewOperation {
            user_id,
            action: "create_transaction",
            details: Some(&format!(
                "recorded {} of {:.2} on account {}",
                transaction.transaction_type, transaction.amount, transaction.account_id
            )),
            target_table: Some("transaction"),
            ip_address: None,
        },
        connection,
    );

    Ok(transaction)
}

/// Replace the fields of a transaction and move the balances to match.
///
/// # Errors
/// Returns [Error::UpdateMissingTransaction] if the transaction does not exist, and
/// otherwise the same errors as [create_transaction].
pub fn update_transaction(
    transaction_id: TransactionId,
    new_transaction: NewTransaction,
    user_id: Option<UserID>,
    now: OffsetDateTime,
    connection: &Connection,
) -> Result<(), Error> {
    let sql_transaction = connection.unchecked_transaction()?;

    let old = get_transaction_row(transaction_id, &sql_transaction)?
        .ok_or(Error::UpdateMissingTransaction)?;
    let amount = validate(&new_transaction, &sql_transaction)?;

    if old.account_id == new_transaction.account_id {
        adjust_balance(old.account_id, amount - old.amount, now, &sql_transaction)?;
    } else {
        adjust_balance(old.account_id, -old.amount, now, &sql_transaction)?;
        adjust_balance(new_transaction.account_id, amount, now, &sql_transaction)?;
    }

    sql_transaction.execute(
        "UPDATE \"transaction\"
        SET transaction_type = ?1, amount = ?2, account_id = ?3, category_id = ?4, date = ?5,
            description = ?6, reference_number = ?7, updated_at = ?8
        WHERE id = ?9",
        (
            new_transaction.transaction_type.as_str(),
            amount,
            new_transaction.account_id,
            new_transaction.category_id,
            new_transaction.date,
            new_transaction.description.as_deref(),
            new_transaction.reference_number.as_deref(),
            now,
            transaction_id,
        ),
    )?;

    sql_transaction.commit()?;

    operation_log::record(
        &NewOperation {
            user_id,
            action: "update_transaction",
            details: Some(&format!(
                "updated transaction {transaction_id}: {:.2} -> {amount:.2}",
                old.amount
            )),
            target_table: Some("transaction"),
            ip_address: None,
        },
        connection,
    );

    Ok(())
}

/// Delete a transaction and take its amount back off the account balance.
///
/// # Errors
/// Returns [Error::DeleteMissingTransaction] if the transaction does not exist.
pub fn delete_transaction(
    transaction_id: TransactionId,
    user_id: Option<UserID>,
    now: OffsetDateTime,
    connection: &Connection,
) -> Result<(), Error> {
    let sql_transaction = connection.unchecked_transaction()?;

    let old = get_transaction_row(transaction_id, &sql_transaction)?
        .ok_or(Error::DeleteMissingTransaction)?;

    sql_transaction.execute(
        "DELETE FROM \"transaction\" WHERE id = ?1",
        [transaction_id],
    )?;
    adjust_balance(old.account_id, -old.amount, now, &sql_transaction)?;

    sql_transaction.commit()?;

    operation_log::record(
        &NewOperation {
            user_id,
            action: "delete_transaction",
            details: Some(&format!(
                "deleted transaction {transaction_id} of {:.2}",
                old.amount
            )),
            target_table: Some("transaction"),
            ip_address: None,
        },
        connection,
    );

    Ok(())
}

/// Retrieve a transaction and the names of its account and category.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `transaction_id` does not refer to a valid transaction,
/// - or [Error::SqlError] there is some other SQL error.
pub fn get_transaction(
    transaction_id: TransactionId,
    connection: &Connection,
) -> Result<TransactionDetail, Error> {
    connection
        .prepare(&format!("{SELECT_DETAIL} WHERE t.id = :id"))?
        .query_row(&[(":id", &transaction_id)], map_detail_row)
        .map_err(|error| error.into())
}

/// Get a page of the transactions matching `filter`, newest date first.
///
/// `limit` of `None` returns every row after `offset`.
///
/// # Errors
/// Returns [Error::InvalidDateRange] if the filter's end date is before its start date.
pub fn get_transactions(
    filter: &TransactionFilter,
    limit: Option<u64>,
    offset: u64,
    connection: &Connection,
) -> Result<Vec<TransactionDetail>, Error> {
    let (where_clause, mut params) = filter.to_sql()?;

    params.push(Value::Integer(limit.map(|limit| limit as i64).unwrap_or(-1)));
    let limit_index = params.len();
    params.push(Value::Integer(offset as i64));
    let offset_index = params.len();

    // Sort by date, and then ID to keep transaction order stable after updates
    let query = format!(
        "{SELECT_DETAIL} {where_clause}
        ORDER BY t.date DESC, t.id DESC
        LIMIT ?{limit_index} OFFSET ?{offset_index}"
    );

    connection
        .prepare(&query)?
        .query_map(params_from_iter(params), map_detail_row)?
        .map(|maybe_detail| maybe_detail.map_err(|error| error.into()))
        .collect()
}

/// Count the transactions matching `filter`.
pub fn get_transactions_count(
    filter: &TransactionFilter,
    connection: &Connection,
) -> Result<usize, Error> {
    let (where_clause, params) = filter.to_sql()?;

    connection
        .query_row(
            &format!("SELECT COUNT(t.id) FROM \"transaction\" t {where_clause}"),
            params_from_iter(params),
            |row| count_column(row, 0),
        )
        .map_err(|error| error.into())
}

/// The most recently recorded transactions.
pub fn get_recent_transactions(
    limit: u64,
    connection: &Connection,
) -> Result<Vec<TransactionDetail>, Error> {
    connection
        .prepare(&format!(
            "{SELECT_DETAIL} ORDER BY t.created_at DESC, t.id DESC LIMIT ?1"
        ))?
        .query_map([limit as i64], map_detail_row)?
        .map(|maybe_detail| maybe_detail.map_err(|error| error.into()))
        .collect()
}

/// Totals for the calendar month `year`-`month`.
pub fn get_monthly_summary(
    year: i32,
    month: Month,
    connection: &Connection,
) -> Result<MonthlySummary, Error> {
    let (start, end) = month_bounds(year, month)?;
    let totals = totals_between(start, end, connection)?;

    Ok(MonthlySummary {
        year,
        month,
        total_income: totals.income,
        total_expense: totals.expense,
        profit: totals.income - totals.expense,
        transaction_count: totals.count,
    })
}

/// The first and last day of a calendar month.
pub(crate) fn month_bounds(year: i32, month: Month) -> Result<(Date, Date), Error> {
    let start =
        Date::from_calendar_date(year, month, 1).map_err(|_| Error::InvalidDateRange)?;
    let next_start = match month {
        Month::December => Date::from_calendar_date(year + 1, Month::January, 1),
        month => Date::from_calendar_date(year, month.next(), 1),
    }
    .map_err(|_| Error::InvalidDateRange)?;
    let end = next_start.previous_day().ok_or(Error::InvalidDateRange)?;

    Ok((start, end))
}

/// Income and expense totals between two dates, inclusive.
pub(crate) fn totals_between(
    start: Date,
    end: Date,
    connection: &Connection,
) -> Result<Totals, Error> {
    if end < start {
        return Err(Error::InvalidDateRange);
    }

    connection
        .query_row(
            "SELECT
                COALESCE(SUM(CASE WHEN transaction_type = 'income' THEN amount ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN transaction_type = 'expense' THEN -amount ELSE 0 END), 0),
                COUNT(id)
            FROM \"transaction\"
            WHERE date BETWEEN ?1 AND ?2",
            (start, end),
            |row| {
                Ok(Totals {
                    income: row.get(0)?,
                    expense: row.get(1)?,
                    count: count_column(row, 2)?,
                })
            },
        )
        .map_err(|error| error.into())
}

/// Check the references and amount of a transaction and return the signed amount.
fn validate(new_transaction: &NewTransaction, connection: &Connection) -> Result<f64, Error> {
    if !new_transaction.amount.is_finite() || new_transaction.amount == 0.0 {
        return Err(Error::InvalidAmount);
    }

    let account_exists = connection
        .query_row(
            "SELECT 1 FROM account WHERE id = ?1",
            [new_transaction.account_id],
            |_| Ok(()),
        )
        .optional()?
        .is_some();

    if !account_exists {
        return Err(Error::InvalidAccount(new_transaction.account_id));
    }

    let category = get_category(new_transaction.category_id, connection).map_err(|error| {
        match error {
            Error::NotFound => Error::InvalidCategory(new_transaction.category_id),
            error => error,
        }
    })?;

    if category.category_type != new_transaction.transaction_type {
        return Err(Error::CategoryTypeMismatch);
    }

    Ok(new_transaction.signed_amount())
}

fn get_transaction_row(
    transaction_id: TransactionId,
    connection: &Connection,
) -> Result<Option<Transaction>, Error> {
    connection
        .prepare(
            "SELECT id, transaction_type, amount, account_id, category_id, date, description,
                reference_number, created_by, created_at, updated_at
            FROM \"transaction\" WHERE id = ?1",
        )?
        .query_row([transaction_id], map_row)
        .optional()
        .map_err(|error| error.into())
}

/// Map a database row to a Transaction.
fn map_row(row: &Row) -> Result<Transaction, rusqlite::Error> {
    let created_by: Option<i64> = row.get(8)?;

    Ok(Transaction {
        id: row.get(0)?,
        transaction_type: parse_column(row, 1)?,
        amount: row.get(2)?,
        account_id: row.get(3)?,
        category_id: row.get(4)?,
        date: row.get(5)?,
        description: row.get(6)?,
        reference_number: row.get(7)?,
        created_by: created_by.map(UserID::new),
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

fn map_detail_row(row: &Row) -> Result<TransactionDetail, rusqlite::Error> {
    Ok(TransactionDetail {
        transaction: map_row(row)?,
        account_name: row.get(11)?,
        category_name: row.get(12)?,
    })
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod database_tests {
    use rusqlite::Connection;
    use time::{Month, macros::date, macros::datetime};

    use crate::{
        Error,
        account::{AccountType, NewAccount, create_account, get_account},
        category::{CategoryType, get_categories_by_type},
        database_id::{AccountId, CategoryId},
        test_utils::{TEST_NOW, get_test_connection},
    };

    use super::{
        Transaction, TransactionFilter, TransactionType, create_transaction, delete_transaction,
        get_monthly_summary, get_recent_transactions, get_transaction, get_transactions,
        get_transactions_count, update_transaction,
    };

    fn test_account(name: &str, connection: &Connection) -> AccountId {
        create_account(
            NewAccount {
                name: name.to_owned(),
                account_type: AccountType::Asset,
                currency: "CNY".to_owned(),
                initial_balance: 0.0,
                description: None,
            },
            None,
            TEST_NOW,
            connection,
        )
        .expect("Could not create test account")
        .id
    }

    fn first_category(category_type: CategoryType, connection: &Connection) -> CategoryId {
        get_categories_by_type(category_type, false, connection).unwrap()[0].id
    }

    fn balance(account_id: AccountId, connection: &Connection) -> f64 {
        get_account(account_id, connection).unwrap().balance
    }

    #[test]
    fn create_applies_sign_and_updates_balance() {
        let connection = get_test_connection();
        let account = test_account("Wallet", &connection);
        let income = first_category(CategoryType::Income, &connection);
        let expense = first_category(CategoryType::Expense, &connection);

        let salary = create_transaction(
            Transaction::build(
                TransactionType::Income,
                -1000.0,
                account,
                income,
                date!(2025 - 01 - 10),
            ),
            None,
            TEST_NOW,
            &connection,
        )
        .unwrap();
        let rent = create_transaction(
            Transaction::build(
                TransactionType::Expense,
                400.0,
                account,
                expense,
                date!(2025 - 01 - 11),
            )
            .description(Some("Rent".to_owned()))
            .reference_number(Some("INV-7".to_owned())),
            None,
            TEST_NOW,
            &connection,
        )
        .unwrap();

        assert_eq!(salary.amount, 1000.0);
        assert_eq!(rent.amount, -400.0);
        assert_eq!(rent.reference_number.as_deref(), Some("INV-7"));
        assert_eq!(balance(account, &connection), 600.0);
    }

    #[test]
    fn create_validates_input() {
        let connection = get_test_connection();
        let account = test_account("Wallet", &connection);
        let income = first_category(CategoryType::Income, &connection);
        let day = date!(2025 - 01 - 10);

        let zero = create_transaction(
            Transaction::build(TransactionType::Income, 0.0, account, income, day),
            None,
            TEST_NOW,
            &connection,
        );
        let not_a_number = create_transaction(
            Transaction::build(TransactionType::Income, f64::NAN, account, income, day),
            None,
            TEST_NOW,
            &connection,
        );
        let missing_account = create_transaction(
            Transaction::build(TransactionType::Income, 5.0, 999, income, day),
            None,
            TEST_NOW,
            &connection,
        );
        let missing_category = create_transaction(
            Transaction::build(TransactionType::Income, 5.0, account, 999, day),
            None,
            TEST_NOW,
            &connection,
        );
        let mismatch = create_transaction(
            Transaction::build(TransactionType::Expense, 5.0, account, income, day),
            None,
            TEST_NOW,
            &connection,
        );

        assert_eq!(zero, Err(Error::InvalidAmount));
        assert_eq!(not_a_number, Err(Error::InvalidAmount));
        assert_eq!(missing_account, Err(Error::InvalidAccount(999)));
        assert_eq!(missing_category, Err(Error::InvalidCategory(999)));
        assert_eq!(mismatch, Err(Error::CategoryTypeMismatch));
        assert_eq!(balance(account, &connection), 0.0);
    }

    #[test]
    fn update_on_same_account_applies_difference() {
        let connection = get_test_connection();
        let account = test_account("Wallet", &connection);
        let expense = first_category(CategoryType::Expense, &connection);
        let day = date!(2025 - 01 - 10);
        let transaction = create_transaction(
            Transaction::build(TransactionType::Expense, 100.0, account, expense, day),
            None,
            TEST_NOW,
            &connection,
        )
        .unwrap();

        update_transaction(
            transaction.id,
            Transaction::build(TransactionType::Expense, 30.0, account, expense, day),
            None,
            TEST_NOW,
            &connection,
        )
        .unwrap();

        assert_eq!(balance(account, &connection), -30.0);
        assert_eq!(
            get_transaction(transaction.id, &connection).unwrap().transaction.amount,
            -30.0
        );
    }

    #[test]
    fn update_to_other_account_moves_amount() {
        let connection = get_test_connection();
        let wallet = test_account("Wallet", &connection);
        let bank = test_account("Bank", &connection);
        let income = first_category(CategoryType::Income, &connection);
        let day = date!(2025 - 01 - 10);
        let transaction = create_transaction(
            Transaction::build(TransactionType::Income, 250.0, wallet, income, day),
            None,
            TEST_NOW,
            &connection,
        )
        .unwrap();

        update_transaction(
            transaction.id,
            Transaction::build(TransactionType::Income, 300.0, bank, income, day),
            None,
            TEST_NOW,
            &connection,
        )
        .unwrap();

        assert_eq!(balance(wallet, &connection), 0.0);
        assert_eq!(balance(bank, &connection), 300.0);
    }

    #[test]
    fn failed_update_leaves_balances_alone() {
        let connection = get_test_connection();
        let wallet = test_account("Wallet", &connection);
        let income = first_category(CategoryType::Income, &connection);
        let day = date!(2025 - 01 - 10);
        let transaction = create_transaction(
            Transaction::build(TransactionType::Income, 250.0, wallet, income, day),
            None,
            TEST_NOW,
            &connection,
        )
        .unwrap();

        let result = update_transaction(
            transaction.id,
            Transaction::build(TransactionType::Income, 300.0, 999, income, day),
            None,
            TEST_NOW,
            &connection,
        );

        assert_eq!(result, Err(Error::InvalidAccount(999)));
        assert_eq!(balance(wallet, &connection), 250.0);
        assert_eq!(
            update_transaction(
                999,
                Transaction::build(TransactionType::Income, 1.0, wallet, income, day),
                None,
                TEST_NOW,
                &connection,
            ),
            Err(Error::UpdateMissingTransaction)
        );
    }

    #[test]
    fn delete_reverses_balance() {
        let connection = get_test_connection();
        let account = test_account("Wallet", &connection);
        let expense = first_category(CategoryType::Expense, &connection);
        let transaction = create_transaction(
            Transaction::build(
                TransactionType::Expense,
                80.0,
                account,
                expense,
                date!(2025 - 01 - 10),
            ),
            None,
            TEST_NOW,
            &connection,
        )
        .unwrap();

        delete_transaction(transaction.id, None, TEST_NOW, &connection).unwrap();

        assert_eq!(balance(account, &connection), 0.0);
        assert_eq!(get_transaction(transaction.id, &connection), Err(Error::NotFound));
        assert_eq!(
            delete_transaction(transaction.id, None, TEST_NOW, &connection),
            Err(Error::DeleteMissingTransaction)
        );
    }

    #[test]
    fn get_transaction_includes_names() {
        let connection = get_test_connection();
        let account = test_account("Wallet", &connection);
        let income = first_category(CategoryType::Income, &connection);
        let transaction = create_transaction(
            Transaction::build(
                TransactionType::Income,
                5.0,
                account,
                income,
                date!(2025 - 01 - 10),
            ),
            None,
            TEST_NOW,
            &connection,
        )
        .unwrap();

        let detail = get_transaction(transaction.id, &connection).unwrap();

        assert_eq!(detail.transaction, transaction);
        assert_eq!(detail.account_name, "Wallet");
        assert!(!detail.category_name.is_empty());
    }

    #[test]
    fn filters_orders_and_pages() {
        let connection = get_test_connection();
        let account = test_account("Wallet", &connection);
        let income = first_category(CategoryType::Income, &connection);
        let expense = first_category(CategoryType::Expense, &connection);
        let rows = [
            (TransactionType::Income, income, date!(2025 - 01 - 01), "salary"),
            (TransactionType::Expense, expense, date!(2025 - 01 - 05), "coffee"),
            (TransactionType::Expense, expense, date!(2025 - 01 - 05), "more coffee"),
            (TransactionType::Expense, expense, date!(2025 - 02 - 01), "rent"),
        ];
        for (transaction_type, category, date, description) in rows {
            create_transaction(
                Transaction::build(transaction_type, 10.0, account, category, date)
                    .description(Some(description.to_owned())),
                None,
                TEST_NOW,
                &connection,
            )
            .unwrap();
        }

        let january = TransactionFilter {
            start_date: Some(date!(2025 - 01 - 01)),
            end_date: Some(date!(2025 - 01 - 31)),
            ..Default::default()
        };
        let coffee = TransactionFilter {
            description_contains: Some("coffee".to_owned()),
            transaction_type: Some(TransactionType::Expense),
            ..Default::default()
        };

        let got = get_transactions(&january, None, 0, &connection).unwrap();
        let descriptions: Vec<_> = got
            .iter()
            .map(|detail| detail.transaction.description.as_deref().unwrap_or_default())
            .collect();
        assert_eq!(descriptions, ["more coffee", "coffee", "salary"]);

        let page = get_transactions(&january, Some(1), 1, &connection).unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].transaction.description.as_deref(), Some("coffee"));

        assert_eq!(get_transactions_count(&january, &connection), Ok(3));
        assert_eq!(get_transactions_count(&coffee, &connection), Ok(2));
        assert_eq!(
            get_transactions_count(&TransactionFilter::default(), &connection),
            Ok(4)
        );
    }

    #[test]
    fn reversed_date_range_is_rejected() {
        let connection = get_test_connection();
        let filter = TransactionFilter {
            start_date: Some(date!(2025 - 02 - 01)),
            end_date: Some(date!(2025 - 01 - 01)),
            ..Default::default()
        };

        assert_eq!(
            get_transactions(&filter, None, 0, &connection),
            Err(Error::InvalidDateRange)
        );
        assert_eq!(
            get_transactions_count(&filter, &connection),
            Err(Error::InvalidDateRange)
        );
    }

    #[test]
    fn recent_transactions_are_ordered_by_creation() {
        let connection = get_test_connection();
        let account = test_account("Wallet", &connection);
        let income = first_category(CategoryType::Income, &connection);
        let created = [
            datetime!(2025-01-03 10:00 UTC),
            datetime!(2025-01-01 10:00 UTC),
            datetime!(2025-01-02 10:00 UTC),
        ];
        for (i, created_at) in created.into_iter().enumerate() {
            create_transaction(
                Transaction::build(
                    TransactionType::Income,
                    (i + 1) as f64,
                    account,
                    income,
                    date!(2025 - 01 - 01),
                ),
                None,
                created_at,
                &connection,
            )
            .unwrap();
        }

        let recent = get_recent_transactions(2, &connection).unwrap();

        let amounts: Vec<_> = recent.iter().map(|detail| detail.transaction.amount).collect();
        assert_eq!(amounts, [1.0, 3.0]);
    }

    #[test]
    fn monthly_summary_covers_whole_month() {
        let connection = get_test_connection();
        let account = test_account("Wallet", &connection);
        let income = first_category(CategoryType::Income, &connection);
        let expense = first_category(CategoryType::Expense, &connection);
        let rows = [
            (TransactionType::Income, income, 500.0, date!(2024 - 12 - 01)),
            (TransactionType::Expense, expense, 120.0, date!(2024 - 12 - 31)),
            (TransactionType::Income, income, 999.0, date!(2025 - 01 - 01)),
            (TransactionType::Expense, expense, 999.0, date!(2024 - 11 - 30)),
        ];
        for (transaction_type, category, amount, date) in rows {
            create_transaction(
                Transaction::build(transaction_type, amount, account, category, date),
                None,
                TEST_NOW,
                &connection,
            )
            .unwrap();
        }

        let summary = get_monthly_summary(2024, Month::December, &connection).unwrap();

        assert_eq!(summary.total_income, 500.0);
        assert_eq!(summary.total_expense, 120.0);
        assert_eq!(summary.profit, 380.0);
        assert_eq!(summary.transaction_count, 2);
    }
}
