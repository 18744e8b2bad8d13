//! Financial reports built from accounts and transactions.
//!
//! Every date range here is inclusive at both ends. Expense figures are
//! reported as positive numbers.

use rusqlite::{Connection, ToSql, params_from_iter};
use serde::Serialize;
use time::{Date, Month};

use crate::{
    Error,
    account::{Account, AccountFilter, AccountStatus, AccountType, get_all_accounts},
    category::CategoryType,
    database_id::AccountId,
    db::{count_column, parse_column},
    transaction::{MonthlySummary, get_monthly_summary, totals_between},
};

/// Income, expenses and profit over a date range.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfitReport {
    /// The first day of the range.
    pub start_date: Date,
    /// The last day of the range.
    pub end_date: Date,
    /// The sum of income.
    pub total_income: f64,
    /// The sum of expenses.
    pub total_expense: f64,
    /// Income minus expenses.
    pub net_profit: f64,
    /// Net profit as a percentage of income, or zero without income.
    pub gross_margin: f64,
    /// The number of transactions in the range.
    pub transaction_count: usize,
}

/// One category's total in an income statement.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatementLine {
    /// The category name.
    pub category: String,
    /// The category total.
    pub amount: f64,
}

/// Income and expenses per category.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IncomeStatement {
    /// The first day of the range.
    pub start_date: Date,
    /// The last day of the range.
    pub end_date: Date,
    /// Income categories, largest first.
    pub income: Vec<StatementLine>,
    /// Expense categories, largest first.
    pub expenses: Vec<StatementLine>,
    /// The sum of the income lines.
    pub total_income: f64,
    /// The sum of the expense lines.
    pub total_expense: f64,
    /// Income minus expenses.
    pub net_profit: f64,
}

/// Assets, liabilities and equity at a point in time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BalanceSheet {
    /// The date the sheet is reported for.
    pub as_of: Date,
    /// Active asset accounts.
    pub assets: Vec<Account>,
    /// Active liability accounts.
    pub liabilities: Vec<Account>,
    /// Active equity accounts.
    pub equity: Vec<Account>,
    /// The sum of asset balances.
    pub total_assets: f64,
    /// The sum of liability balances.
    pub total_liabilities: f64,
    /// The sum of equity balances.
    pub total_equity: f64,
    /// Whether assets equal liabilities plus equity, to the cent.
    pub balance_valid: bool,
}

/// A simplified statement of cash flows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CashFlowStatement {
    /// The first day of the range.
    pub start_date: Date,
    /// The last day of the range.
    pub end_date: Date,
    /// Net profit over the range.
    pub operating_cash_flow: f64,
    /// The sum of transactions on asset accounts.
    pub investing_cash_flow: f64,
    /// The sum of transactions on liability and equity accounts.
    pub financing_cash_flow: f64,
    /// The sum of the three flows.
    pub net_cash_increase: f64,
}

/// One month in a trend analysis.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthTrend {
    /// The month as `YYYY-MM`.
    pub label: String,
    /// The sum of income.
    pub income: f64,
    /// The sum of expenses.
    pub expense: f64,
    /// Income minus expenses.
    pub profit: f64,
    /// The number of transactions in the month.
    pub transaction_count: usize,
}

impl From<MonthlySummary> for MonthTrend {
    fn from(summary: MonthlySummary) -> Self {
        Self {
            label: format!("{}-{:02}", summary.year, summary.month as u8),
            income: summary.total_income,
            expense: summary.total_expense,
            profit: summary.profit,
            transaction_count: summary.transaction_count,
        }
    }
}

/// The activity of one account over a date range.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccountActivity {
    /// The account ID.
    pub account_id: AccountId,
    /// The account name.
    pub name: String,
    /// The accounting class.
    pub account_type: AccountType,
    /// The current balance.
    pub balance: f64,
    /// Income recorded on the account in the range.
    pub total_income: f64,
    /// Expenses recorded on the account in the range.
    pub total_expense: f64,
    /// The number of transactions in the range.
    pub transaction_count: usize,
}

/// Totals for all accounts of one class.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccountTypeTotals {
    /// The accounting class.
    pub account_type: AccountType,
    /// The number of accounts.
    pub account_count: usize,
    /// The sum of balances.
    pub total_balance: f64,
    /// The sum of income.
    pub total_income: f64,
    /// The sum of expenses.
    pub total_expense: f64,
    /// The number of transactions.
    pub transaction_count: usize,
}

/// Activity per active account, grouped by class.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccountSummaryReport {
    /// The first day of the range, if any.
    pub start_date: Option<Date>,
    /// The last day of the range, if any.
    pub end_date: Option<Date>,
    /// Every active account, ordered by class then name.
    pub accounts: Vec<AccountActivity>,
    /// Totals per class, in the same order as `accounts`.
    pub by_type: Vec<AccountTypeTotals>,
}

/// Income, expenses, profit and margin between two dates.
///
/// # Errors
/// Returns [Error::InvalidDateRange] if `end_date` is before `start_date`.
pub fn calculate_profit(
    start_date: Date,
    end_date: Date,
    connection: &Connection,
) -> Result<ProfitReport, Error> {
    let totals = totals_between(start_date, end_date, connection)?;
    let net_profit = totals.income - totals.expense;
    let gross_margin = if totals.income > 0.0 {
        net_profit / totals.income * 100.0
    } else {
        0.0
    };

    Ok(ProfitReport {
        start_date,
        end_date,
        total_income: totals.income,
        total_expense: totals.expense,
        net_profit,
        gross_margin,
        transaction_count: totals.count,
    })
}

/// Per-category income and expenses between two dates.
pub fn generate_income_statement(
    start_date: Date,
    end_date: Date,
    connection: &Connection,
) -> Result<IncomeStatement, Error> {
    if end_date < start_date {
        return Err(Error::InvalidDateRange);
    }

    let income = statement_lines(CategoryType::Income, start_date, end_date, connection)?;
    let expenses = statement_lines(CategoryType::Expense, start_date, end_date, connection)?;
    let total_income = income.iter().map(|line| line.amount).sum();
    let total_expense = expenses.iter().map(|line| line.amount).sum();

    Ok(IncomeStatement {
        start_date,
        end_date,
        income,
        expenses,
        total_income,
        total_expense,
        net_profit: total_income - total_expense,
    })
}

fn statement_lines(
    category_type: CategoryType,
    start_date: Date,
    end_date: Date,
    connection: &Connection,
) -> Result<Vec<StatementLine>, Error> {
    connection
        .prepare(
            "SELECT c.name, ABS(SUM(t.amount)) AS total
            FROM \"transaction\" t
            JOIN category c ON c.id = t.category_id
            WHERE t.transaction_type = ?1 AND t.date BETWEEN ?2 AND ?3
            GROUP BY c.id, c.name
            ORDER BY total DESC, c.name ASC",
        )?
        .query_map((category_type.as_str(), start_date, end_date), |row| {
            Ok(StatementLine {
                category: row.get(0)?,
                amount: row.get(1)?,
            })
        })?
        .map(|maybe_line| maybe_line.map_err(|error| error.into()))
        .collect()
}

/// The balances of the active asset, liability and equity accounts.
///
/// Balances are running totals, so `as_of` labels the sheet rather than
/// filtering it.
pub fn generate_balance_sheet(as_of: Date, connection: &Connection) -> Result<BalanceSheet, Error> {
    let active_of_type = |account_type| {
        get_all_accounts(
            &AccountFilter {
                account_type: Some(account_type),
                status: Some(AccountStatus::Active),
                ..Default::default()
            },
            connection,
        )
    };

    let assets = active_of_type(AccountType::Asset)?;
    let liabilities = active_of_type(AccountType::Liability)?;
    let equity = active_of_type(AccountType::Equity)?;

    let sum = |accounts: &[Account]| accounts.iter().map(|account| account.balance).sum::<f64>();
    let total_assets = sum(&assets);
    let total_liabilities = sum(&liabilities);
    let total_equity = sum(&equity);

    Ok(BalanceSheet {
        as_of,
        assets,
        liabilities,
        equity,
        total_assets,
        total_liabilities,
        total_equity,
        balance_valid: (total_assets - (total_liabilities + total_equity)).abs() < 0.01,
    })
}

/// Operating, investing and financing flows between two dates.
pub fn generate_cash_flow_statement(
    start_date: Date,
    end_date: Date,
    connection: &Connection,
) -> Result<CashFlowStatement, Error> {
    let operating_cash_flow = calculate_profit(start_date, end_date, connection)?.net_profit;

    let flow_on = |account_types: &str| -> Result<f64, Error> {
        connection
            .query_row(
                &format!(
                    "SELECT COALESCE(SUM(t.amount), 0)
                    FROM \"transaction\" t
                    JOIN account a ON a.id = t.account_id
                    WHERE a.account_type IN ({account_types}) AND t.date BETWEEN ?1 AND ?2"
                ),
                (start_date, end_date),
                |row| row.get(0),
            )
            .map_err(|error| error.into())
    };

    let investing_cash_flow = flow_on("'asset'")?;
    let financing_cash_flow = flow_on("'liability', 'equity'")?;

    Ok(CashFlowStatement {
        start_date,
        end_date,
        operating_cash_flow,
        investing_cash_flow,
        financing_cash_flow,
        net_cash_increase: operating_cash_flow + investing_cash_flow + financing_cash_flow,
    })
}

/// The most months a trend analysis covers, twenty years.
pub const MAX_TREND_MONTHS: usize = 240;

/// Monthly totals for the `months` calendar months ending with the month of
/// `today`, oldest first.
///
/// # Errors
/// Returns [Error::InvalidDateRange] if `months` is more than [MAX_TREND_MONTHS].
pub fn generate_trend_analysis(
    months: usize,
    today: Date,
    connection: &Connection,
) -> Result<Vec<MonthTrend>, Error> {
    if months > MAX_TREND_MONTHS {
        return Err(Error::InvalidDateRange);
    }

    let mut year = today.year();
    let mut month = today.month();
    let mut calendar_months = Vec::with_capacity(months);

    for _ in 0..months {
        calendar_months.push((year, month));

        if month == Month::January {
            year -= 1;
        }
        month = month.previous();
    }

    calendar_months
        .into_iter()
        .rev()
        .map(|(year, month)| get_monthly_summary(year, month, connection).map(MonthTrend::from))
        .collect()
}

/// Totals for one calendar month.
pub fn get_month_summary(
    year: i32,
    month: Month,
    connection: &Connection,
) -> Result<MonthlySummary, Error> {
    get_monthly_summary(year, month, connection)
}

/// Income, expenses and transaction counts per active account within an
/// optional date range.
pub fn generate_account_summary(
    start_date: Option<Date>,
    end_date: Option<Date>,
    connection: &Connection,
) -> Result<AccountSummaryReport, Error> {
    if let (Some(start), Some(end)) = (start_date, end_date)
        && end < start
    {
        return Err(Error::InvalidDateRange);
    }

    let mut params: Vec<&dyn ToSql> = Vec::new();
    let mut date_conditions = String::new();

    if let Some(start) = &start_date {
        params.push(start);
        date_conditions.push_str(&format!(" AND t.date >= ?{}", params.len()));
    }

    if let Some(end) = &end_date {
        params.push(end);
        date_conditions.push_str(&format!(" AND t.date <= ?{}", params.len()));
    }

    let query = format!(
        "SELECT a.id, a.name, a.account_type, a.balance,
            COALESCE(SUM(CASE WHEN t.transaction_type = 'income' THEN t.amount ELSE 0 END), 0),
            COALESCE(SUM(CASE WHEN t.transaction_type = 'expense' THEN -t.amount ELSE 0 END), 0),
            COUNT(t.id)
        FROM account a
        LEFT JOIN \"transaction\" t ON t.account_id = a.id{date_conditions}
        WHERE a.status = 'active'
        GROUP BY a.id
        ORDER BY a.account_type ASC, a.name ASC"
    );

    let accounts: Vec<AccountActivity> = connection
        .prepare(&query)?
        .query_map(params_from_iter(params), |row| {
            Ok(AccountActivity {
                account_id: row.get(0)?,
                name: row.get(1)?,
                account_type: parse_column(row, 2)?,
                balance: row.get(3)?,
                total_income: row.get(4)?,
                total_expense: row.get(5)?,
                transaction_count: count_column(row, 6)?,
            })
        })?
        .collect::<Result<_, _>>()?;

    let mut by_type: Vec<AccountTypeTotals> = Vec::new();

    for account in &accounts {
        let index = match by_type
            .iter()
            .position(|totals| totals.account_type == account.account_type)
        {
            Some(index) => index,
            None => {
                by_type.push(AccountTypeTotals {
                    account_type: account.account_type,
                    account_count: 0,
                    total_balance: 0.0,
                    total_income: 0.0,
                    total_expense: 0.0,
                    transaction_count: 0,
                });
                by_type.len() - 1
            }
        };

        let totals = &mut by_type[index];
        totals.account_count += 1;
        totals.total_balance += account.balance;
        totals.total_income += account.total_income;
        totals.total_expense += account.total_expense;
        totals.transaction_count += account.transaction_count;
    }

    Ok(AccountSummaryReport {
        start_date,
        end_date,
        accounts,
        by_type,
    })
}
