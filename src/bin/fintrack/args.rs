use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use time::{Date, format_description::BorrowedFormatItem, macros::format_description};

use fintrack::{
    Role, UserStatus,
    account::{AccountStatus, AccountType},
    category::CategoryType,
    config::DEFAULT_CONFIG_PATH,
    database_id::DatabaseId,
    permission::{Permission, ResourceType},
    system_config::ConfigType,
};

const DATE_FORMAT: &[BorrowedFormatItem] =
    format_description!("[year]-[month repr:numerical padding:zero]-[day padding:zero]");

/// A finance tracker for individuals and small businesses.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// File path to the JSON config file.
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// File path to the application SQLite database. Overrides the config file.
    #[arg(long)]
    pub db_path: Option<PathBuf>,

    /// The user to log in as.
    #[arg(long, short, env = "FINTRACK_USERNAME")]
    pub username: Option<String>,

    /// Print results as JSON instead of text.
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create the database and an admin user.
    Init {
        /// The username of the admin.
        #[arg(long, default_value = "admin")]
        admin_username: String,
    },
    /// Manage users and their grants.
    #[command(subcommand)]
    User(UserCommand),
    /// Change your own password.
    Passwd,
    /// Manage accounts.
    #[command(subcommand)]
    Account(AccountCommand),
    /// Manage income and expense categories.
    #[command(subcommand)]
    Category(CategoryCommand),
    /// Record and browse transactions.
    #[command(subcommand)]
    Transaction(TransactionCommand),
    /// Financial reports.
    #[command(subcommand)]
    Report(ReportCommand),
    /// Read and change system settings.
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Your own display preferences.
    #[command(subcommand)]
    Prefs(PrefsCommand),
    /// Database backups.
    #[command(subcommand)]
    Backup(BackupCommand),
    /// The audit trail.
    #[command(subcommand)]
    Log(LogCommand),
}

#[derive(Subcommand, Debug)]
pub enum UserCommand {
    /// Register a new user.
    Add {
        username: String,
        /// The user's display name.
        #[arg(long)]
        fullname: String,
        #[arg(long)]
        email: Option<String>,
        #[arg(long, default_value = "user")]
        role: Role,
    },
    /// List users.
    List {
        #[arg(long)]
        role: Option<Role>,
        #[arg(long)]
        status: Option<UserStatus>,
    },
    /// Show one user.
    Show { username: String },
    /// Change a user's details.
    Update {
        username: String,
        #[arg(long)]
        fullname: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        role: Option<Role>,
        #[arg(long)]
        status: Option<UserStatus>,
    },
    /// Deactivate a user.
    Delete { username: String },
    /// Set a new password for a user.
    ResetPassword { username: String },
    /// Clear a user's failed log-in attempts.
    Unlock { username: String },
    /// Give a user a permission on one resource.
    Grant(GrantArgs),
    /// Take a permission away from a user.
    Revoke(GrantArgs),
    /// List a user's grants.
    Permissions { username: String },
}

#[derive(Args, Debug)]
pub struct GrantArgs {
    pub username: String,
    /// account, category, transaction or report.
    pub resource_type: ResourceType,
    pub resource_id: DatabaseId,
    /// read, write or delete.
    pub permission: Permission,
}

#[derive(Subcommand, Debug)]
pub enum AccountCommand {
    /// Create an account.
    Add {
        name: String,
        /// asset, liability, equity, income or expense.
        #[arg(long = "type")]
        account_type: AccountType,
        #[arg(long, default_value = "CNY")]
        currency: String,
        #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
        balance: f64,
        #[arg(long)]
        description: Option<String>,
    },
    /// List accounts.
    List {
        #[arg(long = "type")]
        account_type: Option<AccountType>,
        #[arg(long)]
        status: Option<AccountStatus>,
        /// Only accounts whose name contains this text.
        #[arg(long)]
        search: Option<String>,
    },
    /// Show one account.
    Show { id: DatabaseId },
    /// Change an account.
    Update {
        id: DatabaseId,
        #[arg(long)]
        name: Option<String>,
        #[arg(long = "type")]
        account_type: Option<AccountType>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        status: Option<AccountStatus>,
    },
    /// Delete an account without transactions.
    Delete { id: DatabaseId },
    /// Totals of the active accounts by class.
    Summary,
}

#[derive(Subcommand, Debug)]
pub enum CategoryCommand {
    /// Create a category.
    Add {
        name: String,
        /// income or expense.
        #[arg(long = "type")]
        category_type: CategoryType,
        #[arg(long)]
        parent: Option<DatabaseId>,
        #[arg(long)]
        icon: Option<String>,
        #[arg(long)]
        color: Option<String>,
        #[arg(long)]
        description: Option<String>,
    },
    /// List categories.
    List {
        #[arg(long = "type")]
        category_type: Option<CategoryType>,
        /// Only children of this category.
        #[arg(long, conflicts_with = "roots")]
        parent: Option<DatabaseId>,
        /// Only top level categories.
        #[arg(long)]
        roots: bool,
        #[arg(long)]
        include_inactive: bool,
    },
    /// Show the active categories of one type as a tree.
    Tree {
        #[arg(long = "type")]
        category_type: CategoryType,
    },
    /// Change a category.
    Update {
        id: DatabaseId,
        #[arg(long)]
        name: Option<String>,
        #[arg(long = "type")]
        category_type: Option<CategoryType>,
        #[arg(long, conflicts_with = "root")]
        parent: Option<DatabaseId>,
        /// Move the category to the top level.
        #[arg(long)]
        root: bool,
        #[arg(long)]
        icon: Option<String>,
        #[arg(long)]
        color: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        status: Option<AccountStatus>,
    },
    /// Delete a category.
    Delete { id: DatabaseId },
    /// Totals per category.
    Stats {
        #[arg(long = "type")]
        category_type: CategoryType,
        #[command(flatten)]
        range: OptionalDateRange,
    },
}

#[derive(Subcommand, Debug)]
pub enum TransactionCommand {
    /// Record a transaction.
    Add {
        /// income or expense.
        #[arg(long = "type")]
        transaction_type: CategoryType,
        #[arg(long)]
        amount: f64,
        #[arg(long)]
        account: DatabaseId,
        #[arg(long)]
        category: DatabaseId,
        /// Defaults to today.
        #[arg(long, value_parser = parse_date)]
        date: Option<Date>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        reference: Option<String>,
    },
    /// List transactions, newest first.
    List {
        #[command(flatten)]
        range: OptionalDateRange,
        #[arg(long)]
        account: Option<DatabaseId>,
        #[arg(long)]
        category: Option<DatabaseId>,
        #[arg(long = "type")]
        transaction_type: Option<CategoryType>,
        /// Only transactions whose description contains this text.
        #[arg(long)]
        search: Option<String>,
        #[arg(long)]
        page: Option<u64>,
        #[arg(long)]
        page_size: Option<u64>,
    },
    /// Show one transaction.
    Show { id: DatabaseId },
    /// Change a transaction. Fields that are not given keep their value.
    Update {
        id: DatabaseId,
        #[arg(long = "type")]
        transaction_type: Option<CategoryType>,
        #[arg(long)]
        amount: Option<f64>,
        #[arg(long)]
        account: Option<DatabaseId>,
        #[arg(long)]
        category: Option<DatabaseId>,
        #[arg(long, value_parser = parse_date)]
        date: Option<Date>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        reference: Option<String>,
    },
    /// Delete a transaction.
    Delete { id: DatabaseId },
    /// The most recently recorded transactions.
    Recent {
        #[arg(long, default_value_t = 10)]
        limit: u64,
    },
    /// Income and expenses for one month.
    Month {
        year: i32,
        #[arg(value_parser = clap::value_parser!(u8).range(1..=12))]
        month: u8,
    },
}

#[derive(Subcommand, Debug)]
pub enum ReportCommand {
    /// Income, expenses and margin.
    Profit(DateRange),
    /// Per-category income and expenses.
    IncomeStatement(DateRange),
    /// Assets, liabilities and equity.
    BalanceSheet {
        /// Defaults to today.
        #[arg(long, value_parser = parse_date)]
        as_of: Option<Date>,
    },
    /// Operating, investing and financing cash flow.
    CashFlow(DateRange),
    /// Month by month totals, oldest first.
    Trend {
        #[arg(long, default_value_t = 12, value_parser = clap::value_parser!(u16).range(1..=240))]
        months: u16,
    },
    /// Activity per account and per account class.
    Accounts {
        #[command(flatten)]
        range: OptionalDateRange,
    },
}

#[derive(Args, Debug)]
pub struct DateRange {
    /// First day, inclusive (YYYY-MM-DD).
    #[arg(long, value_parser = parse_date)]
    pub from: Date,
    /// Last day, inclusive (YYYY-MM-DD).
    #[arg(long, value_parser = parse_date)]
    pub to: Date,
}

#[derive(Args, Debug)]
pub struct OptionalDateRange {
    /// First day, inclusive (YYYY-MM-DD).
    #[arg(long, value_parser = parse_date)]
    pub from: Option<Date>,
    /// Last day, inclusive (YYYY-MM-DD).
    #[arg(long, value_parser = parse_date)]
    pub to: Option<Date>,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Print one setting.
    Get { key: String },
    /// Change a setting.
    Set {
        key: String,
        value: String,
        /// Parse the value as this type instead of guessing.
        #[arg(long = "type")]
        config_type: Option<ConfigType>,
        #[arg(long)]
        description: Option<String>,
    },
    /// List settings.
    List {
        /// Only keys starting with this text, e.g. "security.".
        #[arg(long, default_value = "")]
        prefix: String,
    },
    /// Remove a setting.
    Delete { key: String },
    /// Write every setting as JSON.
    Export {
        /// Defaults to stdout.
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Read settings from a JSON file.
    Import {
        file: PathBuf,
        /// Replace settings that already exist.
        #[arg(long)]
        overwrite: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum PrefsCommand {
    /// Print your preferences.
    Show,
    /// Change one preference. The value is parsed as JSON if possible.
    Set { key: String, value: String },
}

#[derive(Subcommand, Debug)]
pub enum BackupCommand {
    /// Back up the database now.
    Create {
        #[arg(long, default_value = "manual")]
        description: String,
    },
    /// List backups, newest first.
    List,
    /// Replace the database with a backup.
    Restore { path: PathBuf },
    /// Delete one backup.
    Delete { path: PathBuf },
    /// Delete old backups.
    Cleanup {
        /// Defaults to the config file's keep_days.
        #[arg(long)]
        days: Option<u32>,
        /// Defaults to the config file's min_keep.
        #[arg(long)]
        keep_min: Option<usize>,
    },
    /// Back up if the backup interval has passed, then clean up.
    Auto,
}

#[derive(Subcommand, Debug)]
pub enum LogCommand {
    /// List audit rows, newest first.
    List {
        /// Only rows for this user.
        #[arg(long)]
        user: Option<String>,
        #[arg(long)]
        action: Option<String>,
        #[arg(long, default_value_t = 50)]
        limit: u64,
    },
}

fn parse_date(text: &str) -> Result<Date, String> {
    Date::parse(text, DATE_FORMAT).map_err(|error| format!("expected YYYY-MM-DD: {error}"))
}

#[cfg(test)]
mod tests {
    use clap::{CommandFactory, Parser};
    use time::macros::date;

    use super::{Cli, Command, ReportCommand, TransactionCommand, parse_date};

    #[test]
    fn command_definitions_are_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_iso_dates() {
        assert_eq!(parse_date("2024-02-29"), Ok(date!(2024 - 02 - 29)));
        assert!(parse_date("29/02/2024").is_err());
    }

    #[test]
    fn parses_transaction_add() {
        let cli = Cli::try_parse_from([
            "fintrack",
            "--username",
            "admin",
            "transaction",
            "add",
            "--type",
            "expense",
            "--amount",
            "12.5",
            "--account",
            "1",
            "--category",
            "6",
            "--date",
            "2024-03-01",
        ])
        .unwrap();

        match cli.command {
            Command::Transaction(TransactionCommand::Add { amount, date, .. }) => {
                assert_eq!(amount, 12.5);
                assert_eq!(date, Some(date!(2024 - 03 - 01)));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn month_must_be_in_range() {
        let result = Cli::try_parse_from(["fintrack", "transaction", "month", "2024", "13"]);

        assert!(result.is_err());
    }

    #[test]
    fn trend_months_are_bounded() {
        for months in ["0", "241", "18446744073709551615"] {
            let result = Cli::try_parse_from(["fintrack", "report", "trend", "--months", months]);

            assert!(result.is_err(), "--months {months} should be rejected");
        }

        let cli = Cli::try_parse_from(["fintrack", "report", "trend", "--months", "240"]).unwrap();

        match cli.command {
            Command::Report(ReportCommand::Trend { months }) => assert_eq!(months, 240),
            other => panic!("unexpected command {other:?}"),
        }
    }
}
