//! Accounts, categories and transactions.

use serde::Serialize;
use time::Month;

use fintrack::{
    Error, Role,
    account::{
        Account, AccountFilter, AccountUpdate, NewAccount, create_account, delete_account,
        get_account, get_account_balance_summary, get_all_accounts, update_account,
    },
    category::{
        CategoryFilter, CategoryNode, CategoryStatus, CategoryUpdate, NewCategory, ParentFilter,
        create_category, delete_category, get_all_categories, get_category_hierarchy,
        get_category_statistics, update_category,
    },
    pagination::{Page, describe_page},
    permission::Permission,
    transaction::{
        Transaction, TransactionDetail, TransactionFilter, create_transaction, delete_transaction,
        get_monthly_summary, get_recent_transactions, get_transaction, get_transactions,
        get_transactions_count, update_transaction,
    },
};

use crate::{
    args::{AccountCommand, CategoryCommand, TransactionCommand},
    context::Context,
    output::{or_dash, print_table},
};

// ============================================================================
// ACCOUNTS
// ============================================================================

pub fn account(context: &mut Context, command: AccountCommand) -> Result<(), Error> {
    match command {
        AccountCommand::Add {
            name,
            account_type,
            currency,
            balance,
            description,
        } => {
            let user_id = context.session.require_role(Role::Manager)?.id;
            let account = create_account(
                NewAccount {
                    name,
                    account_type,
                    currency,
                    initial_balance: balance,
                    description,
                },
                Some(user_id),
                context.now,
                &context.connection,
            )?;

            context.emit(&account, |account| {
                println!("Created account \"{}\" with ID {}.", account.name, account.id)
            })
        }
        AccountCommand::List {
            account_type,
            status,
            search,
        } => {
            context.session.require_login()?;
            let accounts = get_all_accounts(
                &AccountFilter {
                    account_type,
                    status,
                    name_contains: search,
                },
                &context.connection,
            )?;

            context.emit(&accounts, |accounts| print_accounts(context, accounts))
        }
        AccountCommand::Show { id } => {
            context.session.require_login()?;
            let account = get_account(id, &context.connection)?;

            context.emit(&account, |account| {
                println!("ID:           {}", account.id);
                println!("Name:         {}", account.name);
                println!("Type:         {}", account.account_type);
                println!("Currency:     {}", account.currency);
                println!("Balance:      {}", context.money(account.balance));
                println!("Status:       {}", account.status);
                println!("Description:  {}", or_dash(account.description.as_deref()));
            })
        }
        AccountCommand::Update {
            id,
            name,
            account_type,
            description,
            status,
        } => {
            let user_id = context.session.require_role(Role::Manager)?.id;
            let update = AccountUpdate {
                name,
                account_type,
                description,
                status,
            };

            update_account(id, &update, Some(user_id), context.now, &context.connection)?;
            context.done(&format!("Updated account {id}."))
        }
        AccountCommand::Delete { id } => {
            let user_id = context.session.require_role(Role::Manager)?.id;

            delete_account(id, Some(user_id), &context.connection)?;
            context.done(&format!("Deleted account {id}."))
        }
        AccountCommand::Summary => {
            context.session.require_login()?;
            let summary = get_account_balance_summary(&context.connection)?;

            context.emit(&summary, |summary| {
                println!("Assets:       {}", context.money(summary.total_assets));
                println!("Liabilities:  {}", context.money(summary.total_liabilities));
                println!("Equity:       {}", context.money(summary.total_equity));
                println!("Income:       {}", context.money(summary.total_income));
                println!("Expenses:     {}", context.money(summary.total_expense));
                println!("Net worth:    {}", context.money(summary.net_worth));
                println!("Accounts:     {}", summary.account_count);
            })
        }
    }
}

fn print_accounts(context: &Context, accounts: &[Account]) {
    let rows: Vec<_> = accounts
        .iter()
        .map(|account| {
            [
                account.id.to_string(),
                account.name.clone(),
                account.account_type.to_string(),
                account.currency.clone(),
                context.money(account.balance),
                account.status.to_string(),
            ]
        })
        .collect();

    print_table(["ID", "Name", "Type", "Currency", "Balance", "Status"], &rows);
}

// ============================================================================
// CATEGORIES
// ============================================================================

pub fn category(context: &mut Context, command: CategoryCommand) -> Result<(), Error> {
    match command {
        CategoryCommand::Add {
            name,
            category_type,
            parent,
            icon,
            color,
            description,
        } => {
            let user_id = context.session.require_role(Role::Manager)?.id;
            let category = create_category(
                NewCategory {
                    name,
                    category_type,
                    parent_id: parent,
                    icon,
                    color,
                    description,
                },
                Some(user_id),
                context.now,
                &context.connection,
            )?;

            context.emit(&category, |category| {
                println!("Created category \"{}\" with ID {}.", category.name, category.id)
            })
        }
        CategoryCommand::List {
            category_type,
            parent,
            roots,
            include_inactive,
        } => {
            context.session.require_login()?;

            let parent = match (roots, parent) {
                (true, _) => ParentFilter::Root,
                (false, Some(parent_id)) => ParentFilter::Id(parent_id),
                (false, None) => ParentFilter::Any,
            };
            let categories = get_all_categories(
                &CategoryFilter {
                    category_type,
                    status: (!include_inactive).then_some(CategoryStatus::Active),
                    parent,
                    name_contains: None,
                },
                &context.connection,
            )?;

            context.emit(&categories, |categories| {
                let rows: Vec<_> = categories
                    .iter()
                    .map(|category| {
                        [
                            category.id.to_string(),
                            category.name.clone(),
                            category.category_type.to_string(),
                            or_dash(category.parent_id),
                            category.status.to_string(),
                            if category.is_system { "yes" } else { "no" }.to_owned(),
                        ]
                    })
                    .collect();
                print_table(["ID", "Name", "Type", "Parent", "Status", "System"], &rows);
            })
        }
        CategoryCommand::Tree { category_type } => {
            context.session.require_login()?;
            let tree = get_category_hierarchy(category_type, &context.connection)?;

            context.emit(&tree, |tree| print_tree(tree, 0))
        }
        CategoryCommand::Update {
            id,
            name,
            category_type,
            parent,
            root,
            icon,
            color,
            description,
            status,
        } => {
            let user_id = context.session.require_role(Role::Manager)?.id;
            let parent_id = match (root, parent) {
                (true, _) => Some(None),
                (false, Some(parent_id)) => Some(Some(parent_id)),
                (false, None) => None,
            };
            let update = CategoryUpdate {
                name,
                category_type,
                parent_id,
                icon,
                color,
                description,
                status,
            };

            update_category(id, &update, Some(user_id), context.now, &context.connection)?;
            context.done(&format!("Updated category {id}."))
        }
        CategoryCommand::Delete { id } => {
            let user_id = context.session.require_role(Role::Manager)?.id;

            delete_category(id, Some(user_id), &context.connection)?;
            context.done(&format!("Deleted category {id}."))
        }
        CategoryCommand::Stats {
            category_type,
            range,
        } => {
            context.session.require_login()?;
            let statistics =
                get_category_statistics(category_type, range.from, range.to, &context.connection)?;

            context.emit(&statistics, |statistics| {
                let rows: Vec<_> = statistics
                    .iter()
                    .map(|line| {
                        [
                            line.category_id.to_string(),
                            line.name.clone(),
                            context.money(line.total_amount),
                            line.transaction_count.to_string(),
                        ]
                    })
                    .collect();
                print_table(["ID", "Category", "Total", "Transactions"], &rows);
            })
        }
    }
}

fn print_tree(nodes: &[CategoryNode], depth: usize) {
    for node in nodes {
        let icon = node
            .category
            .icon
            .as_deref()
            .map(|icon| format!("{icon} "))
            .unwrap_or_default();

        println!(
            "{}{icon}{} ({})",
            "  ".repeat(depth),
            node.category.name,
            node.category.id
        );
        print_tree(&node.children, depth + 1);
    }
}

// ============================================================================
// TRANSACTIONS
// ============================================================================

/// A page of transactions with the total number of matches.
#[derive(Serialize)]
struct TransactionPage {
    page: u64,
    page_size: u64,
    total: usize,
    transactions: Vec<TransactionDetail>,
}

pub fn transaction(context: &mut Context, command: TransactionCommand) -> Result<(), Error> {
    match command {
        TransactionCommand::Add {
            transaction_type,
            amount,
            account,
            category,
            date,
            description,
            reference,
        } => {
            context.require_account_access(account, Permission::Write)?;
            let user_id = context.user_id()?;

            let new_transaction = Transaction::build(
                transaction_type,
                amount,
                account,
                category,
                date.unwrap_or_else(|| context.today()),
            )
            .description(description)
            .reference_number(reference);

            let transaction = create_transaction(
                new_transaction,
                Some(user_id),
                context.now,
                &context.connection,
            )?;

            context.emit(&transaction, |transaction| {
                println!(
                    "Recorded {} of {} with ID {}.",
                    transaction.transaction_type,
                    context.money(transaction.amount.abs()),
                    transaction.id
                )
            })
        }
        TransactionCommand::List {
            range,
            account,
            category,
            transaction_type,
            search,
            page,
            page_size,
        } => {
            context.session.require_login()?;

            let filter = TransactionFilter {
                start_date: range.from,
                end_date: range.to,
                account_id: account,
                category_id: category,
                transaction_type,
                description_contains: search,
            };
            let page = Page::new(page, page_size, &context.pagination()?);
            let total = get_transactions_count(&filter, &context.connection)?;
            let transactions = get_transactions(
                &filter,
                Some(page.limit()),
                page.offset(),
                &context.connection,
            )?;

            let result = TransactionPage {
                page: page.number,
                page_size: page.size,
                total,
                transactions,
            };

            context.emit(&result, |result| {
                print_transactions(context, &result.transactions);
                println!("{}", describe_page(&page, result.total as u64));
            })
        }
        TransactionCommand::Show { id } => {
            context.session.require_login()?;
            let detail = get_transaction(id, &context.connection)?;

            context.emit(&detail, |detail| {
                let transaction = &detail.transaction;
                println!("ID:           {}", transaction.id);
                println!("Date:         {}", transaction.date);
                println!("Type:         {}", transaction.transaction_type);
                println!("Amount:       {}", context.money(transaction.amount));
                println!("Account:      {} ({})", detail.account_name, transaction.account_id);
                println!("Category:     {} ({})", detail.category_name, transaction.category_id);
                println!("Description:  {}", or_dash(transaction.description.as_deref()));
                println!("Reference:    {}", or_dash(transaction.reference_number.as_deref()));
            })
        }
        TransactionCommand::Update {
            id,
            transaction_type,
            amount,
            account,
            category,
            date,
            description,
            reference,
        } => {
            context.session.require_login()?;
            let old = get_transaction(id, &context.connection)
                .map_err(|error| match error {
                    Error::NotFound => Error::UpdateMissingTransaction,
                    error => error,
                })?
                .transaction;

            let account_id = account.unwrap_or(old.account_id);
            context.require_account_access(old.account_id, Permission::Write)?;
            context.require_account_access(account_id, Permission::Write)?;

            let new_transaction = Transaction::build(
                transaction_type.unwrap_or(old.transaction_type),
                amount.unwrap_or(old.amount.abs()),
                account_id,
                category.unwrap_or(old.category_id),
                date.unwrap_or(old.date),
            )
            .description(description.or(old.description))
            .reference_number(reference.or(old.reference_number));

            update_transaction(
                id,
                new_transaction,
                Some(context.user_id()?),
                context.now,
                &context.connection,
            )?;
            context.done(&format!("Updated transaction {id}."))
        }
        TransactionCommand::Delete { id } => {
            context.session.require_login()?;
            let account_id = get_transaction(id, &context.connection)
                .map_err(|error| match error {
                    Error::NotFound => Error::DeleteMissingTransaction,
                    error => error,
                })?
                .transaction
                .account_id;

            context.require_account_access(account_id, Permission::Delete)?;

            delete_transaction(
                id,
                Some(context.user_id()?),
                context.now,
                &context.connection,
            )?;
            context.done(&format!("Deleted transaction {id}."))
        }
        TransactionCommand::Recent { limit } => {
            context.session.require_login()?;
            let transactions = get_recent_transactions(limit, &context.connection)?;

            context.emit(&transactions, |transactions| {
                print_transactions(context, transactions)
            })
        }
        TransactionCommand::Month { year, month } => {
            context.session.require_login()?;
            let month = Month::try_from(month).map_err(|_| Error::InvalidDateRange)?;
            let summary = get_monthly_summary(year, month, &context.connection)?;

            context.emit(&summary, |summary| {
                println!("{} {}", summary.month, summary.year);
                println!("Income:        {}", context.money(summary.total_income));
                println!("Expenses:      {}", context.money(summary.total_expense));
                println!("Profit:        {}", context.money(summary.profit));
                println!("Transactions:  {}", summary.transaction_count);
            })
        }
    }
}

fn print_transactions(context: &Context, transactions: &[TransactionDetail]) {
    let rows: Vec<_> = transactions
        .iter()
        .map(|detail| {
            let transaction = &detail.transaction;
            [
                transaction.id.to_string(),
                transaction.date.to_string(),
                transaction.transaction_type.to_string(),
                context.money(transaction.amount),
                detail.account_name.clone(),
                detail.category_name.clone(),
                or_dash(transaction.description.as_deref()),
            ]
        })
        .collect();

    print_table(
        ["ID", "Date", "Type", "Amount", "Account", "Category", "Description"],
        &rows,
    );
}
