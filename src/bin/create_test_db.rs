use std::error::Error;
use std::path::Path;
use std::process::exit;

use clap::Parser;
use time::{Duration, OffsetDateTime};

use fintrack::{
    PasswordHash, Role, ValidatedPassword,
    account::{AccountFilter, AccountType, NewAccount, create_account, get_all_accounts},
    category::{CategoryType, NewCategory, create_category, get_categories_by_type},
    initialize_db, open_database,
    permission::{Grant, Permission, ResourceType, grant_permission},
    transaction::{Transaction, create_transaction},
    user::{NewUser, create_user},
};

/// A utility for creating a test database for fintrack.
///
/// The database has an admin, a manager and a plain user, all with the password
/// "test", plus a few months of sample transactions.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// File path to save the SQLite database to.
    #[arg(long, short)]
    output_path: String,
}

/// Create and populate a database for manual testing.
fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    let output_path = Path::new(&args.output_path);

    match output_path.extension() {
        None => {
            eprintln!("Output path must include a file extension (e.g., 'fintrack.db').");
            exit(1);
        }
        Some(extension) if extension.is_empty() => {
            eprintln!("Output path must include a file extension (e.g., 'fintrack.db').");
            exit(1);
        }
        _ => {}
    }

    if output_path.is_file() {
        eprintln!("File already exists at {output_path:#?}!");
        exit(1);
    }

    println!("Creating database at {output_path:#?}");
    let conn = open_database(output_path)?;

    initialize_db(&conn)?;

    let now = OffsetDateTime::now_utc();

    println!("Creating test users...");

    let mut users = Vec::new();

    for (username, fullname, role) in [
        ("admin", "Test Admin", Role::Admin),
        ("manager", "Test Manager", Role::Manager),
        ("clerk", "Test Clerk", Role::User),
    ] {
        let password_hash = PasswordHash::new(
            ValidatedPassword::new_unchecked("test"),
            PasswordHash::DEFAULT_COST,
        )?;

        users.push(create_user(
            NewUser {
                username: username.to_owned(),
                password_hash,
                fullname: fullname.to_owned(),
                email: Some(format!("{username}@example.com")),
                role,
                created_at: now,
            },
            &conn,
        )?);
    }

    let admin_id = users[0].id;
    let clerk_id = users[2].id;

    println!("Creating sample accounts and categories...");

    let savings = create_account(
        NewAccount {
            name: "Business Savings".to_owned(),
            account_type: AccountType::Asset,
            currency: "CNY".to_owned(),
            initial_balance: 50_000.0,
            description: Some("Reserve fund".to_owned()),
        },
        Some(admin_id),
        now,
        &conn,
    )?;

    let cash = get_all_accounts(
        &AccountFilter {
            name_contains: Some("Cash".to_owned()),
            ..Default::default()
        },
        &conn,
    )?
    .into_iter()
    .next()
    .ok_or("the default Cash account is missing")?;

    let income = get_categories_by_type(CategoryType::Income, false, &conn)?;
    let mut expenses = get_categories_by_type(CategoryType::Expense, false, &conn)?;

    let rent_parent = expenses
        .iter()
        .find(|category| category.name == "Administrative Expenses")
        .map(|category| category.id);

    expenses.push(create_category(
        NewCategory {
            name: "Office Rent".to_owned(),
            category_type: CategoryType::Expense,
            parent_id: rent_parent,
            icon: Some("🏠".to_owned()),
            color: None,
            description: None,
        },
        Some(admin_id),
        now,
        &conn,
    )?);

    grant_permission(
        &Grant {
            user_id: clerk_id,
            resource_type: ResourceType::Account,
            resource_id: cash.id,
            permission: Permission::Write,
        },
        &conn,
    )?;

    println!("Creating sample transactions...");

    let today = now.date();
    let mut count = 0;

    for day in 0..90_i64 {
        let date = today - Duration::days(day);
        let account_id = if day % 3 == 0 { savings.id } else { cash.id };

        if day % 2 == 0 {
            let category = &income[(day as usize / 2) % income.len()];
            create_transaction(
                Transaction::build(
                    CategoryType::Income,
                    500.0 + (day * 37 % 400) as f64,
                    account_id,
                    category.id,
                    date,
                )
                .description(Some(format!("Sale #{}", 1000 + day))),
                Some(admin_id),
                now,
                &conn,
            )?;
            count += 1;
        }

        let category = &expenses[day as usize % expenses.len()];
        create_transaction(
            Transaction::build(
                CategoryType::Expense,
                80.0 + (day * 53 % 300) as f64,
                account_id,
                category.id,
                date,
            )
            .description(Some(format!("{} payment", category.name)))
            .reference_number(Some(format!("INV-{:04}", day))),
            Some(admin_id),
            now,
            &conn,
        )?;
        count += 1;
    }

    println!("Created {count} transactions.");
    println!("Success! Log in as admin, manager or clerk with the password \"test\".");

    Ok(())
}
