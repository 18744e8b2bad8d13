use std::{error::Error, path::Path, process::exit};

use clap::Parser;
use rusqlite::Connection;

use fintrack::{
    PasswordHash, PasswordPolicy, User, ValidatedPassword, open_database,
    user::{clear_failed_logins, get_user_by_username, set_password_hash},
};

/// A utility for changing the password of a registered user and clearing their
/// failed log-in attempts.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// File path to the application SQLite database.
    #[arg(long)]
    db_path: String,

    /// The user whose password should be reset.
    #[arg(long, short)]
    username: String,

    /// bcrypt cost for the new hash.
    #[arg(long, default_value_t = PasswordHash::DEFAULT_COST)]
    cost: u32,
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    let db_path = Path::new(&args.db_path);
    validate_db_path(db_path);

    println!("Loading user from {db_path:#?}");
    let connection = open_database(db_path)?;

    let user = match get_user_by_username(&args.username, &connection) {
        Ok(user) => user,
        Err(error) => {
            print_error(format!("Could not find the user \"{}\": {error}", args.username));
            exit(1);
        }
    };
    println!("Resetting password for {} ({})", user.username, user.fullname);

    let policy = PasswordPolicy::from_system_config(&connection)?;
    let password_hash = match get_new_password_hash(&policy, args.cost) {
        Some(password_hash) => password_hash,
        None => return Ok(()),
    };
    update_password(&connection, &user, password_hash)?;

    Ok(())
}

fn validate_db_path(db_path: &Path) {
    match db_path.extension() {
        None => {
            print_error("Database path must include a file extension (e.g., 'fintrack.db').");
            exit(1);
        }
        Some(extension) if extension.is_empty() => {
            print_error("Database path must include a file extension (e.g., 'fintrack.db').");
            exit(1);
        }
        _ => {}
    }

    if !db_path.is_file() {
        print_error(format!("File does not exist at {db_path:#?}!"));
        exit(1);
    }
}

fn get_new_password_hash(policy: &PasswordPolicy, cost: u32) -> Option<PasswordHash> {
    loop {
        println!();

        let first_password = read_password("Enter a new password: ")?;

        let validated = match ValidatedPassword::new(&first_password, policy) {
            Ok(validated) => validated,
            Err(error) => {
                print_error(error);
                continue;
            }
        };

        let second_password = read_password("Enter the same password again: ")?;

        if first_password != second_password {
            print_error("Passwords must match, try again.");
            continue;
        }

        match PasswordHash::new(validated, cost) {
            Ok(password_hash) => return Some(password_hash),
            Err(error) => {
                print_error(format!("Could not hash password: {error}. Try again."));
                continue;
            }
        }
    }
}

fn read_password(prompt: &str) -> Option<String> {
    match rpassword::prompt_password(prompt) {
        Ok(string) => Some(string),
        Err(error) if error.kind() == std::io::ErrorKind::UnexpectedEof => None,
        Err(error) => {
            print_error(format!("Could not read password from stdin: {error}"));
            None
        }
    }
}

fn print_error(error: impl ToString) {
    eprintln!(
        "\x1b[31;1m{}\x1b[0m",
        capitalise_first_char(&error.to_string())
    )
}

/// From https://crates.io/crates/capitalize
fn capitalise_first_char(string: &str) -> String {
    let mut chars = string.chars();
    let Some(first) = chars.next() else {
        return String::with_capacity(0);
    };
    first.to_uppercase().chain(chars).collect()
}

/// Store the new hash and unlock the user in one SQL transaction.
fn update_password(
    connection: &Connection,
    user: &User,
    password_hash: PasswordHash,
) -> Result<(), fintrack::Error> {
    let transaction = connection.unchecked_transaction()?;

    set_password_hash(user.id, &password_hash, &transaction)?;
    clear_failed_logins(user.id, &transaction)?;

    transaction.commit()?;

    println!("Password updated successfully!");

    Ok(())
}
