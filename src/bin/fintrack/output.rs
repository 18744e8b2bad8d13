use std::io;

use fintrack::{Error, PasswordPolicy, ValidatedPassword};
use time::{OffsetDateTime, format_description::BorrowedFormatItem, macros::format_description};

const TIMESTAMP_FORMAT: &[BorrowedFormatItem] =
    format_description!("[year]-[month]-[day] [hour]:[minute]");

pub fn print_error(error: impl ToString) {
    eprintln!(
        "\x1b[31;1m{}\x1b[0m",
        capitalise_first_char(&error.to_string())
    )
}

/// From https://crates.io/crates/capitalize
pub fn capitalise_first_char(string: &str) -> String {
    let mut chars = string.chars();
    let Some(first) = chars.next() else {
        return String::with_capacity(0);
    };
    first.to_uppercase().chain(chars).collect()
}

/// Ask for a new password twice until it passes `policy` and both entries match.
///
/// Returns `None` if stdin is closed or cannot be read.
pub fn prompt_new_password(label: &str, policy: &PasswordPolicy) -> Option<ValidatedPassword> {
    loop {
        let first_password = read_password(&format!("{label}: "))?;

        let password = match ValidatedPassword::new(&first_password, policy) {
            Ok(password) => password,
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

        return Some(password);
    }
}

/// A new password and its confirmation, from `FINTRACK_NEW_PASSWORD` or two prompts.
///
/// The library checks that they match and meet the password policy.
pub fn new_password_pair(label: &str) -> Result<(String, String), Error> {
    if let Ok(password) = std::env::var("FINTRACK_NEW_PASSWORD") {
        return Ok((password.clone(), password));
    }

    let password = read_password(&format!("{label}: ")).ok_or(Error::EmptyPassword)?;
    let confirmation =
        read_password("Enter the same password again: ").ok_or(Error::EmptyPassword)?;

    Ok((password, confirmation))
}

/// Read a password without echoing it.
pub fn read_password(prompt: &str) -> Option<String> {
    match rpassword::prompt_password(prompt) {
        Ok(string) => Some(string),
        Err(error) if error.kind() == io::ErrorKind::UnexpectedEof => None,
        Err(error) => {
            print_error(format!("Could not read password from stdin: {error}"));
            None
        }
    }
}

/// Print rows as left aligned columns under a header.
pub fn print_table<const N: usize>(headers: [&str; N], rows: &[[String; N]]) {
    let mut widths = headers.map(|header| header.chars().count());

    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let render = |cells: Vec<&str>| {
        cells
            .iter()
            .zip(widths)
            .map(|(cell, width)| format!("{cell:<width$}"))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_owned()
    };

    let rule: Vec<String> = widths.iter().map(|&width| "-".repeat(width)).collect();

    println!("{}", render(headers.to_vec()));
    println!("{}", render(rule.iter().map(String::as_str).collect()));

    for row in rows {
        println!("{}", render(row.iter().map(String::as_str).collect()));
    }

    if rows.is_empty() {
        println!("(none)");
    }
}

/// A timestamp to the minute, e.g. "2024-03-01 09:30".
pub fn format_timestamp(timestamp: OffsetDateTime) -> String {
    timestamp
        .format(TIMESTAMP_FORMAT)
        .unwrap_or_else(|_| timestamp.to_string())
}

/// Render an optional value, using "-" for `None`.
pub fn or_dash<T: ToString>(value: Option<T>) -> String {
    value.map_or_else(|| "-".to_owned(), |value| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::{capitalise_first_char, or_dash};

    #[test]
    fn capitalises_first_char() {
        assert_eq!(capitalise_first_char("incorrect password"), "Incorrect password");
        assert_eq!(capitalise_first_char(""), "");
    }

    #[test]
    fn missing_values_render_as_dash() {
        assert_eq!(or_dash(None::<i64>), "-");
        assert_eq!(or_dash(Some(3)), "3");
    }
}
