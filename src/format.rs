//! Formatting of money amounts for display.

use numfmt::{Formatter, Precision};

/// Format `number` with two decimal places, thousands separators and the currency `symbol`.
///
/// Negative amounts get a leading minus sign before the symbol, e.g. `-$1,234.50`.
pub fn format_currency(number: f64, symbol: &str) -> String {
    let (prefix, magnitude) = if number < 0.0 {
        (format!("-{symbol}"), number.abs())
    } else {
        (symbol.to_owned(), number)
    };

    // Round first so that e.g. -0.001 is not rendered as "-$0.00".
    let magnitude = (magnitude * 100.0).round() / 100.0;

    if magnitude == 0.0 {
        // Zero is hardcoded as "0", so we must specify the formatted string for zero
        return format!("{symbol}0.00");
    }

    let formatted_string = match Formatter::currency(&prefix) {
        Ok(formatter) => formatter
            .precision(Precision::Decimals(2))
            .fmt_string(magnitude),
        Err(error) => {
            tracing::warn!("could not build currency formatter for {symbol:?}: {error}");
            return format!("{prefix}{magnitude:.2}");
        }
    };

    pad_decimals(formatted_string)
}

/// numfmt omits trailing zeros, e.g. "12.30" is rendered as "12.3" and "12.00" as "12".
fn pad_decimals(formatted_string: String) -> String {
    match formatted_string.rfind('.') {
        None => format!("{formatted_string}.00"),
        Some(dot) => match formatted_string.len() - dot - 1 {
            0 => format!("{formatted_string}00"),
            1 => format!("{formatted_string}0"),
            _ => formatted_string,
        },
    }
}
