//! Log setup and helpers for keeping secrets out of logs.

use std::{fs::OpenOptions, sync::Arc};

use tracing_subscriber::{
    EnvFilter, Layer, filter::LevelFilter, layer::SubscriberExt, util::SubscriberInitExt,
};

use crate::{Error, config::LoggingConfig};

/// Parse a log level name. CRITICAL is treated as ERROR and WARNING as WARN.
///
/// # Errors
/// Returns [Error::InvalidAppConfig] for unknown names.
pub fn parse_level(level: &str) -> Result<LevelFilter, Error> {
    match level.trim().to_uppercase().as_str() {
        "DEBUG" => Ok(LevelFilter::DEBUG),
        "INFO" => Ok(LevelFilter::INFO),
        "WARNING" | "WARN" => Ok(LevelFilter::WARN),
        "ERROR" | "CRITICAL" => Ok(LevelFilter::ERROR),
        _ => Err(Error::InvalidAppConfig(format!(
            "unknown log level {level:?}"
        ))),
    }
}

/// Install the global subscriber.
///
/// Logs at `config.level` and above go to stderr, `RUST_LOG` overrides that level.
/// Everything at DEBUG and above is appended to `config.file`.
///
/// # Errors
/// Returns an error if the level is unknown, the log file cannot be opened, or a
/// subscriber has already been installed.
pub fn setup_logging(config: &LoggingConfig) -> Result<(), Error> {
    let level = parse_level(&config.level)?;

    if let Some(parent) = config
        .file
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
    {
        std::fs::create_dir_all(parent)?;
    }

    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.file)?;

    let console_filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    let console_log = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_filter(console_filter);

    let debug_log = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_writer(Arc::new(log_file))
        .with_filter(LevelFilter::DEBUG);

    tracing_subscriber::registry()
        .with(console_log)
        .with(debug_log)
        .try_init()
        .map_err(|error| Error::IoError(error.to_string()))
}

/// Mask every value of `field_name` in `key=value` style text.
///
/// Values end at `&`, `,`, `;` or whitespace.
pub fn redact_password(text: &str, field_name: &str) -> String {
    let needle = format!("{field_name}=");
    let mut redacted = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(start) = rest.find(&needle) {
        let value_start = start + needle.len();
        redacted.push_str(&rest[..value_start]);
        redacted.push_str("********");

        let value_len = rest[value_start..]
            .find(|c: char| c == '&' || c == ',' || c == ';' || c.is_whitespace())
            .unwrap_or(rest.len() - value_start);
        rest = &rest[value_start + value_len..];
    }

    redacted.push_str(rest);
    redacted
}
