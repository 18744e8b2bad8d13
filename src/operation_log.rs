//! The audit trail of who did what.

use rusqlite::{Connection, Row, ToSql, params_from_iter};
use serde::Serialize;
use time::OffsetDateTime;

use crate::{Error, UserID, database_id::DatabaseId, logging::redact_password};

/// A row in the audit trail.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperationLog {
    /// The row ID.
    pub id: DatabaseId,
    /// The user that performed the action, if known.
    pub user_id: Option<UserID>,
    /// A short machine readable name for the action, e.g. "login".
    pub action: String,
    /// Free text describing the action.
    pub details: Option<String>,
    /// The table the action affected.
    pub target_table: Option<String>,
    /// Where the request came from.
    pub ip_address: Option<String>,
    /// When the action happened (UTC).
    pub created_at: OffsetDateTime,
}

/// The data needed to record an action.
#[derive(Debug, Clone, Copy, Default)]
pub struct NewOperation<'a> {
    /// The user that performed the action, if known.
    pub user_id: Option<UserID>,
    /// A short machine readable name for the action, e.g. "login".
    pub action: &'a str,
    /// Free text describing the action. Password fields are masked before storage.
    pub details: Option<&'a str>,
    /// The table the action affected.
    pub target_table: Option<&'a str>,
    /// Where the request came from.
    pub ip_address: Option<&'a str>,
}

/// Criteria for listing audit rows.
#[derive(Debug, Clone, Default)]
pub struct OperationLogFilter {
    /// Only rows for this user.
    pub user_id: Option<UserID>,
    /// Only rows with this action.
    pub action: Option<String>,
    /// The maximum number of rows to return.
    pub limit: Option<u64>,
}

/// Create the audit table.
pub fn create_operation_log_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS operation_log (
            id INTEGER PRIMARY KEY,
            user_id INTEGER REFERENCES user(id) ON DELETE SET NULL,
            action TEXT NOT NULL,
            details TEXT,
            target_table TEXT,
            ip_address TEXT,
            created_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_operation_log_user ON operation_log(user_id);
        CREATE INDEX IF NOT EXISTS idx_operation_log_created_at ON operation_log(created_at);",
    )?;

    Ok(())
}

/// Insert an audit row timestamped with the current UTC time.
pub fn log_operation(
    operation: &NewOperation,
    connection: &Connection,
) -> Result<DatabaseId, Error> {
    let details = operation
        .details
        .map(|details| redact_password(details, "password"));

    connection.execute(
        "INSERT INTO operation_log (user_id, action, details, target_table, ip_address, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        (
            operation.user_id.map(|id| id.as_i64()),
            operation.action,
            details,
            operation.target_table,
            operation.ip_address,
            OffsetDateTime::now_utc(),
        ),
    )?;

    Ok(connection.last_insert_rowid())
}

/// Insert an audit row, logging a warning instead of failing.
///
/// Use this after the main operation has already succeeded.
pub fn record(operation: &NewOperation, connection: &Connection) {
    if let Err(error) = log_operation(operation, connection) {
        tracing::warn!(
            "could not record \"{}\" in the operation log: {error}",
            operation.action
        );
    }
}

/// Get audit rows matching `filter`, newest first.
pub fn get_operation_logs(
    filter: &OperationLogFilter,
    connection: &Connection,
) -> Result<Vec<OperationLog>, Error> {
    let mut clauses = Vec::new();
    let mut params: Vec<&dyn ToSql> = Vec::new();

    let user_id = filter.user_id.map(|id| id.as_i64());
    let limit = filter.limit.map(|limit| limit as i64).unwrap_or(-1);

    if let Some(user_id) = &user_id {
        params.push(user_id);
        clauses.push(format!("user_id = ?{}", params.len()));
    }

    if let Some(action) = &filter.action {
        params.push(action);
        clauses.push(format!("action = ?{}", params.len()));
    }

    let where_clause = if clauses.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", clauses.join(" AND "))
    };

    params.push(&limit);
    let query = format!(
        "SELECT id, user_id, action, details, target_table, ip_address, created_at
        FROM operation_log {where_clause}
        ORDER BY id DESC
        LIMIT ?{}",
        params.len()
    );

    connection
        .prepare(&query)?
        .query_map(params_from_iter(params), map_row)?
        .map(|maybe_log| maybe_log.map_err(|error| error.into()))
        .collect()
}

fn map_row(row: &Row) -> Result<OperationLog, rusqlite::Error> {
    let user_id: Option<i64> = row.get(1)?;

    Ok(OperationLog {
        id: row.get(0)?,
        user_id: user_id.map(UserID::new),
        action: row.get(2)?,
        details: row.get(3)?,
        target_table: row.get(4)?,
        ip_address: row.get(5)?,
        created_at: row.get(6)?,
    })
}
