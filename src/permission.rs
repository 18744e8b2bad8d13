//! Per-resource permission grants.
//!
//! Roles decide what a user can do in general. A grant gives a single non-admin
//! user a permission on one account, category, transaction or report.

use std::{fmt::Display, str::FromStr};

use rusqlite::{Connection, Row};
use serde::Serialize;

use crate::{Error, UserID, database_id::DatabaseId, db::parse_column, is_constraint_error};

/// What a grant allows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    /// View the resource.
    Read,
    /// Change the resource, or add records to it.
    Write,
    /// Delete the resource, or records in it.
    Delete,
}

impl Permission {
    /// The text stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::Read => "read",
            Permission::Write => "write",
            Permission::Delete => "delete",
        }
    }
}

impl FromStr for Permission {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "read" => Ok(Permission::Read),
            "write" => Ok(Permission::Write),
            "delete" => Ok(Permission::Delete),
            _ => Err(Error::InvalidPermission(s.to_owned())),
        }
    }
}

impl Display for Permission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The kind of record a grant refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceType {
    /// An account.
    Account,
    /// A category.
    Category,
    /// A single transaction.
    Transaction,
    /// A report.
    Report,
}

impl ResourceType {
    /// The text stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::Account => "account",
            ResourceType::Category => "category",
            ResourceType::Transaction => "transaction",
            ResourceType::Report => "report",
        }
    }
}

impl FromStr for ResourceType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "account" => Ok(ResourceType::Account),
            "category" => Ok(ResourceType::Category),
            "transaction" => Ok(ResourceType::Transaction),
            "report" => Ok(ResourceType::Report),
            _ => Err(Error::InvalidPermission(s.to_owned())),
        }
    }
}

impl Display for ResourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A permission given to a user on one resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Grant {
    /// Who the grant is for.
    pub user_id: UserID,
    /// The kind of resource.
    pub resource_type: ResourceType,
    /// The ID of the resource.
    pub resource_id: DatabaseId,
    /// What the user may do with the resource.
    pub permission: Permission,
}

/// Create the grant table.
pub fn create_permission_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS user_permission (
            id INTEGER PRIMARY KEY,
            user_id INTEGER NOT NULL REFERENCES user(id) ON DELETE CASCADE,
            resource_type TEXT NOT NULL,
            resource_id INTEGER NOT NULL,
            permission TEXT NOT NULL CHECK (permission IN ('read', 'write', 'delete')),
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            UNIQUE(user_id, resource_type, resource_id, permission)
        );

        CREATE INDEX IF NOT EXISTS idx_user_permission_user ON user_permission(user_id);",
    )?;

    Ok(())
}

/// Give `grant.user_id` a permission on a resource.
///
/// Returns `false` if the user already had the grant.
///
/// # Errors
/// Returns [Error::NotFound] if the user does not exist.
pub fn grant_permission(grant: &Grant, connection: &Connection) -> Result<bool, Error> {
    let rows_affected = connection
        .execute(
            "INSERT OR IGNORE INTO user_permission (user_id, resource_type, resource_id, permission)
            VALUES (?1, ?2, ?3, ?4)",
            (
                grant.user_id.as_i64(),
                grant.resource_type.as_str(),
                grant.resource_id,
                grant.permission.as_str(),
            ),
        )
        .map_err(|error| {
            if is_constraint_error(&error, rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY) {
                Error::NotFound
            } else {
                error.into()
            }
        })?;

    Ok(rows_affected > 0)
}

/// Remove a grant. Returns whether the grant existed.
pub fn revoke_permission(grant: &Grant, connection: &Connection) -> Result<bool, Error> {
    let rows_affected = connection.execute(
        "DELETE FROM user_permission
        WHERE user_id = ?1 AND resource_type = ?2 AND resource_id = ?3 AND permission = ?4",
        (
            grant.user_id.as_i64(),
            grant.resource_type.as_str(),
            grant.resource_id,
            grant.permission.as_str(),
        ),
    )?;

    Ok(rows_affected > 0)
}

/// Whether the exact grant exists.
pub fn has_grant(grant: &Grant, connection: &Connection) -> Result<bool, Error> {
    connection
        .query_row(
            "SELECT EXISTS (
                SELECT 1 FROM user_permission
                WHERE user_id = ?1 AND resource_type = ?2 AND resource_id = ?3 AND permission = ?4
            )",
            (
                grant.user_id.as_i64(),
                grant.resource_type.as_str(),
                grant.resource_id,
                grant.permission.as_str(),
            ),
            |row| row.get(0),
        )
        .map_err(|error| error.into())
}

/// Get every grant held by a user, ordered by resource.
pub fn get_user_permissions(user_id: UserID, connection: &Connection) -> Result<Vec<Grant>, Error> {
    connection
        .prepare(
            "SELECT user_id, resource_type, resource_id, permission FROM user_permission
            WHERE user_id = ?1
            ORDER BY resource_type, resource_id, permission",
        )?
        .query_map([user_id.as_i64()], map_row)?
        .map(|maybe_grant| maybe_grant.map_err(|error| error.into()))
        .collect()
}

fn map_row(row: &Row) -> Result<Grant, rusqlite::Error> {
    Ok(Grant {
        user_id: UserID::new(row.get(0)?),
        resource_type: parse_column(row, 1)?,
        resource_id: row.get(2)?,
        permission: parse_column(row, 3)?,
    })
}
