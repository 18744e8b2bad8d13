//! Income and expense categories, optionally nested under a parent category.

use std::{
    collections::{HashMap, HashSet},
    fmt::Display,
    str::FromStr,
};

use rusqlite::{Connection, Row, ToSql, params_from_iter};
use serde::Serialize;
use time::{Date, OffsetDateTime};

use crate::{
    Error, UserID,
    account::AccountStatus,
    database_id::CategoryId,
    db::{count_column, parse_column},
    operation_log::{self, NewOperation},
};

/// Whether a category records money coming in or going out.
///
/// Transactions use the same two types, see [crate::transaction::TransactionType].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CategoryType {
    /// Money coming in.
    Income,
    /// Money going out.
    Expense,
}

impl CategoryType {
    /// The text stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            CategoryType::Income => "income",
            CategoryType::Expense => "expense",
        }
    }
}

impl FromStr for CategoryType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "income" => Ok(CategoryType::Income),
            "expense" => Ok(CategoryType::Expense),
            _ => Err(Error::InvalidCategoryType(s.to_owned())),
        }
    }
}

impl Display for CategoryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Categories share the active/inactive status of accounts.
pub type CategoryStatus = AccountStatus;

/// A category for grouping transactions, e.g. 'Selling Expenses'.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Category {
    /// The ID of the category.
    pub id: CategoryId,
    /// The display name.
    pub name: String,
    /// Income or expense.
    pub category_type: CategoryType,
    /// The parent category, `None` for top level categories.
    pub parent_id: Option<CategoryId>,
    /// An optional icon, usually an emoji.
    pub icon: Option<String>,
    /// An optional display colour, e.g. "#28a745".
    pub color: Option<String>,
    /// Optional notes.
    pub description: Option<String>,
    /// Built-in categories cannot be deleted.
    pub is_system: bool,
    /// Inactive categories are hidden from the category tree.
    pub status: CategoryStatus,
    /// When the category was created.
    pub created_at: OffsetDateTime,
    /// When the category was last changed.
    pub updated_at: OffsetDateTime,
}

/// The data needed to create a category.
#[derive(Debug, Clone)]
pub struct NewCategory {
    /// The display name.
    pub name: String,
    /// Income or expense.
    pub category_type: CategoryType,
    /// The parent category, which must have the same type.
    pub parent_id: Option<CategoryId>,
    /// An optional icon.
    pub icon: Option<String>,
    /// An optional display colour.
    pub color: Option<String>,
    /// Optional notes.
    pub description: Option<String>,
}

/// The fields of a category that may be changed. `None` leaves a field as it is.
#[derive(Debug, Clone, Default)]
pub struct CategoryUpdate {
    /// A new name.
    pub name: Option<String>,
    /// A new type. Only allowed while the category has no children or transactions.
    pub category_type: Option<CategoryType>,
    /// A new parent. `Some(None)` moves the category to the top level.
    pub parent_id: Option<Option<CategoryId>>,
    /// A new icon.
    pub icon: Option<String>,
    /// A new colour.
    pub color: Option<String>,
    /// New notes.
    pub description: Option<String>,
    /// A new status.
    pub status: Option<CategoryStatus>,
}

impl CategoryUpdate {
    fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.category_type.is_none()
            && self.parent_id.is_none()
            && self.icon.is_none()
            && self.color.is_none()
            && self.description.is_none()
            && self.status.is_none()
    }
}

/// Which parents to match when listing categories.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ParentFilter {
    /// Any parent, or none.
    #[default]
    Any,
    /// Only top level categories.
    Root,
    /// Only children of this category.
    Id(CategoryId),
}

/// Criteria for listing categories.
#[derive(Debug, Clone, Default)]
pub struct CategoryFilter {
    /// Only categories of this type.
    pub category_type: Option<CategoryType>,
    /// Only categories with this status.
    pub status: Option<CategoryStatus>,
    /// Restrict by parent.
    pub parent: ParentFilter,
    /// Only categories whose name contains this text.
    pub name_contains: Option<String>,
}

/// A category and its sub-categories.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryNode {
    /// The category.
    pub category: Category,
    /// Its children, ordered by name.
    pub children: Vec<CategoryNode>,
}

/// How much was recorded against a category.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryStatistics {
    /// The ID of the category.
    pub category_id: CategoryId,
    /// The name of the category.
    pub name: String,
    /// The absolute sum of the category's transaction amounts.
    pub total_amount: f64,
    /// The number of transactions.
    pub transaction_count: usize,
}

const CATEGORY_COLUMNS: &str = "id, name, category_type, parent_id, icon, color, description, \
    is_system, status, created_at, updated_at";

/// Create the category table.
pub fn create_category_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS category (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            category_type TEXT NOT NULL CHECK (category_type IN ('income', 'expense')),
            parent_id INTEGER REFERENCES category(id) ON DELETE RESTRICT,
            icon TEXT,
            color TEXT,
            description TEXT,
            is_system INTEGER NOT NULL DEFAULT 0,
            status TEXT NOT NULL DEFAULT 'active' CHECK (status IN ('active', 'inactive')),
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_category_type ON category(category_type);",
    )?;

    Ok(())
}

/// Insert the built-in categories if the table is empty.
pub fn seed_default_categories(now: OffsetDateTime, connection: &Connection) -> Result<(), Error> {
    let count: i64 =
        connection.query_row("SELECT COUNT(id) FROM category", [], |row| row.get(0))?;

    if count > 0 {
        return Ok(());
    }

    use CategoryType::{Expense, Income};

    let defaults = [
        ("Main Business Income", Income, "💰", "#28a745", "Sales of goods and services"),
        ("Other Business Income", Income, "💵", "#20c997", "Income outside the main business"),
        ("Investment Income", Income, "📈", "#6f42c1", "Returns on investments"),
        ("Non-operating Income", Income, "🎁", "#ffc107", "Income unrelated to operations"),
        ("Cost of Sales", Expense, "📦", "#dc3545", "Cost of goods and services sold"),
        ("Selling Expenses", Expense, "🏢", "#fd7e14", "Costs of selling"),
        ("Administrative Expenses", Expense, "⚙️", "#17a2b8", "Costs of running the business"),
        ("Financial Expenses", Expense, "💸", "#6c757d", "Interest and bank fees"),
        ("Non-operating Expenses", Expense, "❌", "#343a40", "Costs unrelated to operations"),
    ];

    let mut statement = connection.prepare(
        "INSERT INTO category (name, category_type, icon, color, description, is_system, status, created_at, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5, 1, 'active', ?6, ?6)",
    )?;

    for (name, category_type, icon, color, description) in defaults {
        statement.execute((name, category_type.as_str(), icon, color, description, now))?;
    }

    Ok(())
}

/// Create a category.
///
/// # Errors
/// Returns [Error::EmptyCategoryName] for a blank name, [Error::InvalidParentCategory]
/// if the parent does not exist and [Error::CategoryTypeMismatch] if the parent has a
/// different type.
pub fn create_category(
    new_category: NewCategory,
    user_id: Option<UserID>,
    now: OffsetDateTime,
    connection: &Connection,
) -> Result<Category, Error> {
    let name = new_category.name.trim();

    if name.is_empty() {
        return Err(Error::EmptyCategoryName);
    }

    if let Some(parent_id) = new_category.parent_id {
        check_parent(parent_id, new_category.category_type, connection)?;
    }

    let category = connection
        .prepare(&format!(
            "INSERT INTO category (name, category_type, parent_id, icon, color, description, is_system, status, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, 'active', ?7, ?7)
            RETURNING {CATEGORY_COLUMNS}"
        ))?
        .query_row(
            (
                name,
                new_category.category_type.as_str(),
                new_category.parent_id,
                new_category.icon.as_deref(),
                new_category.color.as_deref(),
                new_category.description.as_deref(),
                now,
            ),
            map_row,
        )?;

    operation_log::record(
        &NewOperation {
            user_id,
            action: "create_category",
            details: Some(&format!("created category \"{}\"", category.name)),
            target_table: Some("category"),
            ip_address: None,
        },
        connection,
    );

    Ok(category)
}

/// Change a category.
///
/// # Errors
/// Besides the errors of [create_category], returns [Error::CategoryCycle] if the new
/// parent is the category itself or one of its descendants, [Error::CategoryInUse]
/// if the type changes while the category has children or transactions, and
/// [Error::UpdateMissingCategory] if it does not exist.
pub fn update_category(
    category_id: CategoryId,
    update: &CategoryUpdate,
    user_id: Option<UserID>,
    now: OffsetDateTime,
    connection: &Connection,
) -> Result<(), Error> {
    if update.is_empty() {
        return Err(Error::NoFieldsToUpdate);
    }

    let existing = get_category(category_id, connection).map_err(|error| match error {
        Error::NotFound => Error::UpdateMissingCategory,
        error => error,
    })?;

    let name = match &update.name {
        Some(name) if name.trim().is_empty() => return Err(Error::EmptyCategoryName),
        Some(name) => name.trim().to_owned(),
        None => existing.name.clone(),
    };

    let category_type = update.category_type.unwrap_or(existing.category_type);

    if category_type != existing.category_type
        && (count_children(category_id, connection)? > 0
            || count_transactions(category_id, connection)? > 0)
    {
        return Err(Error::CategoryInUse);
    }

    let parent_id = update.parent_id.unwrap_or(existing.parent_id);

    if let Some(parent_id) = parent_id {
        if parent_id == category_id || is_ancestor(category_id, parent_id, connection)? {
            return Err(Error::CategoryCycle);
        }

        check_parent(parent_id, category_type, connection)?;
    }

    let icon = update.icon.clone().or(existing.icon);
    let color = update.color.clone().or(existing.color);
    let description = update.description.clone().or(existing.description);
    let status = update.status.unwrap_or(existing.status);

    let rows_affected = connection.execute(
        "UPDATE category
        SET name = ?1, category_type = ?2, parent_id = ?3, icon = ?4, color = ?5,
            description = ?6, status = ?7, updated_at = ?8
        WHERE id = ?9",
        (
            &name,
            category_type.as_str(),
            parent_id,
            icon,
            color,
            description,
            status.as_str(),
            now,
            category_id,
        ),
    )?;

    if rows_affected == 0 {
        return Err(Error::UpdateMissingCategory);
    }

    operation_log::record(
        &NewOperation {
            user_id,
            action: "update_category",
            details: Some(&format!("updated category \"{name}\"")),
            target_table: Some("category"),
            ip_address: None,
        },
        connection,
    );

    Ok(())
}

/// Delete a category without children or transactions.
///
/// # Errors
/// Returns [Error::DeleteMissingCategory], [Error::SystemCategory],
/// [Error::CategoryHasChildren] or [Error::CategoryHasTransactions].
pub fn delete_category(
    category_id: CategoryId,
    user_id: Option<UserID>,
    connection: &Connection,
) -> Result<(), Error> {
    let category = get_category(category_id, connection).map_err(|error| match error {
        Error::NotFound => Error::DeleteMissingCategory,
        error => error,
    })?;

    if category.is_system {
        return Err(Error::SystemCategory);
    }

    if count_children(category_id, connection)? > 0 {
        return Err(Error::CategoryHasChildren);
    }

    if count_transactions(category_id, connection)? > 0 {
        return Err(Error::CategoryHasTransactions);
    }

    let rows_affected = connection.execute("DELETE FROM category WHERE id = ?1", [category_id])?;

    if rows_affected == 0 {
        return Err(Error::DeleteMissingCategory);
    }

    operation_log::record(
        &NewOperation {
            user_id,
            action: "delete_category",
            details: Some(&format!("deleted category \"{}\"", category.name)),
            target_table: Some("category"),
            ip_address: None,
        },
        connection,
    );

    Ok(())
}

/// Retrieve a single category by ID.
pub fn get_category(category_id: CategoryId, connection: &Connection) -> Result<Category, Error> {
    connection
        .prepare(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM category WHERE id = :id"
        ))?
        .query_row(&[(":id", &category_id)], map_row)
        .map_err(|error| error.into())
}

/// Retrieve the categories matching `filter`, ordered by name.
pub fn get_all_categories(
    filter: &CategoryFilter,
    connection: &Connection,
) -> Result<Vec<Category>, Error> {
    let mut clauses = Vec::new();
    let mut params: Vec<&dyn ToSql> = Vec::new();

    let category_type = filter.category_type.map(|category_type| category_type.as_str());
    let status = filter.status.map(|status| status.as_str());

    if let Some(category_type) = &category_type {
        params.push(category_type);
        clauses.push(format!("category_type = ?{}", params.len()));
    }

    if let Some(status) = &status {
        params.push(status);
        clauses.push(format!("status = ?{}", params.len()));
    }

    match &filter.parent {
        ParentFilter::Any => {}
        ParentFilter::Root => clauses.push("parent_id IS NULL".to_owned()),
        ParentFilter::Id(parent_id) => {
            params.push(parent_id);
            clauses.push(format!("parent_id = ?{}", params.len()));
        }
    }

    if let Some(name) = &filter.name_contains {
        params.push(name);
        clauses.push(format!("name LIKE '%' || ?{} || '%'", params.len()));
    }

    let where_clause = if clauses.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", clauses.join(" AND "))
    };

    connection
        .prepare(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM category {where_clause} ORDER BY name ASC, id ASC"
        ))?
        .query_map(params_from_iter(params), map_row)?
        .map(|maybe_category| maybe_category.map_err(|error| error.into()))
        .collect()
}

/// Retrieve the categories of one type, ordered by name.
pub fn get_categories_by_type(
    category_type: CategoryType,
    include_inactive: bool,
    connection: &Connection,
) -> Result<Vec<Category>, Error> {
    get_all_categories(
        &CategoryFilter {
            category_type: Some(category_type),
            status: (!include_inactive).then_some(CategoryStatus::Active),
            ..Default::default()
        },
        connection,
    )
}

/// Build the tree of active categories of one type.
pub fn get_category_hierarchy(
    category_type: CategoryType,
    connection: &Connection,
) -> Result<Vec<CategoryNode>, Error> {
    let categories = get_categories_by_type(category_type, false, connection)?;

    Ok(build_hierarchy(categories))
}

/// Arrange categories into trees.
///
/// Categories whose parent is not in `categories` become roots.
pub fn build_hierarchy(categories: Vec<Category>) -> Vec<CategoryNode> {
    let ids: HashSet<CategoryId> = categories.iter().map(|category| category.id).collect();
    let mut children_of: HashMap<CategoryId, Vec<Category>> = HashMap::new();
    let mut roots = Vec::new();

    for category in categories {
        match category.parent_id {
            Some(parent_id) if parent_id != category.id && ids.contains(&parent_id) => {
                children_of.entry(parent_id).or_default().push(category);
            }
            _ => roots.push(category),
        }
    }

    let mut nodes: Vec<CategoryNode> = roots
        .into_iter()
        .map(|root| attach_children(root, &mut children_of))
        .collect();

    // Only reachable if the stored parents form a loop.
    while let Some(&parent_id) = children_of.keys().next() {
        let stranded = children_of.remove(&parent_id).unwrap_or_default();

        for category in stranded {
            nodes.push(attach_children(category, &mut children_of));
        }
    }

    nodes
}

fn attach_children(
    category: Category,
    children_of: &mut HashMap<CategoryId, Vec<Category>>,
) -> CategoryNode {
    let children = children_of
        .remove(&category.id)
        .unwrap_or_default()
        .into_iter()
        .map(|child| attach_children(child, children_of))
        .collect();

    CategoryNode { category, children }
}

/// Totals per category of one type within an optional inclusive date range,
/// largest first. Categories without transactions are included with zero.
pub fn get_category_statistics(
    category_type: CategoryType,
    start_date: Option<Date>,
    end_date: Option<Date>,
    connection: &Connection,
) -> Result<Vec<CategoryStatistics>, Error> {
    if let (Some(start), Some(end)) = (start_date, end_date)
        && end < start
    {
        return Err(Error::InvalidDateRange);
    }

    connection
        .prepare(
            "SELECT c.id, c.name, ABS(COALESCE(SUM(t.amount), 0)) AS total, COUNT(t.id)
            FROM category c
            LEFT JOIN \"transaction\" t
                ON t.category_id = c.id
                AND (?2 IS NULL OR t.date >= ?2)
                AND (?3 IS NULL OR t.date <= ?3)
            WHERE c.category_type = ?1
            GROUP BY c.id, c.name
            ORDER BY total DESC, c.name ASC",
        )?
        .query_map((category_type.as_str(), start_date, end_date), |row| {
            Ok(CategoryStatistics {
                category_id: row.get(0)?,
                name: row.get(1)?,
                total_amount: row.get(2)?,
                transaction_count: count_column(row, 3)?,
            })
        })?
        .map(|maybe_statistics| maybe_statistics.map_err(|error| error.into()))
        .collect()
}

fn check_parent(
    parent_id: CategoryId,
    category_type: CategoryType,
    connection: &Connection,
) -> Result<(), Error> {
    let parent = get_category(parent_id, connection).map_err(|error| match error {
        Error::NotFound => Error::InvalidParentCategory(parent_id),
        error => error,
    })?;

    if parent.category_type != category_type {
        return Err(Error::CategoryTypeMismatch);
    }

    Ok(())
}

/// Whether `ancestor_id` appears on the parent chain of `category_id`.
fn is_ancestor(
    ancestor_id: CategoryId,
    category_id: CategoryId,
    connection: &Connection,
) -> Result<bool, Error> {
    connection
        .query_row(
            "WITH RECURSIVE ancestor(id) AS (
                SELECT parent_id FROM category WHERE id = ?1
                UNION
                SELECT category.parent_id FROM category JOIN ancestor ON category.id = ancestor.id
            )
            SELECT EXISTS (SELECT 1 FROM ancestor WHERE id = ?2)",
            (category_id, ancestor_id),
            |row| row.get(0),
        )
        .map_err(|error| error.into())
}

fn count_children(category_id: CategoryId, connection: &Connection) -> Result<i64, Error> {
    connection
        .query_row(
            "SELECT COUNT(id) FROM category WHERE parent_id = ?1",
            [category_id],
            |row| row.get(0),
        )
        .map_err(|error| error.into())
}

fn count_transactions(category_id: CategoryId, connection: &Connection) -> Result<i64, Error> {
    connection
        .query_row(
            "SELECT COUNT(id) FROM \"transaction\" WHERE category_id = ?1",
            [category_id],
            |row| row.get(0),
        )
        .map_err(|error| error.into())
}

fn map_row(row: &Row) -> Result<Category, rusqlite::Error> {
    Ok(Category {
        id: row.get(0)?,
        name: row.get(1)?,
        category_type: parse_column(row, 2)?,
        parent_id: row.get(3)?,
        icon: row.get(4)?,
        color: row.get(5)?,
        description: row.get(6)?,
        is_system: row.get(7)?,
        status: parse_column(row, 8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

#[cfg(test)]
mod category_tests {
    use std::str::FromStr;

    use time::macros::date;

    use crate::{
        Error,
        test_utils::{TEST_NOW, get_test_connection},
    };

    use super::{
        Category, CategoryFilter, CategoryStatus, CategoryType, CategoryUpdate, NewCategory,
        ParentFilter, build_hierarchy, create_category, delete_category, get_all_categories,
        get_categories_by_type, get_category, get_category_hierarchy, get_category_statistics,
        update_category,
    };

    fn new_category(
        name: &str,
        category_type: CategoryType,
        parent_id: Option<i64>,
    ) -> NewCategory {
        NewCategory {
            name: name.to_owned(),
            category_type,
            parent_id,
            icon: None,
            color: None,
            description: None,
        }
    }

    fn create(
        name: &str,
        category_type: CategoryType,
        parent_id: Option<i64>,
        connection: &rusqlite::Connection,
    ) -> Category {
        create_category(new_category(name, category_type, parent_id), None, TEST_NOW, connection)
            .expect("Could not create test category")
    }

    #[test]
    fn parses_category_type() {
        assert_eq!(CategoryType::from_str("Income"), Ok(CategoryType::Income));
        assert_eq!(
            CategoryType::from_str("transfer"),
            Err(Error::InvalidCategoryType("transfer".to_owned()))
        );
    }

    #[test]
    fn create_category_succeeds() {
        let connection = get_test_connection();
        let parent = create("Travel", CategoryType::Expense, None, &connection);

        let child = create("Flights", CategoryType::Expense, Some(parent.id), &connection);

        assert_eq!(child.parent_id, Some(parent.id));
        assert!(!child.is_system);
        assert_eq!(get_category(child.id, &connection), Ok(child));
    }

    #[test]
    fn create_category_validates_name_and_parent() {
        let connection = get_test_connection();
        let income = create("Consulting", CategoryType::Income, None, &connection);

        let empty = create_category(
            new_category("  ", CategoryType::Expense, None),
            None,
            TEST_NOW,
            &connection,
        );
        let missing_parent = create_category(
            new_category("Orphan", CategoryType::Expense, Some(9999)),
            None,
            TEST_NOW,
            &connection,
        );
        let wrong_type = create_category(
            new_category("Mismatch", CategoryType::Expense, Some(income.id)),
            None,
            TEST_NOW,
            &connection,
        );

        assert_eq!(empty, Err(Error::EmptyCategoryName));
        assert_eq!(missing_parent, Err(Error::InvalidParentCategory(9999)));
        assert_eq!(wrong_type, Err(Error::CategoryTypeMismatch));
    }

    #[test]
    fn update_category_rejects_cycles() {
        let connection = get_test_connection();
        let grandparent = create("A", CategoryType::Expense, None, &connection);
        let parent = create("B", CategoryType::Expense, Some(grandparent.id), &connection);
        let child = create("C", CategoryType::Expense, Some(parent.id), &connection);

        let onto_self = update_category(
            grandparent.id,
            &CategoryUpdate {
                parent_id: Some(Some(grandparent.id)),
                ..Default::default()
            },
            None,
            TEST_NOW,
            &connection,
        );
        let onto_grandchild = update_category(
            grandparent.id,
            &CategoryUpdate {
                parent_id: Some(Some(child.id)),
                ..Default::default()
            },
            None,
            TEST_NOW,
            &connection,
        );

        assert_eq!(onto_self, Err(Error::CategoryCycle));
        assert_eq!(onto_grandchild, Err(Error::CategoryCycle));
    }

    #[test]
    fn update_category_can_move_to_root() {
        let connection = get_test_connection();
        let parent = create("Travel", CategoryType::Expense, None, &connection);
        let child = create("Flights", CategoryType::Expense, Some(parent.id), &connection);

        update_category(
            child.id,
            &CategoryUpdate {
                parent_id: Some(None),
                name: Some("Air Travel".to_owned()),
                ..Default::default()
            },
            None,
            TEST_NOW,
            &connection,
        )
        .unwrap();

        let got = get_category(child.id, &connection).unwrap();
        assert_eq!(got.parent_id, None);
        assert_eq!(got.name, "Air Travel");
    }

    #[test]
    fn update_category_type_blocked_when_in_use() {
        let connection = get_test_connection();
        let parent = create("Travel", CategoryType::Expense, None, &connection);
        create("Flights", CategoryType::Expense, Some(parent.id), &connection);
        let lonely = create("Misc", CategoryType::Expense, None, &connection);
        let to_income = CategoryUpdate {
            category_type: Some(CategoryType::Income),
            ..Default::default()
        };

        assert_eq!(
            update_category(parent.id, &to_income, None, TEST_NOW, &connection),
            Err(Error::CategoryInUse)
        );
        assert_eq!(
            update_category(lonely.id, &to_income, None, TEST_NOW, &connection),
            Ok(())
        );
        assert_eq!(
            update_category(404, &to_income, None, TEST_NOW, &connection),
            Err(Error::UpdateMissingCategory)
        );
    }

    #[test]
    fn delete_category_rules() {
        let connection = get_test_connection();
        let system = get_categories_by_type(CategoryType::Income, false, &connection).unwrap()[0]
            .clone();
        let parent = create("Travel", CategoryType::Expense, None, &connection);
        let child = create("Flights", CategoryType::Expense, Some(parent.id), &connection);

        assert_eq!(
            delete_category(system.id, None, &connection),
            Err(Error::SystemCategory)
        );
        assert_eq!(
            delete_category(parent.id, None, &connection),
            Err(Error::CategoryHasChildren)
        );
        assert_eq!(delete_category(child.id, None, &connection), Ok(()));
        assert_eq!(delete_category(parent.id, None, &connection), Ok(()));
        assert_eq!(
            delete_category(parent.id, None, &connection),
            Err(Error::DeleteMissingCategory)
        );
    }

    #[test]
    fn filters_by_parent_and_status() {
        let connection = get_test_connection();
        let parent = create("Travel", CategoryType::Expense, None, &connection);
        let child = create("Flights", CategoryType::Expense, Some(parent.id), &connection);
        update_category(
            child.id,
            &CategoryUpdate {
                status: Some(CategoryStatus::Inactive),
                ..Default::default()
            },
            None,
            TEST_NOW,
            &connection,
        )
        .unwrap();

        let children = get_all_categories(
            &CategoryFilter {
                parent: ParentFilter::Id(parent.id),
                ..Default::default()
            },
            &connection,
        )
        .unwrap();
        let roots = get_all_categories(
            &CategoryFilter {
                parent: ParentFilter::Root,
                ..Default::default()
            },
            &connection,
        )
        .unwrap();
        let active_expenses =
            get_categories_by_type(CategoryType::Expense, false, &connection).unwrap();
        let all_expenses =
            get_categories_by_type(CategoryType::Expense, true, &connection).unwrap();

        assert_eq!(children.len(), 1);
        assert_eq!(roots.len(), 10);
        assert_eq!(active_expenses.len(), 6);
        assert_eq!(all_expenses.len(), 7);
    }

    #[test]
    fn hierarchy_nests_children() {
        let connection = get_test_connection();
        let parent = create("Travel", CategoryType::Expense, None, &connection);
        create("Hotels", CategoryType::Expense, Some(parent.id), &connection);
        create("Flights", CategoryType::Expense, Some(parent.id), &connection);

        let tree = get_category_hierarchy(CategoryType::Expense, &connection).unwrap();

        assert_eq!(tree.len(), 6);
        let travel = tree
            .iter()
            .find(|node| node.category.id == parent.id)
            .expect("Travel should be a root");
        let names: Vec<_> = travel
            .children
            .iter()
            .map(|node| node.category.name.as_str())
            .collect();
        assert_eq!(names, ["Flights", "Hotels"]);
    }

    #[test]
    fn hierarchy_keeps_orphans_as_roots() {
        let connection = get_test_connection();
        let parent = create("Travel", CategoryType::Expense, None, &connection);
        let child = create("Flights", CategoryType::Expense, Some(parent.id), &connection);

        // The parent is filtered out, so the child has nowhere to go.
        let tree = build_hierarchy(vec![child.clone()]);

        assert_eq!(tree.len(), 1);
        assert_eq!(tree[0].category, child);
    }

    #[test]
    fn statistics_include_empty_categories() {
        let connection = get_test_connection();

        let statistics = get_category_statistics(
            CategoryType::Income,
            Some(date!(2025 - 01 - 01)),
            Some(date!(2025 - 01 - 31)),
            &connection,
        )
        .unwrap();

        assert_eq!(statistics.len(), 4);
        assert!(statistics.iter().all(|row| row.total_amount == 0.0 && row.transaction_count == 0));
    }

    #[test]
    fn statistics_reject_reversed_range() {
        let connection = get_test_connection();

        let result = get_category_statistics(
            CategoryType::Income,
            Some(date!(2025 - 02 - 01)),
            Some(date!(2025 - 01 - 01)),
            &connection,
        );

        assert_eq!(result, Err(Error::InvalidDateRange));
    }
}
