//! Database ID type definitions.

/// Alias for the integer type used for mapping to database IDs.
pub type DatabaseId = i64;
/// The ID of an account.
pub type AccountId = DatabaseId;
/// The ID of a category.
pub type CategoryId = DatabaseId;
/// The ID of a transaction.
pub type TransactionId = DatabaseId;
