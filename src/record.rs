//! Record capability trait.
//!
//! A record type declares, at compile time, everything the engine would
//! otherwise have to discover at runtime: its table, primary key, column set,
//! per-column value access, and the optional hooks (soft-delete marker,
//! per-type domain errors, unique-index table). Application code implements
//! `Record` once per persisted type; every CRUD operation is generic over it.

use crate::case::to_snake_case;
use crate::error::{DomainError, SkiffError};
use crate::value::SqlRow;
use sea_query::Value;
use std::fmt::Debug;
use std::sync::Arc;

/// Decode a record from one result row.
pub trait FromRow: Sized {
    /// Build `Self` from a decoded row.
    ///
    /// # Errors
    ///
    /// Returns `SkiffError::Decode` when a column is missing or has an
    /// unexpected type.
    fn from_row(row: &SqlRow) -> Result<Self, SkiffError>;
}

/// One declared unique index and the domain error raised when it is violated.
#[derive(Debug, Clone)]
pub struct UniqueIndexEntry {
    /// Index name, optionally table-qualified (`users.idx_email`)
    pub index: String,
    /// Domain error returned when this index rejects a write
    pub error: DomainError,
}

impl UniqueIndexEntry {
    pub fn new<E>(index: impl Into<String>, error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self {
            index: index.into(),
            error: Arc::new(error),
        }
    }
}

/// Capability interface implemented by every persisted type.
///
/// The required methods describe the schema; the provided methods are the
/// optional hooks and default to "not declared".
///
/// # Example
///
/// ```rust
/// use skiff::{FromRow, Record, SkiffError, SqlRow};
/// use sea_query::Value;
///
/// #[derive(Debug, Clone, Default)]
/// struct Account {
///     id: i64,
///     name: String,
/// }
///
/// impl FromRow for Account {
///     fn from_row(row: &SqlRow) -> Result<Self, SkiffError> {
///         Ok(Account {
///             id: row.try_get("id")?,
///             name: row.try_get("name")?,
///         })
///     }
/// }
///
/// impl Record for Account {
///     fn table_name() -> &'static str {
///         "accounts"
///     }
///     fn primary_key() -> &'static str {
///         "id"
///     }
///     fn columns() -> &'static [&'static str] {
///         &["id", "name"]
///     }
///     fn get(&self, column: &str) -> Option<Value> {
///         match column {
///             "id" => Some(Value::BigInt(Some(self.id))),
///             "name" => Some(Value::String(Some(self.name.clone()))),
///             _ => None,
///         }
///     }
/// }
/// ```
pub trait Record: Clone + Debug + Default + Send + FromRow {
    /// Table this record persists to
    fn table_name() -> &'static str;

    /// Name of the primary key column. Exactly one per record type.
    fn primary_key() -> &'static str;

    /// All persisted column names, in declaration order
    fn columns() -> &'static [&'static str];

    /// Current value of a column, `None` for names outside the schema
    fn get(&self, column: &str) -> Option<Value>;

    /// Column marking soft deletion (0 = live), if the table has one
    fn soft_delete_column() -> Option<&'static str> {
        None
    }

    /// Domain error replacing the generic not-found sentinel for this type
    fn not_found_error() -> Option<DomainError> {
        None
    }

    /// Domain error replacing the generic not-affected sentinel for this type
    fn not_affected_error() -> Option<DomainError> {
        None
    }

    /// Declared unique indexes and their domain errors
    fn unique_index_errors() -> Vec<UniqueIndexEntry> {
        Vec::new()
    }

    /// Resolve a payload identifier to a schema column.
    ///
    /// Accepts the column name itself or a field-style identifier whose
    /// snake_case form is a column. Returns `None` for anything outside the
    /// schema.
    fn resolve_column(ident: &str) -> Option<String> {
        if Self::columns().iter().any(|c| *c == ident) {
            return Some(ident.to_string());
        }
        let snake = to_snake_case(ident);
        if Self::columns().iter().any(|c| *c == snake) {
            Some(snake)
        } else {
            None
        }
    }
}
