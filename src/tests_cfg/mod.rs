//! Shared test fixtures.
//!
//! Two record types, a canned-row builder, and a scripted executor. The
//! executor records every statement it is handed and answers from queues, so
//! unit tests can assert on the generated SQL without a database.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use chrono::NaiveDateTime;
use may_postgres::types::ToSql;
use sea_query::Value;

use crate::error::{DomainError, SkiffError};
use crate::executor::SkiffExecutor;
use crate::record::{FromRow, Record, UniqueIndexEntry};
use crate::value::SqlRow;

/// Plain record with no hooks declared.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TestUser {
    pub id: i64,
    pub name: String,
    pub age: Option<i64>,
    pub status: i16,
    pub created_at: Option<NaiveDateTime>,
}

impl FromRow for TestUser {
    fn from_row(row: &SqlRow) -> Result<Self, SkiffError> {
        Ok(TestUser {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            age: row.try_get_opt("age")?,
            status: row.try_get("status")?,
            created_at: row.try_get_opt("created_at")?,
        })
    }
}

impl Record for TestUser {
    fn table_name() -> &'static str {
        "users"
    }

    fn primary_key() -> &'static str {
        "id"
    }

    fn columns() -> &'static [&'static str] {
        &["id", "name", "age", "status", "created_at"]
    }

    fn get(&self, column: &str) -> Option<Value> {
        match column {
            "id" => Some(Value::BigInt(Some(self.id))),
            "name" => Some(Value::String(Some(self.name.clone()))),
            "age" => Some(Value::BigInt(self.age)),
            "status" => Some(Value::SmallInt(Some(self.status))),
            "created_at" => Some(
                self.created_at
                    .map(Value::from)
                    .unwrap_or(Value::ChronoDateTime(None)),
            ),
            _ => None,
        }
    }
}

/// Record declaring every hook: soft-delete marker, per-type domain errors,
/// and unique indexes in both naming forms.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SoftUser {
    pub id: i64,
    pub name: String,
    pub code: i64,
    pub deleted: i64,
}

impl FromRow for SoftUser {
    fn from_row(row: &SqlRow) -> Result<Self, SkiffError> {
        Ok(SoftUser {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            code: row.try_get("code")?,
            deleted: row.try_get("deleted")?,
        })
    }
}

impl Record for SoftUser {
    fn table_name() -> &'static str {
        "soft_users"
    }

    fn primary_key() -> &'static str {
        "id"
    }

    fn columns() -> &'static [&'static str] {
        &["id", "name", "code", "deleted"]
    }

    fn get(&self, column: &str) -> Option<Value> {
        match column {
            "id" => Some(Value::BigInt(Some(self.id))),
            "name" => Some(Value::String(Some(self.name.clone()))),
            "code" => Some(Value::BigInt(Some(self.code))),
            "deleted" => Some(Value::BigInt(Some(self.deleted))),
            _ => None,
        }
    }

    fn soft_delete_column() -> Option<&'static str> {
        Some("deleted")
    }

    fn not_found_error() -> Option<DomainError> {
        Some(Arc::new(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "soft user not found",
        )))
    }

    fn not_affected_error() -> Option<DomainError> {
        Some(Arc::new(std::io::Error::new(
            std::io::ErrorKind::Other,
            "soft user not touched",
        )))
    }

    fn unique_index_errors() -> Vec<UniqueIndexEntry> {
        vec![
            UniqueIndexEntry::new(
                "uk_soft_users_name",
                std::io::Error::new(std::io::ErrorKind::AlreadyExists, "name already taken"),
            ),
            UniqueIndexEntry::new(
                "soft_users.uk_soft_users_code",
                std::io::Error::new(std::io::ErrorKind::AlreadyExists, "code already taken"),
            ),
        ]
    }
}

/// Canned `users` row covering every `TestUser` column.
pub fn user_row(id: i64, name: &str, age: Option<i64>) -> SqlRow {
    SqlRow::new(
        vec![
            "id".to_string(),
            "name".to_string(),
            "age".to_string(),
            "status".to_string(),
            "created_at".to_string(),
        ],
        vec![
            Value::BigInt(Some(id)),
            Value::String(Some(name.to_string())),
            Value::BigInt(age),
            Value::SmallInt(Some(0)),
            Value::ChronoDateTime(None),
        ],
    )
}

/// Scripted executor.
///
/// Statements are recorded in order; responses come from three queues. An
/// entry pushed with [`push_error`](MockExecutor::push_error) is returned
/// before anything else, whichever method runs next. `query_one` and
/// `query_all` share the row queue, so a test scripts result sets in the
/// order the code under test will ask for them.
#[derive(Clone, Default)]
pub struct MockExecutor {
    sql: Arc<Mutex<Vec<String>>>,
    param_counts: Arc<Mutex<Vec<usize>>>,
    rows: Arc<Mutex<VecDeque<Vec<SqlRow>>>>,
    affected: Arc<Mutex<VecDeque<u64>>>,
    errors: Arc<Mutex<VecDeque<SkiffError>>>,
}

impl MockExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a single-row result set.
    pub fn push_row(&self, row: SqlRow) {
        self.rows.lock().unwrap().push_back(vec![row]);
    }

    /// Queue a result set, possibly empty.
    pub fn push_rows(&self, rows: Vec<SqlRow>) {
        self.rows.lock().unwrap().push_back(rows);
    }

    /// Queue an affected-rows answer for the next `execute`.
    pub fn push_affected(&self, affected: u64) {
        self.affected.lock().unwrap().push_back(affected);
    }

    /// Queue an error returned by the next call, whichever method it is.
    pub fn push_error(&self, error: SkiffError) {
        self.errors.lock().unwrap().push_back(error);
    }

    /// Every statement seen so far, in execution order.
    pub fn captured_sql(&self) -> Vec<String> {
        self.sql.lock().unwrap().clone()
    }

    /// Parameter count of every statement seen so far.
    pub fn captured_param_counts(&self) -> Vec<usize> {
        self.param_counts.lock().unwrap().clone()
    }

    fn record(&self, query: &str, params: &[&dyn ToSql]) {
        self.sql.lock().unwrap().push(query.to_string());
        self.param_counts.lock().unwrap().push(params.len());
    }

    fn next_error(&self) -> Option<SkiffError> {
        self.errors.lock().unwrap().pop_front()
    }
}

impl SkiffExecutor for MockExecutor {
    fn execute(&self, query: &str, params: &[&dyn ToSql]) -> Result<u64, SkiffError> {
        self.record(query, params);
        if let Some(err) = self.next_error() {
            return Err(err);
        }
        Ok(self.affected.lock().unwrap().pop_front().unwrap_or(0))
    }

    fn query_one(
        &self,
        query: &str,
        params: &[&dyn ToSql],
    ) -> Result<Option<SqlRow>, SkiffError> {
        self.record(query, params);
        if let Some(err) = self.next_error() {
            return Err(err);
        }
        let set = self.rows.lock().unwrap().pop_front();
        Ok(set.and_then(|rows| rows.into_iter().next()))
    }

    fn query_all(&self, query: &str, params: &[&dyn ToSql]) -> Result<Vec<SqlRow>, SkiffError> {
        self.record(query, params);
        if let Some(err) = self.next_error() {
            return Err(err);
        }
        Ok(self.rows.lock().unwrap().pop_front().unwrap_or_default())
    }
}
