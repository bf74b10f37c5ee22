//! Declarative query options.
//!
//! [`QueryOptions`] accumulates everything one CRUD call needs: projection,
//! joins, predicates, filters, pagination, sorting, and the behavior flags
//! and per-call error overrides. List-valued fields append in application
//! order, scalar fields are last-write-wins, and map-valued fields merge
//! key-by-key. The options are lowered into SQL by [`crate::query::build`].

use std::collections::BTreeMap;
use std::sync::Arc;

use sea_query::{Condition, Value};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::DomainError;
use crate::record::Record;
use crate::value::is_zero_value;

use super::filter::FilterValue;

/// Callback mutating a compiled condition tree, the escape hatch of the
/// filter grammar.
pub type FilterFn = Arc<dyn Fn(Condition) -> Condition + Send + Sync>;

/// One WHERE (or OR) clause.
#[derive(Debug, Clone, PartialEq)]
pub enum WhereSpec {
    /// Raw predicate with `?` placeholders and its bound arguments
    Raw { sql: String, args: Vec<Value> },
    /// Equality per field
    Fields(BTreeMap<String, Value>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
    Right,
}

/// One join clause: target table plus a raw ON fragment with `?` placeholders.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinSpec {
    pub kind: JoinKind,
    pub table: String,
    pub on: String,
    pub args: Vec<Value>,
}

/// Page request, usually deserialized straight from a request body.
/// Pages are 1-based.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Pageable {
    #[serde(default)]
    pub page: u64,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub sort: String,
}

impl Pageable {
    pub fn new(page: u64, size: u64) -> Self {
        Self {
            page,
            size,
            sort: String::new(),
        }
    }

    /// Set the sort expression, e.g. `"created_at desc"`
    pub fn sort(mut self, sort: impl Into<String>) -> Self {
        self.sort = sort.into();
        self
    }
}

/// One page of results plus the total row count across all pages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageResult<R> {
    pub list: Vec<R>,
    pub total: u64,
}

/// Declarative options for one CRUD call.
///
/// Built fresh per call, consumed by exactly one operation, then discarded.
///
/// # Examples
///
/// ```rust
/// use skiff::QueryOptions;
///
/// let options = QueryOptions::new()
///     .where_raw("age >= ?", vec![18.into()])
///     .filter("status$in", serde_json::json!([1, 2, 3]))
///     .sort("created_at desc")
///     .limit(10);
/// ```
#[derive(Clone, Debug, Default)]
pub struct QueryOptions {
    pub(crate) table: Option<String>,
    pub(crate) primary_key: Option<String>,
    pub(crate) select_raw: Option<(String, Vec<Value>)>,
    pub(crate) omit: Vec<String>,
    pub(crate) attend: Vec<String>,
    pub(crate) ignore_omit: bool,
    pub(crate) joins: Vec<JoinSpec>,
    pub(crate) wheres: Vec<WhereSpec>,
    pub(crate) ors: Vec<WhereSpec>,
    pub(crate) filters: BTreeMap<String, FilterValue>,
    pub(crate) group: Option<String>,
    pub(crate) limit: Option<u64>,
    pub(crate) offset: Option<u64>,
    pub(crate) pageable: Option<Pageable>,
    pub(crate) sorts: Vec<String>,
    pub(crate) pluck: Option<String>,
    pub(crate) first: bool,
    pub(crate) last: bool,
    pub(crate) with_deleted: bool,
    pub(crate) ignore_not_found: bool,
    pub(crate) must_affected: bool,
    pub(crate) not_found_error: Option<DomainError>,
    pub(crate) not_unique_error: Option<DomainError>,
    pub(crate) not_affected_error: Option<DomainError>,
}

impl QueryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the target table name
    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    /// Override the primary key column name
    pub fn primary_key(mut self, column: impl Into<String>) -> Self {
        self.primary_key = Some(column.into());
        self
    }

    /// Set a raw select projection with `?` placeholders.
    ///
    /// Repeated calls append with a comma, so fragments compose.
    pub fn select_raw(mut self, sql: impl Into<String>, args: Vec<Value>) -> Self {
        let sql = sql.into();
        match self.select_raw.as_mut() {
            Some((existing, existing_args)) => {
                existing.push_str(", ");
                existing.push_str(&sql);
                existing_args.extend(args);
            }
            None => self.select_raw = Some((sql, args)),
        }
        self
    }

    /// Exclude columns from the projection (and from inserts)
    pub fn omit<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.omit.extend(columns.into_iter().map(Into::into));
        self
    }

    /// Restrict updates to an explicit column allow-list
    pub fn attend<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attend.extend(columns.into_iter().map(Into::into));
        self
    }

    /// Skip the omit list for this call, selecting every column
    pub fn ignore_omit(mut self) -> Self {
        self.ignore_omit = true;
        self
    }

    /// Add an INNER JOIN with a raw ON fragment (`?` placeholders)
    pub fn inner_join(
        mut self,
        table: impl Into<String>,
        on: impl Into<String>,
        args: Vec<Value>,
    ) -> Self {
        self.joins.push(JoinSpec {
            kind: JoinKind::Inner,
            table: table.into(),
            on: on.into(),
            args,
        });
        self
    }

    /// Add a LEFT JOIN with a raw ON fragment (`?` placeholders)
    pub fn left_join(
        mut self,
        table: impl Into<String>,
        on: impl Into<String>,
        args: Vec<Value>,
    ) -> Self {
        self.joins.push(JoinSpec {
            kind: JoinKind::Left,
            table: table.into(),
            on: on.into(),
            args,
        });
        self
    }

    /// Add a RIGHT JOIN with a raw ON fragment (`?` placeholders)
    pub fn right_join(
        mut self,
        table: impl Into<String>,
        on: impl Into<String>,
        args: Vec<Value>,
    ) -> Self {
        self.joins.push(JoinSpec {
            kind: JoinKind::Right,
            table: table.into(),
            on: on.into(),
            args,
        });
        self
    }

    /// Add a raw WHERE predicate with `?` placeholders
    pub fn where_raw(mut self, sql: impl Into<String>, args: Vec<Value>) -> Self {
        self.wheres.push(WhereSpec::Raw {
            sql: sql.into(),
            args,
        });
        self
    }

    /// Add an equality-per-field WHERE clause
    pub fn where_fields(mut self, fields: BTreeMap<String, Value>) -> Self {
        self.wheres.push(WhereSpec::Fields(fields));
        self
    }

    /// Add a single-column equality WHERE clause
    pub fn where_eq(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        let mut fields = BTreeMap::new();
        fields.insert(column.into(), value.into());
        self.where_fields(fields)
    }

    /// Add a WHERE clause matching every non-zero column of a record
    pub fn where_record<R: Record>(self, record: &R) -> Self {
        let mut fields = BTreeMap::new();
        for column in R::columns() {
            if let Some(value) = record.get(column) {
                if !is_zero_value(&value) {
                    fields.insert((*column).to_string(), value);
                }
            }
        }
        self.where_fields(fields)
    }

    /// Add a raw OR predicate with `?` placeholders
    pub fn or_raw(mut self, sql: impl Into<String>, args: Vec<Value>) -> Self {
        self.ors.push(WhereSpec::Raw {
            sql: sql.into(),
            args,
        });
        self
    }

    /// Add an equality-per-field OR clause
    pub fn or_fields(mut self, fields: BTreeMap<String, Value>) -> Self {
        self.ors.push(WhereSpec::Fields(fields));
        self
    }

    /// Add one declarative filter entry.
    ///
    /// Keys follow the filter grammar: optional leading `?` (drop the entry
    /// when the value is zero-valued), a column name, an optional `#comment`
    /// suffix, and an optional `$operator` suffix.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use skiff::QueryOptions;
    ///
    /// let options = QueryOptions::new()
    ///     .filter("age$gte", serde_json::json!(18))
    ///     .filter("?name", serde_json::json!(""));
    /// ```
    pub fn filter(mut self, key: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.filters
            .insert(key.into(), FilterValue::Json(value.into()));
        self
    }

    /// Merge a map of declarative filters, later entries overriding same keys
    pub fn filters<I, S>(mut self, entries: I) -> Self
    where
        I: IntoIterator<Item = (S, JsonValue)>,
        S: Into<String>,
    {
        for (key, value) in entries {
            self.filters
                .insert(key.into(), FilterValue::Json(value));
        }
        self
    }

    /// Add a custom-function filter, the grammar's escape hatch.
    ///
    /// The callback receives the condition tree compiled so far and returns
    /// the tree to use instead, enabling logic outside the fixed grammar.
    pub fn filter_fn<F>(mut self, key: impl Into<String>, f: F) -> Self
    where
        F: Fn(Condition) -> Condition + Send + Sync + 'static,
    {
        self.filters
            .insert(key.into(), FilterValue::Func(Arc::new(f)));
        self
    }

    /// Set a GROUP BY expression
    pub fn group(mut self, expr: impl Into<String>) -> Self {
        self.group = Some(expr.into());
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Paginate results.
    ///
    /// A page size above zero sets `limit = size` and
    /// `offset = (page - 1) * size`; the pageable's own sort applies only
    /// when no explicit sort was set. Explicit non-zero limit and offset
    /// override the derived values.
    pub fn page(mut self, pageable: Pageable) -> Self {
        self.pageable = Some(pageable);
        self
    }

    /// Add a sort expression, e.g. `"name"` or `"created_at desc"`.
    ///
    /// Sorting applies only when the first entry is non-empty.
    pub fn sort(mut self, sort: impl Into<String>) -> Self {
        self.sorts.push(sort.into());
        self
    }

    /// Add several sort expressions
    pub fn sorts<I, S>(mut self, sorts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sorts.extend(sorts.into_iter().map(Into::into));
        self
    }

    /// Select a single column for `pluck`
    pub fn pluck(mut self, column: impl Into<String>) -> Self {
        self.pluck = Some(column.into());
        self
    }

    /// Return only the first row by primary key order
    pub fn first(mut self) -> Self {
        self.first = true;
        self
    }

    /// Return only the last row by primary key order
    pub fn last(mut self) -> Self {
        self.last = true;
        self
    }

    /// Include soft-deleted rows
    pub fn with_deleted(mut self) -> Self {
        self.with_deleted = true;
        self
    }

    /// Turn not-found into success with no result
    pub fn ignore_not_found(mut self) -> Self {
        self.ignore_not_found = true;
        self
    }

    /// Treat zero rows affected by an update or delete as an error
    pub fn must_affected(mut self) -> Self {
        self.must_affected = true;
        self
    }

    /// Per-call override for the not-found error
    pub fn error_not_found<E>(mut self, error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.not_found_error = Some(Arc::new(error));
        self
    }

    /// Per-call override for the not-unique error
    pub fn error_not_unique<E>(mut self, error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.not_unique_error = Some(Arc::new(error));
        self
    }

    /// Per-call override for the not-affected error
    pub fn error_not_affected<E>(mut self, error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.not_affected_error = Some(Arc::new(error));
        self
    }

    /// Merge another option set into this one.
    ///
    /// List fields append, map fields merge key-by-key with `other` winning,
    /// scalar fields take `other`'s value when set, and flags combine with OR.
    pub fn merge(mut self, other: QueryOptions) -> Self {
        if let Some(table) = other.table {
            self.table = Some(table);
        }
        if let Some(primary_key) = other.primary_key {
            self.primary_key = Some(primary_key);
        }
        if let Some((sql, args)) = other.select_raw {
            self = self.select_raw(sql, args);
        }
        self.omit.extend(other.omit);
        self.attend.extend(other.attend);
        self.ignore_omit |= other.ignore_omit;
        self.joins.extend(other.joins);
        self.wheres.extend(other.wheres);
        self.ors.extend(other.ors);
        self.filters.extend(other.filters);
        if let Some(group) = other.group {
            self.group = Some(group);
        }
        if let Some(limit) = other.limit {
            self.limit = Some(limit);
        }
        if let Some(offset) = other.offset {
            self.offset = Some(offset);
        }
        if let Some(pageable) = other.pageable {
            self.pageable = Some(pageable);
        }
        self.sorts.extend(other.sorts);
        if let Some(pluck) = other.pluck {
            self.pluck = Some(pluck);
        }
        self.first |= other.first;
        self.last |= other.last;
        self.with_deleted |= other.with_deleted;
        self.ignore_not_found |= other.ignore_not_found;
        self.must_affected |= other.must_affected;
        if let Some(e) = other.not_found_error {
            self.not_found_error = Some(e);
        }
        if let Some(e) = other.not_unique_error {
            self.not_unique_error = Some(e);
        }
        if let Some(e) = other.not_affected_error {
            self.not_affected_error = Some(e);
        }
        self
    }

    /// Apply a builder closure only when `condition` holds
    pub fn apply_if<F>(self, condition: bool, f: F) -> Self
    where
        F: FnOnce(Self) -> Self,
    {
        if condition {
            f(self)
        } else {
            self
        }
    }

    /// Whether any narrowing clause is present. Bulk mutations refuse to run
    /// without one.
    pub(crate) fn has_conditions(&self) -> bool {
        !self.wheres.is_empty() || !self.ors.is_empty() || !self.filters.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_fields_append() {
        let options = QueryOptions::new()
            .sort("a")
            .omit(["x"])
            .sort("b")
            .omit(["y", "z"]);
        assert_eq!(options.sorts, vec!["a", "b"]);
        assert_eq!(options.omit, vec!["x", "y", "z"]);
    }

    #[test]
    fn test_scalar_fields_last_write_wins() {
        let options = QueryOptions::new().table("a").limit(5).table("b").limit(9);
        assert_eq!(options.table.as_deref(), Some("b"));
        assert_eq!(options.limit, Some(9));
    }

    #[test]
    fn test_select_raw_appends_with_comma() {
        let options = QueryOptions::new()
            .select_raw("id", vec![])
            .select_raw("name", vec![]);
        let (sql, args) = options.select_raw.unwrap();
        assert_eq!(sql, "id, name");
        assert!(args.is_empty());
    }

    #[test]
    fn test_filters_merge_key_by_key() {
        let options = QueryOptions::new()
            .filter("status", serde_json::json!(1))
            .filter("status", serde_json::json!(2));
        assert_eq!(options.filters.len(), 1);
        match options.filters.get("status") {
            Some(FilterValue::Json(v)) => assert_eq!(*v, serde_json::json!(2)),
            other => panic!("unexpected filter value: {other:?}"),
        }
    }

    #[test]
    fn test_merge_combines_option_sets() {
        let base = QueryOptions::new().sort("a").limit(5).must_affected();
        let extra = QueryOptions::new().sort("b").limit(10).ignore_not_found();
        let merged = base.merge(extra);
        assert_eq!(merged.sorts, vec!["a", "b"]);
        assert_eq!(merged.limit, Some(10));
        assert!(merged.must_affected);
        assert!(merged.ignore_not_found);
    }

    #[test]
    fn test_merge_is_append_stable_across_grouping() {
        // Applying options one by one or pre-merged in groups must produce
        // the same list ordering.
        let one_by_one = QueryOptions::new().sort("a").sort("b").sort("c");
        let grouped = QueryOptions::new()
            .sort("a")
            .merge(QueryOptions::new().sort("b").sort("c"));
        assert_eq!(one_by_one.sorts, grouped.sorts);
    }

    #[test]
    fn test_apply_if() {
        let options = QueryOptions::new()
            .apply_if(true, |o| o.limit(3))
            .apply_if(false, |o| o.limit(99));
        assert_eq!(options.limit, Some(3));
    }

    #[test]
    fn test_pageable_deserializes_with_defaults() {
        let pageable: Pageable = serde_json::from_str(r#"{"page": 2, "size": 20}"#).unwrap();
        assert_eq!(pageable.page, 2);
        assert_eq!(pageable.size, 20);
        assert!(pageable.sort.is_empty());
    }

    #[test]
    fn test_error_overrides_stored() {
        let options = QueryOptions::new().error_not_found(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "user missing",
        ));
        assert_eq!(
            options.not_found_error.as_ref().map(|e| e.to_string()),
            Some("user missing".to_string())
        );
    }
}
