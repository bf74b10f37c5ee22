//! Filter expression compiler.
//!
//! Filter keys follow a small grammar: an optional leading `?` (drop the
//! entry when its value is zero-valued), a column name, an optional
//! `#comment` suffix (stripped, unused), and an optional `$operator` suffix.
//! Values are JSON; a null value always drops the entry. Compiled predicates
//! are conjunctive; the `$func` escape hatch can introduce anything else.

use std::collections::BTreeMap;
use std::fmt;

use sea_query::{ColumnRef, Condition, DynIden, Expr, ExprTrait, IntoColumnRef, Value};
use serde_json::Value as JsonValue;

use crate::error::SkiffError;
use crate::value::json_to_value;

use super::options::FilterFn;

/// Value side of one declarative filter entry.
#[derive(Clone)]
pub enum FilterValue {
    /// Plain JSON value compiled through the operator table
    Json(JsonValue),
    /// Callback mutating the compiled condition tree directly
    Func(FilterFn),
}

impl fmt::Debug for FilterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterValue::Json(v) => f.debug_tuple("Json").field(v).finish(),
            FilterValue::Func(_) => f.write_str("Func(..)"),
        }
    }
}

/// Operator tag of one filter key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Ne,
    Gte,
    Gt,
    Lte,
    Lt,
    Like,
    NotLike,
    In,
    NotIn,
    Func,
}

impl FilterOp {
    /// Parse an operator tag. Unknown tags fall back to the default
    /// behavior (membership for arrays, equality otherwise), like an
    /// absent tag does.
    fn parse(tag: &str) -> Option<Self> {
        match tag {
            "eq" => Some(Self::Eq),
            "ne" => Some(Self::Ne),
            "gte" => Some(Self::Gte),
            "gt" => Some(Self::Gt),
            "lte" => Some(Self::Lte),
            "lt" => Some(Self::Lt),
            "like" => Some(Self::Like),
            "notLike" => Some(Self::NotLike),
            "in" => Some(Self::In),
            "notIn" => Some(Self::NotIn),
            "func" => Some(Self::Func),
            _ => None,
        }
    }
}

/// One parsed filter key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterKey {
    pub column: String,
    /// `None` means no (or an unrecognized) operator tag
    pub op: Option<FilterOp>,
    /// Leading `?`: drop the entry when the value is zero-valued
    pub skip_zero: bool,
}

impl FilterKey {
    /// Parse one raw key: leading `?` flag, then truncate at the first `#`,
    /// then split at the first `$` into column and operator tag.
    pub fn parse(raw: &str) -> Self {
        let mut key = raw;
        let mut skip_zero = false;
        if let Some(stripped) = key.strip_prefix('?') {
            skip_zero = true;
            key = stripped;
        }
        if let Some(idx) = key.find('#') {
            key = &key[..idx];
        }
        let (column, op) = match key.find('$') {
            Some(idx) => (&key[..idx], FilterOp::parse(&key[idx + 1..])),
            None => (key, None),
        };
        Self {
            column: column.to_string(),
            op,
            skip_zero,
        }
    }
}

/// Compile a filter map into one conjunctive condition tree.
///
/// Returns `Ok(None)` when every entry was dropped. Custom-function entries
/// run after all plain predicates, in key order.
///
/// # Errors
///
/// Returns `SkiffError::Query` for an array value under a non-membership
/// operator, or a value that has no SQL representation.
pub(crate) fn compile_filters(
    filters: &BTreeMap<String, FilterValue>,
) -> Result<Option<Condition>, SkiffError> {
    if filters.is_empty() {
        return Ok(None);
    }

    let mut condition = Condition::all();
    let mut added = false;
    let mut funcs: Vec<&FilterFn> = Vec::new();

    for (raw_key, value) in filters {
        let key = FilterKey::parse(raw_key);
        match value {
            FilterValue::Func(f) => funcs.push(f),
            FilterValue::Json(json) => {
                if json.is_null() {
                    continue;
                }
                if key.skip_zero && is_json_zero(json) {
                    continue;
                }
                // A func tag without a callback value has nothing to run
                if key.op == Some(FilterOp::Func) {
                    continue;
                }
                condition = condition.add(compile_predicate(&key, json)?);
                added = true;
            }
        }
    }

    for f in &funcs {
        condition = f(condition);
    }

    if !added && funcs.is_empty() {
        return Ok(None);
    }
    Ok(Some(condition))
}

fn compile_predicate(key: &FilterKey, json: &JsonValue) -> Result<Expr, SkiffError> {
    let op = match key.op {
        Some(op) => op,
        // Default behavior: membership for arrays, equality otherwise
        None => {
            if json.is_array() {
                FilterOp::In
            } else {
                FilterOp::Eq
            }
        }
    };

    let column = Expr::col(column_ref(&key.column));

    match op {
        FilterOp::In => Ok(column.is_in(membership_values(&key.column, json)?)),
        FilterOp::NotIn => Ok(column.is_not_in(membership_values(&key.column, json)?)),
        FilterOp::Like => Ok(column.like(format!("%{}%", like_fragment(json)))),
        FilterOp::NotLike => Ok(column.not_like(format!("%{}%", like_fragment(json)))),
        FilterOp::Func => Err(SkiffError::Query(format!(
            "filter '{}' requires a callback value",
            key.column
        ))),
        op => {
            if json.is_array() {
                return Err(SkiffError::Query(format!(
                    "filter '{}' does not accept an array value",
                    key.column
                )));
            }
            let value = scalar_value(&key.column, json)?;
            Ok(match op {
                FilterOp::Ne => column.ne(Expr::val(value)),
                FilterOp::Gte => column.gte(Expr::val(value)),
                FilterOp::Gt => column.gt(Expr::val(value)),
                FilterOp::Lte => column.lte(Expr::val(value)),
                FilterOp::Lt => column.lt(Expr::val(value)),
                _ => column.eq(Expr::val(value)),
            })
        }
    }
}

/// Column reference for a plain or table-qualified name.
pub(crate) fn column_ref(name: &str) -> ColumnRef {
    match name.split_once('.') {
        Some((table, column)) => (
            DynIden::from(table.to_string()),
            DynIden::from(column.to_string()),
        )
            .into_column_ref(),
        None => DynIden::from(name.to_string()).into_column_ref(),
    }
}

fn membership_values(column: &str, json: &JsonValue) -> Result<Vec<Value>, SkiffError> {
    match json.as_array() {
        Some(items) => items.iter().map(|item| scalar_value(column, item)).collect(),
        None => Ok(vec![scalar_value(column, json)?]),
    }
}

fn scalar_value(column: &str, json: &JsonValue) -> Result<Value, SkiffError> {
    json_to_value(json)
        .map_err(|e| SkiffError::Query(format!("filter '{column}' has an unusable value: {e}")))
}

fn like_fragment(json: &JsonValue) -> String {
    match json.as_str() {
        Some(s) => s.to_string(),
        None => json.to_string(),
    }
}

/// Zero check for the `?` flag: null, false, zero numbers, and the empty
/// string count as zero. Arrays and objects never do, even when empty.
fn is_json_zero(json: &JsonValue) -> bool {
    match json {
        JsonValue::Null => true,
        JsonValue::Bool(b) => !b,
        JsonValue::Number(n) => {
            n.as_i64() == Some(0) || n.as_u64() == Some(0) || n.as_f64() == Some(0.0)
        }
        JsonValue::String(s) => s.is_empty(),
        JsonValue::Array(_) | JsonValue::Object(_) => false,
    }
}
