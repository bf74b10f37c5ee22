//! Value and row layer.
//!
//! Rows come back from the executor as [`SqlRow`]: owned column names plus
//! `sea_query::Value` cells, so decoding is uniform across the live driver,
//! transactions, and test mocks. The helpers here are the single definition of
//! "null", "zero" and "equal" that the diff engine and filter compiler share.

pub mod list;
pub mod try_getable;

pub use list::{DecimalList, IntList, StringList};
pub use try_getable::{TryGetable, TryGetableMany, ValueExtractionError};

use sea_query::Value;
use serde_json::Value as JsonValue;
use std::str::FromStr;

/// One decoded result row: column names aligned with their values.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlRow {
    columns: Vec<String>,
    values: Vec<Value>,
}

impl SqlRow {
    /// Build a row from parallel column/value vectors.
    pub fn new(columns: Vec<String>, values: Vec<Value>) -> Self {
        debug_assert_eq!(columns.len(), values.len());
        Self { columns, values }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }

    /// Borrow the raw value of a column.
    pub fn value(&self, column: &str) -> Result<&Value, ValueExtractionError> {
        self.column_index(column)
            .and_then(|i| self.values.get(i))
            .ok_or_else(|| ValueExtractionError::MissingColumn(column.to_string()))
    }

    /// Extract a typed value from a column.
    pub fn try_get<T: TryGetable>(&self, column: &str) -> Result<T, ValueExtractionError> {
        T::try_get(self.value(column)?.clone())
    }

    /// Extract a typed value, mapping SQL NULL to `None`.
    pub fn try_get_opt<T: TryGetable>(
        &self,
        column: &str,
    ) -> Result<Option<T>, ValueExtractionError> {
        T::try_get_opt(self.value(column)?.clone())
    }
}

/// True when the value is SQL NULL, whatever its declared type.
pub fn is_null_value(value: &Value) -> bool {
    matches!(
        value,
        Value::Bool(None)
            | Value::TinyInt(None)
            | Value::SmallInt(None)
            | Value::Int(None)
            | Value::BigInt(None)
            | Value::TinyUnsigned(None)
            | Value::SmallUnsigned(None)
            | Value::Unsigned(None)
            | Value::BigUnsigned(None)
            | Value::Float(None)
            | Value::Double(None)
            | Value::Char(None)
            | Value::String(None)
            | Value::Bytes(None)
            | Value::Json(None)
            | Value::Uuid(None)
            | Value::Decimal(None)
            | Value::ChronoDate(None)
            | Value::ChronoTime(None)
            | Value::ChronoDateTime(None)
            | Value::ChronoDateTimeUtc(None)
            | Value::ChronoDateTimeLocal(None)
            | Value::ChronoDateTimeWithTimeZone(None)
    )
}

/// True when the value is its type's zero/empty value.
///
/// NULL counts as zero for every type. Temporal values are zero only when
/// NULL: a stored instant is never "empty". Empty strings and byte strings
/// are zero; a nil UUID and a zero decimal are zero.
pub fn is_zero_value(value: &Value) -> bool {
    if is_null_value(value) {
        return true;
    }
    match value {
        Value::Bool(Some(b)) => !*b,
        Value::TinyInt(Some(v)) => *v == 0,
        Value::SmallInt(Some(v)) => *v == 0,
        Value::Int(Some(v)) => *v == 0,
        Value::BigInt(Some(v)) => *v == 0,
        Value::TinyUnsigned(Some(v)) => *v == 0,
        Value::SmallUnsigned(Some(v)) => *v == 0,
        Value::Unsigned(Some(v)) => *v == 0,
        Value::BigUnsigned(Some(v)) => *v == 0,
        Value::Float(Some(v)) => *v == 0.0,
        Value::Double(Some(v)) => *v == 0.0,
        Value::String(Some(s)) => s.is_empty(),
        Value::Bytes(Some(b)) => b.is_empty(),
        Value::Json(Some(j)) => j.is_null(),
        Value::Uuid(Some(_)) => uuid_of(value).map(|u| u.is_nil()).unwrap_or(false),
        Value::Decimal(Some(_)) => decimal_of(value).map(|d| d.is_zero()).unwrap_or(false),
        _ => false,
    }
}

/// True for any chrono-backed value, set or NULL.
pub fn is_temporal_value(value: &Value) -> bool {
    matches!(
        value,
        Value::ChronoDate(_)
            | Value::ChronoTime(_)
            | Value::ChronoDateTime(_)
            | Value::ChronoDateTimeUtc(_)
            | Value::ChronoDateTimeLocal(_)
            | Value::ChronoDateTimeWithTimeZone(_)
    )
}

fn uuid_of(value: &Value) -> Option<uuid::Uuid> {
    <uuid::Uuid as sea_query::ValueType>::try_from(value.clone()).ok()
}

fn decimal_of(value: &Value) -> Option<rust_decimal::Decimal> {
    <rust_decimal::Decimal as sea_query::ValueType>::try_from(value.clone()).ok()
}

/// Canonical display form of a value, `None` for NULL.
///
/// This is the fallback equality form: two values of different SQL widths
/// (`Int(5)` vs `BigInt(5)`) or representations (`Double(5.0)` vs a decimal
/// `5.00`) compare equal through their canonical strings.
pub fn canonical_string(value: &Value) -> Option<String> {
    if is_null_value(value) {
        return None;
    }
    match value {
        Value::Bool(Some(b)) => Some(b.to_string()),
        Value::TinyInt(Some(v)) => Some(v.to_string()),
        Value::SmallInt(Some(v)) => Some(v.to_string()),
        Value::Int(Some(v)) => Some(v.to_string()),
        Value::BigInt(Some(v)) => Some(v.to_string()),
        Value::TinyUnsigned(Some(v)) => Some(v.to_string()),
        Value::SmallUnsigned(Some(v)) => Some(v.to_string()),
        Value::Unsigned(Some(v)) => Some(v.to_string()),
        Value::BigUnsigned(Some(v)) => Some(v.to_string()),
        Value::Float(Some(v)) => Some(v.to_string()),
        Value::Double(Some(v)) => Some(v.to_string()),
        Value::Char(Some(c)) => Some(c.to_string()),
        Value::String(Some(s)) => Some(s.clone()),
        Value::Bytes(Some(b)) => Some(String::from_utf8_lossy(b).into_owned()),
        Value::Json(Some(j)) => Some(j.to_string()),
        Value::Uuid(Some(_)) => uuid_of(value).map(|u| u.to_string()),
        Value::Decimal(Some(_)) => decimal_of(value).map(|d| d.normalize().to_string()),
        Value::ChronoDate(Some(_)) => {
            <chrono::NaiveDate as sea_query::ValueType>::try_from(value.clone())
                .ok()
                .map(|d| d.to_string())
        }
        Value::ChronoTime(Some(_)) => {
            <chrono::NaiveTime as sea_query::ValueType>::try_from(value.clone())
                .ok()
                .map(|t| t.to_string())
        }
        Value::ChronoDateTime(Some(_)) => {
            <chrono::NaiveDateTime as sea_query::ValueType>::try_from(value.clone())
                .ok()
                .map(|dt| dt.to_string())
        }
        Value::ChronoDateTimeUtc(Some(_)) => {
            <chrono::DateTime<chrono::Utc> as sea_query::ValueType>::try_from(value.clone())
                .ok()
                .map(|dt| dt.to_rfc3339())
        }
        Value::ChronoDateTimeLocal(Some(_)) => {
            <chrono::DateTime<chrono::Local> as sea_query::ValueType>::try_from(value.clone())
                .ok()
                .map(|dt| dt.to_rfc3339())
        }
        Value::ChronoDateTimeWithTimeZone(Some(_)) => {
            <chrono::DateTime<chrono::FixedOffset> as sea_query::ValueType>::try_from(value.clone())
                .ok()
                .map(|dt| dt.to_rfc3339())
        }
        _ => None,
    }
}

/// Structural equality first, canonical-string equality as fallback.
/// Two NULLs of different types are equal; NULL never equals a set value.
pub fn values_equal(a: &Value, b: &Value) -> bool {
    if a == b {
        return true;
    }
    if is_null_value(a) || is_null_value(b) {
        return is_null_value(a) && is_null_value(b);
    }
    match (canonical_string(a), canonical_string(b)) {
        (Some(x), Some(y)) => x == y,
        _ => false,
    }
}

/// Convert a scalar JSON value to a SQL value.
///
/// Arrays and objects are not scalars here; membership filters and JSON
/// columns handle those shapes themselves.
pub fn json_to_value(value: &JsonValue) -> Result<Value, ValueExtractionError> {
    match value {
        JsonValue::Null => Ok(Value::String(None)),
        JsonValue::Bool(b) => Ok(Value::Bool(Some(*b))),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(Value::BigInt(Some(i)))
            } else if let Some(u) = n.as_u64() {
                Ok(Value::BigUnsigned(Some(u)))
            } else if let Some(f) = n.as_f64() {
                Ok(Value::Double(Some(f)))
            } else {
                Err(ValueExtractionError::ConversionError(
                    "unrepresentable JSON number".to_string(),
                ))
            }
        }
        JsonValue::String(s) => Ok(Value::String(Some(s.clone()))),
        JsonValue::Array(_) => Err(ValueExtractionError::ConversionError(
            "JSON array is not a scalar value".to_string(),
        )),
        JsonValue::Object(_) => Err(ValueExtractionError::ConversionError(
            "JSON object is not a scalar value".to_string(),
        )),
    }
}

/// Convert a JSON payload value to the SQL type of a baseline column value.
///
/// The baseline's variant decides the target: JSON columns take the payload
/// verbatim, temporal/uuid/decimal columns parse their string or numeric
/// forms, everything else goes through [`json_to_value`].
pub fn coerce_json_value(
    proposed: &JsonValue,
    baseline: &Value,
) -> Result<Value, ValueExtractionError> {
    if proposed.is_null() {
        return Ok(null_like(baseline));
    }
    match baseline {
        Value::Json(_) => Ok(Value::Json(Some(Box::new(proposed.clone())))),
        Value::Uuid(_) => {
            let s = proposed.as_str().ok_or_else(|| {
                ValueExtractionError::ConversionError("uuid value must be a string".to_string())
            })?;
            uuid::Uuid::parse_str(s)
                .map(Value::from)
                .map_err(|e| ValueExtractionError::ConversionError(format!("invalid uuid: {e}")))
        }
        Value::Decimal(_) => match proposed {
            JsonValue::String(s) => rust_decimal::Decimal::from_str(s)
                .map(Value::from)
                .map_err(|e| {
                    ValueExtractionError::ConversionError(format!("invalid decimal: {e}"))
                }),
            JsonValue::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(Value::from(rust_decimal::Decimal::from(i)))
                } else {
                    use rust_decimal::prelude::FromPrimitive;
                    n.as_f64()
                        .and_then(rust_decimal::Decimal::from_f64)
                        .map(Value::from)
                        .ok_or_else(|| {
                            ValueExtractionError::ConversionError(
                                "unrepresentable decimal".to_string(),
                            )
                        })
                }
            }
            _ => Err(ValueExtractionError::ConversionError(
                "decimal value must be a string or number".to_string(),
            )),
        },
        Value::ChronoDate(_) => parse_temporal(proposed, baseline, |s| {
            chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d").map(Value::from)
        }),
        Value::ChronoTime(_) => parse_temporal(proposed, baseline, |s| {
            chrono::NaiveTime::parse_from_str(s, "%H:%M:%S%.f").map(Value::from)
        }),
        Value::ChronoDateTime(_) => parse_temporal(proposed, baseline, |s| {
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f").map(Value::from)
        }),
        Value::ChronoDateTimeUtc(_)
        | Value::ChronoDateTimeLocal(_)
        | Value::ChronoDateTimeWithTimeZone(_) => parse_temporal(proposed, baseline, |s| {
            chrono::DateTime::parse_from_rfc3339(s)
                .map(|dt| Value::from(dt.with_timezone(&chrono::Utc)))
        }),
        _ => json_to_value(proposed),
    }
}

fn parse_temporal<E: std::fmt::Display>(
    proposed: &JsonValue,
    baseline: &Value,
    parse: impl Fn(&str) -> Result<Value, E>,
) -> Result<Value, ValueExtractionError> {
    let s = proposed.as_str().ok_or_else(|| {
        ValueExtractionError::ConversionError("temporal value must be a string".to_string())
    })?;
    if s.is_empty() {
        return Ok(null_like(baseline));
    }
    parse(s).map_err(|e| ValueExtractionError::ConversionError(format!("invalid timestamp: {e}")))
}

/// A NULL of the same declared type as `value`.
pub fn null_like(value: &Value) -> Value {
    match value {
        Value::Bool(_) => Value::Bool(None),
        Value::TinyInt(_) => Value::TinyInt(None),
        Value::SmallInt(_) => Value::SmallInt(None),
        Value::Int(_) => Value::Int(None),
        Value::BigInt(_) => Value::BigInt(None),
        Value::TinyUnsigned(_) => Value::TinyUnsigned(None),
        Value::SmallUnsigned(_) => Value::SmallUnsigned(None),
        Value::Unsigned(_) => Value::Unsigned(None),
        Value::BigUnsigned(_) => Value::BigUnsigned(None),
        Value::Float(_) => Value::Float(None),
        Value::Double(_) => Value::Double(None),
        Value::Char(_) => Value::Char(None),
        Value::Bytes(_) => Value::Bytes(None),
        Value::Json(_) => Value::Json(None),
        Value::Uuid(_) => Value::Uuid(None),
        Value::Decimal(_) => Value::Decimal(None),
        Value::ChronoDate(_) => Value::ChronoDate(None),
        Value::ChronoTime(_) => Value::ChronoTime(None),
        Value::ChronoDateTime(_) => Value::ChronoDateTime(None),
        Value::ChronoDateTimeUtc(_) => Value::ChronoDateTimeUtc(None),
        Value::ChronoDateTimeLocal(_) => Value::ChronoDateTimeLocal(None),
        Value::ChronoDateTimeWithTimeZone(_) => Value::ChronoDateTimeWithTimeZone(None),
        _ => Value::String(None),
    }
}
