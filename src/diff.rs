//! Minimal-diff computation between a stored record and an update payload.
//!
//! Only columns that actually changed make it into the assignment map, so
//! updates touch nothing the caller did not change. Payloads arrive as a
//! whole record, an explicit column map, or loosely-typed JSON.

use std::collections::BTreeMap;

use sea_query::Value;
use serde_json::Value as JsonValue;

use crate::error::SkiffError;
use crate::record::Record;
use crate::value::{coerce_json_value, is_null_value, is_temporal_value, is_zero_value, values_equal};

/// An update payload in one of the accepted shapes.
#[derive(Clone, Debug)]
pub enum UpdatePayload<R: Record> {
    /// A full record; every column is a change candidate.
    Record(R),
    /// An explicit column to value map.
    Fields(BTreeMap<String, Value>),
    /// A JSON document; must be an object or null.
    Json(JsonValue),
}

impl<R: Record> UpdatePayload<R> {
    pub fn record(record: R) -> Self {
        UpdatePayload::Record(record)
    }

    pub fn fields(fields: BTreeMap<String, Value>) -> Self {
        UpdatePayload::Fields(fields)
    }

    pub fn json(value: JsonValue) -> Self {
        UpdatePayload::Json(value)
    }
}

/// Compute the changed columns between `snapshot` and `payload`.
///
/// Candidates are dropped when the column is the primary key, is unknown to
/// the record, proposes a NULL for a temporal column, is the zero value on
/// both sides, or equals the stored value directly or by canonical string
/// form. A JSON null payload yields an empty diff; JSON arrays and scalars
/// are rejected as [`SkiffError::UpdateValueArray`] and
/// [`SkiffError::UpdateValueScalar`].
pub fn diff<R: Record>(
    snapshot: &R,
    payload: &UpdatePayload<R>,
) -> Result<BTreeMap<String, Value>, SkiffError> {
    let mut changed = BTreeMap::new();
    match payload {
        UpdatePayload::Record(proposed) => {
            for column in R::columns() {
                let Some(baseline) = snapshot.get(column) else {
                    continue;
                };
                let Some(value) = proposed.get(column) else {
                    continue;
                };
                if keep_candidate::<R>(column, &baseline, &value) {
                    changed.insert((*column).to_string(), value);
                }
            }
        }
        UpdatePayload::Fields(fields) => {
            for (key, value) in fields {
                let Some(column) = R::resolve_column(key) else {
                    continue;
                };
                let Some(baseline) = snapshot.get(&column) else {
                    continue;
                };
                if keep_candidate::<R>(&column, &baseline, value) {
                    changed.insert(column, value.clone());
                }
            }
        }
        UpdatePayload::Json(JsonValue::Null) => {}
        UpdatePayload::Json(JsonValue::Object(map)) => {
            for (key, proposed) in map {
                let Some(column) = R::resolve_column(key) else {
                    continue;
                };
                let Some(baseline) = snapshot.get(&column) else {
                    continue;
                };
                let value = coerce_json_value(proposed, &baseline)?;
                if keep_candidate::<R>(&column, &baseline, &value) {
                    changed.insert(column, value);
                }
            }
        }
        UpdatePayload::Json(JsonValue::Array(_)) => return Err(SkiffError::UpdateValueArray),
        UpdatePayload::Json(_) => return Err(SkiffError::UpdateValueScalar),
    }
    Ok(changed)
}

fn keep_candidate<R: Record>(column: &str, baseline: &Value, proposed: &Value) -> bool {
    if column.eq_ignore_ascii_case(R::primary_key()) {
        return false;
    }
    if is_temporal_value(proposed) && is_null_value(proposed) {
        return false;
    }
    if is_zero_value(baseline) && is_zero_value(proposed) {
        return false;
    }
    !values_equal(baseline, proposed)
}

/// Collapse a record into a column map of its non-zero, non-key columns.
/// Bulk updates use this when handed a whole record instead of a map.
pub(crate) fn record_to_fields<R: Record>(record: &R) -> BTreeMap<String, Value> {
    let pk = R::primary_key();
    let mut fields = BTreeMap::new();
    for column in R::columns() {
        if column.eq_ignore_ascii_case(pk) {
            continue;
        }
        let Some(value) = record.get(column) else {
            continue;
        };
        if is_zero_value(&value) {
            continue;
        }
        fields.insert((*column).to_string(), value);
    }
    fields
}
