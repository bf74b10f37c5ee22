//! Bind-parameter conversion.
//!
//! sea-query builds produce `Value` lists while `may_postgres` wants
//! `&dyn ToSql` slices. The conversion is two-pass: values are first
//! collected into typed vectors, then referenced in build order, so the
//! borrows stay alive for the closure call.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use may_postgres::types::ToSql;
use sea_query::Value;

use crate::error::SkiffError;

/// Convert sea-query values to `may_postgres` parameters and run a closure.
///
/// # Errors
///
/// Returns `SkiffError::Query` when a value has no driver representation,
/// or whatever error the closure itself returns.
pub fn with_converted_params<F, R>(values: &[Value], f: F) -> Result<R, SkiffError>
where
    F: FnOnce(&[&dyn ToSql]) -> Result<R, SkiffError>,
{
    let mut bools: Vec<bool> = Vec::new();
    let mut ints: Vec<i32> = Vec::new();
    let mut big_ints: Vec<i64> = Vec::new();
    let mut floats: Vec<f32> = Vec::new();
    let mut doubles: Vec<f64> = Vec::new();
    let mut strings: Vec<String> = Vec::new();
    let mut bytes: Vec<Vec<u8>> = Vec::new();
    let mut uuids: Vec<uuid::Uuid> = Vec::new();
    let mut decimals: Vec<rust_decimal::Decimal> = Vec::new();
    let mut dates: Vec<NaiveDate> = Vec::new();
    let mut times: Vec<NaiveTime> = Vec::new();
    let mut date_times: Vec<NaiveDateTime> = Vec::new();
    let mut utc_date_times: Vec<DateTime<Utc>> = Vec::new();
    let mut nulls: Vec<Option<i32>> = Vec::new();

    // First pass: collect all values into typed vectors
    for value in values.iter() {
        match value {
            Value::Bool(Some(b)) => bools.push(*b),
            Value::TinyInt(Some(i)) => ints.push(i32::from(*i)),
            Value::SmallInt(Some(i)) => ints.push(i32::from(*i)),
            Value::Int(Some(i)) => ints.push(*i),
            Value::BigInt(Some(i)) => big_ints.push(*i),
            Value::TinyUnsigned(Some(u)) => ints.push(i32::from(*u)),
            Value::SmallUnsigned(Some(u)) => ints.push(i32::from(*u)),
            Value::Unsigned(Some(u)) => big_ints.push(i64::from(*u)),
            Value::BigUnsigned(Some(u)) => {
                if *u > i64::MAX as u64 {
                    return Err(SkiffError::Query(format!(
                        "unsigned value {u} exceeds i64::MAX, cannot bind"
                    )));
                }
                big_ints.push(*u as i64);
            }
            Value::Float(Some(x)) => floats.push(*x),
            Value::Double(Some(x)) => doubles.push(*x),
            Value::String(Some(s)) => strings.push(s.clone()),
            Value::Bytes(Some(b)) => bytes.push(b.clone()),
            Value::Json(Some(j)) => {
                strings.push(serde_json::to_string(&**j).map_err(|e| {
                    SkiffError::Query(format!("failed to serialize JSON parameter: {e}"))
                })?);
            }
            Value::Uuid(Some(_)) => uuids.push(extract(value)?),
            Value::Decimal(Some(_)) => decimals.push(extract(value)?),
            Value::ChronoDate(Some(_)) => dates.push(extract(value)?),
            Value::ChronoTime(Some(_)) => times.push(extract(value)?),
            Value::ChronoDateTime(Some(_)) => date_times.push(extract(value)?),
            Value::ChronoDateTimeUtc(Some(_)) => utc_date_times.push(extract(value)?),
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
            | Value::String(None)
            | Value::Bytes(None)
            | Value::Json(None)
            | Value::Uuid(None)
            | Value::Decimal(None)
            | Value::ChronoDate(None)
            | Value::ChronoTime(None)
            | Value::ChronoDateTime(None)
            | Value::ChronoDateTimeUtc(None) => nulls.push(None),
            other => {
                return Err(SkiffError::Query(format!(
                    "unsupported parameter value: {other:?}"
                )));
            }
        }
    }

    // Second pass: create references to the stored values
    let mut bool_idx = 0;
    let mut int_idx = 0;
    let mut big_int_idx = 0;
    let mut float_idx = 0;
    let mut double_idx = 0;
    let mut string_idx = 0;
    let mut byte_idx = 0;
    let mut uuid_idx = 0;
    let mut decimal_idx = 0;
    let mut date_idx = 0;
    let mut time_idx = 0;
    let mut date_time_idx = 0;
    let mut utc_date_time_idx = 0;
    let mut null_idx = 0;

    let mut params: Vec<&dyn ToSql> = Vec::with_capacity(values.len());

    for value in values.iter() {
        match value {
            Value::Bool(Some(_)) => {
                params.push(&bools[bool_idx] as &dyn ToSql);
                bool_idx += 1;
            }
            Value::TinyInt(Some(_))
            | Value::SmallInt(Some(_))
            | Value::Int(Some(_))
            | Value::TinyUnsigned(Some(_))
            | Value::SmallUnsigned(Some(_)) => {
                params.push(&ints[int_idx] as &dyn ToSql);
                int_idx += 1;
            }
            Value::BigInt(Some(_)) | Value::Unsigned(Some(_)) | Value::BigUnsigned(Some(_)) => {
                params.push(&big_ints[big_int_idx] as &dyn ToSql);
                big_int_idx += 1;
            }
            Value::Float(Some(_)) => {
                params.push(&floats[float_idx] as &dyn ToSql);
                float_idx += 1;
            }
            Value::Double(Some(_)) => {
                params.push(&doubles[double_idx] as &dyn ToSql);
                double_idx += 1;
            }
            Value::String(Some(_)) | Value::Json(Some(_)) => {
                params.push(&strings[string_idx] as &dyn ToSql);
                string_idx += 1;
            }
            Value::Bytes(Some(_)) => {
                params.push(&bytes[byte_idx] as &dyn ToSql);
                byte_idx += 1;
            }
            Value::Uuid(Some(_)) => {
                params.push(&uuids[uuid_idx] as &dyn ToSql);
                uuid_idx += 1;
            }
            Value::Decimal(Some(_)) => {
                params.push(&decimals[decimal_idx] as &dyn ToSql);
                decimal_idx += 1;
            }
            Value::ChronoDate(Some(_)) => {
                params.push(&dates[date_idx] as &dyn ToSql);
                date_idx += 1;
            }
            Value::ChronoTime(Some(_)) => {
                params.push(&times[time_idx] as &dyn ToSql);
                time_idx += 1;
            }
            Value::ChronoDateTime(Some(_)) => {
                params.push(&date_times[date_time_idx] as &dyn ToSql);
                date_time_idx += 1;
            }
            Value::ChronoDateTimeUtc(Some(_)) => {
                params.push(&utc_date_times[utc_date_time_idx] as &dyn ToSql);
                utc_date_time_idx += 1;
            }
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
            | Value::String(None)
            | Value::Bytes(None)
            | Value::Json(None)
            | Value::Uuid(None)
            | Value::Decimal(None)
            | Value::ChronoDate(None)
            | Value::ChronoTime(None)
            | Value::ChronoDateTime(None)
            | Value::ChronoDateTimeUtc(None) => {
                params.push(&nulls[null_idx] as &dyn ToSql);
                null_idx += 1;
            }
            other => {
                return Err(SkiffError::Query(format!(
                    "unsupported parameter value: {other:?}"
                )));
            }
        }
    }

    f(&params)
}

fn extract<T>(value: &Value) -> Result<T, SkiffError>
where
    T: sea_query::ValueType,
{
    T::try_from(value.clone())
        .map_err(|_| SkiffError::Query(format!("unsupported parameter value: {value:?}")))
}
