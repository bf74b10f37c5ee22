//! CRUD operations.
//!
//! Free functions generic over the record type and the executor. Every
//! operation lowers its [`QueryOptions`] through [`crate::query`], binds
//! parameters through the shared converter, and resolves empty or ambiguous
//! outcomes through the uniform error chains: not-found and not-affected
//! resolve per-call override, then per-type declaration, then the sentinel;
//! not-unique has no per-type tier.
//!
//! Diff-based updates read the stored row first and write only the columns
//! that changed. The read and the write are separate statements; run them on
//! a [`crate::Transaction`] when that race matters.

use std::collections::BTreeMap;

use sea_query::Value;
use serde_json::Value as JsonValue;

use crate::diff::{self, UpdatePayload};
use crate::error::{resolve_not_affected, resolve_not_found, resolve_not_unique, SkiffError};
use crate::executor::SkiffExecutor;
use crate::query::build::{insert_plan, primary_key, with_default_sort};
use crate::query::{
    count_plan, delete_plan, select_plan, update_plan, with_converted_params, PageResult,
    QueryOptions,
};
use crate::record::Record;
use crate::unique::map_duplicate_key;
use crate::value::{is_zero_value, json_to_value, TryGetable};

/// Insert one record and decode the stored row.
///
/// Omitted columns and a zero-valued primary key are left to the database;
/// the row comes back via `RETURNING *`. Duplicate-key failures map to the
/// record's declared domain errors.
pub fn create<R, E>(executor: &E, record: &R, options: QueryOptions) -> Result<R, SkiffError>
where
    R: Record,
    E: SkiffExecutor + ?Sized,
{
    let (sql, values) = insert_plan(record, &options)?;
    let row = with_converted_params(&values, |params| executor.query_one(&sql, params))
        .map_err(map_duplicate_key::<R>)?;
    match row {
        Some(row) => R::from_row(&row),
        None => Err(SkiffError::Query("insert returned no row".to_string())),
    }
}

/// Count the rows the options select.
pub fn count<R, E>(executor: &E, options: QueryOptions) -> Result<u64, SkiffError>
where
    R: Record,
    E: SkiffExecutor + ?Sized,
{
    let (sql, values) = count_plan::<R>(&options)?;
    let row = with_converted_params(&values, |params| executor.query_one(&sql, params))?;
    let Some(row) = row else {
        return Ok(0);
    };
    let total: i64 = match row.columns().first() {
        Some(column) => row.try_get(column)?,
        None => 0,
    };
    Ok(total.max(0) as u64)
}

/// Fetch one row by primary key.
///
/// Zero rows resolves through the not-found chain, or `Ok(None)` under
/// `ignore_not_found`.
pub fn find_by_id<R, E>(executor: &E, id: Value, options: QueryOptions) -> Result<Option<R>, SkiffError>
where
    R: Record,
    E: SkiffExecutor + ?Sized,
{
    let pk = validate_pk::<R>(&options, &id)?;
    let options = options.where_eq(pk, id).limit(1);
    let (sql, values) = select_plan::<R>(&options)?;
    let row = with_converted_params(&values, |params| executor.query_one(&sql, params))?;
    match row {
        Some(row) => Ok(Some(R::from_row(&row)?)),
        None if options.ignore_not_found => Ok(None),
        None => Err(resolve_not_found(
            options.not_found_error.clone(),
            R::not_found_error(),
        )),
    }
}

/// Fetch the single row the options select.
///
/// The query runs unbounded so ambiguity is detectable: zero rows resolves
/// through the not-found chain, more than one through the not-unique chain.
pub fn find_one<R, E>(executor: &E, options: QueryOptions) -> Result<Option<R>, SkiffError>
where
    R: Record,
    E: SkiffExecutor + ?Sized,
{
    let (sql, values) = select_plan::<R>(&options)?;
    let rows = with_converted_params(&values, |params| executor.query_all(&sql, params))?;
    match rows.len() {
        0 if options.ignore_not_found => Ok(None),
        0 => Err(resolve_not_found(
            options.not_found_error.clone(),
            R::not_found_error(),
        )),
        1 => Ok(Some(R::from_row(&rows[0])?)),
        _ => Err(resolve_not_unique(options.not_unique_error.clone())),
    }
}

/// Fetch every row the options select.
///
/// With `first`/`last` set the plan orders by primary key, limits to one,
/// and an empty result resolves through the not-found chain.
pub fn find<R, E>(executor: &E, options: QueryOptions) -> Result<Vec<R>, SkiffError>
where
    R: Record,
    E: SkiffExecutor + ?Sized,
{
    let records = fetch_all::<R, E>(executor, &options)?;
    if records.is_empty() && (options.first || options.last) && !options.ignore_not_found {
        return Err(resolve_not_found(
            options.not_found_error.clone(),
            R::not_found_error(),
        ));
    }
    Ok(records)
}

/// Fetch the first row by primary key order.
pub fn find_first<R, E>(executor: &E, options: QueryOptions) -> Result<Option<R>, SkiffError>
where
    R: Record,
    E: SkiffExecutor + ?Sized,
{
    Ok(find(executor, options.first())?.into_iter().next())
}

/// Fetch the last row by primary key order.
pub fn find_last<R, E>(executor: &E, options: QueryOptions) -> Result<Option<R>, SkiffError>
where
    R: Record,
    E: SkiffExecutor + ?Sized,
{
    Ok(find(executor, options.last())?.into_iter().next())
}

/// As [`find`], with a default `pk DESC` order when the caller set none.
pub fn find_all<R, E>(executor: &E, options: QueryOptions) -> Result<Vec<R>, SkiffError>
where
    R: Record,
    E: SkiffExecutor + ?Sized,
{
    find(executor, with_default_sort::<R>(options))
}

/// Fetch one page plus the total row count.
///
/// The count statement runs only when a pageable is set; otherwise `total`
/// stays 0.
pub fn find_page<R, E>(executor: &E, options: QueryOptions) -> Result<PageResult<R>, SkiffError>
where
    R: Record,
    E: SkiffExecutor + ?Sized,
{
    let options = with_default_sort::<R>(options);
    let list = fetch_all::<R, E>(executor, &options)?;
    let total = if options.pageable.is_some() {
        count::<R, E>(executor, options)?
    } else {
        0
    };
    Ok(PageResult { list, total })
}

/// Project a single column into a vector of plain values.
///
/// Requires `options.pluck`; the projected column replaces any caller
/// projection.
pub fn pluck<R, T, E>(executor: &E, options: QueryOptions) -> Result<Vec<T>, SkiffError>
where
    R: Record,
    T: TryGetable,
    E: SkiffExecutor + ?Sized,
{
    let Some(column) = options.pluck.clone() else {
        return Err(SkiffError::MissingPluckColumn);
    };
    let mut options = options;
    options.select_raw = Some((column, Vec::new()));
    let (sql, values) = select_plan::<R>(&options)?;
    let rows = with_converted_params(&values, |params| executor.query_all(&sql, params))?;
    let mut plucked = Vec::with_capacity(rows.len());
    for row in &rows {
        let Some(name) = row.columns().first() else {
            return Err(SkiffError::Decode("pluck row has no columns".to_string()));
        };
        plucked.push(row.try_get::<T>(name)?);
    }
    Ok(plucked)
}

/// Bulk update of every row the options select.
///
/// Refuses to run without conditions. A `Record` payload contributes its
/// non-zero, non-key columns; `attend` restricts the applied columns.
pub fn update_all<R, E>(
    executor: &E,
    payload: &UpdatePayload<R>,
    options: QueryOptions,
) -> Result<u64, SkiffError>
where
    R: Record,
    E: SkiffExecutor + ?Sized,
{
    if !options.has_conditions() {
        return Err(SkiffError::Query(
            "refusing a bulk update without conditions".to_string(),
        ));
    }
    let assignments = payload_assignments::<R>(payload)?;
    execute_update::<R, E>(executor, &options, assignments)
}

/// Update one row by primary key.
///
/// A `Record` payload routes through the diff engine so only changed columns
/// are written; other payload shapes update directly.
pub fn update_by_id<R, E>(
    executor: &E,
    id: Value,
    payload: &UpdatePayload<R>,
    options: QueryOptions,
) -> Result<u64, SkiffError>
where
    R: Record,
    E: SkiffExecutor + ?Sized,
{
    if matches!(payload, UpdatePayload::Record(_)) {
        let (_, _, affected) = update_by_id_diff::<R, E>(executor, id, payload, options)?;
        return Ok(affected);
    }
    let pk = validate_pk::<R>(&options, &id)?;
    let options = options.where_eq(pk, id);
    let assignments = payload_assignments::<R>(payload)?;
    execute_update::<R, E>(executor, &options, assignments)
}

/// Diff-update one row by primary key, returning what changed.
///
/// Snapshots the full row (omit is ignored for the read), diffs the payload
/// against it, and writes only the changed columns. An empty diff executes
/// no SQL. Returns the applied diff and the pre-update snapshot.
pub fn update_by_id_return_changed_values<R, E>(
    executor: &E,
    id: Value,
    payload: &UpdatePayload<R>,
    options: QueryOptions,
) -> Result<(BTreeMap<String, Value>, R), SkiffError>
where
    R: Record,
    E: SkiffExecutor + ?Sized,
{
    let (changed, snapshot, _) = update_by_id_diff::<R, E>(executor, id, payload, options)?;
    Ok((changed, snapshot))
}

/// Update the single row the options select.
///
/// A `Record` payload routes through the diff engine. Otherwise the row is
/// required to exist and be unique first, then updated under the same
/// conditions.
pub fn update_one<R, E>(
    executor: &E,
    payload: &UpdatePayload<R>,
    options: QueryOptions,
) -> Result<u64, SkiffError>
where
    R: Record,
    E: SkiffExecutor + ?Sized,
{
    if matches!(payload, UpdatePayload::Record(_)) {
        let (_, _, affected) = update_one_diff::<R, E>(executor, payload, options)?;
        return Ok(affected);
    }
    if !require_one::<R, E>(executor, &options)? {
        return Ok(0);
    }
    let assignments = payload_assignments::<R>(payload)?;
    execute_update::<R, E>(executor, &options, assignments)
}

/// Diff-update the single row the options select, returning what changed.
pub fn update_one_return_changed_values<R, E>(
    executor: &E,
    payload: &UpdatePayload<R>,
    options: QueryOptions,
) -> Result<(BTreeMap<String, Value>, R), SkiffError>
where
    R: Record,
    E: SkiffExecutor + ?Sized,
{
    let (changed, snapshot, _) = update_one_diff::<R, E>(executor, payload, options)?;
    Ok((changed, snapshot))
}

/// Update the matching row, or insert the record when none matches.
///
/// Only a not-found outcome falls back to insert; everything else, including
/// a not-unique outcome, propagates.
pub fn update_one_or_create<R, E>(
    executor: &E,
    record: &R,
    options: QueryOptions,
) -> Result<R, SkiffError>
where
    R: Record,
    E: SkiffExecutor + ?Sized,
{
    let payload = UpdatePayload::record(record.clone());
    match update_one::<R, E>(executor, &payload, options.clone()) {
        Ok(_) => Ok(record.clone()),
        Err(err) if err.is_not_found() => create(executor, record, options),
        Err(err) => Err(err),
    }
}

/// Bulk hard delete of every row the options select. Refuses to run without
/// conditions.
pub fn delete_all<R, E>(executor: &E, options: QueryOptions) -> Result<u64, SkiffError>
where
    R: Record,
    E: SkiffExecutor + ?Sized,
{
    if !options.has_conditions() {
        return Err(SkiffError::Query(
            "refusing a bulk delete without conditions".to_string(),
        ));
    }
    execute_delete::<R, E>(executor, &options)
}

/// Hard delete one row by primary key.
pub fn delete_by_id<R, E>(executor: &E, id: Value, options: QueryOptions) -> Result<u64, SkiffError>
where
    R: Record,
    E: SkiffExecutor + ?Sized,
{
    let pk = validate_pk::<R>(&options, &id)?;
    let options = options.where_eq(pk, id);
    execute_delete::<R, E>(executor, &options)
}

/// Hard delete the single row the options select; requires it to exist and
/// be unique first.
pub fn delete_one<R, E>(executor: &E, options: QueryOptions) -> Result<u64, SkiffError>
where
    R: Record,
    E: SkiffExecutor + ?Sized,
{
    if !require_one::<R, E>(executor, &options)? {
        return Ok(0);
    }
    execute_delete::<R, E>(executor, &options)
}

fn fetch_all<R, E>(executor: &E, options: &QueryOptions) -> Result<Vec<R>, SkiffError>
where
    R: Record,
    E: SkiffExecutor + ?Sized,
{
    let (sql, values) = select_plan::<R>(options)?;
    let rows = with_converted_params(&values, |params| executor.query_all(&sql, params))?;
    rows.iter().map(R::from_row).collect()
}

/// Resolve and validate the primary key descriptor for a `*_by_id` call.
fn validate_pk<R: Record>(options: &QueryOptions, id: &Value) -> Result<String, SkiffError> {
    let name = primary_key::<R>(options);
    if name.is_empty() {
        return Err(SkiffError::PrimaryKeyUnset);
    }
    if !R::columns().iter().any(|c| *c == name.as_str()) {
        return Err(SkiffError::PrimaryKeyInvalid);
    }
    if is_zero_value(id) {
        return Err(SkiffError::PrimaryKeyEmpty);
    }
    Ok(name)
}

/// True when exactly one row matches; false when none does and
/// `ignore_not_found` is set.
fn require_one<R, E>(executor: &E, options: &QueryOptions) -> Result<bool, SkiffError>
where
    R: Record,
    E: SkiffExecutor + ?Sized,
{
    let (sql, values) = select_plan::<R>(options)?;
    let rows = with_converted_params(&values, |params| executor.query_all(&sql, params))?;
    match rows.len() {
        0 if options.ignore_not_found => Ok(false),
        0 => Err(resolve_not_found(
            options.not_found_error.clone(),
            R::not_found_error(),
        )),
        1 => Ok(true),
        _ => Err(resolve_not_unique(options.not_unique_error.clone())),
    }
}

fn payload_assignments<R: Record>(
    payload: &UpdatePayload<R>,
) -> Result<BTreeMap<String, Value>, SkiffError> {
    match payload {
        UpdatePayload::Record(record) => Ok(diff::record_to_fields(record)),
        UpdatePayload::Fields(fields) => Ok(fields.clone()),
        UpdatePayload::Json(JsonValue::Null) => Ok(BTreeMap::new()),
        UpdatePayload::Json(JsonValue::Object(map)) => {
            let mut fields = BTreeMap::new();
            for (key, value) in map {
                let Some(column) = R::resolve_column(key) else {
                    continue;
                };
                if column.eq_ignore_ascii_case(R::primary_key()) {
                    continue;
                }
                fields.insert(column, json_to_value(value)?);
            }
            Ok(fields)
        }
        UpdatePayload::Json(JsonValue::Array(_)) => Err(SkiffError::UpdateValueArray),
        UpdatePayload::Json(_) => Err(SkiffError::UpdateValueScalar),
    }
}

/// Shared update executor: attend allow-list, duplicate-key mapping, and the
/// must-affected chain. An empty assignment set executes nothing.
fn execute_update<R, E>(
    executor: &E,
    options: &QueryOptions,
    mut assignments: BTreeMap<String, Value>,
) -> Result<u64, SkiffError>
where
    R: Record,
    E: SkiffExecutor + ?Sized,
{
    if !options.attend.is_empty() {
        assignments.retain(|column, _| options.attend.iter().any(|a| a == column));
    }
    if assignments.is_empty() {
        log::debug!("nothing to update for {}", R::table_name());
        return Ok(0);
    }
    let (sql, values) = update_plan::<R>(options, &assignments)?;
    let affected = with_converted_params(&values, |params| executor.execute(&sql, params))
        .map_err(map_duplicate_key::<R>)?;
    if affected == 0 && options.must_affected {
        return Err(resolve_not_affected(
            options.not_affected_error.clone(),
            R::not_affected_error(),
        ));
    }
    Ok(affected)
}

fn execute_delete<R, E>(executor: &E, options: &QueryOptions) -> Result<u64, SkiffError>
where
    R: Record,
    E: SkiffExecutor + ?Sized,
{
    let (sql, values) = delete_plan::<R>(options)?;
    let affected = with_converted_params(&values, |params| executor.execute(&sql, params))?;
    if affected == 0 && options.must_affected {
        return Err(resolve_not_affected(
            options.not_affected_error.clone(),
            R::not_affected_error(),
        ));
    }
    Ok(affected)
}

fn update_by_id_diff<R, E>(
    executor: &E,
    id: Value,
    payload: &UpdatePayload<R>,
    options: QueryOptions,
) -> Result<(BTreeMap<String, Value>, R, u64), SkiffError>
where
    R: Record,
    E: SkiffExecutor + ?Sized,
{
    let pk = validate_pk::<R>(&options, &id)?;
    // Full-row snapshot; a missing row diffs against the default record
    // under ignore_not_found, as find_by_id defines it.
    let snapshot = find_by_id::<R, E>(executor, id.clone(), options.clone().ignore_omit())?
        .unwrap_or_default();
    let changed = diff::diff(&snapshot, payload)?;
    if changed.is_empty() {
        log::debug!("empty diff for {}, skipping update", R::table_name());
        return Ok((changed, snapshot, 0));
    }
    let options = options.where_eq(pk, id);
    let affected = execute_update::<R, E>(executor, &options, changed.clone())?;
    Ok((changed, snapshot, affected))
}

fn update_one_diff<R, E>(
    executor: &E,
    payload: &UpdatePayload<R>,
    options: QueryOptions,
) -> Result<(BTreeMap<String, Value>, R, u64), SkiffError>
where
    R: Record,
    E: SkiffExecutor + ?Sized,
{
    let snapshot =
        find_one::<R, E>(executor, options.clone().ignore_omit())?.unwrap_or_default();
    let changed = diff::diff(&snapshot, payload)?;
    if changed.is_empty() {
        log::debug!("empty diff for {}, skipping update", R::table_name());
        return Ok((changed, snapshot, 0));
    }
    let affected = execute_update::<R, E>(executor, &options, changed.clone())?;
    Ok((changed, snapshot, affected))
}
