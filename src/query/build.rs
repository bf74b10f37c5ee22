//! Lowering from options to SQL plans.
//!
//! The lowering order is fixed: projection, joins, where/or clauses, group,
//! sort, pagination, the automatic soft-delete predicate, and declarative
//! filters last. Update and delete plans reuse the condition lowering
//! without projection or ordering, and the count plan wraps the filtered
//! query in a `COUNT(*)` subquery.

use std::collections::BTreeMap;

use sea_query::{
    Asterisk, Condition, DynIden, Expr, ExprTrait, JoinType, Order, PostgresQueryBuilder, Query,
    SelectStatement, Value, Values,
};

use crate::error::SkiffError;
use crate::record::Record;
use crate::value::{is_null_value, is_zero_value};

use super::filter::{column_ref, compile_filters};
use super::options::{JoinKind, QueryOptions, WhereSpec};

/// Effective table name: explicit override or the record's own.
pub(crate) fn table_name<R: Record>(opts: &QueryOptions) -> String {
    opts.table
        .clone()
        .unwrap_or_else(|| R::table_name().to_string())
}

/// Effective primary key column: explicit override or the record's own.
pub(crate) fn primary_key<R: Record>(opts: &QueryOptions) -> String {
    opts.primary_key
        .clone()
        .unwrap_or_else(|| R::primary_key().to_string())
}

/// Build the full SELECT statement for one call.
pub(crate) fn select_statement<R: Record>(
    opts: &QueryOptions,
) -> Result<SelectStatement, SkiffError> {
    let table = table_name::<R>(opts);
    let mut query = Query::select();
    query.from(DynIden::from(table.clone()));

    apply_projection::<R>(&mut query, opts);
    apply_joins(&mut query, opts);
    if let Some(condition) = combined_condition::<R>(opts, &table)? {
        query.cond_where(condition);
    }
    apply_group(&mut query, opts);

    // Sorting applies only when the first entry is non-empty; later empty
    // entries are skipped.
    let mut ordered = false;
    if opts
        .sorts
        .first()
        .map(|s| !s.trim().is_empty())
        .unwrap_or(false)
    {
        for sort in &opts.sorts {
            if sort.trim().is_empty() {
                continue;
            }
            apply_order(&mut query, sort);
            ordered = true;
        }
    }

    // Pagination: size > 0 derives limit and offset; the pageable's own sort
    // applies only when no explicit sort was set.
    let mut limit: Option<u64> = None;
    let mut offset: Option<u64> = None;
    if let Some(pageable) = &opts.pageable {
        if pageable.size > 0 {
            limit = Some(pageable.size);
            offset = Some(pageable.page.saturating_sub(1) * pageable.size);
        }
        if !ordered && !pageable.sort.trim().is_empty() {
            apply_order(&mut query, &pageable.sort);
        }
    }
    // Explicit non-zero limit and offset override the derived values
    if let Some(l) = opts.limit {
        if l > 0 {
            limit = Some(l);
        }
    }
    if let Some(o) = opts.offset {
        if o > 0 {
            offset = Some(o);
        }
    }

    if opts.first || opts.last {
        let pk = primary_key::<R>(opts);
        let order = if opts.last { Order::Desc } else { Order::Asc };
        query.order_by(column_ref(&pk), order);
        limit = Some(1);
    }

    if let Some(l) = limit {
        query.limit(l);
    }
    if let Some(o) = offset {
        query.offset(o);
    }

    Ok(query)
}

/// Build the SELECT plan: SQL plus values to bind.
pub fn select_plan<R: Record>(opts: &QueryOptions) -> Result<(String, Values), SkiffError> {
    Ok(select_statement::<R>(opts)?.build(PostgresQueryBuilder))
}

/// Build the COUNT plan.
///
/// The filtered query runs without ordering or pagination, wrapped in a
/// `COUNT(*)` subquery so grouped queries count grouped rows.
pub fn count_plan<R: Record>(opts: &QueryOptions) -> Result<(String, Values), SkiffError> {
    let table = table_name::<R>(opts);
    let mut query = Query::select();
    query.from(DynIden::from(table.clone()));

    apply_projection::<R>(&mut query, opts);
    apply_joins(&mut query, opts);
    if let Some(condition) = combined_condition::<R>(opts, &table)? {
        query.cond_where(condition);
    }
    apply_group(&mut query, opts);

    let (sql, values) = query.build(PostgresQueryBuilder);
    let count_sql = format!("SELECT COUNT(*) FROM ({sql}) AS count_subquery");
    Ok((count_sql, values))
}

/// Build the UPDATE plan for an explicit column→value assignment map.
pub fn update_plan<R: Record>(
    opts: &QueryOptions,
    assignments: &BTreeMap<String, Value>,
) -> Result<(String, Values), SkiffError> {
    let table = table_name::<R>(opts);
    let mut query = Query::update();
    query.table(DynIden::from(table.clone()));
    for (column, value) in assignments {
        query.value(DynIden::from(column.clone()), Expr::val(value.clone()));
    }
    if let Some(condition) = combined_condition::<R>(opts, &table)? {
        query.cond_where(condition);
    }
    Ok(query.build(PostgresQueryBuilder))
}

/// Build the DELETE plan.
pub fn delete_plan<R: Record>(opts: &QueryOptions) -> Result<(String, Values), SkiffError> {
    let table = table_name::<R>(opts);
    let mut query = Query::delete();
    query.from_table(DynIden::from(table.clone()));
    if let Some(condition) = combined_condition::<R>(opts, &table)? {
        query.cond_where(condition);
    }
    Ok(query.build(PostgresQueryBuilder))
}

/// Build the INSERT plan for one record, returning every column.
///
/// Omitted columns are skipped, as is a zero-valued primary key so the
/// database can assign it.
pub(crate) fn insert_plan<R: Record>(
    record: &R,
    opts: &QueryOptions,
) -> Result<(String, Values), SkiffError> {
    let table = table_name::<R>(opts);
    let pk = primary_key::<R>(opts);

    let mut columns: Vec<DynIden> = Vec::new();
    let mut values: Vec<Value> = Vec::new();
    for column in R::columns() {
        if !opts.ignore_omit && opts.omit.iter().any(|o| o == column) {
            continue;
        }
        let Some(value) = record.get(column) else {
            continue;
        };
        if *column == pk && is_zero_value(&value) {
            continue;
        }
        columns.push(DynIden::from((*column).to_string()));
        values.push(value);
    }
    if columns.is_empty() {
        return Err(SkiffError::Query("no columns to insert".to_string()));
    }

    let mut query = Query::insert();
    query.into_table(DynIden::from(table));
    query.columns(columns);
    // Arity always matches: columns and values are pushed pairwise
    query.values_panic(values);
    query.returning_col(Asterisk);
    Ok(query.build(PostgresQueryBuilder))
}

/// Default ordering for list reads: primary key descending, unless any sort
/// was requested explicitly or via the pageable.
pub(crate) fn with_default_sort<R: Record>(mut opts: QueryOptions) -> QueryOptions {
    let pageable_sorted = opts
        .pageable
        .as_ref()
        .map(|p| !p.sort.trim().is_empty())
        .unwrap_or(false);
    if opts.sorts.is_empty() && !pageable_sorted {
        let pk = primary_key::<R>(&opts);
        opts.sorts.push(format!("{pk} desc"));
    }
    opts
}

fn apply_projection<R: Record>(query: &mut SelectStatement, opts: &QueryOptions) {
    if let Some((sql, args)) = &opts.select_raw {
        query.expr(raw_expr(sql, args));
        return;
    }
    let kept: Vec<&str> = if opts.ignore_omit || opts.omit.is_empty() {
        Vec::new()
    } else {
        R::columns()
            .iter()
            .copied()
            .filter(|column| !opts.omit.iter().any(|o| o == column))
            .collect()
    };
    if kept.is_empty() {
        query.column(Asterisk);
    } else {
        for column in kept {
            query.column(DynIden::from(column.to_string()));
        }
    }
}

fn apply_joins(query: &mut SelectStatement, opts: &QueryOptions) {
    for join in &opts.joins {
        let kind = match join.kind {
            JoinKind::Inner => JoinType::InnerJoin,
            JoinKind::Left => JoinType::LeftJoin,
            JoinKind::Right => JoinType::RightJoin,
        };
        query.join(
            kind,
            DynIden::from(join.table.clone()),
            raw_expr(&join.on, &join.args),
        );
    }
}

fn apply_group(query: &mut SelectStatement, opts: &QueryOptions) {
    if let Some(group) = &opts.group {
        if is_ident_path(group) {
            query.group_by_col(column_ref(group));
        } else {
            query.add_group_by([Expr::cust(group.clone())]);
        }
    }
}

/// Conditions shared by select, update, and delete plans: where/or clauses,
/// the automatic soft-delete predicate, then declarative filters last.
fn combined_condition<R: Record>(
    opts: &QueryOptions,
    table: &str,
) -> Result<Option<Condition>, SkiffError> {
    let mut parts: Vec<Condition> = Vec::new();

    if !opts.wheres.is_empty() || !opts.ors.is_empty() {
        let mut wheres = Condition::all();
        for spec in &opts.wheres {
            wheres = wheres.add(clause_condition(spec));
        }
        if opts.ors.is_empty() {
            parts.push(wheres);
        } else {
            let mut any = Condition::any();
            if !opts.wheres.is_empty() {
                any = any.add(wheres);
            }
            for spec in &opts.ors {
                any = any.add(clause_condition(spec));
            }
            parts.push(any);
        }
    }

    if !opts.with_deleted {
        if let Some(marker) = R::soft_delete_column() {
            let qualified = (
                DynIden::from(table.to_string()),
                DynIden::from(marker.to_string()),
            );
            parts.push(Condition::all().add(Expr::col(qualified).eq(Expr::val(0i64))));
        }
    }

    if let Some(filtered) = compile_filters(&opts.filters)? {
        parts.push(filtered);
    }

    if parts.is_empty() {
        return Ok(None);
    }
    let mut all = Condition::all();
    for part in parts {
        all = all.add(part);
    }
    Ok(Some(all))
}

fn clause_condition(spec: &WhereSpec) -> Condition {
    match spec {
        WhereSpec::Raw { sql, args } => Condition::all().add(raw_expr(sql, args)),
        WhereSpec::Fields(fields) => {
            let mut all = Condition::all();
            for (column, value) in fields {
                let col = Expr::col(column_ref(column));
                if is_null_value(value) {
                    all = all.add(col.is_null());
                } else {
                    all = all.add(col.eq(Expr::val(value.clone())));
                }
            }
            all
        }
    }
}

fn raw_expr(sql: &str, args: &[Value]) -> Expr {
    if args.is_empty() {
        Expr::cust(sql.to_string())
    } else {
        Expr::cust_with_values(sql.to_string(), args.to_vec())
    }
}

fn apply_order(query: &mut SelectStatement, sort: &str) {
    let (column, order) = parse_sort(sort);
    if is_ident_path(column) {
        query.order_by(column_ref(column), order);
    } else {
        query.order_by_expr(Expr::cust(column.to_string()), order);
    }
}

fn parse_sort(sort: &str) -> (&str, Order) {
    let trimmed = sort.trim();
    if let Some(rest) = strip_suffix_ci(trimmed, " desc") {
        return (rest.trim_end(), Order::Desc);
    }
    if let Some(rest) = strip_suffix_ci(trimmed, " asc") {
        return (rest.trim_end(), Order::Asc);
    }
    (trimmed, Order::Asc)
}

fn strip_suffix_ci<'a>(s: &'a str, suffix: &str) -> Option<&'a str> {
    if s.len() < suffix.len() {
        return None;
    }
    let split = s.len() - suffix.len();
    let head = s.get(..split)?;
    let tail = s.get(split..)?;
    if tail.eq_ignore_ascii_case(suffix) {
        Some(head)
    } else {
        None
    }
}

fn is_plain_ident(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn is_ident_path(s: &str) -> bool {
    match s.split_once('.') {
        Some((table, column)) => is_plain_ident(table) && is_plain_ident(column),
        None => is_plain_ident(s),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::options::Pageable;
    use crate::tests_cfg::{SoftUser, TestUser};

    fn values_of(values: &Values) -> Vec<Value> {
        values.iter().cloned().collect()
    }

    #[test]
    fn test_bare_select() {
        let (sql, values) = select_plan::<TestUser>(&QueryOptions::new()).unwrap();
        assert_eq!(sql, r#"SELECT * FROM "users""#);
        assert!(values_of(&values).is_empty());
    }

    #[test]
    fn test_omit_projects_remaining_columns() {
        let opts = QueryOptions::new().omit(["created_at", "status"]);
        let (sql, _) = select_plan::<TestUser>(&opts).unwrap();
        assert!(sql.contains(r#""id""#), "sql: {sql}");
        assert!(sql.contains(r#""name""#), "sql: {sql}");
        assert!(!sql.contains("created_at"), "sql: {sql}");

        let (sql, _) = select_plan::<TestUser>(&opts.ignore_omit()).unwrap();
        assert!(sql.starts_with("SELECT *"), "sql: {sql}");
    }

    #[test]
    fn test_select_raw_binds_args() {
        let opts = QueryOptions::new().select_raw("id, name, age + ? AS age_next", vec![1.into()]);
        let (sql, values) = select_plan::<TestUser>(&opts).unwrap();
        assert!(sql.contains("age + $1 AS age_next"), "sql: {sql}");
        assert_eq!(values_of(&values).len(), 1);
    }

    #[test]
    fn test_where_and_or_grouping() {
        let opts = QueryOptions::new()
            .where_raw("age >= ?", vec![18.into()])
            .where_eq("status", 1i16)
            .or_raw("vip = ?", vec![true.into()]);
        let (sql, values) = select_plan::<TestUser>(&opts).unwrap();
        assert!(
            sql.contains("(age >= $1 AND \"status\" = $2) OR (vip = $3)")
                || sql.contains("(age >= $1 AND \"status\" = $2) OR vip = $3"),
            "sql: {sql}"
        );
        assert_eq!(values_of(&values).len(), 3);
    }

    #[test]
    fn test_where_fields_null_is_null() {
        let opts = QueryOptions::new().where_eq("age", Value::BigInt(None));
        let (sql, _) = select_plan::<TestUser>(&opts).unwrap();
        assert!(sql.contains(r#""age" IS NULL"#), "sql: {sql}");
    }

    #[test]
    fn test_joins_render_in_order() {
        let opts = QueryOptions::new()
            .left_join("orders", "users.id = orders.user_id", vec![])
            .inner_join("teams", "users.team_id = teams.id AND teams.kind = ?", vec![2.into()]);
        let (sql, values) = select_plan::<TestUser>(&opts).unwrap();
        assert!(
            sql.contains(r#"LEFT JOIN "orders" ON users.id = orders.user_id"#),
            "sql: {sql}"
        );
        assert!(sql.contains(r#"INNER JOIN "teams""#), "sql: {sql}");
        assert_eq!(values_of(&values).len(), 1);
    }

    #[test]
    fn test_sort_quirk_first_entry_empty_disables_sorting() {
        let opts = QueryOptions::new().sort("").sort("name desc");
        let (sql, _) = select_plan::<TestUser>(&opts).unwrap();
        assert!(!sql.contains("ORDER BY"), "sql: {sql}");

        let opts = QueryOptions::new().sort("name desc").sort("").sort("id");
        let (sql, _) = select_plan::<TestUser>(&opts).unwrap();
        assert!(
            sql.contains(r#"ORDER BY "name" DESC, "id" ASC"#),
            "sql: {sql}"
        );
    }

    #[test]
    fn test_pagination_derives_limit_offset() {
        let opts = QueryOptions::new().page(Pageable::new(3, 20));
        let (sql, _) = select_plan::<TestUser>(&opts).unwrap();
        assert!(sql.contains("LIMIT 20"), "sql: {sql}");
        assert!(sql.contains("OFFSET 40"), "sql: {sql}");
    }

    #[test]
    fn test_pageable_sort_only_without_explicit_sort() {
        let pageable = Pageable::new(1, 10).sort("age asc");
        let opts = QueryOptions::new().page(pageable.clone());
        let (sql, _) = select_plan::<TestUser>(&opts).unwrap();
        assert!(sql.contains(r#"ORDER BY "age" ASC"#), "sql: {sql}");

        let opts = QueryOptions::new().sort("name desc").page(pageable);
        let (sql, _) = select_plan::<TestUser>(&opts).unwrap();
        assert!(sql.contains(r#"ORDER BY "name" DESC"#), "sql: {sql}");
        assert!(!sql.contains(r#""age" ASC"#), "sql: {sql}");
    }

    #[test]
    fn test_explicit_limit_overrides_pagination() {
        let opts = QueryOptions::new().page(Pageable::new(2, 10)).limit(5);
        let (sql, _) = select_plan::<TestUser>(&opts).unwrap();
        assert!(sql.contains("LIMIT 5"), "sql: {sql}");
        assert!(sql.contains("OFFSET 10"), "sql: {sql}");
    }

    #[test]
    fn test_first_last_order_by_primary_key() {
        let (sql, _) = select_plan::<TestUser>(&QueryOptions::new().first()).unwrap();
        assert!(sql.contains(r#"ORDER BY "id" ASC"#), "sql: {sql}");
        assert!(sql.contains("LIMIT 1"), "sql: {sql}");

        let (sql, _) = select_plan::<TestUser>(&QueryOptions::new().last()).unwrap();
        assert!(sql.contains(r#"ORDER BY "id" DESC"#), "sql: {sql}");
        assert!(sql.contains("LIMIT 1"), "sql: {sql}");
    }

    #[test]
    fn test_soft_delete_predicate() {
        let (sql, values) = select_plan::<SoftUser>(&QueryOptions::new()).unwrap();
        assert!(
            sql.contains(r#""soft_users"."deleted" = $1"#),
            "sql: {sql}"
        );
        assert_eq!(values_of(&values), vec![Value::BigInt(Some(0))]);

        let (sql, _) = select_plan::<SoftUser>(&QueryOptions::new().with_deleted()).unwrap();
        assert!(!sql.contains("deleted"), "sql: {sql}");
    }

    #[test]
    fn test_filters_append_after_soft_delete() {
        let opts = QueryOptions::new().filter("status", serde_json::json!(1));
        let (sql, _) = select_plan::<SoftUser>(&opts).unwrap();
        let deleted_pos = sql.find("deleted").unwrap();
        let status_pos = sql.find("status").unwrap();
        assert!(deleted_pos < status_pos, "sql: {sql}");
    }

    #[test]
    fn test_count_plan_strips_ordering_and_pagination() {
        let opts = QueryOptions::new()
            .where_raw("age >= ?", vec![18.into()])
            .sort("name desc")
            .page(Pageable::new(2, 10));
        let (sql, values) = count_plan::<TestUser>(&opts).unwrap();
        assert!(sql.starts_with("SELECT COUNT(*) FROM (SELECT"), "sql: {sql}");
        assert!(sql.ends_with("AS count_subquery"), "sql: {sql}");
        assert!(!sql.contains("ORDER BY"), "sql: {sql}");
        assert!(!sql.contains("LIMIT"), "sql: {sql}");
        assert_eq!(values_of(&values).len(), 1);
    }

    #[test]
    fn test_group_by_column_and_raw() {
        let opts = QueryOptions::new().group("status");
        let (sql, _) = select_plan::<TestUser>(&opts).unwrap();
        assert!(sql.contains(r#"GROUP BY "status""#), "sql: {sql}");

        let opts = QueryOptions::new().group("status, age");
        let (sql, _) = select_plan::<TestUser>(&opts).unwrap();
        assert!(sql.contains("GROUP BY status, age"), "sql: {sql}");
    }

    #[test]
    fn test_update_plan_sets_assignments() {
        let mut assignments = BTreeMap::new();
        assignments.insert("name".to_string(), Value::String(Some("bob".to_string())));
        assignments.insert("age".to_string(), Value::BigInt(Some(30)));
        let opts = QueryOptions::new().where_eq("id", 7i64);
        let (sql, values) = update_plan::<TestUser>(&opts, &assignments).unwrap();
        assert!(
            sql.starts_with(r#"UPDATE "users" SET "age" = $1, "name" = $2"#),
            "sql: {sql}"
        );
        assert!(sql.contains(r#""id" = $3"#), "sql: {sql}");
        assert_eq!(values_of(&values).len(), 3);
    }

    #[test]
    fn test_delete_plan() {
        let opts = QueryOptions::new().where_eq("id", 7i64);
        let (sql, _) = delete_plan::<TestUser>(&opts).unwrap();
        assert!(sql.starts_with(r#"DELETE FROM "users""#), "sql: {sql}");
        assert!(sql.contains(r#""id" = $1"#), "sql: {sql}");
    }

    #[test]
    fn test_insert_plan_skips_zero_primary_key() {
        let user = TestUser {
            id: 0,
            name: "alice".to_string(),
            ..TestUser::default()
        };
        let (sql, _) = insert_plan(&user, &QueryOptions::new()).unwrap();
        assert!(!sql.contains(r#""id""#), "sql: {sql}");
        assert!(sql.contains("RETURNING *"), "sql: {sql}");

        let user = TestUser {
            id: 42,
            name: "alice".to_string(),
            ..TestUser::default()
        };
        let (sql, _) = insert_plan(&user, &QueryOptions::new()).unwrap();
        assert!(sql.contains(r#""id""#), "sql: {sql}");
    }

    #[test]
    fn test_insert_plan_honors_omit() {
        let user = TestUser {
            id: 1,
            name: "alice".to_string(),
            ..TestUser::default()
        };
        let opts = QueryOptions::new().omit(["name"]);
        let (sql, _) = insert_plan(&user, &opts).unwrap();
        assert!(!sql.contains(r#""name""#), "sql: {sql}");
    }

    #[test]
    fn test_default_sort_applies_only_without_sorts() {
        let opts = with_default_sort::<TestUser>(QueryOptions::new());
        assert_eq!(opts.sorts, vec!["id desc"]);

        let opts = with_default_sort::<TestUser>(QueryOptions::new().sort("name"));
        assert_eq!(opts.sorts, vec!["name"]);

        let pageable = Pageable::new(1, 10).sort("age");
        let opts = with_default_sort::<TestUser>(QueryOptions::new().page(pageable));
        assert!(opts.sorts.is_empty());
    }

    #[test]
    fn test_table_override() {
        let opts = QueryOptions::new().table("users_archive");
        let (sql, _) = select_plan::<TestUser>(&opts).unwrap();
        assert!(sql.contains(r#"FROM "users_archive""#), "sql: {sql}");
    }
}
