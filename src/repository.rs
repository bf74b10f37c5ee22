//! Typed repository facade.
//!
//! [`Repository`] pins a record type and an executor so call sites stop
//! repeating both. Every method is a thin delegation into [`crate::crud`];
//! see [`crate::record::Record`] for declaring a record type. `remove` is
//! the soft-delete path: it stamps the record's deletion-marker column with
//! the current epoch second instead of deleting the row.

use std::collections::BTreeMap;
use std::marker::PhantomData;

use chrono::Utc;
use sea_query::Value;

use crate::crud;
use crate::diff::UpdatePayload;
use crate::error::SkiffError;
use crate::executor::SkiffExecutor;
use crate::query::build;
use crate::query::{PageResult, QueryOptions};
use crate::record::Record;

pub struct Repository<'e, R, E>
where
    R: Record,
    E: SkiffExecutor + ?Sized,
{
    executor: &'e E,
    _record: PhantomData<R>,
}

impl<'e, R, E> Repository<'e, R, E>
where
    R: Record,
    E: SkiffExecutor + ?Sized,
{
    pub fn new(executor: &'e E) -> Self {
        Self {
            executor,
            _record: PhantomData,
        }
    }

    pub fn create(&self, record: &R, options: QueryOptions) -> Result<R, SkiffError> {
        crud::create(self.executor, record, options)
    }

    pub fn count(&self, options: QueryOptions) -> Result<u64, SkiffError> {
        crud::count::<R, E>(self.executor, options)
    }

    pub fn find_by_id(
        &self,
        id: impl Into<Value>,
        options: QueryOptions,
    ) -> Result<Option<R>, SkiffError> {
        crud::find_by_id::<R, E>(self.executor, id.into(), options)
    }

    pub fn find_one(&self, options: QueryOptions) -> Result<Option<R>, SkiffError> {
        crud::find_one::<R, E>(self.executor, options)
    }

    pub fn find_all(&self, options: QueryOptions) -> Result<Vec<R>, SkiffError> {
        crud::find_all::<R, E>(self.executor, options)
    }

    pub fn find_page(&self, options: QueryOptions) -> Result<PageResult<R>, SkiffError> {
        crud::find_page::<R, E>(self.executor, options)
    }

    /// Diff-update the record against its stored row, keyed by its own
    /// primary key value. Returns the record back on success.
    pub fn update(&self, record: &R, options: QueryOptions) -> Result<R, SkiffError> {
        let pk = build::primary_key::<R>(&options);
        let id = record.get(&pk).unwrap_or(Value::BigInt(None));
        let payload = UpdatePayload::record(record.clone());
        crud::update_by_id::<R, E>(self.executor, id, &payload, options)?;
        Ok(record.clone())
    }

    pub fn update_by_id(
        &self,
        id: impl Into<Value>,
        payload: &UpdatePayload<R>,
        options: QueryOptions,
    ) -> Result<u64, SkiffError> {
        crud::update_by_id::<R, E>(self.executor, id.into(), payload, options)
    }

    pub fn update_one_or_create(
        &self,
        record: &R,
        options: QueryOptions,
    ) -> Result<R, SkiffError> {
        crud::update_one_or_create(self.executor, record, options)
    }

    /// Soft delete, keyed by the record's own primary key value.
    pub fn remove(&self, record: &R, options: QueryOptions) -> Result<u64, SkiffError> {
        let pk = build::primary_key::<R>(&options);
        let id = record.get(&pk).unwrap_or(Value::BigInt(None));
        self.remove_by_id(id, options)
    }

    /// Soft delete by primary key: stamps the declared deletion-marker
    /// column with the current epoch second, restricted to that column.
    /// Fails when the record declares no marker.
    pub fn remove_by_id(
        &self,
        id: impl Into<Value>,
        options: QueryOptions,
    ) -> Result<u64, SkiffError> {
        let Some(marker) = R::soft_delete_column() else {
            return Err(SkiffError::Query(format!(
                "{} declares no soft-delete column",
                R::table_name()
            )));
        };
        let mut assignments = BTreeMap::new();
        assignments.insert(
            marker.to_string(),
            Value::BigInt(Some(Utc::now().timestamp())),
        );
        let options = options.attend([marker]);
        crud::update_by_id::<R, E>(
            self.executor,
            id.into(),
            &UpdatePayload::fields(assignments),
            options,
        )
    }

    /// Hard delete by primary key.
    pub fn delete_by_id(
        &self,
        id: impl Into<Value>,
        options: QueryOptions,
    ) -> Result<u64, SkiffError> {
        crud::delete_by_id::<R, E>(self.executor, id.into(), options)
    }
}
