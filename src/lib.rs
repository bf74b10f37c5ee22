//! # Skiff
//!
//! Declarative CRUD engine for PostgreSQL on the `may` runtime.
//!
//! Records declare their schema through [`Record`]; call sites describe what
//! they want through [`QueryOptions`]; the engine lowers that to SQL, runs it
//! through a [`SkiffExecutor`], and resolves empty or ambiguous outcomes into
//! uniform errors. Updates can diff a payload against the stored row and
//! write only what changed.
//!
//! See [README on GitHub](https://github.com/microscaler/skiff) for the full
//! tour.

pub mod config;
pub mod connection;
pub mod crud;
pub mod diff;
pub mod error;
pub mod executor;
pub mod query;
pub mod record;
pub mod repository;
pub mod transaction;
pub mod unique;
pub mod value;

mod case;
#[cfg(test)]
mod tests_cfg;

pub use config::DatabaseConfig;
pub use connection::{connect, ConnectionError};
pub use diff::{diff, UpdatePayload};
pub use error::{DomainError, SkiffError};
pub use executor::{MayPostgresExecutor, SkiffExecutor};
pub use query::{
    FilterFn, FilterValue, JoinKind, PageResult, Pageable, QueryOptions, WhereSpec,
};
pub use record::{FromRow, Record, UniqueIndexEntry};
pub use repository::Repository;
pub use transaction::Transaction;
pub use unique::map_duplicate_key;
pub use value::{SqlRow, TryGetable, TryGetableMany, ValueExtractionError};
