//! Error types for skiff.
//!
//! Every operation returns `SkiffError`. Outcome classes (not-found,
//! not-unique, not-affected) exist in two forms: the generic sentinel variant
//! and a domain-mapped variant carrying an application-declared error. The
//! classification helpers treat both forms as the same class, so a mapped
//! error still answers "is this not-found?" correctly.

use may_postgres::Error as PostgresError;
use std::fmt;
use std::sync::Arc;

use crate::value::try_getable::ValueExtractionError;

/// Cloneable handle to an application-declared domain error.
pub type DomainError = Arc<dyn std::error::Error + Send + Sync + 'static>;

/// Unified error type for all skiff operations
#[derive(Debug)]
pub enum SkiffError {
    /// `PostgreSQL` error from `may_postgres`
    Postgres(PostgresError),
    /// Query building or plan lowering error
    Query(String),
    /// Row decoding error
    Decode(String),
    /// No primary key column is declared or resolvable
    PrimaryKeyUnset,
    /// The resolved primary key name is not a column of the record
    PrimaryKeyInvalid,
    /// The primary key value is missing or the type's zero value
    PrimaryKeyEmpty,
    /// Generic not-found sentinel
    NotFound,
    /// Not-found mapped to a per-call or per-type domain error
    NotFoundAs(DomainError),
    /// More than one row matched where exactly one was required
    NotUnique,
    /// Not-unique mapped to a per-call domain error
    NotUniqueAs(DomainError),
    /// Zero rows affected under the must-affected flag
    NotAffected,
    /// Not-affected mapped to a per-call or per-type domain error
    NotAffectedAs(DomainError),
    /// Duplicate-key violation mapped through the record's unique-index table
    DuplicateKey {
        /// Index name extracted from the driver message, normalized
        index: String,
        /// The domain error declared for that index
        error: DomainError,
        /// The raw driver error
        cause: Box<SkiffError>,
    },
    /// Update payload was an array; an object or record is required
    UpdateValueArray,
    /// Update payload was a scalar; an object or record is required
    UpdateValueScalar,
    /// Pluck was invoked without a configured pluck column
    MissingPluckColumn,
}

impl fmt::Display for SkiffError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkiffError::Postgres(e) => {
                write!(f, "PostgreSQL error: {e}")
            }
            SkiffError::Query(s) => {
                write!(f, "Query error: {s}")
            }
            SkiffError::Decode(s) => {
                write!(f, "Decode error: {s}")
            }
            SkiffError::PrimaryKeyUnset => {
                write!(f, "record primary key is undefined")
            }
            SkiffError::PrimaryKeyInvalid => {
                write!(f, "record primary key is invalid")
            }
            SkiffError::PrimaryKeyEmpty => {
                write!(f, "record primary key is empty")
            }
            SkiffError::NotFound => {
                write!(f, "record not found")
            }
            SkiffError::NotFoundAs(e) => {
                write!(f, "{e}")
            }
            SkiffError::NotUnique => {
                write!(f, "find duplicate record")
            }
            SkiffError::NotUniqueAs(e) => {
                write!(f, "{e}")
            }
            SkiffError::NotAffected => {
                write!(f, "record for update not found")
            }
            SkiffError::NotAffectedAs(e) => {
                write!(f, "{e}")
            }
            SkiffError::DuplicateKey { error, .. } => {
                write!(f, "{error}")
            }
            SkiffError::UpdateValueArray => {
                write!(f, "update value must be an object or record, got an array")
            }
            SkiffError::UpdateValueScalar => {
                write!(f, "update value must be an object or record, got a scalar")
            }
            SkiffError::MissingPluckColumn => {
                write!(f, "pluck column not supplied")
            }
        }
    }
}

impl std::error::Error for SkiffError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SkiffError::Postgres(e) => Some(e),
            SkiffError::NotFoundAs(e)
            | SkiffError::NotUniqueAs(e)
            | SkiffError::NotAffectedAs(e) => Some(&**e),
            SkiffError::DuplicateKey { cause, .. } => Some(&**cause),
            _ => None,
        }
    }
}

impl From<PostgresError> for SkiffError {
    fn from(err: PostgresError) -> Self {
        SkiffError::Postgres(err)
    }
}

impl From<ValueExtractionError> for SkiffError {
    fn from(err: ValueExtractionError) -> Self {
        SkiffError::Decode(err.to_string())
    }
}

impl SkiffError {
    /// True for both the not-found sentinel and its domain-mapped form
    pub fn is_not_found(&self) -> bool {
        matches!(self, SkiffError::NotFound | SkiffError::NotFoundAs(_))
    }

    /// True for both the not-unique sentinel and its domain-mapped form
    pub fn is_not_unique(&self) -> bool {
        matches!(self, SkiffError::NotUnique | SkiffError::NotUniqueAs(_))
    }

    /// True for both the not-affected sentinel and its domain-mapped form
    pub fn is_not_affected(&self) -> bool {
        matches!(self, SkiffError::NotAffected | SkiffError::NotAffectedAs(_))
    }

    /// True when a duplicate-key violation was mapped to a declared index
    pub fn is_duplicate_key(&self) -> bool {
        matches!(self, SkiffError::DuplicateKey { .. })
    }

    /// The attached domain error, if this is a domain-mapped variant
    pub fn domain_error(&self) -> Option<&DomainError> {
        match self {
            SkiffError::NotFoundAs(e)
            | SkiffError::NotUniqueAs(e)
            | SkiffError::NotAffectedAs(e) => Some(e),
            SkiffError::DuplicateKey { error, .. } => Some(error),
            _ => None,
        }
    }
}

/// Resolve a not-found outcome: per-call override > per-type declared > sentinel.
pub(crate) fn resolve_not_found(
    per_call: Option<DomainError>,
    per_type: Option<DomainError>,
) -> SkiffError {
    match per_call.or(per_type) {
        Some(e) => SkiffError::NotFoundAs(e),
        None => SkiffError::NotFound,
    }
}

/// Resolve a not-affected outcome: per-call override > per-type declared > sentinel.
pub(crate) fn resolve_not_affected(
    per_call: Option<DomainError>,
    per_type: Option<DomainError>,
) -> SkiffError {
    match per_call.or(per_type) {
        Some(e) => SkiffError::NotAffectedAs(e),
        None => SkiffError::NotAffected,
    }
}

/// Resolve a not-unique outcome: per-call override > sentinel. There is no
/// per-type tier for uniqueness.
pub(crate) fn resolve_not_unique(per_call: Option<DomainError>) -> SkiffError {
    match per_call {
        Some(e) => SkiffError::NotUniqueAs(e),
        None => SkiffError::NotUnique,
    }
}
