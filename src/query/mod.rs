//! Query planning.
//!
//! Declarative [`QueryOptions`] are lowered into concrete SQL plans here:
//! `options` holds the builder, `filter` the string-keyed filter grammar,
//! `build` the lowering into sea-query statements, and `params` the bridge
//! from sea-query values to driver bind parameters.

pub mod build;
pub mod filter;
pub mod options;
pub mod params;

pub use build::{count_plan, delete_plan, select_plan, update_plan};
pub use filter::{FilterKey, FilterOp, FilterValue};
pub use options::{
    FilterFn, JoinKind, JoinSpec, PageResult, Pageable, QueryOptions, WhereSpec,
};
pub use params::with_converted_params;
