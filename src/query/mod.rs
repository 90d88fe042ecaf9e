//! Query composition
//!
//! Everything that happens before a backend sees a read: filter values and
//! conditions, property-path resolution, the fluent builder, the resulting
//! backend-neutral plan, and projection specifications.

pub mod builder;
pub mod filter;
pub mod path;
pub mod plan;
pub mod projection;

pub use builder::{Included, QueryBuilder};
pub use filter::{FilterCondition, FilterOperator, FilterValue};
pub use path::PropertyPath;
pub use plan::{
    EntityComparator, IncludeChain, IncludeStep, OrderDirection, OrderKey, OrderSpec,
    QueryOptions, QueryPlan, Tracking,
};
pub use projection::{ProjectionConfig, ProjectionSpec};
