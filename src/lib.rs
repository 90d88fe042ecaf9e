//! # dockside
//!
//! A backend-agnostic data-access layer: describe an entity's shape once,
//! compose reads with a fluent builder, and run them against PostgreSQL or
//! SurrealDB through the same repository contracts.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use dockside::prelude::*;
//!
//! let config = Config::load()?;
//! let pool = dockside::postgres::connect(config.database.as_ref().unwrap()).await?;
//! let todos = PgQueryRepository::<Todo>::new(pool.clone());
//!
//! let open = todos
//!     .get_all(
//!         QueryBuilder::new()
//!             .filter(FilterCondition::eq("is_completed", false))
//!             .include_path("category")
//!             .order_by_path("title", false)
//!             .into_options(),
//!         Some(PageRequest::first(20)),
//!     )
//!     .await?;
//! ```
//!
//! ## Architecture
//!
//! - [`entity`] — static schema metadata ([`entity::Schema`], field and
//!   relation tables) plus the [`entity::Entity`] trait binding a key type
//! - [`query`] — filter conditions, property-path resolution, the fluent
//!   [`query::QueryBuilder`], and projections
//! - [`repository`] — the [`repository::QueryRepository`] and
//!   [`repository::CommandRepository`] contracts, paging, and the error
//!   taxonomy
//! - [`postgres`] / [`surreal`] — the two adapters, feature-gated
//!
//! Reads never mutate; writes stage on a command repository and persist on
//! `save`/`commit`. Either backend can serve either contract, so a service
//! can read from one store and write to another during a migration.

pub mod config;
pub mod entity;
pub mod query;
pub mod repository;

#[cfg(feature = "postgres")]
pub mod postgres;

#[cfg(feature = "surrealdb")]
pub mod surreal;

pub use config::{Config, ConfigError, DatabaseConfig, SurrealDbConfig};

/// Commonly used types, importable as a bundle
pub mod prelude {
    pub use crate::config::{Config, DatabaseConfig, SurrealDbConfig};
    pub use crate::entity::{Entity, Field, FieldDef, Relation, RelationKind, Schema};
    pub use crate::query::{
        FilterCondition, FilterOperator, FilterValue, ProjectionConfig, ProjectionSpec,
        QueryBuilder, QueryOptions, Tracking,
    };
    pub use crate::repository::{
        CommandRepository, IsolationLevel, PageRequest, PageSummary, QueryRepository,
        RawExecute, RawQuery, RepositoryError, RepositoryErrorKind, RepositoryOperation,
        RepositoryResult,
    };

    #[cfg(feature = "postgres")]
    pub use crate::postgres::{PgCommandRepository, PgQueryRepository};

    #[cfg(feature = "surrealdb")]
    pub use crate::surreal::{SurrealCommandRepository, SurrealQueryRepository};
}
