//! Fluent query builder
//!
//! [`QueryBuilder`] accumulates a [`QueryPlan`] by value: every method
//! consumes the builder and returns it (or a typed child builder), so
//! chains compose without shared mutable state.
//!
//! `include` returns an [`Included`] child scoped to the navigation's
//! target type. `then_include` exists only on that child, which makes the
//! classic off-chain `then_include` misuse a compile error instead of a
//! runtime one. String-path escape hatches (`order_by_path`,
//! `include_path`) validate at build time but defer their failures into
//! the plan; the repository surfaces them as invalid-argument errors
//! before any I/O.
//!
//! # Example
//!
//! ```rust,ignore
//! let opts = QueryBuilder::<Todo>::new()
//!     .filter(FilterCondition::eq("is_completed", false))
//!     .include(Relation::<Todo, Category>::new("category"))
//!     .then_include(Relation::<Category, Owner>::new("owner"))
//!     .order_by_path("category.name", false)
//!     .into_options();
//! ```

use std::cmp::Ordering;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::entity::{Field, Relation, Schema};
use crate::query::filter::FilterCondition;
use crate::query::path::{self, PropertyPath};
use crate::query::plan::{
    IncludeChain, OrderDirection, OrderKey, OrderSpec, QueryOptions, Tracking,
};

/// Fluent, by-value query composition for one entity type
pub struct QueryBuilder<E: Schema> {
    opts: QueryOptions<E>,
}

impl<E: Schema> Default for QueryBuilder<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Schema> QueryBuilder<E> {
    /// Start an empty builder
    #[must_use]
    pub fn new() -> Self {
        Self {
            opts: QueryOptions::default(),
        }
    }

    /// AND a predicate onto the query
    #[must_use]
    pub fn filter(mut self, condition: FilterCondition) -> Self {
        self.opts.plan.filters.push(condition);
        self
    }

    /// Bypass the entity's default (soft-delete) predicate for this query
    #[must_use]
    pub fn ignore_filters(mut self) -> Self {
        self.opts.plan.bypass_default_filters = true;
        self
    }

    /// Request row locking where the backend supports it
    #[must_use]
    pub fn tracked(mut self) -> Self {
        self.opts.tracking = Tracking::Tracked;
        self
    }

    /// Natural (identity) ordering, ascending
    #[must_use]
    pub fn order(self) -> Self {
        self.push_order(OrderKey::Natural, OrderDirection::Ascending)
    }

    /// Natural (identity) ordering, descending
    #[must_use]
    pub fn order_desc(self) -> Self {
        self.push_order(OrderKey::Natural, OrderDirection::Descending)
    }

    /// Comparer-driven ordering, applied in process after rows are
    /// materialized
    #[must_use]
    pub fn order_with(
        mut self,
        comparator: impl Fn(&E, &E) -> Ordering + Send + Sync + 'static,
    ) -> Self {
        self.opts.comparator = Some(Arc::new(comparator));
        self
    }

    /// Comparer-driven ordering, reversed
    #[must_use]
    pub fn order_desc_with(
        mut self,
        comparator: impl Fn(&E, &E) -> Ordering + Send + Sync + 'static,
    ) -> Self {
        self.opts.comparator = Some(Arc::new(move |a, b| comparator(a, b).reverse()));
        self
    }

    /// Typed-field ordering, ascending; the first ordering on the plan is
    /// the primary sort, later calls add stable secondary sorts
    #[must_use]
    pub fn order_by(self, field: Field<E>) -> Self {
        self.order_by_path(field.name(), false)
    }

    /// Typed-field ordering, descending
    #[must_use]
    pub fn order_by_desc(self, field: Field<E>) -> Self {
        self.order_by_path(field.name(), true)
    }

    /// Order by a dot-separated property path, resolved against the
    /// entity's field table; failures surface when the query executes
    #[must_use]
    pub fn order_by_path(mut self, path: &str, descending: bool) -> Self {
        match PropertyPath::resolve::<E>(path) {
            Ok(resolved) => {
                let direction = if descending {
                    OrderDirection::Descending
                } else {
                    OrderDirection::Ascending
                };
                return self.push_order(OrderKey::Path(resolved), direction);
            }
            Err(error) => self.opts.plan.record_invalid(error),
        }
        self
    }

    /// Attach a navigation load and descend into the included type,
    /// enabling `then_include`
    #[must_use]
    pub fn include<R: Schema>(mut self, relation: Relation<E, R>) -> Included<E, R> {
        let segments = path::resolve_relations::<E>(relation.name())
            .expect("typed relation handles are pre-validated");
        self.opts
            .plan
            .includes
            .push(IncludeChain::from_segments(&segments));
        Included {
            root: self,
            _scope: PhantomData,
        }
    }

    /// Include by string path, bypassing type safety; failures surface
    /// when the query executes
    #[must_use]
    pub fn include_path(mut self, path: &str) -> Self {
        match path::resolve_relations::<E>(path) {
            Ok(segments) => self
                .opts
                .plan
                .includes
                .push(IncludeChain::from_segments(&segments)),
            Err(error) => self.opts.plan.record_invalid(error),
        }
        self
    }

    /// Finish building
    #[must_use]
    pub fn into_options(self) -> QueryOptions<E> {
        self.opts
    }

    fn push_order(mut self, key: OrderKey, direction: OrderDirection) -> Self {
        self.opts.plan.order.push(OrderSpec { key, direction });
        self
    }
}

impl<E: Schema> From<QueryBuilder<E>> for QueryOptions<E> {
    fn from(builder: QueryBuilder<E>) -> Self {
        builder.into_options()
    }
}

/// A child builder scoped to the most recently included type
///
/// All root-builder methods remain available through [`Included::done`];
/// `then_include` extends the current navigation chain one level deeper.
pub struct Included<E: Schema, R: Schema> {
    root: QueryBuilder<E>,
    _scope: PhantomData<fn() -> R>,
}

impl<E: Schema, R: Schema> Included<E, R> {
    /// Extend the current navigation chain one level deeper
    #[must_use]
    pub fn then_include<N: Schema>(mut self, relation: Relation<R, N>) -> Included<E, N> {
        let segments = path::resolve_relations::<R>(relation.name())
            .expect("typed relation handles are pre-validated");
        let chain = self
            .root
            .opts
            .plan
            .includes
            .last_mut()
            .expect("an include chain is open while the child builder exists");
        chain.steps.extend(
            IncludeChain::from_segments(&segments).steps,
        );
        Included {
            root: self.root,
            _scope: PhantomData,
        }
    }

    /// Return to the root builder
    #[must_use]
    pub fn done(self) -> QueryBuilder<E> {
        self.root
    }

    /// Finish building from the child position
    #[must_use]
    pub fn into_options(self) -> QueryOptions<E> {
        self.root.into_options()
    }
}

impl<E: Schema, R: Schema> From<Included<E, R>> for QueryOptions<E> {
    fn from(included: Included<E, R>) -> Self {
        included.into_options()
    }
}
