//! Query plan values
//!
//! The fluent builder accumulates into a [`QueryPlan`]: a backend-neutral
//! description of filters, ordering, navigation loads, and default-filter
//! bypass. Plans are plain values threaded through chained calls — there is
//! no shared mutable root, so a plan can be cloned, inspected, and rendered
//! by either backend without surprises.

use std::cmp::Ordering;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::entity::{RelationKind, Schema};
use crate::query::filter::FilterCondition;
use crate::query::path::{PathSegment, PropertyPath};
use crate::repository::RepositoryError;

/// Direction for ordering results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrderDirection {
    /// Ascending (A-Z, 0-9)
    #[default]
    Ascending,
    /// Descending (Z-A, 9-0)
    Descending,
}

impl OrderDirection {
    /// Flip the direction
    #[must_use]
    pub fn reversed(self) -> Self {
        match self {
            Self::Ascending => Self::Descending,
            Self::Descending => Self::Ascending,
        }
    }
}

impl fmt::Display for OrderDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ascending => write!(f, "ASC"),
            Self::Descending => write!(f, "DESC"),
        }
    }
}

/// What an ordering entry sorts on
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderKey {
    /// The backend's natural ordering (the identity column)
    Natural,
    /// A resolved property path, local or across to-one navigations
    Path(PropertyPath),
}

/// One ordering entry; the first on a plan is the primary sort, later
/// entries are stable secondary ("then by") sorts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderSpec {
    /// Sort key
    pub key: OrderKey,
    /// Sort direction
    pub direction: OrderDirection,
}

/// One step of a navigation-load chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IncludeStep {
    /// Field name of the navigation on the step's owner
    pub field: &'static str,
    /// Target table/collection
    pub target: &'static str,
    /// One or many
    pub kind: RelationKind,
    /// Foreign key (local for one, remote for many)
    pub foreign_key: &'static str,
}

/// A navigation-load chain: `include` starts one, `then_include` extends it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncludeChain {
    /// Steps from the root outward
    pub steps: Vec<IncludeStep>,
}

impl IncludeChain {
    pub(crate) fn from_segments(segments: &[PathSegment]) -> Self {
        let steps = segments
            .iter()
            .map(|segment| {
                let relation = segment
                    .relation
                    .expect("include chains are built from navigation segments");
                IncludeStep {
                    field: segment.name,
                    target: relation.target,
                    kind: relation.kind,
                    foreign_key: relation.foreign_key,
                }
            })
            .collect();
        Self { steps }
    }

    /// The dotted path of the chain
    pub fn dotted(&self) -> String {
        self.steps
            .iter()
            .map(|s| s.field)
            .collect::<Vec<_>>()
            .join(".")
    }
}

/// Whether a read registers entities for write-side locking
///
/// Neither backend has a client-side change tracker; `Tracked` maps to the
/// nearest native analog (row locking on PostgreSQL) and is otherwise
/// accepted for contract parity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tracking {
    /// No bookkeeping; the default
    #[default]
    Untracked,
    /// Lock matched rows where the backend supports it
    Tracked,
}

/// The accumulated, backend-neutral description of a read
#[derive(Debug, Clone, Default)]
pub struct QueryPlan {
    /// Predicates, ANDed
    pub filters: Vec<FilterCondition>,
    /// Ordering entries, primary first
    pub order: Vec<OrderSpec>,
    /// Navigation-load chains
    pub includes: Vec<IncludeChain>,
    /// Bypass the entity's default (soft-delete) predicate
    pub bypass_default_filters: bool,
    /// First builder misconfiguration, surfaced when the plan executes
    pub(crate) invalid: Option<RepositoryError>,
}

impl QueryPlan {
    /// Fail if a string-path builder call recorded a misconfiguration
    pub(crate) fn check(&self) -> Result<(), RepositoryError> {
        match &self.invalid {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    pub(crate) fn record_invalid(&mut self, error: RepositoryError) {
        if self.invalid.is_none() {
            self.invalid = Some(error);
        }
    }

    /// Include chains with duplicates removed, preserving first-seen order.
    /// Repeating an identical `include` chain must not change result
    /// cardinality.
    pub fn distinct_includes(&self) -> Vec<&IncludeChain> {
        let mut seen: Vec<&IncludeChain> = Vec::with_capacity(self.includes.len());
        for chain in &self.includes {
            if !seen.iter().any(|existing| **existing == *chain) {
                seen.push(chain);
            }
        }
        seen
    }
}

/// In-process comparator applied after materialization
pub type EntityComparator<E> = Arc<dyn Fn(&E, &E) -> Ordering + Send + Sync>;

/// A built plan plus per-call read options for one entity type
pub struct QueryOptions<E: Schema> {
    /// The accumulated plan
    pub plan: QueryPlan,
    /// Tracking flag, untracked by default
    pub tracking: Tracking,
    /// Comparator-driven ordering, applied in process after the backend
    /// returns rows
    pub comparator: Option<EntityComparator<E>>,
    pub(crate) _entity: PhantomData<fn() -> E>,
}

impl<E: Schema> QueryOptions<E> {
    /// Whether a comparator requires full in-process materialization
    pub fn sorts_in_process(&self) -> bool {
        self.comparator.is_some()
    }
}

impl<E: Schema> Default for QueryOptions<E> {
    fn default() -> Self {
        Self {
            plan: QueryPlan::default(),
            tracking: Tracking::default(),
            comparator: None,
            _entity: PhantomData,
        }
    }
}

impl<E: Schema> Clone for QueryOptions<E> {
    fn clone(&self) -> Self {
        Self {
            plan: self.plan.clone(),
            tracking: self.tracking,
            comparator: self.comparator.clone(),
            _entity: PhantomData,
        }
    }
}

impl<E: Schema> fmt::Debug for QueryOptions<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryOptions")
            .field("plan", &self.plan)
            .field("tracking", &self.tracking)
            .field("comparator", &self.comparator.is_some())
            .finish()
    }
}
