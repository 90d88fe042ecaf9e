//! Repository trait definitions
//!
//! Two contracts, one read-side and one write-side, implemented
//! independently by the PostgreSQL and SurrealDB adapters. Methods use
//! RPITIT (`-> impl Future + Send`) rather than `async_trait`, and every
//! returned future is cancel-safe in the Rust sense: dropping it aborts
//! the in-flight round trip. Cancellation never rolls back an open
//! transaction — the handle stays open for the caller to roll back.
//!
//! Projected read variants have default implementations in terms of the
//! unprojected reads plus a [`ProjectionSpec`], so both backends get the
//! full projected surface.

use std::future::Future;

use serde::de::DeserializeOwned;

use super::error::RepositoryError;
use super::page::PageRequest;
use crate::entity::Entity;
use crate::query::{FilterCondition, FilterValue, ProjectionSpec, QueryOptions};

/// Result type for repository operations
pub type RepositoryResult<T> = std::result::Result<T, RepositoryError>;

/// Isolation level requested for a transaction
///
/// PostgreSQL applies it with `SET TRANSACTION ISOLATION LEVEL`; the
/// SurrealDB adapter accepts and logs it, the engine exposes no levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsolationLevel {
    /// Read committed
    ReadCommitted,
    /// Repeatable read
    RepeatableRead,
    /// Serializable
    Serializable,
}

impl std::fmt::Display for IsolationLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ReadCommitted => write!(f, "READ COMMITTED"),
            Self::RepeatableRead => write!(f, "REPEATABLE READ"),
            Self::Serializable => write!(f, "SERIALIZABLE"),
        }
    }
}

/// Read-side repository contract for one entity type
///
/// Point lookups represent a missing entity as `None` or an empty
/// collection — absence is never an error. `single` is the only read with
/// a cardinality guarantee.
///
/// With no filters, `any` evaluates against the full (default-filtered)
/// set and `all_match` is vacuously true. The upstream system this design
/// derives from returned `false` for both; that behavior was a quirk, not
/// a contract, and is deliberately not preserved.
pub trait QueryRepository<E: Entity>: Send + Sync {
    /// Point lookup by identity
    fn get_by_id(
        &self,
        id: &E::Key,
        opts: QueryOptions<E>,
    ) -> impl Future<Output = RepositoryResult<Option<E>>> + Send;

    /// Batch lookup by identity; missing ids are simply absent from the
    /// result
    fn get_by_ids(
        &self,
        ids: &[E::Key],
        opts: QueryOptions<E>,
    ) -> impl Future<Output = RepositoryResult<Vec<E>>> + Send;

    /// Filtered collection read with optional paging
    fn get_all(
        &self,
        opts: QueryOptions<E>,
        page: Option<PageRequest>,
    ) -> impl Future<Output = RepositoryResult<Vec<E>>> + Send;

    /// First match in query order, or absence
    fn first(
        &self,
        opts: QueryOptions<E>,
    ) -> impl Future<Output = RepositoryResult<Option<E>>> + Send;

    /// The only match, absence, or a cardinality-violation error when more
    /// than one row matches
    fn single(
        &self,
        opts: QueryOptions<E>,
    ) -> impl Future<Output = RepositoryResult<Option<E>>> + Send;

    /// Last match in query order, or absence
    fn last(
        &self,
        opts: QueryOptions<E>,
    ) -> impl Future<Output = RepositoryResult<Option<E>>> + Send;

    /// Whether any entity matches the filters
    fn any(
        &self,
        filters: &[FilterCondition],
    ) -> impl Future<Output = RepositoryResult<bool>> + Send;

    /// Whether every entity matches the filters
    fn all_match(
        &self,
        filters: &[FilterCondition],
    ) -> impl Future<Output = RepositoryResult<bool>> + Send;

    /// Count of entities matching the filters
    fn count(
        &self,
        filters: &[FilterCondition],
    ) -> impl Future<Output = RepositoryResult<u64>> + Send;

    /// Projected point lookup
    fn get_by_id_projected<P>(
        &self,
        id: &E::Key,
        opts: QueryOptions<E>,
        spec: &ProjectionSpec<E, P>,
    ) -> impl Future<Output = RepositoryResult<Option<P>>> + Send
    where
        P: DeserializeOwned + Send + Sync,
    {
        async move {
            match self.get_by_id(id, opts).await? {
                Some(entity) => Ok(Some(spec.project(&entity)?)),
                None => Ok(None),
            }
        }
    }

    /// Projected collection read
    fn get_all_projected<P>(
        &self,
        opts: QueryOptions<E>,
        page: Option<PageRequest>,
        spec: &ProjectionSpec<E, P>,
    ) -> impl Future<Output = RepositoryResult<Vec<P>>> + Send
    where
        P: DeserializeOwned + Send + Sync,
    {
        async move {
            let entities = self.get_all(opts, page).await?;
            spec.project_all(&entities)
        }
    }

    /// Projected first-match read
    fn first_projected<P>(
        &self,
        opts: QueryOptions<E>,
        spec: &ProjectionSpec<E, P>,
    ) -> impl Future<Output = RepositoryResult<Option<P>>> + Send
    where
        P: DeserializeOwned + Send + Sync,
    {
        async move {
            match self.first(opts).await? {
                Some(entity) => Ok(Some(spec.project(&entity)?)),
                None => Ok(None),
            }
        }
    }

    /// Projected single-match read; cardinality semantics of [`single`]
    ///
    /// [`single`]: QueryRepository::single
    fn single_projected<P>(
        &self,
        opts: QueryOptions<E>,
        spec: &ProjectionSpec<E, P>,
    ) -> impl Future<Output = RepositoryResult<Option<P>>> + Send
    where
        P: DeserializeOwned + Send + Sync,
    {
        async move {
            match self.single(opts).await? {
                Some(entity) => Ok(Some(spec.project(&entity)?)),
                None => Ok(None),
            }
        }
    }

    /// Projected last-match read
    fn last_projected<P>(
        &self,
        opts: QueryOptions<E>,
        spec: &ProjectionSpec<E, P>,
    ) -> impl Future<Output = RepositoryResult<Option<P>>> + Send
    where
        P: DeserializeOwned + Send + Sync,
    {
        async move {
            match self.last(opts).await? {
                Some(entity) => Ok(Some(spec.project(&entity)?)),
                None => Ok(None),
            }
        }
    }
}

/// Write-side repository contract for one entity type
///
/// Staging methods buffer changes on the repository instance; nothing is
/// persisted before a `save_*` or `commit` call. One transaction handle at
/// most is open per instance; opening a second is a logic error, as is
/// committing or rolling back without one.
pub trait CommandRepository<E: Entity>: Send + Sync {
    /// Stage an insert
    fn add(&self, entity: E) -> impl Future<Output = RepositoryResult<()>> + Send;

    /// Stage a batch of inserts
    fn add_range(
        &self,
        entities: Vec<E>,
    ) -> impl Future<Output = RepositoryResult<()>> + Send;

    /// Stage an update
    fn update(&self, entity: E) -> impl Future<Output = RepositoryResult<()>> + Send;

    /// Stage a batch of updates
    fn update_range(
        &self,
        entities: Vec<E>,
    ) -> impl Future<Output = RepositoryResult<()>> + Send;

    /// Stage a removal (persists a delete on save)
    fn delete(&self, entity: E) -> impl Future<Output = RepositoryResult<()>> + Send;

    /// Stage a batch of removals
    fn delete_range(
        &self,
        entities: Vec<E>,
    ) -> impl Future<Output = RepositoryResult<()>> + Send;

    /// Drop any staged change for an identity without persisting anything
    fn detach(&self, id: &E::Key) -> impl Future<Output = RepositoryResult<()>> + Send;

    /// Drop staged changes for a batch of identities
    fn detach_range(
        &self,
        ids: &[E::Key],
    ) -> impl Future<Output = RepositoryResult<()>> + Send;

    /// Open a transaction; a second open handle is a logic error
    fn begin_transaction(
        &self,
        isolation: Option<IsolationLevel>,
    ) -> impl Future<Output = RepositoryResult<()>> + Send;

    /// Persist staged changes and commit the open transaction
    ///
    /// Fails with a no-active-transaction error when none is open. When
    /// `accept_all_changes` is false the staged set is retained after a
    /// successful commit.
    fn commit(
        &self,
        accept_all_changes: bool,
    ) -> impl Future<Output = RepositoryResult<u64>> + Send;

    /// Discard the open transaction
    fn rollback(&self) -> impl Future<Output = RepositoryResult<()>> + Send;

    /// Persist staged changes, returning the affected-row count; a zero
    /// count logs a warning. Inside an open transaction the changes are
    /// written but not committed.
    fn save(&self) -> impl Future<Output = RepositoryResult<u64>> + Send;

    /// Like [`save`], logging (never failing) when the affected count
    /// differs from `expected`
    ///
    /// [`save`]: CommandRepository::save
    fn save_expecting(
        &self,
        expected: u64,
    ) -> impl Future<Output = RepositoryResult<u64>> + Send;

    /// Like [`save`], classifying backend failures into the crate error
    /// taxonomy and rolling back any open transaction before propagating
    ///
    /// [`save`]: CommandRepository::save
    fn save_checked(&self) -> impl Future<Output = RepositoryResult<u64>> + Send;
}

/// Raw query pass-through for cases the builder cannot express
///
/// Query text is backend-native; no dialect abstraction is provided.
/// Empty query text is an invalid-argument failure.
pub trait RawQuery: Send + Sync {
    /// Run a raw query and map each row onto `T` by member name
    fn query_raw<T>(
        &self,
        query: &str,
        params: &[FilterValue],
    ) -> impl Future<Output = RepositoryResult<Vec<T>>> + Send
    where
        T: DeserializeOwned + Send;

    /// Run a raw query returning the first column of the first row
    fn scalar_raw<T>(
        &self,
        query: &str,
        params: &[FilterValue],
    ) -> impl Future<Output = RepositoryResult<Option<T>>> + Send
    where
        T: DeserializeOwned + Send;
}

/// Raw statement pass-through for the write side
pub trait RawExecute: Send + Sync {
    /// Run a raw statement, returning the affected-row count. Statements
    /// run on the open transaction when one exists, otherwise directly on
    /// the connection.
    fn execute_raw(
        &self,
        statement: &str,
        params: &[FilterValue],
    ) -> impl Future<Output = RepositoryResult<u64>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn isolation_level_display() {
        assert_eq!(format!("{}", IsolationLevel::ReadCommitted), "READ COMMITTED");
        assert_eq!(format!("{}", IsolationLevel::RepeatableRead), "REPEATABLE READ");
        assert_eq!(format!("{}", IsolationLevel::Serializable), "SERIALIZABLE");
    }

    #[test]
    fn repository_result_alias() {
        let ok: RepositoryResult<u64> = Ok(3);
        assert!(ok.is_ok());
        let err: RepositoryResult<u64> = Err(RepositoryError::transaction_active());
        assert!(err.is_err());
    }
}
