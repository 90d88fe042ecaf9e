//! Read-side PostgreSQL repository

use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde_json::Value;
use sqlx::{PgPool, Row};

use super::sql::{self, KeyFilter, SelectParams};
use crate::entity::Entity;
use crate::query::{FilterCondition, FilterValue, QueryOptions, Tracking};
use crate::repository::{
    PageRequest, QueryRepository, RawQuery, RepositoryError, RepositoryOperation,
    RepositoryResult,
};

/// [`QueryRepository`] over a PostgreSQL pool
///
/// Rows come back as one `jsonb` document per entity (see the `sql`
/// module), so the repository is a thin loop of render, bind, fetch,
/// deserialize.
#[derive(Debug, Clone)]
pub struct PgQueryRepository<E: Entity> {
    pool: PgPool,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> PgQueryRepository<E> {
    /// Create a repository over an existing pool
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            _entity: PhantomData,
        }
    }

    async fn fetch(
        &self,
        opts: &QueryOptions<E>,
        params: SelectParams,
        operation: RepositoryOperation,
    ) -> RepositoryResult<Vec<E>> {
        let query = sql::render_select::<E>(&opts.plan, &params)
            .map_err(|e| e.with_operation(operation))?;
        tracing::debug!(sql = %query.sql, table = E::TABLE, "executing query");

        let rows = sql::bind_values(sqlx::query(&query.sql), &query.binds)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| super::classify(operation, e))?;

        rows.iter()
            .map(|row| {
                let document: Value = row
                    .try_get("data")
                    .map_err(|e| super::classify(operation, e))?;
                serde_json::from_value(document).map_err(|e| {
                    let mut error =
                        RepositoryError::serialization_error(operation, e.to_string());
                    error.entity_type = Some(E::TABLE.to_string());
                    error
                })
            })
            .collect()
    }

    /// Fetch everything matching the plan, order in process with the
    /// comparator, then window. Comparator ordering cannot be pushed to
    /// the server.
    async fn fetch_sorted(
        &self,
        opts: &QueryOptions<E>,
        page: Option<PageRequest>,
        operation: RepositoryOperation,
    ) -> RepositoryResult<Vec<E>> {
        let params = SelectParams {
            for_update: opts.tracking == Tracking::Tracked,
            ..SelectParams::default()
        };
        let mut entities = self.fetch(opts, params, operation).await?;
        if let Some(comparator) = &opts.comparator {
            entities.sort_by(|a, b| comparator(a, b));
        }
        if let Some(page) = page {
            entities = entities
                .into_iter()
                .skip(page.offset() as usize)
                .take(page.limit() as usize)
                .collect();
        }
        Ok(entities)
    }

    fn params_for(&self, opts: &QueryOptions<E>) -> SelectParams {
        SelectParams {
            for_update: opts.tracking == Tracking::Tracked,
            ..SelectParams::default()
        }
    }

    async fn count_where(
        &self,
        filters: &[FilterCondition],
        operation: RepositoryOperation,
    ) -> RepositoryResult<u64> {
        let query = sql::render_count::<E>(filters, false)
            .map_err(|e| e.with_operation(operation))?;
        let row = sql::bind_values(sqlx::query(&query.sql), &query.binds)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| super::classify(operation, e))?;
        let count: i64 = row
            .try_get(0)
            .map_err(|e| super::classify(operation, e))?;
        Ok(count.unsigned_abs())
    }

    async fn fetch_raw_rows(
        &self,
        query: &str,
        params: &[FilterValue],
        operation: RepositoryOperation,
    ) -> RepositoryResult<Vec<sqlx::postgres::PgRow>> {
        if query.trim().is_empty() {
            return Err(
                RepositoryError::invalid_argument("query text must not be empty")
                    .with_operation(operation),
            );
        }
        sql::bind_values(sqlx::query(query), params)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| super::classify(operation, e))
    }

    async fn fetch_segments(
        &self,
        query: &str,
        params: &[FilterValue],
        split_on: Option<&str>,
        parts: usize,
    ) -> RepositoryResult<Vec<Vec<Value>>> {
        let split_on = split_on.unwrap_or("id");
        let rows = self
            .fetch_raw_rows(query, params, RepositoryOperation::RawQuery)
            .await?;
        rows.iter()
            .map(|row| sql::split_row(row, split_on, parts))
            .collect()
    }

    /// Two-way multi-mapping: each row splits into two objects at the
    /// split column (`id` when `None`), and `map` combines them. Segments
    /// whose columns are all null arrive as `None`.
    pub async fn query_multi2<T1, T2, R>(
        &self,
        query: &str,
        params: &[FilterValue],
        split_on: Option<&str>,
        mut map: impl FnMut(T1, Option<T2>) -> R,
    ) -> RepositoryResult<Vec<R>>
    where
        T1: DeserializeOwned,
        T2: DeserializeOwned,
    {
        let rows = self.fetch_segments(query, params, split_on, 2).await?;
        rows.into_iter()
            .map(|mut segments| {
                Ok(map(
                    required(segments.remove(0))?,
                    optional(segments.remove(0))?,
                ))
            })
            .collect()
    }

    /// Three-way multi-mapping; see [`query_multi2`](Self::query_multi2)
    pub async fn query_multi3<T1, T2, T3, R>(
        &self,
        query: &str,
        params: &[FilterValue],
        split_on: Option<&str>,
        mut map: impl FnMut(T1, Option<T2>, Option<T3>) -> R,
    ) -> RepositoryResult<Vec<R>>
    where
        T1: DeserializeOwned,
        T2: DeserializeOwned,
        T3: DeserializeOwned,
    {
        let rows = self.fetch_segments(query, params, split_on, 3).await?;
        rows.into_iter()
            .map(|mut segments| {
                Ok(map(
                    required(segments.remove(0))?,
                    optional(segments.remove(0))?,
                    optional(segments.remove(0))?,
                ))
            })
            .collect()
    }

    /// Four-way multi-mapping; see [`query_multi2`](Self::query_multi2)
    pub async fn query_multi4<T1, T2, T3, T4, R>(
        &self,
        query: &str,
        params: &[FilterValue],
        split_on: Option<&str>,
        mut map: impl FnMut(T1, Option<T2>, Option<T3>, Option<T4>) -> R,
    ) -> RepositoryResult<Vec<R>>
    where
        T1: DeserializeOwned,
        T2: DeserializeOwned,
        T3: DeserializeOwned,
        T4: DeserializeOwned,
    {
        let rows = self.fetch_segments(query, params, split_on, 4).await?;
        rows.into_iter()
            .map(|mut segments| {
                Ok(map(
                    required(segments.remove(0))?,
                    optional(segments.remove(0))?,
                    optional(segments.remove(0))?,
                    optional(segments.remove(0))?,
                ))
            })
            .collect()
    }

    /// Five-way multi-mapping; see [`query_multi2`](Self::query_multi2)
    pub async fn query_multi5<T1, T2, T3, T4, T5, R>(
        &self,
        query: &str,
        params: &[FilterValue],
        split_on: Option<&str>,
        mut map: impl FnMut(T1, Option<T2>, Option<T3>, Option<T4>, Option<T5>) -> R,
    ) -> RepositoryResult<Vec<R>>
    where
        T1: DeserializeOwned,
        T2: DeserializeOwned,
        T3: DeserializeOwned,
        T4: DeserializeOwned,
        T5: DeserializeOwned,
    {
        let rows = self.fetch_segments(query, params, split_on, 5).await?;
        rows.into_iter()
            .map(|mut segments| {
                Ok(map(
                    required(segments.remove(0))?,
                    optional(segments.remove(0))?,
                    optional(segments.remove(0))?,
                    optional(segments.remove(0))?,
                    optional(segments.remove(0))?,
                ))
            })
            .collect()
    }

    /// Six-way multi-mapping; see [`query_multi2`](Self::query_multi2)
    #[allow(clippy::too_many_arguments)]
    pub async fn query_multi6<T1, T2, T3, T4, T5, T6, R>(
        &self,
        query: &str,
        params: &[FilterValue],
        split_on: Option<&str>,
        mut map: impl FnMut(T1, Option<T2>, Option<T3>, Option<T4>, Option<T5>, Option<T6>) -> R,
    ) -> RepositoryResult<Vec<R>>
    where
        T1: DeserializeOwned,
        T2: DeserializeOwned,
        T3: DeserializeOwned,
        T4: DeserializeOwned,
        T5: DeserializeOwned,
        T6: DeserializeOwned,
    {
        let rows = self.fetch_segments(query, params, split_on, 6).await?;
        rows.into_iter()
            .map(|mut segments| {
                Ok(map(
                    required(segments.remove(0))?,
                    optional(segments.remove(0))?,
                    optional(segments.remove(0))?,
                    optional(segments.remove(0))?,
                    optional(segments.remove(0))?,
                    optional(segments.remove(0))?,
                ))
            })
            .collect()
    }
}

fn required<T: DeserializeOwned>(value: Value) -> RepositoryResult<T> {
    serde_json::from_value(value).map_err(|e| {
        RepositoryError::serialization_error(RepositoryOperation::RawQuery, e.to_string())
    })
}

fn optional<T: DeserializeOwned>(value: Value) -> RepositoryResult<Option<T>> {
    if value.is_null() {
        return Ok(None);
    }
    required(value).map(Some)
}

impl<E: Entity> QueryRepository<E> for PgQueryRepository<E> {
    async fn get_by_id(&self, id: &E::Key, opts: QueryOptions<E>) -> RepositoryResult<Option<E>> {
        let mut params = self.params_for(&opts);
        params.key_filter = Some(KeyFilter::One(id.to_string()));
        let entities = self
            .fetch(&opts, params, RepositoryOperation::GetById)
            .await
            .map_err(|e| e.with_entity(E::TABLE, id.to_string()))?;
        Ok(entities.into_iter().next())
    }

    async fn get_by_ids(&self, ids: &[E::Key], opts: QueryOptions<E>) -> RepositoryResult<Vec<E>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut params = self.params_for(&opts);
        params.key_filter = Some(KeyFilter::Many(
            ids.iter().map(ToString::to_string).collect(),
        ));
        self.fetch(&opts, params, RepositoryOperation::GetById).await
    }

    async fn get_all(
        &self,
        opts: QueryOptions<E>,
        page: Option<PageRequest>,
    ) -> RepositoryResult<Vec<E>> {
        if opts.sorts_in_process() {
            return self
                .fetch_sorted(&opts, page, RepositoryOperation::GetAll)
                .await;
        }
        let mut params = self.params_for(&opts);
        if let Some(page) = page {
            params.limit = Some(page.limit() as i64);
            params.offset = Some(page.offset() as i64);
        }
        self.fetch(&opts, params, RepositoryOperation::GetAll).await
    }

    async fn first(&self, opts: QueryOptions<E>) -> RepositoryResult<Option<E>> {
        if opts.sorts_in_process() {
            let entities = self
                .fetch_sorted(&opts, Some(PageRequest::first(1)), RepositoryOperation::First)
                .await?;
            return Ok(entities.into_iter().next());
        }
        let mut params = self.params_for(&opts);
        params.limit = Some(1);
        let entities = self.fetch(&opts, params, RepositoryOperation::First).await?;
        Ok(entities.into_iter().next())
    }

    async fn single(&self, opts: QueryOptions<E>) -> RepositoryResult<Option<E>> {
        let mut params = self.params_for(&opts);
        // two rows are enough to prove a violation
        params.limit = Some(2);
        let entities = self
            .fetch(&opts, params, RepositoryOperation::Single)
            .await?;
        if entities.len() > 1 {
            return Err(RepositoryError::cardinality(E::TABLE));
        }
        Ok(entities.into_iter().next())
    }

    async fn last(&self, opts: QueryOptions<E>) -> RepositoryResult<Option<E>> {
        if opts.sorts_in_process() {
            let mut entities = self
                .fetch_sorted(&opts, None, RepositoryOperation::Last)
                .await?;
            return Ok(entities.pop());
        }
        let mut params = self.params_for(&opts);
        params.limit = Some(1);
        params.reverse = true;
        let entities = self.fetch(&opts, params, RepositoryOperation::Last).await?;
        Ok(entities.into_iter().next())
    }

    async fn any(&self, filters: &[FilterCondition]) -> RepositoryResult<bool> {
        let count = self.count_where(filters, RepositoryOperation::Any).await?;
        Ok(count > 0)
    }

    async fn all_match(&self, filters: &[FilterCondition]) -> RepositoryResult<bool> {
        if filters.is_empty() {
            return Ok(true);
        }
        let matching = self.count_where(filters, RepositoryOperation::All).await?;
        let total = self.count_where(&[], RepositoryOperation::All).await?;
        Ok(matching == total)
    }

    async fn count(&self, filters: &[FilterCondition]) -> RepositoryResult<u64> {
        self.count_where(filters, RepositoryOperation::Count).await
    }
}

impl<E: Entity> RawQuery for PgQueryRepository<E> {
    async fn query_raw<T>(&self, query: &str, params: &[FilterValue]) -> RepositoryResult<Vec<T>>
    where
        T: DeserializeOwned + Send,
    {
        let rows = self
            .fetch_raw_rows(query, params, RepositoryOperation::RawQuery)
            .await?;
        rows.iter()
            .map(|row| required(sql::row_to_json(row)?))
            .collect()
    }

    async fn scalar_raw<T>(
        &self,
        query: &str,
        params: &[FilterValue],
    ) -> RepositoryResult<Option<T>>
    where
        T: DeserializeOwned + Send,
    {
        let rows = self
            .fetch_raw_rows(query, params, RepositoryOperation::RawQuery)
            .await?;
        match rows.first() {
            Some(row) => optional(sql::pg_value_to_json(row, 0)?),
            None => Ok(None),
        }
    }
}
