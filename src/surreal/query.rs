//! Read-side SurrealDB repository

use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use super::ql::{self, KeyFilter, SelectParams};
use super::SurrealClient;
use crate::entity::Entity;
use crate::query::{FilterCondition, FilterValue, QueryOptions, Tracking};
use crate::repository::{
    PageRequest, QueryRepository, RawQuery, RepositoryError, RepositoryOperation,
    RepositoryResult,
};

/// [`QueryRepository`] over a SurrealDB client
///
/// `Tracked` reads are accepted for contract parity; the engine has no
/// row-locking analog, so the flag is logged and otherwise ignored.
#[derive(Debug, Clone)]
pub struct SurrealQueryRepository<E: Entity> {
    client: SurrealClient,
    _entity: PhantomData<fn() -> E>,
}

#[derive(Deserialize)]
struct CountRow {
    count: u64,
}

impl<E: Entity> SurrealQueryRepository<E> {
    /// Create a repository over an existing client
    pub fn new(client: SurrealClient) -> Self {
        Self {
            client,
            _entity: PhantomData,
        }
    }

    async fn fetch(
        &self,
        opts: &QueryOptions<E>,
        params: SelectParams,
        operation: RepositoryOperation,
    ) -> RepositoryResult<Vec<E>> {
        if opts.tracking == Tracking::Tracked {
            tracing::debug!(
                table = E::TABLE,
                "tracked read requested; surrealdb has no row-locking analog"
            );
        }
        let query = ql::render_select::<E>(&opts.plan, &params)
            .map_err(|e| e.with_operation(operation))?;
        tracing::debug!(query = %query.text, table = E::TABLE, "executing query");

        let mut request = self.client.query(query.text.as_str());
        for bind in query.binds {
            request = request.bind(bind);
        }
        let mut response = request
            .await
            .map_err(|e| super::classify(operation, e))?
            .check()
            .map_err(|e| super::classify(operation, e))?;

        response.take::<Vec<E>>(0).map_err(|e| {
            let mut error = RepositoryError::serialization_error(operation, e.to_string());
            error.entity_type = Some(E::TABLE.to_string());
            error
        })
    }

    async fn fetch_sorted(
        &self,
        opts: &QueryOptions<E>,
        page: Option<PageRequest>,
        operation: RepositoryOperation,
    ) -> RepositoryResult<Vec<E>> {
        let mut entities = self.fetch(opts, SelectParams::default(), operation).await?;
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

    async fn count_where(
        &self,
        filters: &[FilterCondition],
        operation: RepositoryOperation,
    ) -> RepositoryResult<u64> {
        let query =
            ql::render_count::<E>(filters, false).map_err(|e| e.with_operation(operation))?;
        let mut request = self.client.query(query.text.as_str());
        for bind in query.binds {
            request = request.bind(bind);
        }
        let mut response = request
            .await
            .map_err(|e| super::classify(operation, e))?
            .check()
            .map_err(|e| super::classify(operation, e))?;
        let rows: Vec<CountRow> = response
            .take(0)
            .map_err(|e| RepositoryError::serialization_error(operation, e.to_string()))?;
        Ok(rows.first().map_or(0, |row| row.count))
    }

    async fn run_raw(
        &self,
        query: &str,
        params: &[FilterValue],
        operation: RepositoryOperation,
    ) -> RepositoryResult<surrealdb::Response> {
        if query.trim().is_empty() {
            return Err(
                RepositoryError::invalid_argument("query text must not be empty")
                    .with_operation(operation),
            );
        }
        let mut request = self.client.query(query);
        for (index, value) in params.iter().enumerate() {
            request = request.bind((format!("p{}", index + 1), ql::bind_json(value)));
        }
        request
            .await
            .map_err(|e| super::classify(operation, e))?
            .check()
            .map_err(|e| super::classify(operation, e))
    }
}

impl<E: Entity> QueryRepository<E> for SurrealQueryRepository<E> {
    async fn get_by_id(&self, id: &E::Key, opts: QueryOptions<E>) -> RepositoryResult<Option<E>> {
        let params = SelectParams {
            key_filter: Some(KeyFilter::One(id.to_string())),
            ..SelectParams::default()
        };
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
        let params = SelectParams {
            key_filter: Some(KeyFilter::Many(
                ids.iter().map(ToString::to_string).collect(),
            )),
            ..SelectParams::default()
        };
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
        let params = match page {
            Some(page) => SelectParams {
                limit: Some(page.limit() as i64),
                start: Some(page.offset() as i64),
                ..SelectParams::default()
            },
            None => SelectParams::default(),
        };
        self.fetch(&opts, params, RepositoryOperation::GetAll).await
    }

    async fn first(&self, opts: QueryOptions<E>) -> RepositoryResult<Option<E>> {
        if opts.sorts_in_process() {
            let entities = self
                .fetch_sorted(&opts, Some(PageRequest::first(1)), RepositoryOperation::First)
                .await?;
            return Ok(entities.into_iter().next());
        }
        let params = SelectParams {
            limit: Some(1),
            ..SelectParams::default()
        };
        let entities = self.fetch(&opts, params, RepositoryOperation::First).await?;
        Ok(entities.into_iter().next())
    }

    async fn single(&self, opts: QueryOptions<E>) -> RepositoryResult<Option<E>> {
        let params = SelectParams {
            // two rows are enough to prove a violation
            limit: Some(2),
            ..SelectParams::default()
        };
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
        let params = SelectParams {
            limit: Some(1),
            reverse: true,
            ..SelectParams::default()
        };
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

impl<E: Entity> RawQuery for SurrealQueryRepository<E> {
    async fn query_raw<T>(&self, query: &str, params: &[FilterValue]) -> RepositoryResult<Vec<T>>
    where
        T: DeserializeOwned + Send,
    {
        let mut response = self
            .run_raw(query, params, RepositoryOperation::RawQuery)
            .await?;
        response.take(0).map_err(|e| {
            RepositoryError::serialization_error(RepositoryOperation::RawQuery, e.to_string())
        })
    }

    async fn scalar_raw<T>(
        &self,
        query: &str,
        params: &[FilterValue],
    ) -> RepositoryResult<Option<T>>
    where
        T: DeserializeOwned + Send,
    {
        let mut response = self
            .run_raw(query, params, RepositoryOperation::RawQuery)
            .await?;
        let rows: Vec<Value> = response.take(0).map_err(|e| {
            RepositoryError::serialization_error(RepositoryOperation::RawQuery, e.to_string())
        })?;
        let Some(first) = rows.into_iter().next() else {
            return Ok(None);
        };
        // a single-field projection unwraps to its value
        let scalar = match first {
            Value::Object(object) if object.len() == 1 => {
                object.into_iter().next().map(|(_, v)| v).unwrap_or(Value::Null)
            }
            other => other,
        };
        serde_json::from_value(scalar).map(Some).map_err(|e| {
            RepositoryError::serialization_error(RepositoryOperation::RawQuery, e.to_string())
        })
    }
}
