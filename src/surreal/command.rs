//! Write-side SurrealDB repository
//!
//! The engine exposes transactions only as statement blocks, so the
//! repository buffers client-side: an open "transaction" is a flag, and
//! `commit` sends every staged change as one `BEGIN TRANSACTION ... COMMIT
//! TRANSACTION` batch, which the server applies atomically. Two
//! consequences, both deliberate:
//!
//! - `save` inside an open transaction cannot write-without-committing;
//!   the staged batch stays queued until `commit` sends it.
//! - raw statements run immediately against the client and do not join
//!   the buffered batch.
//!
//! The affected count of a batch is its statement count; the engine does
//! not report per-statement row counts for batched writes.
//!
//! Declared secondary indexes are created lazily, once per repository,
//! before the first transaction opens.

use std::marker::PhantomData;

use serde_json::Value;
use tokio::sync::{Mutex, OnceCell};

use super::ql;
use super::SurrealClient;
use crate::entity::Entity;
use crate::query::FilterValue;
use crate::repository::{
    CommandRepository, IsolationLevel, RawExecute, RepositoryError, RepositoryOperation,
    RepositoryResult,
};

enum Staged<E> {
    Insert(E),
    Update(E),
    Delete(String),
}

impl<E: Entity> Staged<E> {
    fn key(&self) -> String {
        match self {
            Self::Insert(e) | Self::Update(e) => e.key().to_string(),
            Self::Delete(key) => key.clone(),
        }
    }
}

struct CommandState<E> {
    staged: Vec<Staged<E>>,
    in_tx: bool,
}

/// [`CommandRepository`] over a SurrealDB client
pub struct SurrealCommandRepository<E: Entity> {
    client: SurrealClient,
    state: Mutex<CommandState<E>>,
    indexes: OnceCell<()>,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> SurrealCommandRepository<E> {
    /// Create a repository over an existing client
    pub fn new(client: SurrealClient) -> Self {
        Self {
            client,
            state: Mutex::new(CommandState {
                staged: Vec::new(),
                in_tx: false,
            }),
            indexes: OnceCell::new(),
            _entity: PhantomData,
        }
    }

    /// Create any declared secondary index the table does not already
    /// have. Existing indexes are matched by name, case-insensitively.
    async fn ensure_indexes(&self) -> RepositoryResult<()> {
        self.indexes
            .get_or_try_init(|| async {
                let existing = self.existing_index_names().await;
                for field in E::fields().iter().filter(|f| f.indexed && f.relation.is_none()) {
                    let wanted = field.name.to_lowercase();
                    if existing.iter().any(|name| name.to_lowercase().contains(&wanted)) {
                        continue;
                    }
                    let statement = ql::render_define_index(E::TABLE, field.name, field.unique);
                    self.client
                        .query(statement.as_str())
                        .await
                        .map_err(|e| super::classify(RepositoryOperation::EnsureIndexes, e))?
                        .check()
                        .map_err(|e| super::classify(RepositoryOperation::EnsureIndexes, e))?;
                    tracing::info!(
                        table = E::TABLE,
                        field = field.name,
                        unique = field.unique,
                        "created declared index"
                    );
                }
                Ok(())
            })
            .await
            .copied()
    }

    async fn existing_index_names(&self) -> Vec<String> {
        // a missing table simply has no indexes yet
        let response = match self.client.query(format!("INFO FOR TABLE {}", E::TABLE)).await {
            Ok(response) => response,
            Err(e) => {
                tracing::debug!(table = E::TABLE, error = %e, "table info unavailable");
                return Vec::new();
            }
        };
        let mut response = match response.check() {
            Ok(response) => response,
            Err(_) => return Vec::new(),
        };
        let info: Option<Value> = response.take(0).ok().flatten();
        info.as_ref()
            .and_then(|v| v.get("indexes"))
            .and_then(Value::as_object)
            .map(|indexes| indexes.keys().cloned().collect())
            .unwrap_or_default()
    }

    async fn run_batch(
        &self,
        staged: &[Staged<E>],
        operation: RepositoryOperation,
    ) -> RepositoryResult<u64> {
        if staged.is_empty() {
            return Ok(0);
        }

        let mut text = String::from("BEGIN TRANSACTION; ");
        let mut binds: Vec<(String, Value)> = Vec::new();
        for (index, change) in staged.iter().enumerate() {
            match change {
                Staged::Insert(entity) => {
                    text.push_str(&ql::render_create(E::TABLE, index));
                    binds.push((format!("k{index}"), Value::from(entity.key().to_string())));
                    binds.push((format!("d{index}"), ql::entity_document(entity, operation)?));
                }
                Staged::Update(entity) => {
                    text.push_str(&ql::render_update(E::TABLE, index));
                    binds.push((format!("k{index}"), Value::from(entity.key().to_string())));
                    binds.push((format!("d{index}"), ql::entity_document(entity, operation)?));
                }
                Staged::Delete(key) => {
                    text.push_str(&ql::render_delete(E::TABLE, index));
                    binds.push((format!("k{index}"), Value::from(key.clone())));
                }
            }
            text.push_str("; ");
        }
        text.push_str("COMMIT TRANSACTION;");
        tracing::debug!(table = E::TABLE, statements = staged.len(), "sending write batch");

        let mut request = self.client.query(text.as_str());
        for bind in binds {
            request = request.bind(bind);
        }
        request
            .await
            .map_err(|e| super::classify(operation, e))?
            .check()
            .map_err(|e| super::classify(operation, e))?;

        Ok(staged.len() as u64)
    }

    async fn stage(&self, change: Staged<E>) {
        self.state.lock().await.staged.push(change);
    }
}

impl<E: Entity> CommandRepository<E> for SurrealCommandRepository<E> {
    async fn add(&self, entity: E) -> RepositoryResult<()> {
        self.stage(Staged::Insert(entity)).await;
        Ok(())
    }

    async fn add_range(&self, entities: Vec<E>) -> RepositoryResult<()> {
        let mut state = self.state.lock().await;
        state.staged.extend(entities.into_iter().map(Staged::Insert));
        Ok(())
    }

    async fn update(&self, entity: E) -> RepositoryResult<()> {
        self.stage(Staged::Update(entity)).await;
        Ok(())
    }

    async fn update_range(&self, entities: Vec<E>) -> RepositoryResult<()> {
        let mut state = self.state.lock().await;
        state.staged.extend(entities.into_iter().map(Staged::Update));
        Ok(())
    }

    async fn delete(&self, entity: E) -> RepositoryResult<()> {
        self.stage(Staged::Delete(entity.key().to_string())).await;
        Ok(())
    }

    async fn delete_range(&self, entities: Vec<E>) -> RepositoryResult<()> {
        let mut state = self.state.lock().await;
        state
            .staged
            .extend(entities.iter().map(|e| Staged::Delete(e.key().to_string())));
        Ok(())
    }

    async fn detach(&self, id: &E::Key) -> RepositoryResult<()> {
        let key = id.to_string();
        self.state.lock().await.staged.retain(|c| c.key() != key);
        Ok(())
    }

    async fn detach_range(&self, ids: &[E::Key]) -> RepositoryResult<()> {
        let keys: Vec<String> = ids.iter().map(ToString::to_string).collect();
        self.state
            .lock()
            .await
            .staged
            .retain(|c| !keys.contains(&c.key()));
        Ok(())
    }

    async fn begin_transaction(&self, isolation: Option<IsolationLevel>) -> RepositoryResult<()> {
        self.ensure_indexes().await?;
        let mut state = self.state.lock().await;
        if state.in_tx {
            return Err(RepositoryError::transaction_active());
        }
        if let Some(level) = isolation {
            tracing::debug!(
                table = E::TABLE,
                isolation = %level,
                "surrealdb does not expose isolation levels; request ignored"
            );
        }
        state.in_tx = true;
        Ok(())
    }

    async fn commit(&self, accept_all_changes: bool) -> RepositoryResult<u64> {
        let state = &mut *self.state.lock().await;
        if !state.in_tx {
            return Err(RepositoryError::no_active_transaction(
                RepositoryOperation::Commit,
            ));
        }
        // the batch either applies atomically or not at all; either way
        // the transaction handle is spent
        state.in_tx = false;
        let affected = self
            .run_batch(&state.staged, RepositoryOperation::Commit)
            .await?;
        if accept_all_changes {
            state.staged.clear();
        }
        Ok(affected)
    }

    async fn rollback(&self) -> RepositoryResult<()> {
        let mut state = self.state.lock().await;
        if !state.in_tx {
            return Err(RepositoryError::no_active_transaction(
                RepositoryOperation::Rollback,
            ));
        }
        // nothing was sent; dropping the flag discards the transaction
        state.in_tx = false;
        Ok(())
    }

    async fn save(&self) -> RepositoryResult<u64> {
        let state = &mut *self.state.lock().await;
        if state.in_tx {
            tracing::debug!(
                table = E::TABLE,
                staged = state.staged.len(),
                "transaction open; staged changes remain queued until commit"
            );
            return Ok(state.staged.len() as u64);
        }
        let affected = self
            .run_batch(&state.staged, RepositoryOperation::Save)
            .await?;
        state.staged.clear();
        if affected == 0 {
            tracing::warn!(table = E::TABLE, "save affected zero records");
        }
        Ok(affected)
    }

    async fn save_expecting(&self, expected: u64) -> RepositoryResult<u64> {
        let affected = self.save().await?;
        if affected != expected {
            tracing::warn!(
                table = E::TABLE,
                expected,
                affected,
                "save affected an unexpected number of records"
            );
        }
        Ok(affected)
    }

    async fn save_checked(&self) -> RepositoryResult<u64> {
        match self.save().await {
            Ok(affected) => Ok(affected),
            Err(error) => {
                self.state.lock().await.in_tx = false;
                Err(error)
            }
        }
    }
}

impl<E: Entity> RawExecute for SurrealCommandRepository<E> {
    async fn execute_raw(
        &self,
        statement: &str,
        params: &[FilterValue],
    ) -> RepositoryResult<u64> {
        if statement.trim().is_empty() {
            return Err(
                RepositoryError::invalid_argument("statement text must not be empty")
                    .with_operation(RepositoryOperation::RawExecute),
            );
        }
        let mut request = self.client.query(statement);
        for (index, value) in params.iter().enumerate() {
            request = request.bind((format!("p{}", index + 1), ql::bind_json(value)));
        }
        let mut response = request
            .await
            .map_err(|e| super::classify(RepositoryOperation::RawExecute, e))?
            .check()
            .map_err(|e| super::classify(RepositoryOperation::RawExecute, e))?;
        // a statement may produce a scalar rather than a record set; that
        // affects no records
        let affected = match response.take::<Vec<Value>>(0) {
            Ok(results) => results.len() as u64,
            Err(e) => {
                tracing::debug!(error = %e, "statement result is not a record set");
                0
            }
        };
        Ok(affected)
    }
}
