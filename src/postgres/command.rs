//! Write-side PostgreSQL repository
//!
//! Changes stage in memory on the repository instance; `save` flushes them
//! inside an implicit transaction (or the explicitly opened one), `commit`
//! flushes and commits the explicit handle. A flush failure during commit
//! rolls the handle back before the error propagates, so a failed commit
//! never leaves a half-applied batch.

use std::marker::PhantomData;

use sqlx::{PgConnection, PgPool, Postgres, Transaction};
use tokio::sync::Mutex;

use super::sql;
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
    tx: Option<Transaction<'static, Postgres>>,
}

/// [`CommandRepository`] over a PostgreSQL pool
pub struct PgCommandRepository<E: Entity> {
    pool: PgPool,
    state: Mutex<CommandState<E>>,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> PgCommandRepository<E> {
    /// Create a repository over an existing pool
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            state: Mutex::new(CommandState {
                staged: Vec::new(),
                tx: None,
            }),
            _entity: PhantomData,
        }
    }

    async fn stage(&self, change: Staged<E>) {
        self.state.lock().await.staged.push(change);
    }

    async fn save_locked(&self, operation: RepositoryOperation) -> RepositoryResult<u64> {
        let state = &mut *self.state.lock().await;
        let affected = match state.tx.as_mut() {
            Some(tx) => flush::<E>(&state.staged, &mut *tx, operation).await?,
            None => {
                let mut tx = self
                    .pool
                    .begin()
                    .await
                    .map_err(|e| super::classify(operation, e))?;
                let affected = flush::<E>(&state.staged, &mut tx, operation).await?;
                tx.commit()
                    .await
                    .map_err(|e| super::classify(operation, e))?;
                affected
            }
        };
        state.staged.clear();
        if affected == 0 {
            tracing::warn!(table = E::TABLE, "save affected zero rows");
        }
        Ok(affected)
    }
}

async fn flush<E: Entity>(
    staged: &[Staged<E>],
    conn: &mut PgConnection,
    operation: RepositoryOperation,
) -> RepositoryResult<u64> {
    let mut affected = 0;
    for change in staged {
        let result = match change {
            Staged::Insert(entity) => {
                let statement = sql::render_insert::<E>();
                let document = sql::entity_document(entity, operation)?;
                sqlx::query(&statement)
                    .bind(document)
                    .execute(&mut *conn)
                    .await
            }
            Staged::Update(entity) => {
                let statement = sql::render_update::<E>();
                let document = sql::entity_document(entity, operation)?;
                sqlx::query(&statement)
                    .bind(document)
                    .bind(entity.key().to_string())
                    .execute(&mut *conn)
                    .await
            }
            Staged::Delete(key) => {
                let statement = sql::render_delete::<E>();
                sqlx::query(&statement)
                    .bind(key.clone())
                    .execute(&mut *conn)
                    .await
            }
        };
        let result = result
            .map_err(|e| super::classify(operation, e).with_entity(E::TABLE, change.key()))?;
        affected += result.rows_affected();
    }
    Ok(affected)
}

impl<E: Entity> CommandRepository<E> for PgCommandRepository<E> {
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
        let mut state = self.state.lock().await;
        if state.tx.is_some() {
            return Err(RepositoryError::transaction_active());
        }
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| super::classify(RepositoryOperation::BeginTransaction, e))?;
        if let Some(level) = isolation {
            sqlx::query(&format!("SET TRANSACTION ISOLATION LEVEL {level}"))
                .execute(&mut *tx)
                .await
                .map_err(|e| super::classify(RepositoryOperation::BeginTransaction, e))?;
        }
        state.tx = Some(tx);
        Ok(())
    }

    async fn commit(&self, accept_all_changes: bool) -> RepositoryResult<u64> {
        let state = &mut *self.state.lock().await;
        let mut tx = state
            .tx
            .take()
            .ok_or_else(|| RepositoryError::no_active_transaction(RepositoryOperation::Commit))?;

        match flush::<E>(&state.staged, &mut tx, RepositoryOperation::Commit).await {
            Ok(affected) => {
                tx.commit()
                    .await
                    .map_err(|e| super::classify(RepositoryOperation::Commit, e))?;
                if accept_all_changes {
                    state.staged.clear();
                }
                Ok(affected)
            }
            Err(error) => {
                if let Err(rollback_error) = tx.rollback().await {
                    tracing::error!(
                        error = %rollback_error,
                        "rollback after failed commit also failed"
                    );
                }
                Err(error)
            }
        }
    }

    async fn rollback(&self) -> RepositoryResult<()> {
        let tx = self.state.lock().await.tx.take().ok_or_else(|| {
            RepositoryError::no_active_transaction(RepositoryOperation::Rollback)
        })?;
        tx.rollback()
            .await
            .map_err(|e| super::classify(RepositoryOperation::Rollback, e))
    }

    async fn save(&self) -> RepositoryResult<u64> {
        self.save_locked(RepositoryOperation::Save).await
    }

    async fn save_expecting(&self, expected: u64) -> RepositoryResult<u64> {
        let affected = self.save_locked(RepositoryOperation::Save).await?;
        if affected != expected {
            tracing::warn!(
                table = E::TABLE,
                expected,
                affected,
                "save affected an unexpected number of rows"
            );
        }
        Ok(affected)
    }

    async fn save_checked(&self) -> RepositoryResult<u64> {
        match self.save_locked(RepositoryOperation::Save).await {
            Ok(affected) => Ok(affected),
            Err(error) => {
                if let Some(tx) = self.state.lock().await.tx.take() {
                    if let Err(rollback_error) = tx.rollback().await {
                        tracing::error!(
                            error = %rollback_error,
                            "rollback after failed save also failed"
                        );
                    }
                }
                Err(error)
            }
        }
    }
}

impl<E: Entity> RawExecute for PgCommandRepository<E> {
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
        let state = &mut *self.state.lock().await;
        let result = match state.tx.as_mut() {
            Some(tx) => {
                sql::bind_values(sqlx::query(statement), params)
                    .execute(&mut **tx)
                    .await
            }
            None => {
                sql::bind_values(sqlx::query(statement), params)
                    .execute(&self.pool)
                    .await
            }
        };
        result
            .map(|r| r.rows_affected())
            .map_err(|e| super::classify(RepositoryOperation::RawExecute, e))
    }
}
