//! SurrealDB backend
//!
//! Entities live as documents, one table per entity type, keyed by the
//! record id. The adapter renders query plans to SurrealQL; navigation
//! loads become correlated subqueries aliased to the navigation field, so
//! the same serde types round-trip through both backends.
//!
//! Supports runtime protocol selection via URL scheme:
//! - `ws://` / `wss://` - WebSocket connections
//! - `http://` / `https://` - HTTP connections
//! - `mem://` - In-memory database (for testing)

mod command;
mod query;
mod ql;

pub use command::SurrealCommandRepository;
pub use query::SurrealQueryRepository;

use std::time::Duration;

use crate::config::SurrealDbConfig;
use crate::repository::{RepositoryError, RepositoryOperation, RepositoryResult};

/// SurrealDB client type alias using the `Any` engine for runtime protocol
/// selection
pub type SurrealClient = surrealdb::Surreal<surrealdb::engine::any::Any>;

/// Create a SurrealDB client with retry logic
///
/// Uses exponential backoff between attempts based on the configuration.
pub async fn connect(config: &SurrealDbConfig) -> RepositoryResult<SurrealClient> {
    let mut attempt = 0;
    let base_delay = Duration::from_secs(config.retry_delay_secs);

    loop {
        match try_connect(config).await {
            Ok(client) => {
                if attempt > 0 {
                    tracing::info!(
                        "surrealdb connection established after {} attempt(s)",
                        attempt + 1
                    );
                } else {
                    tracing::info!(
                        "surrealdb connected: url={}, ns={}, db={}",
                        sanitize_connection_url(&config.url),
                        config.namespace,
                        config.database
                    );
                }
                return Ok(client);
            }
            Err(e) => {
                attempt += 1;

                if attempt > config.max_retries {
                    tracing::error!(
                        "failed to connect to surrealdb after {} attempts: {}",
                        config.max_retries + 1,
                        e
                    );
                    return Err(e);
                }

                let delay = base_delay * 2_u32.pow(attempt.saturating_sub(1));
                tracing::warn!(
                    "surrealdb connection attempt {} failed: {}. retrying in {:?}...",
                    attempt,
                    e,
                    delay
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}

async fn try_connect(config: &SurrealDbConfig) -> RepositoryResult<SurrealClient> {
    let url_safe = sanitize_connection_url(&config.url);
    tracing::debug!("connecting to surrealdb: {}", url_safe);

    let client = surrealdb::engine::any::connect(&config.url)
        .await
        .map_err(|e| {
            RepositoryError::connection_failed(format!(
                "failed to connect to surrealdb at '{url_safe}': {e}"
            ))
        })?;

    if let (Some(username), Some(password)) = (&config.username, &config.password) {
        client
            .signin(surrealdb::opt::auth::Root { username, password })
            .await
            .map_err(|e| {
                RepositoryError::connection_failed(format!(
                    "failed to authenticate with surrealdb at '{url_safe}': {e}"
                ))
            })?;
    }

    client
        .use_ns(&config.namespace)
        .use_db(&config.database)
        .await
        .map_err(|e| {
            RepositoryError::connection_failed(format!(
                "failed to select namespace '{}' / database '{}' on surrealdb at '{url_safe}': {e}",
                config.namespace, config.database
            ))
        })?;

    Ok(client)
}

/// Sanitize connection URL for safe logging (remove credentials if present)
fn sanitize_connection_url(url: &str) -> String {
    if let Some(at_pos) = url.find('@') {
        if let Some(scheme_end) = url.find("://") {
            let scheme = &url[..=scheme_end + 2];
            let after_at = &url[at_pos..];
            return format!("{scheme}***{after_at}");
        }
    }
    url.to_string()
}

/// Classify a driver error into the crate taxonomy
///
/// The driver exposes most failures as message text, so classification
/// matches on the message.
pub(crate) fn classify(operation: RepositoryOperation, error: surrealdb::Error) -> RepositoryError {
    let message = error.to_string();
    let lower = message.to_lowercase();

    if lower.contains("already contains") || lower.contains("already exists") {
        RepositoryError::already_exists(operation, message)
    } else if lower.contains("timed out") || lower.contains("timeout") {
        RepositoryError::timeout(operation, message)
    } else if lower.contains("connect")
        || lower.contains("network")
        || lower.contains("websocket")
        || lower.contains("refused")
    {
        RepositoryError::connection_failed(message).with_operation(operation)
    } else if lower.contains("serializ") || lower.contains("deserializ") || lower.contains("parse")
    {
        RepositoryError::serialization_error(operation, message)
    } else {
        RepositoryError::database_error(operation, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::RepositoryErrorKind;

    #[test]
    fn sanitize_masks_credentials() {
        let sanitized = sanitize_connection_url("ws://root:root@localhost:8000");
        assert_eq!(sanitized, "ws://***@localhost:8000");
    }

    #[test]
    fn sanitize_passes_through_without_credentials() {
        assert_eq!(sanitize_connection_url("mem://"), "mem://");
    }

    #[test]
    fn duplicate_index_entries_classify_as_already_exists() {
        let error = surrealdb::Error::Api(surrealdb::error::Api::Query(
            "Database index `idx_categories_name` already contains 'Work'".to_string(),
        ));
        let classified = classify(RepositoryOperation::Save, error);
        assert_eq!(classified.kind, RepositoryErrorKind::AlreadyExists);
    }
}
