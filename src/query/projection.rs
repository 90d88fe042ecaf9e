//! Projection specifications
//!
//! A projection maps an entity to a different output type without handing
//! the full entity to the caller. Resolution order is fixed: an explicit
//! mapper function wins over a declarative field-mapping config, which
//! wins over convention-based member-name matching. The config and
//! convention strategies run through a `serde_json` intermediate, so
//! member-name matching is exactly serde's field matching.

use std::fmt;
use std::sync::Arc;

use serde::{de::DeserializeOwned, Serialize};

use crate::repository::{RepositoryError, RepositoryOperation, RepositoryResult};

/// Declarative field mapping from source member names to target member
/// names; unmapped members fall through by name
///
/// # Example
///
/// ```rust
/// use dockside::query::ProjectionConfig;
///
/// let config = ProjectionConfig::new().map("title", "label");
/// ```
#[derive(Debug, Clone, Default)]
pub struct ProjectionConfig {
    renames: Vec<(String, String)>,
}

impl ProjectionConfig {
    /// An empty config (pure convention mapping)
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Map a source member onto a differently named target member
    #[must_use]
    pub fn map(mut self, source: impl Into<String>, target: impl Into<String>) -> Self {
        self.renames.push((source.into(), target.into()));
        self
    }

    fn apply(&self, mut value: serde_json::Value) -> serde_json::Value {
        if let serde_json::Value::Object(ref mut object) = value {
            for (source, target) in &self.renames {
                if let Some(moved) = object.remove(source) {
                    object.insert(target.clone(), moved);
                }
            }
        }
        value
    }
}

/// How to shape an entity into a projection type
pub enum ProjectionSpec<E, P> {
    /// Explicit mapping function; always wins
    Mapper(Arc<dyn Fn(&E) -> P + Send + Sync>),
    /// Declarative field-mapping config
    Config(ProjectionConfig),
    /// Convention-based member-name matching
    Convention,
}

impl<E, P> ProjectionSpec<E, P> {
    /// An explicit mapper
    pub fn mapper(f: impl Fn(&E) -> P + Send + Sync + 'static) -> Self {
        Self::Mapper(Arc::new(f))
    }

    /// A declarative config
    pub fn config(config: ProjectionConfig) -> Self {
        Self::Config(config)
    }

    /// Convention-based mapping
    pub fn convention() -> Self {
        Self::Convention
    }
}

impl<E, P> Clone for ProjectionSpec<E, P> {
    fn clone(&self) -> Self {
        match self {
            Self::Mapper(f) => Self::Mapper(Arc::clone(f)),
            Self::Config(config) => Self::Config(config.clone()),
            Self::Convention => Self::Convention,
        }
    }
}

impl<E, P> fmt::Debug for ProjectionSpec<E, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mapper(_) => write!(f, "ProjectionSpec::Mapper"),
            Self::Config(config) => write!(f, "ProjectionSpec::Config({config:?})"),
            Self::Convention => write!(f, "ProjectionSpec::Convention"),
        }
    }
}

impl<E, P> ProjectionSpec<E, P>
where
    E: Serialize,
    P: DeserializeOwned,
{
    /// Apply the projection to one entity
    pub fn project(&self, entity: &E) -> RepositoryResult<P> {
        match self {
            Self::Mapper(f) => Ok(f(entity)),
            Self::Config(config) => {
                let value = to_intermediate(entity)?;
                from_intermediate(config.apply(value))
            }
            Self::Convention => from_intermediate(to_intermediate(entity)?),
        }
    }

    /// Apply the projection to a collection
    pub fn project_all(&self, entities: &[E]) -> RepositoryResult<Vec<P>> {
        entities.iter().map(|e| self.project(e)).collect()
    }
}

fn to_intermediate<E: Serialize>(entity: &E) -> RepositoryResult<serde_json::Value> {
    serde_json::to_value(entity).map_err(|e| {
        RepositoryError::serialization_error(
            RepositoryOperation::GetAll,
            format!("projection source failed to serialize: {e}"),
        )
    })
}

fn from_intermediate<P: DeserializeOwned>(value: serde_json::Value) -> RepositoryResult<P> {
    serde_json::from_value(value).map_err(|e| {
        RepositoryError::serialization_error(
            RepositoryOperation::GetAll,
            format!("projection target failed to deserialize: {e}"),
        )
    })
}
