//! Repository error types
//!
//! Structured errors for repository operations: every failure carries the
//! operation that was running, an error kind from the crate taxonomy, and
//! optional entity context. Backends classify their native driver errors
//! into this taxonomy at the boundary, so nothing above them ever matches
//! on a driver error type.

use std::fmt;

/// Operation being performed when the repository error occurred
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RepositoryOperation {
    /// Point lookup by identity
    GetById,
    /// Filtered collection read
    GetAll,
    /// First-match read
    First,
    /// Single-match read
    Single,
    /// Last-match read
    Last,
    /// Existence check
    Any,
    /// Universal-match check
    All,
    /// Counting entities matching filters
    Count,
    /// Staging a new entity
    Add,
    /// Staging an entity update
    Update,
    /// Staging an entity removal
    Delete,
    /// Dropping staged changes for an entity
    Detach,
    /// Opening a transaction
    BeginTransaction,
    /// Committing a transaction
    Commit,
    /// Rolling back a transaction
    Rollback,
    /// Persisting staged changes
    Save,
    /// Raw query pass-through
    RawQuery,
    /// Raw statement pass-through
    RawExecute,
    /// Composing a query from the builder plan
    BuildQuery,
    /// Creating declared secondary indexes
    EnsureIndexes,
}

impl fmt::Display for RepositoryOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GetById => write!(f, "get_by_id"),
            Self::GetAll => write!(f, "get_all"),
            Self::First => write!(f, "first"),
            Self::Single => write!(f, "single"),
            Self::Last => write!(f, "last"),
            Self::Any => write!(f, "any"),
            Self::All => write!(f, "all_match"),
            Self::Count => write!(f, "count"),
            Self::Add => write!(f, "add"),
            Self::Update => write!(f, "update"),
            Self::Delete => write!(f, "delete"),
            Self::Detach => write!(f, "detach"),
            Self::BeginTransaction => write!(f, "begin_transaction"),
            Self::Commit => write!(f, "commit"),
            Self::Rollback => write!(f, "rollback"),
            Self::Save => write!(f, "save"),
            Self::RawQuery => write!(f, "query_raw"),
            Self::RawExecute => write!(f, "execute_raw"),
            Self::BuildQuery => write!(f, "build_query"),
            Self::EnsureIndexes => write!(f, "ensure_indexes"),
        }
    }
}

/// Category of repository error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RepositoryErrorKind {
    /// Caller passed an invalid argument (empty SQL text, bad property path).
    /// Raised before any I/O happens.
    InvalidArgument,
    /// Entity was not found. Point lookups represent absence as `None`,
    /// so this kind only appears on paths that require a match.
    NotFound,
    /// Entity already exists (duplicate key)
    AlreadyExists,
    /// More than one row matched a single-result query
    CardinalityViolation,
    /// Database constraint violation
    ConstraintViolation,
    /// A conflicting concurrent write was detected during save
    ConcurrencyConflict,
    /// Failed to connect to the backend
    ConnectionFailed,
    /// Operation timed out
    Timeout,
    /// Underlying database error
    DatabaseError,
    /// Serialization or deserialization error
    SerializationError,
    /// A transaction is already open on this repository instance
    TransactionActive,
    /// Commit or rollback was requested without an open transaction
    NoActiveTransaction,
    /// Other unclassified error
    Other,
}

impl fmt::Display for RepositoryErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidArgument => write!(f, "invalid_argument"),
            Self::NotFound => write!(f, "not_found"),
            Self::AlreadyExists => write!(f, "already_exists"),
            Self::CardinalityViolation => write!(f, "cardinality_violation"),
            Self::ConstraintViolation => write!(f, "constraint_violation"),
            Self::ConcurrencyConflict => write!(f, "concurrency_conflict"),
            Self::ConnectionFailed => write!(f, "connection_failed"),
            Self::Timeout => write!(f, "timeout"),
            Self::DatabaseError => write!(f, "database_error"),
            Self::SerializationError => write!(f, "serialization_error"),
            Self::TransactionActive => write!(f, "transaction_active"),
            Self::NoActiveTransaction => write!(f, "no_active_transaction"),
            Self::Other => write!(f, "other"),
        }
    }
}

/// Structured repository error with operation context
///
/// # Example
///
/// ```rust
/// use dockside::repository::{RepositoryError, RepositoryErrorKind};
///
/// let error = RepositoryError::invalid_argument("sql text must not be empty");
/// assert_eq!(error.kind, RepositoryErrorKind::InvalidArgument);
/// assert!(!error.is_retriable());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryError {
    /// The operation being performed when the error occurred
    pub operation: RepositoryOperation,
    /// The category of error
    pub kind: RepositoryErrorKind,
    /// Human-readable error message
    pub message: String,
    /// The storage name of the entity involved (e.g. "todos")
    pub entity_type: Option<String>,
    /// The identity of the entity involved
    pub entity_id: Option<String>,
}

impl RepositoryError {
    /// Create a new repository error
    pub fn new(
        operation: RepositoryOperation,
        kind: RepositoryErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            operation,
            kind,
            message: message.into(),
            entity_type: None,
            entity_id: None,
        }
    }

    /// Invalid caller input, detected before any I/O
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(
            RepositoryOperation::BuildQuery,
            RepositoryErrorKind::InvalidArgument,
            message,
        )
    }

    /// A required match was missing
    pub fn not_found(entity_type: impl Into<String>, entity_id: impl Into<String>) -> Self {
        Self::new(
            RepositoryOperation::GetById,
            RepositoryErrorKind::NotFound,
            "entity not found",
        )
        .with_entity(entity_type, entity_id)
    }

    /// More than one row matched a single-result query
    pub fn cardinality(entity_type: impl Into<String>) -> Self {
        Self {
            operation: RepositoryOperation::Single,
            kind: RepositoryErrorKind::CardinalityViolation,
            message: "query matched more than one entity".to_string(),
            entity_type: Some(entity_type.into()),
            entity_id: None,
        }
    }

    /// Duplicate-key violation during a write
    pub fn already_exists(operation: RepositoryOperation, message: impl Into<String>) -> Self {
        Self::new(operation, RepositoryErrorKind::AlreadyExists, message)
    }

    /// Database constraint violation
    pub fn constraint_violation(
        operation: RepositoryOperation,
        message: impl Into<String>,
    ) -> Self {
        Self::new(operation, RepositoryErrorKind::ConstraintViolation, message)
    }

    /// A conflicting concurrent write was detected
    pub fn concurrency_conflict(
        operation: RepositoryOperation,
        message: impl Into<String>,
    ) -> Self {
        Self::new(operation, RepositoryErrorKind::ConcurrencyConflict, message)
    }

    /// Backend connection failure
    pub fn connection_failed(message: impl Into<String>) -> Self {
        Self::new(
            RepositoryOperation::GetById,
            RepositoryErrorKind::ConnectionFailed,
            message,
        )
    }

    /// Operation timed out
    pub fn timeout(operation: RepositoryOperation, message: impl Into<String>) -> Self {
        Self::new(operation, RepositoryErrorKind::Timeout, message)
    }

    /// Unclassified backend error
    pub fn database_error(operation: RepositoryOperation, message: impl Into<String>) -> Self {
        Self::new(operation, RepositoryErrorKind::DatabaseError, message)
    }

    /// Serialization or deserialization failure
    pub fn serialization_error(operation: RepositoryOperation, message: impl Into<String>) -> Self {
        Self::new(operation, RepositoryErrorKind::SerializationError, message)
    }

    /// A transaction is already open on this repository instance
    pub fn transaction_active() -> Self {
        Self::new(
            RepositoryOperation::BeginTransaction,
            RepositoryErrorKind::TransactionActive,
            "a transaction is already open on this repository",
        )
    }

    /// Commit or rollback without an open transaction
    pub fn no_active_transaction(operation: RepositoryOperation) -> Self {
        Self::new(
            operation,
            RepositoryErrorKind::NoActiveTransaction,
            "no active transaction",
        )
    }

    /// Add entity context to an existing error
    #[must_use]
    pub fn with_entity(
        mut self,
        entity_type: impl Into<String>,
        entity_id: impl Into<String>,
    ) -> Self {
        self.entity_type = Some(entity_type.into());
        self.entity_id = Some(entity_id.into());
        self
    }

    /// Set the operation that caused the error
    #[must_use]
    pub fn with_operation(mut self, operation: RepositoryOperation) -> Self {
        self.operation = operation;
        self
    }

    /// Transient errors that may succeed on retry
    pub fn is_retriable(&self) -> bool {
        matches!(
            self.kind,
            RepositoryErrorKind::ConnectionFailed
                | RepositoryErrorKind::Timeout
                | RepositoryErrorKind::ConcurrencyConflict
        )
    }
}

impl fmt::Display for RepositoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "repository {} error during {}: {}",
            self.kind, self.operation, self.message
        )?;
        if let (Some(entity_type), Some(entity_id)) = (&self.entity_type, &self.entity_id) {
            write!(f, " [{}: {}]", entity_type, entity_id)?;
        }
        Ok(())
    }
}

impl std::error::Error for RepositoryError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operation_display() {
        assert_eq!(format!("{}", RepositoryOperation::GetById), "get_by_id");
        assert_eq!(format!("{}", RepositoryOperation::Single), "single");
        assert_eq!(
            format!("{}", RepositoryOperation::BeginTransaction),
            "begin_transaction"
        );
        assert_eq!(format!("{}", RepositoryOperation::RawQuery), "query_raw");
    }

    #[test]
    fn kind_display() {
        assert_eq!(
            format!("{}", RepositoryErrorKind::InvalidArgument),
            "invalid_argument"
        );
        assert_eq!(
            format!("{}", RepositoryErrorKind::CardinalityViolation),
            "cardinality_violation"
        );
        assert_eq!(
            format!("{}", RepositoryErrorKind::NoActiveTransaction),
            "no_active_transaction"
        );
    }

    #[test]
    fn invalid_argument_convenience() {
        let error = RepositoryError::invalid_argument("property path must not be empty");
        assert_eq!(error.kind, RepositoryErrorKind::InvalidArgument);
        assert_eq!(error.operation, RepositoryOperation::BuildQuery);
    }

    #[test]
    fn not_found_carries_entity_context() {
        let error = RepositoryError::not_found("todos", "42");
        assert_eq!(error.kind, RepositoryErrorKind::NotFound);
        assert_eq!(error.entity_type, Some("todos".to_string()));
        assert_eq!(error.entity_id, Some("42".to_string()));
    }

    #[test]
    fn cardinality_convenience() {
        let error = RepositoryError::cardinality("todos");
        assert_eq!(error.operation, RepositoryOperation::Single);
        assert_eq!(error.kind, RepositoryErrorKind::CardinalityViolation);
    }

    #[test]
    fn no_active_transaction_convenience() {
        let error = RepositoryError::no_active_transaction(RepositoryOperation::Commit);
        assert_eq!(error.kind, RepositoryErrorKind::NoActiveTransaction);
        assert_eq!(error.message, "no active transaction");
    }

    #[test]
    fn with_entity_and_operation() {
        let error = RepositoryError::connection_failed("connection refused")
            .with_operation(RepositoryOperation::Save)
            .with_entity("todos", "7");
        assert_eq!(error.operation, RepositoryOperation::Save);
        assert_eq!(error.entity_id, Some("7".to_string()));
    }

    #[test]
    fn retriable_classification() {
        assert!(RepositoryError::connection_failed("refused").is_retriable());
        assert!(
            RepositoryError::timeout(RepositoryOperation::GetAll, "timed out").is_retriable()
        );
        assert!(
            RepositoryError::concurrency_conflict(RepositoryOperation::Save, "stale write")
                .is_retriable()
        );
        assert!(!RepositoryError::not_found("todos", "1").is_retriable());
        assert!(!RepositoryError::cardinality("todos").is_retriable());
        assert!(!RepositoryError::transaction_active().is_retriable());
    }

    #[test]
    fn display_with_entity() {
        let error = RepositoryError::not_found("todos", "42");
        let display = format!("{}", error);
        assert!(display.contains("not_found"));
        assert!(display.contains("get_by_id"));
        assert!(display.contains("[todos: 42]"));
    }

    #[test]
    fn display_without_entity() {
        let error = RepositoryError::transaction_active();
        let display = format!("{}", error);
        assert!(display.contains("transaction_active"));
        assert!(!display.contains('['));
    }
}
