use catalog_schema::SchemaError;
use catalog_types::{EntityType, RecordId, RecordRef};

use crate::deletion::ProtectedError;

/// Errors from record store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The entity type is not part of the store's catalog.
    #[error("unknown entity: {0}")]
    UnknownEntity(EntityType),

    /// The field is not declared on the entity type.
    #[error("unknown field {field} on {entity}")]
    UnknownField { entity: EntityType, field: String },

    /// The requested record does not exist.
    #[error("record not found: {0}")]
    RecordNotFound(RecordRef),

    /// A write would duplicate a `unique_together` tuple.
    #[error("unique violation on {entity} {fields:?}: {record} collides with {existing}")]
    UniqueViolation {
        entity: EntityType,
        fields: Vec<String>,
        record: RecordId,
        existing: RecordId,
    },

    /// Deleting the records would orphan protected references.
    #[error(transparent)]
    Protected(#[from] ProtectedError),

    /// Another transaction committed since this one began.
    #[error("transaction conflict: store moved from version {expected} to {found}")]
    Conflict { expected: u64, found: u64 },

    /// The savepoint does not belong to the current savepoint stack.
    #[error("unknown savepoint {0}")]
    UnknownSavepoint(usize),

    /// A thread panicked while holding the store lock.
    #[error("store lock poisoned")]
    LockPoisoned,

    /// The schema of a loaded snapshot is invalid.
    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error reading or writing a snapshot file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
