use catalog_audit::AuditError;
use catalog_schema::SchemaError;
use catalog_store::{ProtectedError, StoreError};
use catalog_types::{EntityType, RecordRef};

use crate::engine::MergeOutcome;

/// Errors from merge operations.
#[derive(Debug, thiserror::Error)]
pub enum MergeError {
    /// Secondaries are still referenced through protected relations.
    /// The merge was rolled back.
    #[error("merge aborted, {0}")]
    Protected(ProtectedError),

    /// Raised by the relation migrator for one relation; the coordinator
    /// aggregates these into [`MergeError::Protected`].
    #[error("relation {relation} is still protected: {protected}")]
    RelationStillProtected {
        relation: String,
        protected: ProtectedError,
    },

    #[error("record not found: {0}")]
    RecordNotFound(RecordRef),

    #[error("a merge needs at least {required} distinct records, got {found}")]
    TooFewRecords { required: usize, found: usize },

    /// The records disagree on the entity's merge scope field.
    #[error("{secondary} and {primary} differ in {field}")]
    ScopeMismatch {
        field: String,
        primary: RecordRef,
        secondary: RecordRef,
    },

    #[error("{record} is not a {expected}")]
    EntityMismatch { expected: EntityType, record: RecordRef },

    /// Conflicting fields without a chosen value.
    #[error("unresolved conflicts: {}", .0.join(", "))]
    UnresolvedConflict(Vec<String>),

    #[error("invalid choice for {field}: {reason}")]
    InvalidChoice { field: String, reason: String },

    #[error("merge deadline of {limit_ms} ms exceeded after {elapsed_ms} ms")]
    DeadlineExceeded { limit_ms: u64, elapsed_ms: u64 },

    #[error("store error: {0}")]
    Store(StoreError),

    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),

    /// The change committed but its audit entries could not be delivered.
    #[error("audit error: {0}")]
    Audit(#[from] AuditError),

    /// The merge committed; its audit entries could not be delivered.
    #[error("merge committed but its audit entries were not delivered: {source}")]
    AuditAfterCommit {
        outcome: Box<MergeOutcome>,
        source: AuditError,
    },

    #[error("configuration error: {0}")]
    Config(String),
}

impl From<StoreError> for MergeError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Protected(protected) => Self::Protected(protected),
            StoreError::RecordNotFound(record) => Self::RecordNotFound(record),
            other => Self::Store(other),
        }
    }
}

/// Result alias for merge operations.
pub type MergeResult<T> = Result<T, MergeError>;
