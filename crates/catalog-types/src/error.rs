use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid entity name {name:?}: {reason}")]
    InvalidEntityName { name: String, reason: String },

    #[error("invalid record id: {0}")]
    InvalidRecordId(String),

    #[error("invalid record reference {0:?}: expected <entity>#<id>")]
    InvalidRecordRef(String),
}
