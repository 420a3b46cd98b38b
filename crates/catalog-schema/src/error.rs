//! Error types for schema and catalog construction.

use catalog_types::TypeError;
use thiserror::Error;

/// Configuration errors found while building a [`RelationCatalog`](crate::RelationCatalog).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("invalid name: {0}")]
    InvalidName(#[from] TypeError),

    #[error("entity declared twice: {0}")]
    DuplicateEntity(String),

    #[error("unknown entity: {0}")]
    UnknownEntity(String),

    #[error("entity {entity} extends unknown parent {parent}")]
    UnknownParent { entity: String, parent: String },

    #[error("inheritance cycle through {0}")]
    InheritanceCycle(String),

    #[error("field {field} declared twice on {entity}")]
    DuplicateField { entity: String, field: String },

    #[error("field name {field} on {entity} is reserved")]
    ReservedField { entity: String, field: String },

    #[error("unknown field {field} on {entity}")]
    UnknownField { entity: String, field: String },

    #[error("{entity}.{field} targets unknown entity {target}")]
    UnknownTarget {
        entity: String,
        field: String,
        target: String,
    },

    #[error("{entity}.{field} targets abstract entity {target}")]
    AbstractTarget {
        entity: String,
        field: String,
        target: String,
    },

    #[error("ambiguous join roles for {relation} on {join}: candidates {candidates:?}")]
    AmbiguousJoin {
        relation: String,
        join: String,
        candidates: Vec<String>,
    },

    #[error("join entity {join} has no foreign key for the {side} side of {relation}")]
    MissingJoinRole {
        relation: String,
        join: String,
        side: &'static str,
    },

    #[error("invalid through_fields for {relation}: {reason}")]
    InvalidThroughFields { relation: String, reason: String },
}

/// Convenience alias for schema results.
pub type SchemaResult<T> = Result<T, SchemaError>;
