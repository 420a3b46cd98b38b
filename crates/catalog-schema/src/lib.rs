//! Schema description and relation catalog.
//!
//! The catalog is computed once from an explicit [`SchemaDef`] and is
//! immutable afterwards. It answers one question for the rest of the engine:
//! which relationships reference a given entity type, and which foreign-key
//! field on which entity implements each of them.
//!
//! # Relation kinds
//!
//! - many-to-one forward: a foreign key declared on the queried entity
//! - one-to-many reverse: a foreign key declared elsewhere that targets it
//! - many-to-many direct: a link set whose join entity is synthesised
//! - many-to-many via join: a link set through a declared join entity
//!
//! Topology problems (unknown targets, ambiguous join roles, inheritance
//! cycles) are reported by [`RelationCatalog::build`], never later.
//!
//! # Modules
//!
//! - [`definition`] -- serde types describing a schema
//! - [`relation`] -- [`RelationDescriptor`] and friends
//! - [`catalog`] -- [`RelationCatalog`] construction and queries
//! - [`sample`] -- the archive schema used by the CLI demo and tests

pub mod catalog;
pub mod definition;
pub mod error;
pub mod relation;
pub mod sample;

pub use catalog::{EntitySchema, RelationCatalog};
pub use definition::{EntityDef, FieldDef, FieldKind, ManyToManyDef, SchemaDef};
pub use error::{SchemaError, SchemaResult};
pub use relation::{DeletePolicy, JoinDescriptor, RelationDescriptor, RelationEnd, RelationKind};
