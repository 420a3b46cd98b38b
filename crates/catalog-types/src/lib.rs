//! Foundation types for the catalog merge engine.
//!
//! This crate provides the identity and value types shared by every other
//! catalog crate. Every other catalog crate depends on `catalog-types`.
//!
//! # Key Types
//!
//! - [`EntityType`] -- Validated name of an entity type (`band`, `magazine`, ...)
//! - [`RecordId`] -- Stable primary key of a record within its entity type
//! - [`RecordRef`] -- Fully qualified record address (`band#12`)
//! - [`ActorId`] -- Identity of whoever triggered a change, threaded into audit entries
//! - [`Value`] / [`Attributes`] -- Attribute values and the attribute map of a record

pub mod error;
pub mod identity;
pub mod value;

pub use error::TypeError;
pub use identity::{ActorId, EntityType, RecordId, RecordRef};
pub use value::{as_record_id, canonical_string, is_empty_value, Attributes, Value};
