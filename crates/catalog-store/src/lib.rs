//! Transactional record storage for the catalog merge engine.
//!
//! Records are rows of the entity types described by a
//! [`RelationCatalog`](catalog_schema::RelationCatalog). Every write happens
//! inside a [`Transaction`], which can nest savepoints and either commits as
//! a whole or leaves committed state untouched.
//!
//! # Storage Backends
//!
//! All backends implement the [`RecordStore`] trait:
//!
//! - [`InMemoryRecordStore`] -- snapshot-isolated store for tests, the CLI and embedding
//!
//! # Design Rules
//!
//! 1. `unique_together` is checked on every insert and update; tuples with a null are not compared.
//! 2. A bulk update either applies to every row or to none.
//! 3. Raw [`Transaction::remove`] ignores delete policies; [`delete_records`] honors them.
//! 4. A commit fails with [`StoreError::Conflict`] if another transaction committed first.

pub mod deletion;
pub mod error;
pub mod memory;
pub mod record;
pub mod sample;
pub mod snapshot;
pub mod traits;

pub use deletion::{
    collect_deletion, delete_records, is_protected, DeletionPlan, ProtectedError, ProtectingLink,
};
pub use error::{StoreError, StoreResult};
pub use memory::{InMemoryRecordStore, MemoryTransaction};
pub use record::Record;
pub use snapshot::Snapshot;
pub use traits::{RecordStore, Savepoint, Transaction};
