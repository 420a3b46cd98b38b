//! Audit log collaborator for the catalog merge engine.
//!
//! The engine never persists audit data itself. It describes every change as
//! an [`AuditEntry`] (added, changed or deleted, attributed to an
//! [`ActorId`](catalog_types::ActorId)) and hands it to an [`AuditSink`].
//!
//! Inside a transaction entries are collected in a [`PendingAudit`] buffer
//! and only flushed once the transaction has committed, so an aborted merge
//! leaves no audit trail.
//!
//! # Sinks
//!
//! - [`InMemoryAuditLog`] -- `Vec`-backed log for tests and embedding
//! - [`JsonLinesAuditLog`] -- appends one JSON object per line to a file

pub mod entry;
pub mod error;
pub mod file;
pub mod memory;
pub mod pending;
pub mod traits;

pub use entry::{AuditAction, AuditEntry};
pub use error::{AuditError, AuditResult};
pub use file::JsonLinesAuditLog;
pub use memory::InMemoryAuditLog;
pub use pending::PendingAudit;
pub use traits::AuditSink;
