//! Record merge and deduplication for the catalog.
//!
//! Merging consolidates one or more secondary records into a primary: empty
//! fields of the primary are filled from the secondaries, every relationship
//! instance pointing at a secondary is repointed at the primary, and the
//! secondaries are deleted. The whole operation commits or rolls back as one
//! store transaction.
//!
//! # Key Types
//!
//! - [`MergePlan`] -- primary, ordered secondaries, expansion flag, resolved conflicts
//! - [`GapAnalysis`] / [`ConflictSet`] -- fillable fields and their candidate values
//! - [`ConflictResolver`] -- picks one value per conflicting field
//! - [`RelationMigrator`] -- repoints the instances of one relation
//! - [`MergeEngine`] -- coordinates analysis, migration, deletion and audit
//! - [`MergeConfig`] -- fallback, deletion, precondition and deadline settings
//!
//! # Invariants
//!
//! 1. A field of the primary that holds data before a merge holds the same data after it.
//! 2. With `expand` off, the primary's attributes do not change.
//! 3. After a committed merge nothing references a secondary.
//! 4. An aborted merge leaves storage and the audit log untouched.

pub mod config;
pub mod engine;
pub mod error;
pub mod gaps;
pub mod migrate;
pub mod phase;
pub mod plan;
pub mod resolve;

pub use config::MergeConfig;
pub use engine::{MergeEngine, MergeOutcome, MergePreview, ReferenceCount};
pub use error::{MergeError, MergeResult};
pub use gaps::{analyze, candidate_values, gap_fields, ConflictSet, GapAnalysis};
pub use migrate::{MigrationReport, RelationMigrator};
pub use phase::MergePhase;
pub use plan::MergePlan;
pub use resolve::{
    resolve_conflicts, ChoiceResolver, ConflictResolver, FirstCandidate, RejectConflicts,
};

#[cfg(test)]
pub(crate) mod test_support {
    use catalog_store::sample::archive_snapshot;
    use catalog_store::InMemoryRecordStore;
    use catalog_types::{EntityType, RecordId, RecordRef};

    pub fn entity(name: &str) -> EntityType {
        EntityType::new(name).unwrap()
    }

    pub fn rref(name: &str, id: u64) -> RecordRef {
        RecordRef::new(entity(name), RecordId::new(id))
    }

    pub fn ids(raw: &[u64]) -> Vec<RecordId> {
        raw.iter().copied().map(RecordId::new).collect()
    }

    pub fn archive_store() -> InMemoryRecordStore {
        InMemoryRecordStore::from_snapshot(archive_snapshot()).unwrap()
    }
}
