use std::sync::RwLock;

use catalog_types::RecordRef;

use crate::entry::AuditEntry;
use crate::error::{AuditError, AuditResult};
use crate::traits::AuditSink;

/// In-memory audit log.
///
/// Intended for tests and embedding. Entries are kept in append order.
pub struct InMemoryAuditLog {
    entries: RwLock<Vec<AuditEntry>>,
}

impl InMemoryAuditLog {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
        }
    }

    /// Copy of every entry, oldest first.
    pub fn entries(&self) -> AuditResult<Vec<AuditEntry>> {
        let entries = self.entries.read().map_err(|_| AuditError::LockPoisoned)?;
        Ok(entries.clone())
    }

    /// Entries about `record`, oldest first.
    pub fn for_record(&self, record: &RecordRef) -> AuditResult<Vec<AuditEntry>> {
        let entries = self.entries.read().map_err(|_| AuditError::LockPoisoned)?;
        Ok(entries
            .iter()
            .filter(|e| &e.record == record)
            .cloned()
            .collect())
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryAuditLog {
    fn default() -> Self {
        Self::new()
    }
}

impl AuditSink for InMemoryAuditLog {
    fn append(&self, entry: AuditEntry) -> AuditResult<()> {
        self.entries
            .write()
            .map_err(|_| AuditError::LockPoisoned)?
            .push(entry);
        Ok(())
    }
}

impl std::fmt::Debug for InMemoryAuditLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryAuditLog")
            .field("entry_count", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::AuditAction;
    use catalog_types::ActorId;

    fn rref(s: &str) -> RecordRef {
        s.parse().unwrap()
    }

    #[test]
    fn default_methods_build_entries() {
        let log = InMemoryAuditLog::new();
        let actor = ActorId::new(5);
        log.record_added(actor, &rref("band#1"), Some(&rref("band_genres#2")))
            .unwrap();
        log.record_changed(actor, &rref("band#1"), &["rank".to_string()], None)
            .unwrap();
        log.record_deleted(actor, &rref("band#2")).unwrap();

        let entries = log.entries().unwrap();
        let actions: Vec<_> = entries.iter().map(|e| e.action).collect();
        assert_eq!(
            actions,
            vec![AuditAction::Added, AuditAction::Changed, AuditAction::Deleted]
        );
        assert!(entries.iter().all(|e| e.actor == actor));
    }

    #[test]
    fn filter_by_record() {
        let log = InMemoryAuditLog::default();
        log.record_deleted(ActorId::SYSTEM, &rref("band#2")).unwrap();
        log.record_deleted(ActorId::SYSTEM, &rref("band#3")).unwrap();
        assert_eq!(log.for_record(&rref("band#3")).unwrap().len(), 1);
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn debug_format() {
        let log = InMemoryAuditLog::new();
        assert!(format!("{log:?}").contains("entry_count"));
        assert!(log.is_empty());
    }
}
