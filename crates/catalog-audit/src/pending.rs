use tracing::debug;

use catalog_types::{ActorId, RecordRef};

use crate::entry::AuditEntry;
use crate::error::AuditResult;
use crate::traits::AuditSink;

/// Audit entries collected inside a transaction.
///
/// Nothing reaches a sink until [`flush`](Self::flush) is called after the
/// transaction commits. Dropping the buffer discards its entries.
#[derive(Debug)]
pub struct PendingAudit {
    actor: ActorId,
    entries: Vec<AuditEntry>,
}

impl PendingAudit {
    pub fn new(actor: ActorId) -> Self {
        Self {
            actor,
            entries: Vec::new(),
        }
    }

    pub fn actor(&self) -> ActorId {
        self.actor
    }

    pub fn added(&mut self, record: &RecordRef, related: Option<&RecordRef>) {
        self.entries
            .push(AuditEntry::added(self.actor, record.clone(), related.cloned()));
    }

    pub fn changed(&mut self, record: &RecordRef, fields: &[String], related: Option<&RecordRef>) {
        self.entries.push(AuditEntry::changed(
            self.actor,
            record.clone(),
            fields.to_vec(),
            related.cloned(),
        ));
    }

    pub fn deleted(&mut self, record: &RecordRef) {
        self.entries
            .push(AuditEntry::deleted(self.actor, record.clone()));
    }

    pub fn entries(&self) -> &[AuditEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Current buffer position, for [`truncate`](Self::truncate).
    pub fn mark(&self) -> usize {
        self.entries.len()
    }

    /// Drop entries buffered after `mark`, e.g. after a savepoint rollback.
    pub fn truncate(&mut self, mark: usize) {
        self.entries.truncate(mark);
    }

    /// Hand every buffered entry to `sink`, in order.
    pub fn flush(self, sink: &dyn AuditSink) -> AuditResult<usize> {
        let count = sink.append_batch(self.entries)?;
        debug!(actor = %self.actor, entries = count, "audit entries flushed");
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryAuditLog;

    fn rref(s: &str) -> RecordRef {
        s.parse().unwrap()
    }

    #[test]
    fn nothing_reaches_the_sink_before_flush() {
        let log = InMemoryAuditLog::new();
        let mut pending = PendingAudit::new(ActorId::new(9));
        pending.changed(&rref("band#1"), &["description".to_string()], None);
        pending.deleted(&rref("band#2"));
        assert!(log.is_empty());

        assert_eq!(pending.flush(&log).unwrap(), 2);
        let entries = log.entries().unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().all(|e| e.actor == ActorId::new(9)));
    }

    #[test]
    fn truncate_drops_entries_after_mark() {
        let mut pending = PendingAudit::new(ActorId::SYSTEM);
        pending.deleted(&rref("band#2"));
        let mark = pending.mark();
        pending.added(&rref("band#1"), Some(&rref("band_genres#3")));
        pending.truncate(mark);
        assert_eq!(pending.len(), 1);
    }
}
