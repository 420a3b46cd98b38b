use catalog_types::{ActorId, RecordRef};

use crate::entry::AuditEntry;
use crate::error::AuditResult;

/// Receiver of structured change descriptions.
///
/// Implementations only persist; they never interpret or reject entries on
/// content grounds.
pub trait AuditSink: Send + Sync {
    /// Persist one entry.
    fn append(&self, entry: AuditEntry) -> AuditResult<()>;

    fn record_added(
        &self,
        actor: ActorId,
        record: &RecordRef,
        related: Option<&RecordRef>,
    ) -> AuditResult<()> {
        self.append(AuditEntry::added(actor, record.clone(), related.cloned()))
    }

    fn record_changed(
        &self,
        actor: ActorId,
        record: &RecordRef,
        fields: &[String],
        related: Option<&RecordRef>,
    ) -> AuditResult<()> {
        self.append(AuditEntry::changed(
            actor,
            record.clone(),
            fields.to_vec(),
            related.cloned(),
        ))
    }

    fn record_deleted(&self, actor: ActorId, record: &RecordRef) -> AuditResult<()> {
        self.append(AuditEntry::deleted(actor, record.clone()))
    }

    /// Persist several entries in order.
    ///
    /// Default implementation calls `append()` for each entry.
    fn append_batch(&self, entries: Vec<AuditEntry>) -> AuditResult<usize> {
        let count = entries.len();
        for entry in entries {
            self.append(entry)?;
        }
        Ok(count)
    }
}
