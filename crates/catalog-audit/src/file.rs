use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::entry::AuditEntry;
use crate::error::{AuditError, AuditResult};
use crate::traits::AuditSink;

/// Audit log appending one JSON object per line to a file.
pub struct JsonLinesAuditLog {
    path: PathBuf,
    file: Mutex<File>,
}

impl JsonLinesAuditLog {
    /// Open `path` for appending, creating it if needed.
    pub fn open(path: impl AsRef<Path>) -> AuditResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every entry back from `path`.
    pub fn read_all(path: impl AsRef<Path>) -> AuditResult<Vec<AuditEntry>> {
        let text = std::fs::read_to_string(path)?;
        text.lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).map_err(AuditError::from))
            .collect()
    }
}

impl AuditSink for JsonLinesAuditLog {
    fn append(&self, entry: AuditEntry) -> AuditResult<()> {
        let mut line = serde_json::to_string(&entry)?;
        line.push('\n');
        let mut file = self.file.lock().map_err(|_| AuditError::LockPoisoned)?;
        file.write_all(line.as_bytes())?;
        Ok(())
    }

    fn append_batch(&self, entries: Vec<AuditEntry>) -> AuditResult<usize> {
        let mut buf = String::new();
        for entry in &entries {
            buf.push_str(&serde_json::to_string(entry)?);
            buf.push('\n');
        }
        let mut file = self.file.lock().map_err(|_| AuditError::LockPoisoned)?;
        file.write_all(buf.as_bytes())?;
        file.flush()?;
        Ok(entries.len())
    }
}

impl std::fmt::Debug for JsonLinesAuditLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonLinesAuditLog")
            .field("path", &self.path)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalog_types::{ActorId, RecordRef};

    #[test]
    fn appends_and_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");
        let record: RecordRef = "band#2".parse().unwrap();

        let log = JsonLinesAuditLog::open(&path).unwrap();
        log.record_deleted(ActorId::new(1), &record).unwrap();
        log.append_batch(vec![AuditEntry::deleted(ActorId::new(1), record.clone())])
            .unwrap();
        drop(log);

        // Reopening appends rather than truncating.
        let log = JsonLinesAuditLog::open(&path).unwrap();
        log.record_deleted(ActorId::new(2), &record).unwrap();

        let entries = JsonLinesAuditLog::read_all(&path).unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[2].actor, ActorId::new(2));
    }
}
