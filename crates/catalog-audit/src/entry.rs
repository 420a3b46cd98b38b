use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use catalog_types::{ActorId, RecordRef};

/// Kind of change described by an [`AuditEntry`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Added,
    Changed,
    Deleted,
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Added => write!(f, "added"),
            Self::Changed => write!(f, "changed"),
            Self::Deleted => write!(f, "deleted"),
        }
    }
}

/// One structured change description.
///
/// `related` names the other record involved: for `Added` the row that now
/// links to `record`, for `Changed` the record a moved row now points at.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub actor: ActorId,
    pub action: AuditAction,
    pub record: RecordRef,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related: Option<RecordRef>,
}

impl AuditEntry {
    fn new(actor: ActorId, action: AuditAction, record: RecordRef) -> Self {
        Self {
            id: Uuid::now_v7(),
            timestamp: Utc::now(),
            actor,
            action,
            record,
            fields: Vec::new(),
            related: None,
        }
    }

    pub fn added(actor: ActorId, record: RecordRef, related: Option<RecordRef>) -> Self {
        Self {
            related,
            ..Self::new(actor, AuditAction::Added, record)
        }
    }

    pub fn changed(
        actor: ActorId,
        record: RecordRef,
        fields: Vec<String>,
        related: Option<RecordRef>,
    ) -> Self {
        Self {
            fields,
            related,
            ..Self::new(actor, AuditAction::Changed, record)
        }
    }

    pub fn deleted(actor: ActorId, record: RecordRef) -> Self {
        Self::new(actor, AuditAction::Deleted, record)
    }

    /// Human-readable change message.
    pub fn summary(&self) -> String {
        match (self.action, &self.related) {
            (AuditAction::Added, Some(related)) => format!("added {related} to {}", self.record),
            (AuditAction::Added, None) => format!("added {}", self.record),
            (AuditAction::Changed, related) => {
                let mut msg = format!("changed {}", self.record);
                if !self.fields.is_empty() {
                    msg.push_str(&format!(" ({})", self.fields.join(", ")));
                }
                if let Some(related) = related {
                    msg.push_str(&format!(" -> {related}"));
                }
                msg
            }
            (AuditAction::Deleted, _) => format!("deleted {}", self.record),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rref(s: &str) -> RecordRef {
        s.parse().unwrap()
    }

    #[test]
    fn summaries() {
        let actor = ActorId::new(3);
        let added = AuditEntry::added(actor, rref("band#1"), Some(rref("band_genres#2")));
        assert_eq!(added.summary(), "added band_genres#2 to band#1");

        let changed = AuditEntry::changed(
            actor,
            rref("band_genres#2"),
            vec!["band".into()],
            Some(rref("band#1")),
        );
        assert_eq!(changed.summary(), "changed band_genres#2 (band) -> band#1");

        assert_eq!(AuditEntry::deleted(actor, rref("band#2")).summary(), "deleted band#2");
    }

    #[test]
    fn json_shape() {
        let entry = AuditEntry::changed(ActorId::new(1), rref("band#1"), vec!["rank".into()], None);
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["action"], json!("changed"));
        assert_eq!(value["fields"], json!(["rank"]));
        assert!(value.get("related").is_none());
        let back: AuditEntry = serde_json::from_value(value).unwrap();
        assert_eq!(back, entry);
    }

    #[test]
    fn ids_are_v7_and_distinct() {
        let a = AuditEntry::deleted(ActorId::SYSTEM, rref("band#1"));
        let b = AuditEntry::deleted(ActorId::SYSTEM, rref("band#2"));
        assert_eq!(a.id.get_version_num(), 7);
        assert_ne!(a.id, b.id);
    }
}
