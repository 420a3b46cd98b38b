//! Deletion collector.
//!
//! Deleting a record walks every foreign key that references it, join-entity
//! roles included, and applies the key's delete policy: cascade deletes the
//! referencing row (recursively), set-null clears the key, protect blocks the
//! deletion unless the referencing row is itself being deleted, and
//! do-nothing leaves the row alone.

use std::collections::{BTreeMap, HashSet, VecDeque};
use std::fmt;

use serde::Serialize;
use tracing::debug;

use catalog_schema::DeletePolicy;
use catalog_types::{Attributes, EntityType, RecordId, RecordRef, Value};

use crate::error::StoreResult;
use crate::traits::Transaction;

/// A row that keeps `protected` alive through the foreign key `field`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct ProtectingLink {
    pub protected: RecordRef,
    pub by: RecordRef,
    pub field: String,
}

impl fmt::Display for ProtectingLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{} -> {}", self.by, self.field, self.protected)
    }
}

/// Records that cannot be deleted, with the rows protecting them.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ProtectedError {
    pub protected: Vec<RecordRef>,
    pub links: Vec<ProtectingLink>,
}

impl ProtectedError {
    pub fn from_links(links: Vec<ProtectingLink>) -> Self {
        let mut err = Self::default();
        err.extend(links);
        err
    }

    /// Add links, keeping `protected` free of duplicates.
    pub fn extend(&mut self, links: impl IntoIterator<Item = ProtectingLink>) {
        for link in links {
            if !self.protected.contains(&link.protected) {
                self.protected.push(link.protected.clone());
            }
            if !self.links.contains(&link) {
                self.links.push(link);
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// Rows protecting `record`.
    pub fn protecting(&self, record: &RecordRef) -> impl Iterator<Item = &RecordRef> + '_ {
        let record = record.clone();
        self.links
            .iter()
            .filter(move |l| l.protected == record)
            .map(|l| &l.by)
    }
}

impl fmt::Display for ProtectedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "protected records:")?;
        for record in &self.protected {
            let by: Vec<String> = self.protecting(record).map(ToString::to_string).collect();
            write!(f, " {record} (referenced by {})", by.join(", "))?;
        }
        Ok(())
    }
}

impl std::error::Error for ProtectedError {}

/// What deleting a set of records would do.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DeletionPlan {
    /// Targets first, then cascaded rows in discovery order.
    pub delete: Vec<RecordRef>,
    /// Rows whose foreign key would be nulled.
    pub set_null: Vec<(RecordRef, String)>,
    pub protected: Vec<ProtectingLink>,
}

impl DeletionPlan {
    pub fn protected_error(&self) -> Option<ProtectedError> {
        (!self.protected.is_empty()).then(|| ProtectedError::from_links(self.protected.clone()))
    }
}

/// Work out the consequences of deleting `targets` without writing anything.
pub fn collect_deletion<T: Transaction>(tx: &T, targets: &[RecordRef]) -> StoreResult<DeletionPlan> {
    let mut deleting: HashSet<RecordRef> = HashSet::new();
    let mut plan = DeletionPlan::default();
    let mut queue = VecDeque::new();

    for target in targets {
        tx.require(target)?;
        if deleting.insert(target.clone()) {
            plan.delete.push(target.clone());
            queue.push_back(target.clone());
        }
    }

    while let Some(current) = queue.pop_front() {
        let key = Value::from(current.id.get());
        for end in tx.catalog().foreign_keys_to(&current.entity) {
            for row in tx.find(&end.entity, &end.field, &key)? {
                let referencing = RecordRef::new(end.entity.clone(), row.id);
                match end.on_delete {
                    DeletePolicy::Cascade => {
                        if deleting.insert(referencing.clone()) {
                            plan.delete.push(referencing.clone());
                            queue.push_back(referencing);
                        }
                    }
                    DeletePolicy::SetNull => plan.set_null.push((referencing, end.field.clone())),
                    DeletePolicy::Protect => plan.protected.push(ProtectingLink {
                        protected: current.clone(),
                        by: referencing,
                        field: end.field.clone(),
                    }),
                    DeletePolicy::DoNothing => {}
                }
            }
        }
    }

    plan.set_null.retain(|(record, _)| !deleting.contains(record));
    plan.protected.retain(|link| !deleting.contains(&link.by));
    Ok(plan)
}

/// The protection that would block deleting `targets`, if any.
pub fn is_protected<T: Transaction>(
    tx: &T,
    targets: &[RecordRef],
) -> StoreResult<Option<ProtectedError>> {
    Ok(collect_deletion(tx, targets)?.protected_error())
}

/// Delete `targets` honoring every delete policy.
///
/// Fails with [`StoreError::Protected`](crate::StoreError::Protected) and
/// writes nothing when a protected reference would be orphaned.
pub fn delete_records<T: Transaction>(
    tx: &mut T,
    targets: &[RecordRef],
) -> StoreResult<DeletionPlan> {
    let plan = collect_deletion(tx, targets)?;
    if let Some(err) = plan.protected_error() {
        return Err(err.into());
    }

    for (record, field) in &plan.set_null {
        let changes = Attributes::from([(field.clone(), Value::Null)]);
        tx.update(&record.entity, &[record.id], &changes)?;
    }

    let mut by_entity: BTreeMap<&EntityType, Vec<RecordId>> = BTreeMap::new();
    for record in &plan.delete {
        by_entity.entry(&record.entity).or_default().push(record.id);
    }
    for (entity, ids) in by_entity {
        tx.remove(entity, &ids)?;
    }

    debug!(
        targets = targets.len(),
        deleted = plan.delete.len(),
        nulled = plan.set_null.len(),
        "records deleted"
    );
    Ok(plan)
}
