//! Relation migration.
//!
//! Repoints every relationship instance that references a secondary record
//! so that it references the primary instead. Instances that would duplicate
//! a link the primary already has are left behind; the secondary's deletion
//! takes care of them, except on protect relations, where they are deleted
//! here unless something else keeps them alive.
//!
//! The bulk repoint and each per-instance retry run in savepoints of the
//! merge transaction. Nothing the migrator does survives an aborted merge.

use serde::Serialize;
use tracing::debug;

use catalog_audit::PendingAudit;
use catalog_schema::{DeletePolicy, RelationDescriptor, RelationEnd};
use catalog_store::{delete_records, is_protected, ProtectedError, Record, StoreError, Transaction};
use catalog_types::{Attributes, RecordId, RecordRef, Value};

use crate::config::MergeConfig;
use crate::error::{MergeError, MergeResult};

/// What happened on one relation end for one secondary.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    pub relation: String,
    /// `<entity>.<field>` holding the foreign key.
    pub end: String,
    pub from: Option<RecordRef>,
    /// Instances that referenced the secondary.
    pub found: usize,
    /// Left out of the repoint because the primary already has an equal link.
    pub excluded: usize,
    pub moved: usize,
    /// Per-instance repoints that still violated uniqueness.
    pub skipped: usize,
    /// Unmovable instances deleted outright.
    pub deleted: usize,
    /// The bulk repoint failed and instances were retried one at a time.
    pub fell_back: bool,
}

/// Moves relationship instances from one record to another.
#[derive(Clone, Copy, Debug)]
pub struct RelationMigrator<'a> {
    config: &'a MergeConfig,
}

impl<'a> RelationMigrator<'a> {
    pub fn new(config: &'a MergeConfig) -> Self {
        Self { config }
    }

    /// Repoint `relation`'s instances from `from` to `to`.
    ///
    /// Returns one report per foreign key of the relation that points at
    /// `from`'s entity type (two for self-referential many-to-many
    /// relations, outgoing role first). Fails with
    /// [`MergeError::RelationStillProtected`] when a protect instance can be
    /// neither moved nor deleted.
    pub fn migrate<T: Transaction>(
        &self,
        tx: &mut T,
        relation: &RelationDescriptor,
        from: &RecordRef,
        to: &RecordRef,
        audit: &mut PendingAudit,
    ) -> MergeResult<Vec<MigrationReport>> {
        let mut reports = Vec::new();
        for end in relation.ends_towards(&from.entity) {
            reports.push(self.migrate_end(tx, relation, &end, from, to, audit)?);
        }
        Ok(reports)
    }

    fn migrate_end<T: Transaction>(
        &self,
        tx: &mut T,
        relation: &RelationDescriptor,
        end: &RelationEnd,
        from: &RecordRef,
        to: &RecordRef,
        audit: &mut PendingAudit,
    ) -> MergeResult<MigrationReport> {
        let mut report = MigrationReport {
            relation: relation.name.clone(),
            end: end.to_string(),
            from: Some(from.clone()),
            ..Default::default()
        };

        let instances = tx.find(&end.entity, &end.field, &key(from.id))?;
        report.found = instances.len();
        if instances.is_empty() {
            return Ok(report);
        }

        let held = self.tuples_held_by(tx, relation, end, to)?;
        let opposite = relation.opposite_field(end);
        let candidates: Vec<RecordId> = instances
            .iter()
            .filter(|row| {
                // A link between secondary and primary would become a self-link.
                let self_link = relation.is_self_referential()
                    && opposite.is_some_and(|f| row.foreign_key(f) == Some(to.id));
                !self_link && !held.iter().any(|(set, tuples)| {
                    row.tuple(set).is_some_and(|t| tuples.contains(&t))
                })
            })
            .map(|row| row.id)
            .collect();
        report.excluded = instances.len() - candidates.len();

        let moved = self.repoint(tx, end, &candidates, to, &mut report)?;
        for id in &moved {
            let instance = RecordRef::new(end.entity.clone(), *id);
            audit.added(to, Some(&instance));
            audit.changed(&instance, std::slice::from_ref(&end.field), Some(to));
        }
        report.moved = moved.len();

        let leftover = tx.find(&end.entity, &end.field, &key(from.id))?;
        if !leftover.is_empty() {
            report.deleted = self.clear_leftovers(tx, relation, end, &leftover, audit)?;
        }

        debug!(
            relation = %relation.name,
            end = %end,
            from = %from,
            found = report.found,
            excluded = report.excluded,
            moved = report.moved,
            skipped = report.skipped,
            deleted = report.deleted,
            "relation migrated"
        );
        Ok(report)
    }

    /// Unique tuples, minus the relation field, already held by `to`.
    fn tuples_held_by<T: Transaction>(
        &self,
        tx: &T,
        relation: &RelationDescriptor,
        end: &RelationEnd,
        to: &RecordRef,
    ) -> MergeResult<Vec<(Vec<String>, Vec<Vec<Value>>)>> {
        let sets = relation.unique_sets_without(&end.field);
        if sets.is_empty() {
            return Ok(Vec::new());
        }
        let existing = tx.find(&end.entity, &end.field, &key(to.id))?;
        Ok(sets
            .into_iter()
            .map(|set| {
                let tuples = existing.iter().filter_map(|row| row.tuple(&set)).collect();
                (set, tuples)
            })
            .collect())
    }

    /// Bulk repoint, falling back to one savepoint per instance.
    fn repoint<T: Transaction>(
        &self,
        tx: &mut T,
        end: &RelationEnd,
        ids: &[RecordId],
        to: &RecordRef,
        report: &mut MigrationReport,
    ) -> MergeResult<Vec<RecordId>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let changes = Attributes::from([(end.field.clone(), key(to.id))]);

        match tx.atomic(|tx| tx.update(&end.entity, ids, &changes)) {
            Ok(_) => return Ok(ids.to_vec()),
            Err(StoreError::UniqueViolation { .. }) if self.config.per_instance_fallback => {}
            Err(StoreError::UniqueViolation { .. }) => {
                debug!(end = %end, "bulk repoint violated uniqueness, fallback disabled");
                report.skipped = ids.len();
                return Ok(Vec::new());
            }
            Err(err) => return Err(err.into()),
        }

        debug!(end = %end, instances = ids.len(), "bulk repoint violated uniqueness, repointing one at a time");
        report.fell_back = true;
        let mut moved = Vec::with_capacity(ids.len());
        for id in ids {
            match tx.atomic(|tx| tx.update(&end.entity, &[*id], &changes)) {
                Ok(_) => moved.push(*id),
                Err(StoreError::UniqueViolation { existing, .. }) => {
                    debug!(end = %end, instance = %id, existing = %existing, "instance skipped");
                    report.skipped += 1;
                }
                Err(err) => return Err(err.into()),
            }
        }
        Ok(moved)
    }

    /// Deal with instances that still reference the secondary.
    ///
    /// Cascade and set-null instances are left to the secondary's deletion.
    /// Do-nothing instances would dangle and are deleted. Protect instances
    /// are deleted unless independently protected.
    fn clear_leftovers<T: Transaction>(
        &self,
        tx: &mut T,
        relation: &RelationDescriptor,
        end: &RelationEnd,
        leftover: &[Record],
        audit: &mut PendingAudit,
    ) -> MergeResult<usize> {
        let refs: Vec<RecordRef> = leftover
            .iter()
            .map(|row| RecordRef::new(end.entity.clone(), row.id))
            .collect();

        match end.on_delete {
            DeletePolicy::Cascade | DeletePolicy::SetNull => Ok(0),
            DeletePolicy::Protect if !self.config.delete_unmovable_protected => Ok(0),
            DeletePolicy::Protect => {
                let mut still = ProtectedError::default();
                for record in &refs {
                    if let Some(err) = is_protected(tx, std::slice::from_ref(record))? {
                        still.extend(err.links);
                    }
                }
                if !still.is_empty() {
                    return Err(MergeError::RelationStillProtected {
                        relation: relation.name.clone(),
                        protected: still,
                    });
                }
                self.delete(tx, &refs, audit)
            }
            DeletePolicy::DoNothing => self.delete(tx, &refs, audit),
        }
    }

    fn delete<T: Transaction>(
        &self,
        tx: &mut T,
        refs: &[RecordRef],
        audit: &mut PendingAudit,
    ) -> MergeResult<usize> {
        delete_records(tx, refs)?;
        for record in refs {
            audit.deleted(record);
        }
        Ok(refs.len())
    }
}

fn key(id: RecordId) -> Value {
    Value::from(id.get())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{archive_store, entity, rref};
    use catalog_store::RecordStore;
    use catalog_types::ActorId;
    use serde_json::json;

    fn relation(store: &impl RecordStore, name: &str) -> RelationDescriptor {
        store
            .catalog()
            .all_relations()
            .iter()
            .find(|r| r.name == name && r.kind != catalog_schema::RelationKind::ManyToOneForward)
            .cloned()
            .unwrap()
    }

    #[test]
    fn shared_many_to_many_link_is_not_duplicated() {
        let store = archive_store();
        let config = MergeConfig::default();
        let mut tx = store.begin().unwrap();
        let mut audit = PendingAudit::new(ActorId::new(1));
        let genres = relation(&store, "band.genres");

        let reports = RelationMigrator::new(&config)
            .migrate(&mut tx, &genres, &rref("band", 2), &rref("band", 1), &mut audit)
            .unwrap();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].found, 2);
        assert_eq!(reports[0].excluded, 1);
        assert_eq!(reports[0].moved, 1);

        let links = tx.find(&entity("band_genres"), "band", &json!(1)).unwrap();
        let genres: Vec<_> = links.iter().map(|l| l.value("genre")).collect();
        assert_eq!(genres, vec![json!(1), json!(2)]);
        // The duplicate (band 2, rock) stays behind for the cascade.
        let left = tx.find(&entity("band_genres"), "band", &json!(2)).unwrap();
        assert_eq!(left.len(), 1);
        // One moved instance: an added and a changed entry.
        assert_eq!(audit.len(), 2);
    }

    #[test]
    fn fallback_moves_what_it_can() {
        let store = archive_store();
        let config = MergeConfig::default();
        let mut tx = store.begin().unwrap();
        let mut audit = PendingAudit::new(ActorId::SYSTEM);
        // Without unique_together in the descriptor the exclusion step is
        // blind and the bulk update trips the store's check.
        let mut genres = relation(&store, "band.genres");
        genres.unique_together.clear();

        let reports = RelationMigrator::new(&config)
            .migrate(&mut tx, &genres, &rref("band", 2), &rref("band", 1), &mut audit)
            .unwrap();
        assert!(reports[0].fell_back);
        assert_eq!(reports[0].moved, 1);
        assert_eq!(reports[0].skipped, 1);
    }

    #[test]
    fn fallback_can_be_disabled() {
        let store = archive_store();
        let config = MergeConfig {
            per_instance_fallback: false,
            ..Default::default()
        };
        let mut tx = store.begin().unwrap();
        let mut audit = PendingAudit::new(ActorId::SYSTEM);
        let mut genres = relation(&store, "band.genres");
        genres.unique_together.clear();

        let reports = RelationMigrator::new(&config)
            .migrate(&mut tx, &genres, &rref("band", 2), &rref("band", 1), &mut audit)
            .unwrap();
        assert_eq!(reports[0].moved, 0);
        assert_eq!(reports[0].skipped, 2);
        assert!(audit.is_empty());
    }

    #[test]
    fn self_referential_links_move_both_roles() {
        let store = archive_store();
        let config = MergeConfig::default();
        let mut tx = store.begin().unwrap();
        let mut audit = PendingAudit::new(ActorId::SYSTEM);
        let related = relation(&store, "band.related");

        // band_related: 1 = (2 -> 4), 2 = (4 -> 3)
        let reports = RelationMigrator::new(&config)
            .migrate(&mut tx, &related, &rref("band", 4), &rref("band", 2), &mut audit)
            .unwrap();
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].end, "band_related.from_band");
        assert_eq!(reports[0].moved, 1);
        // (2 -> 4) would become (2 -> 2) and is left behind.
        assert_eq!(reports[1].end, "band_related.to_band");
        assert_eq!(reports[1].excluded, 1);

        let moved = tx.require(&rref("band_related", 2)).unwrap();
        assert_eq!(moved.value("from_band"), json!(2));
        assert_eq!(moved.value("to_band"), json!(3));
    }

    #[test]
    fn unmovable_protect_instances_are_deleted() {
        let store = archive_store();
        let config = MergeConfig::default();
        let mut tx = store.begin().unwrap();
        let mut audit = PendingAudit::new(ActorId::SYSTEM);
        let issues = relation(&store, "issue.magazine");

        // Issue 4 (Spin, 1991-09) collides with issue 1 on (magazine, name)
        // once moved to magazine 1; nothing protects it.
        let reports = RelationMigrator::new(&config)
            .migrate(&mut tx, &issues, &rref("magazine", 3), &rref("magazine", 1), &mut audit)
            .unwrap();
        assert_eq!(reports[0].excluded, 1);
        assert_eq!(reports[0].deleted, 1);
        assert!(tx.get(&entity("issue"), RecordId::new(4)).unwrap().is_none());
        assert_eq!(audit.entries()[0].action, catalog_audit::AuditAction::Deleted);
    }

    #[test]
    fn independently_protected_instance_fails_the_relation() {
        let store = archive_store();
        let config = MergeConfig::default();
        let mut tx = store.begin().unwrap();
        let mut audit = PendingAudit::new(ActorId::SYSTEM);
        let issues = relation(&store, "issue.magazine");

        // Issue 2 collides with issue 1 and article 2 protects it.
        let err = RelationMigrator::new(&config)
            .migrate(&mut tx, &issues, &rref("magazine", 2), &rref("magazine", 1), &mut audit)
            .unwrap_err();
        match err {
            MergeError::RelationStillProtected { relation, protected } => {
                assert_eq!(relation, "issue.magazine");
                assert_eq!(protected.protected, vec![rref("issue", 2)]);
                assert_eq!(protected.links[0].by, rref("article", 2));
            }
            other => panic!("expected RelationStillProtected, got {other:?}"),
        }
    }
}
