//! Merge transaction coordinator.
//!
//! A merge runs in one store transaction and moves through
//! `Pending -> Expanding -> Migrating -> Committed`. Any failure, a
//! commit conflict or an exceeded deadline ends it in `Aborted` with the
//! transaction rolled back and no audit entries delivered.

use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info, warn};

use catalog_audit::{AuditEntry, AuditSink, PendingAudit};
use catalog_schema::{DeletePolicy, EntitySchema, RelationDescriptor};
use catalog_store::{delete_records, is_protected, ProtectedError, Record, RecordStore, Transaction};
use catalog_types::{ActorId, Attributes, EntityType, RecordRef, Value};

use crate::config::MergeConfig;
use crate::error::{MergeError, MergeResult};
use crate::gaps::{analyze, GapAnalysis};
use crate::migrate::{MigrationReport, RelationMigrator};
use crate::phase::MergePhase;
use crate::plan::MergePlan;
use crate::resolve::{resolve_conflicts, ConflictResolver};

/// What a merge did.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MergeOutcome {
    /// The primary as re-read at the end of the merge.
    pub primary: Record,
    pub applied_updates: Attributes,
    /// Resolved updates dropped because the primary already had a value.
    pub ignored_updates: Vec<String>,
    pub migrations: Vec<MigrationReport>,
    /// Every row removed with the secondaries, cascades included.
    pub deleted: Vec<RecordRef>,
    pub audit: Vec<AuditEntry>,
    /// `Committed`, or `Aborted` for a dry run.
    pub phase: MergePhase,
}

impl MergeOutcome {
    pub fn moved(&self) -> usize {
        self.migrations.iter().map(|m| m.moved).sum()
    }
}

/// References to one secondary through one relation end.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ReferenceCount {
    pub relation: String,
    pub end: String,
    pub secondary: RecordRef,
    pub count: usize,
    pub on_delete: DeletePolicy,
}

/// Read-only forecast of a merge.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MergePreview {
    pub analysis: GapAnalysis,
    pub references: Vec<ReferenceCount>,
}

/// Coordinates merges against a [`RecordStore`].
pub struct MergeEngine<'s, S: RecordStore> {
    store: &'s S,
    config: MergeConfig,
}

impl<'s, S: RecordStore> MergeEngine<'s, S> {
    pub fn new(store: &'s S, config: MergeConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &MergeConfig {
        &self.config
    }

    /// Relations of `entity` as the catalog reports them.
    pub fn relations_of(
        &self,
        entity: &EntityType,
        forward: bool,
        reverse: bool,
    ) -> Vec<&'s RelationDescriptor> {
        self.store.catalog().relations_of(entity, forward, reverse)
    }

    /// Gap analysis of the plan's records as currently committed.
    pub fn analyze(&self, plan: &MergePlan) -> MergeResult<GapAnalysis> {
        let schema = self.check_preconditions(plan)?;
        let tx = self.store.begin()?;
        let (primary, secondaries) = load(&tx, plan)?;
        tx.rollback();
        Ok(analyze(schema, &primary, &secondaries))
    }

    /// Resolve the plan's conflicts with `resolver`.
    ///
    /// Returns the plan with the chosen values added to its resolved updates.
    pub fn prepare(&self, plan: &MergePlan, resolver: &dyn ConflictResolver) -> MergeResult<MergePlan> {
        let analysis = self.analyze(plan)?;
        let resolved = resolve_conflicts(&analysis.conflicts, resolver)?;
        Ok(plan.clone().with_resolved_updates(resolved))
    }

    /// Gap analysis plus the references that would move, without writing.
    pub fn preview(&self, plan: &MergePlan) -> MergeResult<MergePreview> {
        let schema = self.check_preconditions(plan)?;
        let tx = self.store.begin()?;
        let (primary, secondaries) = load(&tx, plan)?;

        let mut references = Vec::new();
        for relation in self.relations_of(&plan.entity, false, true) {
            for end in relation.ends_towards(&plan.entity) {
                for secondary in &secondaries {
                    let count = tx.find(&end.entity, &end.field, &key(secondary))?.len();
                    if count > 0 {
                        references.push(ReferenceCount {
                            relation: relation.name.clone(),
                            end: end.to_string(),
                            secondary: RecordRef::new(plan.entity.clone(), secondary.id),
                            count,
                            on_delete: end.on_delete,
                        });
                    }
                }
            }
        }
        tx.rollback();

        Ok(MergePreview {
            analysis: analyze(schema, &primary, &secondaries),
            references,
        })
    }

    /// Merge the plan's secondaries into its primary and commit.
    ///
    /// Audit entries reach `audit` only after the commit succeeded. If they
    /// cannot be delivered the merge stays committed and the error is
    /// [`MergeError::AuditAfterCommit`], carrying the outcome.
    pub fn merge(&self, plan: &MergePlan, audit: &dyn AuditSink) -> MergeResult<MergeOutcome> {
        let (outcome, pending) = self.merge_unaudited(plan)?;
        match pending.flush(audit) {
            Ok(_) => Ok(outcome),
            Err(source) => {
                warn!(primary = %plan.primary_ref(), error = %source, "merge committed, audit not delivered");
                Err(MergeError::AuditAfterCommit {
                    outcome: Box::new(outcome),
                    source,
                })
            }
        }
    }

    /// Merge and commit, handing the buffered audit entries back to the
    /// caller instead of delivering them.
    pub fn merge_unaudited(&self, plan: &MergePlan) -> MergeResult<(MergeOutcome, PendingAudit)> {
        self.execute(plan, true)
    }

    /// Run the merge and roll it back. Nothing is written or audited.
    pub fn dry_run(&self, plan: &MergePlan) -> MergeResult<MergeOutcome> {
        self.execute(plan, false).map(|(outcome, _)| outcome)
    }

    /// Replace every many-to-many link to `record` by links to `replacements`.
    ///
    /// Links the replacement already has are not duplicated. Returns the
    /// records on the other side whose links changed, in discovery order.
    pub fn replace(
        &self,
        record: &RecordRef,
        replacements: &[RecordRef],
        actor: ActorId,
        audit: &dyn AuditSink,
    ) -> MergeResult<Vec<RecordRef>> {
        let (changed, pending) = self.replace_unaudited(record, replacements, actor)?;
        pending.flush(audit)?;
        Ok(changed)
    }

    /// [`replace`](Self::replace) without delivering the audit entries.
    pub fn replace_unaudited(
        &self,
        record: &RecordRef,
        replacements: &[RecordRef],
        actor: ActorId,
    ) -> MergeResult<(Vec<RecordRef>, PendingAudit)> {
        if let Some(other) = replacements.iter().find(|r| r.entity != record.entity) {
            return Err(MergeError::EntityMismatch {
                expected: record.entity.clone(),
                record: other.clone(),
            });
        }

        let mut pending = PendingAudit::new(actor);
        let changed = self
            .store
            .with_transaction(|tx| self.replace_links(tx, record, replacements, &mut pending))?;

        info!(record = %record, replacements = replacements.len(), changed = changed.len(), "links replaced");
        Ok((changed, pending))
    }

    // -----------------------------------------------------------------------
    // Merge steps
    // -----------------------------------------------------------------------

    fn check_preconditions(&self, plan: &MergePlan) -> MergeResult<&'s EntitySchema> {
        self.config.validate()?;
        let schema = self.store.catalog().require_entity(&plan.entity)?;

        let found = plan.record_count();
        if found < self.config.min_records {
            return Err(MergeError::TooFewRecords {
                required: self.config.min_records,
                found,
            });
        }

        let primary_ref = plan.primary_ref();
        let primary = self
            .store
            .get(&plan.entity, plan.primary)?
            .ok_or_else(|| MergeError::RecordNotFound(primary_ref.clone()))?;

        let scope = schema.merge_scope.as_ref().filter(|_| self.config.enforce_merge_scope);
        for secondary_ref in plan.secondary_refs() {
            let secondary = self
                .store
                .get(&plan.entity, secondary_ref.id)?
                .ok_or_else(|| MergeError::RecordNotFound(secondary_ref.clone()))?;
            if let Some(field) = scope {
                if secondary.value(field) != primary.value(field) {
                    return Err(MergeError::ScopeMismatch {
                        field: field.clone(),
                        primary: primary_ref.clone(),
                        secondary: secondary_ref,
                    });
                }
            }
        }
        Ok(schema)
    }

    fn execute(&self, plan: &MergePlan, commit: bool) -> MergeResult<(MergeOutcome, PendingAudit)> {
        let schema = self.check_preconditions(plan)?;
        let started = Instant::now();
        let mut phase = MergePhase::Pending;
        let mut pending = PendingAudit::new(plan.actor);
        let mut tx = self.store.begin()?;

        let result = self.run(&mut tx, plan, schema, &mut pending, &mut phase, started);
        let mut outcome = match result {
            Ok(outcome) => outcome,
            Err(err) => {
                tx.rollback();
                advance(&mut phase, MergePhase::Aborted, plan);
                warn!(primary = %plan.primary_ref(), error = %err, "merge aborted");
                return Err(err);
            }
        };

        if !commit {
            tx.rollback();
            advance(&mut phase, MergePhase::Aborted, plan);
            outcome.phase = phase;
            return Ok((outcome, pending));
        }

        if let Err(err) = tx.commit() {
            advance(&mut phase, MergePhase::Aborted, plan);
            warn!(primary = %plan.primary_ref(), error = %err, "merge commit failed");
            return Err(err.into());
        }
        advance(&mut phase, MergePhase::Committed, plan);
        outcome.phase = phase;

        info!(
            primary = %plan.primary_ref(),
            secondaries = plan.secondaries.len(),
            updated = outcome.applied_updates.len(),
            moved = outcome.moved(),
            deleted = outcome.deleted.len(),
            "merge committed"
        );
        Ok((outcome, pending))
    }

    fn run(
        &self,
        tx: &mut S::Tx,
        plan: &MergePlan,
        schema: &EntitySchema,
        pending: &mut PendingAudit,
        phase: &mut MergePhase,
        started: Instant,
    ) -> MergeResult<MergeOutcome> {
        advance(phase, MergePhase::Expanding, plan);
        let primary_ref = plan.primary_ref();
        let secondary_refs = plan.secondary_refs();
        let (primary, secondaries) = load(tx, plan)?;

        let (applied_updates, ignored_updates) = if plan.expand {
            expansion(schema, &primary, &secondaries, &plan.resolved_updates)
        } else {
            (Attributes::new(), Vec::new())
        };
        if !applied_updates.is_empty() {
            tx.update(&plan.entity, &[plan.primary], &applied_updates)?;
            let fields: Vec<String> = applied_updates.keys().cloned().collect();
            pending.changed(&primary_ref, &fields, None);
        }
        self.check_deadline(started)?;

        advance(phase, MergePhase::Migrating, plan);
        let migrator = RelationMigrator::new(&self.config);
        let mut migrations = Vec::new();
        let mut still_protected = ProtectedError::default();
        for relation in self.relations_of(&plan.entity, false, true) {
            for secondary in &secondary_refs {
                match migrator.migrate(tx, relation, secondary, &primary_ref, pending) {
                    Ok(reports) => migrations.extend(reports),
                    Err(MergeError::RelationStillProtected { relation, protected }) => {
                        debug!(relation = %relation, secondary = %secondary, "relation still protected");
                        still_protected.extend(protected.links);
                    }
                    Err(err) => return Err(err),
                }
            }
            self.check_deadline(started)?;
        }

        if let Some(err) = is_protected(tx, &secondary_refs)? {
            still_protected.extend(err.links);
        }
        if !still_protected.is_empty() {
            return Err(MergeError::Protected(still_protected));
        }

        let deletion = delete_records(tx, &secondary_refs)?;
        for secondary in &secondary_refs {
            pending.deleted(secondary);
        }

        Ok(MergeOutcome {
            primary: tx.require(&primary_ref)?,
            applied_updates,
            ignored_updates,
            migrations,
            deleted: deletion.delete,
            audit: pending.entries().to_vec(),
            phase: *phase,
        })
    }

    fn check_deadline(&self, started: Instant) -> MergeResult<()> {
        let Some(limit) = self.config.deadline() else {
            return Ok(());
        };
        let elapsed = started.elapsed();
        if elapsed >= limit {
            return Err(MergeError::DeadlineExceeded {
                limit_ms: limit.as_millis() as u64,
                elapsed_ms: elapsed.as_millis() as u64,
            });
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Replace
    // -----------------------------------------------------------------------

    fn replace_links(
        &self,
        tx: &mut S::Tx,
        record: &RecordRef,
        replacements: &[RecordRef],
        pending: &mut PendingAudit,
    ) -> MergeResult<Vec<RecordRef>> {
        tx.require(record)?;
        for replacement in replacements {
            tx.require(replacement)?;
        }

        let mut changed: Vec<RecordRef> = Vec::new();
        // Without forward and reverse keys only many-to-many relations remain.
        for relation in self.relations_of(&record.entity, false, false) {
            let Some(join) = &relation.join else {
                continue;
            };
            for end in relation.ends_towards(&record.entity) {
                let Some(opposite) = relation.opposite_field(&end) else {
                    continue;
                };
                let other_entity = if end.field == join.source_field {
                    &relation.target
                } else {
                    &relation.owner
                };

                for link in tx.find(&end.entity, &end.field, &Value::from(record.id.get()))? {
                    let Some(other_id) = link.foreign_key(opposite) else {
                        continue;
                    };
                    for replacement in replacements {
                        if replacement == record
                            || (relation.is_self_referential() && replacement.id == other_id)
                        {
                            continue;
                        }
                        let linked = tx
                            .find(&end.entity, &end.field, &Value::from(replacement.id.get()))?
                            .iter()
                            .any(|l| l.foreign_key(opposite) == Some(other_id));
                        if !linked {
                            let mut attributes = link.attributes.clone();
                            attributes.insert(end.field.clone(), Value::from(replacement.id.get()));
                            tx.insert(&end.entity, attributes)?;
                        }
                    }
                    delete_records(tx, &[RecordRef::new(end.entity.clone(), link.id)])?;

                    let other = RecordRef::new(other_entity.clone(), other_id);
                    pending.changed(&other, std::slice::from_ref(&relation.field), None);
                    if !changed.contains(&other) {
                        changed.push(other);
                    }
                }
            }
        }
        Ok(changed)
    }
}

impl<S: RecordStore> std::fmt::Debug for MergeEngine<'_, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MergeEngine")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn advance(phase: &mut MergePhase, next: MergePhase, plan: &MergePlan) {
    debug_assert!(phase.can_advance_to(next), "{phase} -> {next}");
    debug!(primary = %plan.primary_ref(), from = %phase, to = %next, "merge phase");
    *phase = next;
}

/// The primary and the secondaries, in plan order.
fn load<T: Transaction>(tx: &T, plan: &MergePlan) -> MergeResult<(Record, Vec<Record>)> {
    let primary = tx.require(&plan.primary_ref())?;
    let secondaries = plan
        .secondary_refs()
        .iter()
        .map(|r| tx.require(r))
        .collect::<Result<Vec<_>, _>>()?;
    Ok((primary, secondaries))
}

/// Updates for the primary: unambiguous candidates plus resolved values
/// for gap fields. Resolved values for anything else are ignored.
fn expansion(
    schema: &EntitySchema,
    primary: &Record,
    secondaries: &[Record],
    resolved: &Attributes,
) -> (Attributes, Vec<String>) {
    let analysis = analyze(schema, primary, secondaries);
    let mut updates = analysis.updates.clone();
    let mut ignored = Vec::new();
    for (field, value) in resolved {
        if analysis.is_gap(field) {
            updates.insert(field.clone(), value.clone());
        } else {
            debug!(field = %field, "resolved update ignored, field is not a gap");
            ignored.push(field.clone());
        }
    }
    (updates, ignored)
}

fn key(record: &Record) -> Value {
    Value::from(record.id.get())
}
