use std::collections::BTreeMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::debug;

use catalog_schema::definition::PRIMARY_KEY;
use catalog_schema::{EntitySchema, RelationCatalog};
use catalog_types::{Attributes, EntityType, RecordId, RecordRef, Value};

use crate::error::{StoreError, StoreResult};
use crate::record::Record;
use crate::traits::{RecordStore, Savepoint, Transaction};

pub(crate) type Table = BTreeMap<RecordId, Record>;
pub(crate) type Tables = BTreeMap<EntityType, Table>;

#[derive(Debug)]
struct Committed {
    tables: Tables,
    version: u64,
    /// Highest id ever handed out per entity. Ids are never reused.
    issued: BTreeMap<EntityType, u64>,
}

/// In-memory record store with snapshot transactions.
///
/// Every transaction works on a private copy of the committed tables and
/// publishes it on commit, provided no other transaction committed first.
/// Savepoints are copies of the working tables.
pub struct InMemoryRecordStore {
    catalog: Arc<RelationCatalog>,
    state: Arc<RwLock<Committed>>,
}

impl InMemoryRecordStore {
    /// Create a store with an empty table for every concrete entity.
    pub fn empty(catalog: RelationCatalog) -> Self {
        let tables = catalog
            .entities()
            .map(|schema| (schema.name.clone(), Table::new()))
            .collect();
        Self {
            catalog: Arc::new(catalog),
            state: Arc::new(RwLock::new(Committed {
                tables,
                version: 0,
                issued: BTreeMap::new(),
            })),
        }
    }

    /// Load rows without going through a transaction.
    ///
    /// Fields are validated; uniqueness is not.
    pub fn load_rows(
        &self,
        entity: &EntityType,
        rows: impl IntoIterator<Item = Record>,
    ) -> StoreResult<usize> {
        let schema = schema_of(&self.catalog, entity)?;
        let mut state = self.write()?;
        let table = state
            .tables
            .get_mut(entity)
            .ok_or_else(|| StoreError::UnknownEntity(entity.clone()))?;
        let mut loaded = 0;
        for row in rows {
            check_fields(schema, &row.attributes)?;
            table.insert(row.id, row);
            loaded += 1;
        }
        let top = table.keys().next_back().map_or(0, |id| id.get());
        let issued = state.issued.entry(entity.clone()).or_insert(0);
        *issued = (*issued).max(top);
        state.version += 1;
        Ok(loaded)
    }

    /// Number of commits since the store was created.
    pub fn version(&self) -> StoreResult<u64> {
        Ok(self.read()?.version)
    }

    /// Every committed row of `entity`, in id order.
    pub fn records(&self, entity: &EntityType) -> StoreResult<Vec<Record>> {
        let state = self.read()?;
        let table = state
            .tables
            .get(entity)
            .ok_or_else(|| StoreError::UnknownEntity(entity.clone()))?;
        Ok(table.values().cloned().collect())
    }

    /// Total number of committed rows across all entities.
    pub fn len(&self) -> StoreResult<usize> {
        Ok(self.read()?.tables.values().map(BTreeMap::len).sum())
    }

    pub fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.len()? == 0)
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, Committed>> {
        self.state.read().map_err(|_| StoreError::LockPoisoned)
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, Committed>> {
        self.state.write().map_err(|_| StoreError::LockPoisoned)
    }
}

impl RecordStore for InMemoryRecordStore {
    type Tx = MemoryTransaction;

    fn catalog(&self) -> &RelationCatalog {
        &self.catalog
    }

    fn begin(&self) -> StoreResult<MemoryTransaction> {
        let state = self.read()?;
        Ok(MemoryTransaction {
            catalog: Arc::clone(&self.catalog),
            state: Arc::clone(&self.state),
            base_version: state.version,
            tables: state.tables.clone(),
            issued: state.issued.clone(),
            savepoints: Vec::new(),
        })
    }

    fn get(&self, entity: &EntityType, id: RecordId) -> StoreResult<Option<Record>> {
        let state = self.read()?;
        let table = state
            .tables
            .get(entity)
            .ok_or_else(|| StoreError::UnknownEntity(entity.clone()))?;
        Ok(table.get(&id).cloned())
    }
}

impl std::fmt::Debug for InMemoryRecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (records, version) = match self.read() {
            Ok(state) => (
                state.tables.values().map(BTreeMap::len).sum::<usize>(),
                state.version,
            ),
            Err(_) => (0, 0),
        };
        f.debug_struct("InMemoryRecordStore")
            .field("record_count", &records)
            .field("version", &version)
            .finish()
    }
}

/// Transaction over an [`InMemoryRecordStore`].
pub struct MemoryTransaction {
    catalog: Arc<RelationCatalog>,
    state: Arc<RwLock<Committed>>,
    base_version: u64,
    tables: Tables,
    issued: BTreeMap<EntityType, u64>,
    savepoints: Vec<Tables>,
}

impl MemoryTransaction {
    fn table(&self, entity: &EntityType) -> StoreResult<&Table> {
        self.tables
            .get(entity)
            .ok_or_else(|| StoreError::UnknownEntity(entity.clone()))
    }

    fn check_savepoint(&self, savepoint: Savepoint) -> StoreResult<()> {
        if savepoint.0 >= self.savepoints.len() {
            return Err(StoreError::UnknownSavepoint(savepoint.0));
        }
        Ok(())
    }
}

impl Transaction for MemoryTransaction {
    fn catalog(&self) -> &RelationCatalog {
        &self.catalog
    }

    fn get(&self, entity: &EntityType, id: RecordId) -> StoreResult<Option<Record>> {
        Ok(self.table(entity)?.get(&id).cloned())
    }

    fn find(&self, entity: &EntityType, field: &str, value: &Value) -> StoreResult<Vec<Record>> {
        let table = self.table(entity)?;
        if !schema_of(&self.catalog, entity)?.has_field(field) {
            return Err(StoreError::UnknownField {
                entity: entity.clone(),
                field: field.to_string(),
            });
        }
        Ok(table
            .values()
            .filter(|row| &row.value(field) == value)
            .cloned()
            .collect())
    }

    fn all(&self, entity: &EntityType) -> StoreResult<Vec<Record>> {
        Ok(self.table(entity)?.values().cloned().collect())
    }

    fn insert(&mut self, entity: &EntityType, attributes: Attributes) -> StoreResult<RecordId> {
        let schema = schema_of(&self.catalog, entity)?;
        check_fields(schema, &attributes)?;
        let table = self.table(entity)?;
        let live = table.keys().next_back().map_or(0, |last| last.get());
        let issued = self.issued.get(entity).copied().unwrap_or(0);
        let id = RecordId::new(live.max(issued) + 1);

        let mut staged = table.clone();
        staged.insert(id, Record::new(id, attributes));
        check_unique(schema, &staged, &[id])?;
        self.tables.insert(entity.clone(), staged);
        self.issued.insert(entity.clone(), id.get());
        Ok(id)
    }

    fn update(
        &mut self,
        entity: &EntityType,
        ids: &[RecordId],
        changes: &Attributes,
    ) -> StoreResult<usize> {
        let schema = schema_of(&self.catalog, entity)?;
        check_fields(schema, changes)?;
        if ids.is_empty() {
            return Ok(0);
        }

        let mut staged = self.table(entity)?.clone();
        for id in ids {
            let row = staged
                .get_mut(id)
                .ok_or_else(|| StoreError::RecordNotFound(RecordRef::new(entity.clone(), *id)))?;
            for (field, value) in changes {
                row.attributes.insert(field.clone(), value.clone());
            }
        }
        check_unique(schema, &staged, ids)?;
        self.tables.insert(entity.clone(), staged);
        Ok(ids.len())
    }

    fn remove(&mut self, entity: &EntityType, ids: &[RecordId]) -> StoreResult<usize> {
        let table = self
            .tables
            .get_mut(entity)
            .ok_or_else(|| StoreError::UnknownEntity(entity.clone()))?;
        Ok(ids.iter().filter(|id| table.remove(id).is_some()).count())
    }

    fn savepoint(&mut self) -> Savepoint {
        self.savepoints.push(self.tables.clone());
        Savepoint(self.savepoints.len() - 1)
    }

    fn rollback_to(&mut self, savepoint: Savepoint) -> StoreResult<()> {
        self.check_savepoint(savepoint)?;
        self.savepoints.truncate(savepoint.0 + 1);
        if let Some(tables) = self.savepoints.pop() {
            self.tables = tables;
        }
        Ok(())
    }

    fn release(&mut self, savepoint: Savepoint) -> StoreResult<()> {
        self.check_savepoint(savepoint)?;
        self.savepoints.truncate(savepoint.0);
        Ok(())
    }

    fn commit(self) -> StoreResult<()> {
        let mut state = self.state.write().map_err(|_| StoreError::LockPoisoned)?;
        if state.version != self.base_version {
            return Err(StoreError::Conflict {
                expected: self.base_version,
                found: state.version,
            });
        }
        state.tables = self.tables;
        state.issued = self.issued;
        state.version += 1;
        debug!(version = state.version, "transaction committed");
        Ok(())
    }

    fn rollback(self) {
        debug!(base_version = self.base_version, "transaction rolled back");
    }
}

impl std::fmt::Debug for MemoryTransaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryTransaction")
            .field("base_version", &self.base_version)
            .field("savepoints", &self.savepoints.len())
            .finish()
    }
}

fn schema_of<'a>(catalog: &'a RelationCatalog, entity: &EntityType) -> StoreResult<&'a EntitySchema> {
    catalog
        .entity(entity)
        .ok_or_else(|| StoreError::UnknownEntity(entity.clone()))
}

fn check_fields(schema: &EntitySchema, attributes: &Attributes) -> StoreResult<()> {
    match attributes
        .keys()
        .find(|field| field.as_str() == PRIMARY_KEY || schema.field(field).is_none())
    {
        Some(field) => Err(StoreError::UnknownField {
            entity: schema.name.clone(),
            field: field.clone(),
        }),
        None => Ok(()),
    }
}

/// Reject `changed` rows whose unique tuples repeat elsewhere in `table`.
fn check_unique(schema: &EntitySchema, table: &Table, changed: &[RecordId]) -> StoreResult<()> {
    for fields in &schema.unique_together {
        for id in changed {
            let Some(tuple) = table.get(id).and_then(|row| row.tuple(fields)) else {
                continue;
            };
            let clash = table
                .values()
                .find(|other| other.id != *id && other.tuple(fields).as_ref() == Some(&tuple));
            if let Some(other) = clash {
                return Err(StoreError::UniqueViolation {
                    entity: schema.name.clone(),
                    fields: fields.clone(),
                    record: *id,
                    existing: other.id,
                });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{archive_store, attrs, entity, rref};
    use serde_json::json;

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    #[test]
    fn find_by_foreign_key() {
        let store = archive_store();
        let tx = store.begin().unwrap();
        let rows = tx.find(&entity("band_genres"), "band", &json!(2)).unwrap();
        let ids: Vec<u64> = rows.iter().map(|r| r.id.get()).collect();
        assert_eq!(ids, vec![2, 3]);
    }

    #[test]
    fn find_unknown_field_fails() {
        let store = archive_store();
        let tx = store.begin().unwrap();
        assert!(matches!(
            tx.find(&entity("band"), "colour", &json!(1)),
            Err(StoreError::UnknownField { .. })
        ));
    }

    #[test]
    fn unknown_entity_fails() {
        let store = archive_store();
        assert!(matches!(
            store.get(&entity("venue"), RecordId::new(1)),
            Err(StoreError::UnknownEntity(_))
        ));
    }

    // -----------------------------------------------------------------------
    // Writes and uniqueness
    // -----------------------------------------------------------------------

    #[test]
    fn insert_assigns_next_id() {
        let store = archive_store();
        let mut tx = store.begin().unwrap();
        let id = tx
            .insert(&entity("genre"), attrs(json!({"name": "blues"})))
            .unwrap();
        assert_eq!(id, RecordId::new(4));
    }

    #[test]
    fn removed_ids_are_not_reused() {
        let store = archive_store();
        let genre = entity("genre");
        let mut tx = store.begin().unwrap();
        tx.remove(&genre, &[RecordId::new(3)]).unwrap();
        let blues = tx.insert(&genre, attrs(json!({"name": "blues"}))).unwrap();
        assert_eq!(blues, RecordId::new(4));
        tx.remove(&genre, &[blues]).unwrap();
        tx.commit().unwrap();

        let mut tx = store.begin().unwrap();
        let soul = tx.insert(&genre, attrs(json!({"name": "soul"}))).unwrap();
        assert_eq!(soul, RecordId::new(5));
    }

    #[test]
    fn bulk_update_is_all_or_nothing() {
        let store = archive_store();
        let mut tx = store.begin().unwrap();
        // band_genres 2 and 3 belong to band 2; moving both to band 1 collides
        // with band_genres 1 (band 1, genre 1).
        let err = tx
            .update(
                &entity("band_genres"),
                &[RecordId::new(2), RecordId::new(3)],
                &attrs(json!({"band": 1})),
            )
            .unwrap_err();
        assert!(matches!(err, StoreError::UniqueViolation { existing, .. } if existing == RecordId::new(1)));
        let row = tx.require(&rref("band_genres", 3)).unwrap();
        assert_eq!(row.value("band"), json!(2));
    }

    #[test]
    fn null_tuples_are_not_compared() {
        let store = archive_store();
        let mut tx = store.begin().unwrap();
        tx.update(
            &entity("band_genres"),
            &[RecordId::new(1), RecordId::new(2)],
            &attrs(json!({"genre": null})),
        )
        .unwrap();
    }

    #[test]
    fn primary_key_is_not_writable() {
        let store = archive_store();
        let mut tx = store.begin().unwrap();
        assert!(matches!(
            tx.update(&entity("genre"), &[RecordId::new(1)], &attrs(json!({"id": 9}))),
            Err(StoreError::UnknownField { .. })
        ));
    }

    // -----------------------------------------------------------------------
    // Transactions
    // -----------------------------------------------------------------------

    #[test]
    fn uncommitted_writes_are_invisible() {
        let store = archive_store();
        let mut tx = store.begin().unwrap();
        tx.update(&entity("genre"), &[RecordId::new(1)], &attrs(json!({"name": "pop"})))
            .unwrap();
        assert_eq!(
            store.get(&entity("genre"), RecordId::new(1)).unwrap().unwrap().value("name"),
            json!("rock")
        );
        tx.rollback();
        assert_eq!(
            store.get(&entity("genre"), RecordId::new(1)).unwrap().unwrap().value("name"),
            json!("rock")
        );
    }

    #[test]
    fn commit_publishes() {
        let store = archive_store();
        let before = store.version().unwrap();
        let mut tx = store.begin().unwrap();
        tx.remove(&entity("genre"), &[RecordId::new(3)]).unwrap();
        tx.commit().unwrap();
        assert!(store.get(&entity("genre"), RecordId::new(3)).unwrap().is_none());
        assert_eq!(store.version().unwrap(), before + 1);
    }

    #[test]
    fn concurrent_commit_conflicts() {
        let store = archive_store();
        let mut first = store.begin().unwrap();
        let mut second = store.begin().unwrap();
        first.remove(&entity("genre"), &[RecordId::new(3)]).unwrap();
        second.remove(&entity("genre"), &[RecordId::new(2)]).unwrap();
        first.commit().unwrap();
        assert!(matches!(second.commit(), Err(StoreError::Conflict { .. })));
        assert!(store.get(&entity("genre"), RecordId::new(2)).unwrap().is_some());
    }

    #[test]
    fn savepoints_nest() {
        let store = archive_store();
        let mut tx = store.begin().unwrap();
        let outer = tx.savepoint();
        tx.remove(&entity("genre"), &[RecordId::new(1)]).unwrap();
        let inner = tx.savepoint();
        tx.remove(&entity("genre"), &[RecordId::new(2)]).unwrap();
        tx.rollback_to(inner).unwrap();
        assert!(tx.get(&entity("genre"), RecordId::new(2)).unwrap().is_some());
        assert!(tx.get(&entity("genre"), RecordId::new(1)).unwrap().is_none());
        tx.rollback_to(outer).unwrap();
        assert!(tx.get(&entity("genre"), RecordId::new(1)).unwrap().is_some());
        assert!(matches!(tx.release(outer), Err(StoreError::UnknownSavepoint(0))));
    }

    #[test]
    fn atomic_rolls_back_on_error() {
        let store = archive_store();
        let mut tx = store.begin().unwrap();
        let result: StoreResult<()> = tx.atomic(|tx| {
            tx.remove(&entity("genre"), &[RecordId::new(1)])?;
            tx.update(
                &entity("band_genres"),
                &[RecordId::new(2)],
                &attrs(json!({"band": 1})),
            )?;
            Ok(())
        });
        assert!(result.is_err());
        assert!(tx.get(&entity("genre"), RecordId::new(1)).unwrap().is_some());
    }

    #[test]
    fn with_transaction_commits_on_ok() {
        let store = archive_store();
        let id = store
            .with_transaction(|tx| tx.insert(&entity("genre"), attrs(json!({"name": "punk"}))))
            .unwrap();
        assert!(store.get(&entity("genre"), id).unwrap().is_some());
    }

    #[test]
    fn debug_format() {
        let store = archive_store();
        let debug = format!("{store:?}");
        assert!(debug.contains("InMemoryRecordStore"));
        assert!(debug.contains("record_count"));
    }
}
