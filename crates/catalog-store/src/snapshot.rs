//! JSON database files.
//!
//! A [`Snapshot`] holds a schema description and the rows of every entity
//! type. The CLI reads a snapshot into an [`InMemoryRecordStore`], runs one
//! operation and writes the result back.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use catalog_schema::{RelationCatalog, SchemaDef, SchemaError};
use catalog_types::EntityType;

use crate::error::StoreResult;
use crate::memory::InMemoryRecordStore;
use crate::record::Record;
use crate::traits::RecordStore;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub schema: SchemaDef,
    /// Rows keyed by entity name.
    #[serde(default)]
    pub records: BTreeMap<String, Vec<Record>>,
}

impl Snapshot {
    pub fn new(schema: SchemaDef) -> Self {
        Self {
            schema,
            records: BTreeMap::new(),
        }
    }

    pub fn from_json_str(text: &str) -> StoreResult<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn to_json_string(&self) -> StoreResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn load(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let snapshot = Self::from_json_str(&text)?;
        debug!(path = %path.display(), entities = snapshot.records.len(), "snapshot loaded");
        Ok(snapshot)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> StoreResult<()> {
        let path = path.as_ref();
        std::fs::write(path, self.to_json_string()?)?;
        debug!(path = %path.display(), "snapshot saved");
        Ok(())
    }
}

impl InMemoryRecordStore {
    /// Build the catalog from the snapshot's schema and load its rows.
    pub fn from_snapshot(snapshot: Snapshot) -> StoreResult<Self> {
        let catalog = RelationCatalog::build(snapshot.schema)?;
        let store = Self::empty(catalog);
        for (name, rows) in snapshot.records {
            let entity = EntityType::new(name).map_err(SchemaError::from)?;
            store.load_rows(&entity, rows)?;
        }
        Ok(store)
    }

    /// Current committed state as a snapshot; empty tables are left out.
    pub fn snapshot(&self) -> StoreResult<Snapshot> {
        let mut snapshot = Snapshot::new(self.catalog().definition().clone());
        for schema in self.catalog().entities() {
            let rows = self.records(&schema.name)?;
            if !rows.is_empty() {
                snapshot.records.insert(schema.name.to_string(), rows);
            }
        }
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::archive_snapshot;
    use crate::StoreError;
    use catalog_types::RecordId;
    use serde_json::json;

    #[test]
    fn file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("archive.json");
        archive_snapshot().save(&path).unwrap();

        let store = InMemoryRecordStore::from_snapshot(Snapshot::load(&path).unwrap()).unwrap();
        let band = store
            .get(&EntityType::new("band").unwrap(), RecordId::new(2))
            .unwrap()
            .unwrap();
        assert_eq!(band.value("description"), json!("Grunge band"));
        assert_eq!(store.snapshot().unwrap(), archive_snapshot());
    }

    #[test]
    fn rows_for_unknown_entities_are_rejected() {
        let mut snapshot = archive_snapshot();
        snapshot.records.insert("venue".into(), Vec::new());
        assert!(matches!(
            InMemoryRecordStore::from_snapshot(snapshot),
            Err(StoreError::UnknownEntity(_))
        ));
    }

    #[test]
    fn rows_with_undeclared_fields_are_rejected() {
        let text = json!({
            "schema": {"entities": [{"name": "genre", "fields": [{"name": "name", "kind": {"type": "text"}}]}]},
            "records": {"genre": [{"id": 1, "name": "rock", "colour": "red"}]}
        })
        .to_string();
        let snapshot = Snapshot::from_json_str(&text).unwrap();
        assert!(matches!(
            InMemoryRecordStore::from_snapshot(snapshot),
            Err(StoreError::UnknownField { .. })
        ));
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            Snapshot::load(dir.path().join("nope.json")),
            Err(StoreError::Io(_))
        ));
    }
}
