use serde::{Deserialize, Serialize};

use catalog_schema::definition::PRIMARY_KEY;
use catalog_types::{as_record_id, Attributes, RecordId, Value};

/// One row of an entity type.
///
/// Serialized flat: `{"id": 3, "name": "Nirvana", ...}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    #[serde(flatten)]
    pub attributes: Attributes,
}

impl Record {
    pub fn new(id: RecordId, attributes: Attributes) -> Self {
        Self { id, attributes }
    }

    /// Value of `field`; absent attributes read as null.
    pub fn value(&self, field: &str) -> Value {
        if field == PRIMARY_KEY {
            return Value::from(self.id.get());
        }
        self.attributes.get(field).cloned().unwrap_or(Value::Null)
    }

    /// The record id a foreign-key field points at, if set.
    pub fn foreign_key(&self, field: &str) -> Option<RecordId> {
        self.attributes.get(field).and_then(as_record_id)
    }

    /// Values of `fields` in order, or `None` if any of them is null.
    pub fn tuple(&self, fields: &[String]) -> Option<Vec<Value>> {
        fields
            .iter()
            .map(|f| Some(self.value(f)).filter(|v| !v.is_null()))
            .collect()
    }
}
