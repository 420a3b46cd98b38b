//! Attribute values.
//!
//! Records store their attributes as `BTreeMap<String, serde_json::Value>`.
//! Foreign keys are stored as the referenced record's id (a JSON number).

use std::collections::BTreeMap;

pub use serde_json::Value;

use crate::identity::RecordId;

/// The attribute map of a record, keyed by field name.
pub type Attributes = BTreeMap<String, Value>;

/// Returns `true` for values that mean "no data recorded".
///
/// Null, the empty string, and empty arrays/objects are empty. `false` and
/// `0` are recorded values, not absences.
pub fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

/// Canonical string form of a value, used to deduplicate candidates.
///
/// Strings map to themselves (unquoted); everything else uses its JSON form.
/// `"1"` and `1` therefore collapse to the same candidate.
pub fn canonical_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

/// Interpret a stored foreign-key value as a record id.
pub fn as_record_id(value: &Value) -> Option<RecordId> {
    value.as_u64().map(RecordId::new)
}
