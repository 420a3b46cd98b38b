//! Field gap analysis.
//!
//! A gap is a primary attribute that holds no data yet: null, empty, or
//! equal to its declared default. Gaps may be filled from the secondaries;
//! anything else on the primary is never overwritten.

use std::collections::{BTreeMap, HashSet};

use serde::Serialize;

use catalog_schema::{EntitySchema, FieldDef, FieldKind};
use catalog_store::Record;
use catalog_types::{canonical_string, is_empty_value, Attributes, Value};

/// Gap fields with more than one distinct candidate value.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ConflictSet(BTreeMap<String, Vec<Value>>);

impl ConflictSet {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Candidates for `field`, in secondary order.
    pub fn candidates(&self, field: &str) -> Option<&[Value]> {
        self.0.get(field).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Value])> {
        self.0.iter().map(|(f, v)| (f.as_str(), v.as_slice()))
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }
}

impl FromIterator<(String, Vec<Value>)> for ConflictSet {
    fn from_iter<I: IntoIterator<Item = (String, Vec<Value>)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Result of analysing a primary against its secondaries.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct GapAnalysis {
    /// Gap fields of the primary, in schema order.
    pub gaps: Vec<String>,
    /// Gap fields with exactly one candidate, and that candidate.
    pub updates: Attributes,
    pub conflicts: ConflictSet,
}

impl GapAnalysis {
    pub fn is_gap(&self, field: &str) -> bool {
        self.gaps.iter().any(|g| g == field)
    }
}

/// Attributes of `primary` that may be filled in.
///
/// The primary key, internal (`_`-prefixed) and computed fields are never
/// gaps, and neither are booleans: `false` is a recorded value.
pub fn gap_fields(schema: &EntitySchema, primary: &Record) -> Vec<String> {
    schema
        .fields
        .iter()
        .filter(|field| !field.is_internal() && !field.computed)
        .filter(|field| field.kind != FieldKind::Boolean)
        .filter(|field| {
            let value = primary.value(&field.name);
            is_empty_value(&value) || field.default.as_ref() == Some(&value)
        })
        .map(|field| field.name.clone())
        .collect()
}

/// Whether a secondary's value for `field` carries data worth offering.
///
/// Booleans always do. Empty values, numeric zero and the field's declared
/// default do not.
fn is_candidate(field: Option<&FieldDef>, value: &Value) -> bool {
    match value {
        Value::Bool(_) => true,
        Value::Number(n) if n.as_f64() == Some(0.0) => false,
        _ if is_empty_value(value) => false,
        _ => field.and_then(|f| f.default.as_ref()) != Some(value),
    }
}

/// Distinct values the secondaries hold for each gap field.
///
/// Booleans count as candidates here. Candidates are deduplicated by
/// canonical string form and kept in secondary order.
pub fn candidate_values(
    schema: &EntitySchema,
    gaps: &[String],
    secondaries: &[Record],
) -> (Attributes, ConflictSet) {
    let mut updates = Attributes::new();
    let mut conflicts = BTreeMap::new();

    for field in gaps {
        let def = schema.fields.iter().find(|f| &f.name == field);
        let mut seen = HashSet::new();
        let mut candidates: Vec<Value> = Vec::new();
        for secondary in secondaries {
            let value = secondary.value(field);
            if is_candidate(def, &value) && seen.insert(canonical_string(&value)) {
                candidates.push(value);
            }
        }
        match candidates.len() {
            0 => {}
            1 => {
                updates.insert(field.clone(), candidates.remove(0));
            }
            _ => {
                conflicts.insert(field.clone(), candidates);
            }
        }
    }

    (updates, ConflictSet(conflicts))
}

/// Run both analysis steps.
pub fn analyze(schema: &EntitySchema, primary: &Record, secondaries: &[Record]) -> GapAnalysis {
    let gaps = gap_fields(schema, primary);
    let (updates, conflicts) = candidate_values(schema, &gaps, secondaries);
    GapAnalysis {
        gaps,
        updates,
        conflicts,
    }
}
