//! Conflict resolution glue.
//!
//! The merge engine never picks between conflicting candidates itself. A
//! [`ConflictResolver`] (an operator UI, a CLI flag set, a batch policy)
//! returns exactly one value per conflicting field.

use std::collections::BTreeMap;

use catalog_types::{Attributes, Value};

use crate::error::{MergeError, MergeResult};
use crate::gaps::ConflictSet;

/// Chooses one value per conflicting field.
pub trait ConflictResolver {
    fn resolve(&self, conflicts: &ConflictSet) -> MergeResult<Attributes>;
}

/// Takes the first candidate, i.e. the value of the earliest secondary.
#[derive(Clone, Copy, Debug, Default)]
pub struct FirstCandidate;

impl ConflictResolver for FirstCandidate {
    fn resolve(&self, conflicts: &ConflictSet) -> MergeResult<Attributes> {
        Ok(conflicts
            .iter()
            .filter_map(|(field, candidates)| {
                candidates.first().map(|v| (field.to_string(), v.clone()))
            })
            .collect())
    }
}

/// Fails on any conflict.
#[derive(Clone, Copy, Debug, Default)]
pub struct RejectConflicts;

impl ConflictResolver for RejectConflicts {
    fn resolve(&self, conflicts: &ConflictSet) -> MergeResult<Attributes> {
        if conflicts.is_empty() {
            Ok(Attributes::new())
        } else {
            Err(MergeError::UnresolvedConflict(
                conflicts.fields().map(String::from).collect(),
            ))
        }
    }
}

/// Picks candidates by index, e.g. from `--choose rank=1`.
#[derive(Clone, Debug, Default)]
pub struct ChoiceResolver {
    choices: BTreeMap<String, usize>,
    first_candidate_fallback: bool,
}

impl ChoiceResolver {
    pub fn new(choices: BTreeMap<String, usize>) -> Self {
        Self {
            choices,
            first_candidate_fallback: false,
        }
    }

    /// Resolve fields without a choice by taking their first candidate.
    pub fn or_first_candidate(mut self) -> Self {
        self.first_candidate_fallback = true;
        self
    }

    /// Parse `field=index` pairs.
    pub fn parse<S: AsRef<str>>(pairs: &[S]) -> MergeResult<Self> {
        let mut choices = BTreeMap::new();
        for pair in pairs {
            let pair = pair.as_ref();
            let (field, index) = pair.split_once('=').ok_or_else(|| MergeError::InvalidChoice {
                field: pair.to_string(),
                reason: "expected field=index".into(),
            })?;
            let index = index.trim().parse().map_err(|_| MergeError::InvalidChoice {
                field: field.to_string(),
                reason: format!("{index:?} is not an index"),
            })?;
            choices.insert(field.trim().to_string(), index);
        }
        Ok(Self::new(choices))
    }
}

impl ConflictResolver for ChoiceResolver {
    fn resolve(&self, conflicts: &ConflictSet) -> MergeResult<Attributes> {
        if let Some(field) = self.choices.keys().find(|f| !conflicts.contains(f)) {
            return Err(MergeError::InvalidChoice {
                field: field.clone(),
                reason: "field is not in conflict".into(),
            });
        }

        let mut resolved = Attributes::new();
        let mut unresolved = Vec::new();
        for (field, candidates) in conflicts.iter() {
            match self.choices.get(field) {
                Some(&index) => {
                    let value = candidates.get(index).ok_or_else(|| MergeError::InvalidChoice {
                        field: field.to_string(),
                        reason: format!("index {index} out of range, {} candidates", candidates.len()),
                    })?;
                    resolved.insert(field.to_string(), value.clone());
                }
                None if self.first_candidate_fallback => {
                    if let Some(value) = candidates.first() {
                        resolved.insert(field.to_string(), value.clone());
                    }
                }
                None => unresolved.push(field.to_string()),
            }
        }

        if unresolved.is_empty() {
            Ok(resolved)
        } else {
            Err(MergeError::UnresolvedConflict(unresolved))
        }
    }
}

/// Run `resolver` and check it answered every conflict with one of its candidates.
pub fn resolve_conflicts(
    conflicts: &ConflictSet,
    resolver: &dyn ConflictResolver,
) -> MergeResult<Attributes> {
    let resolved = resolver.resolve(conflicts)?;

    let missing: Vec<String> = conflicts
        .fields()
        .filter(|f| !resolved.contains_key(*f))
        .map(String::from)
        .collect();
    if !missing.is_empty() {
        return Err(MergeError::UnresolvedConflict(missing));
    }

    for (field, value) in &resolved {
        let allowed = conflicts
            .candidates(field)
            .ok_or_else(|| MergeError::InvalidChoice {
                field: field.clone(),
                reason: "field is not in conflict".into(),
            })?;
        if !allowed.contains(value) {
            return Err(MergeError::InvalidChoice {
                field: field.clone(),
                reason: format!("{value} is not a candidate"),
            });
        }
    }
    Ok(resolved)
}
