use serde::{Deserialize, Serialize};

use catalog_types::{ActorId, Attributes, EntityType, RecordId, RecordRef, Value};

/// One merge request.
///
/// `secondaries` is ordered: candidate values are collected, and the first
/// candidate chosen, in this order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MergePlan {
    pub entity: EntityType,
    pub primary: RecordId,
    pub secondaries: Vec<RecordId>,
    /// Fill gaps on the primary from the secondaries.
    pub expand: bool,
    /// Values chosen for conflicting fields.
    #[serde(default)]
    pub resolved_updates: Attributes,
    #[serde(default = "system_actor")]
    pub actor: ActorId,
}

fn system_actor() -> ActorId {
    ActorId::SYSTEM
}

impl MergePlan {
    /// Plan a merge of `secondaries` into `primary`, with gap filling on.
    ///
    /// The primary and repeated ids are dropped from `secondaries`; the
    /// first occurrence keeps its position.
    pub fn new(entity: EntityType, primary: RecordId, secondaries: impl IntoIterator<Item = RecordId>) -> Self {
        let mut plan = Self {
            entity,
            primary,
            secondaries: secondaries.into_iter().collect(),
            expand: true,
            resolved_updates: Attributes::new(),
            actor: ActorId::SYSTEM,
        };
        plan.secondaries = plan.distinct_secondaries();
        plan
    }

    pub fn expand(mut self, expand: bool) -> Self {
        self.expand = expand;
        self
    }

    pub fn actor(mut self, actor: ActorId) -> Self {
        self.actor = actor;
        self
    }

    pub fn resolve(mut self, field: impl Into<String>, value: Value) -> Self {
        self.resolved_updates.insert(field.into(), value);
        self
    }

    pub fn with_resolved_updates(mut self, updates: Attributes) -> Self {
        self.resolved_updates.extend(updates);
        self
    }

    /// Secondaries in order, without the primary and without repeats.
    pub fn distinct_secondaries(&self) -> Vec<RecordId> {
        let mut seen = vec![self.primary];
        self.secondaries
            .iter()
            .copied()
            .filter(|id| {
                if seen.contains(id) {
                    false
                } else {
                    seen.push(*id);
                    true
                }
            })
            .collect()
    }

    pub fn primary_ref(&self) -> RecordRef {
        RecordRef::new(self.entity.clone(), self.primary)
    }

    pub fn secondary_refs(&self) -> Vec<RecordRef> {
        self.distinct_secondaries()
            .into_iter()
            .map(|id| RecordRef::new(self.entity.clone(), id))
            .collect()
    }

    /// Number of distinct records named by the plan, primary included.
    pub fn record_count(&self) -> usize {
        1 + self.distinct_secondaries().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ids(raw: &[u64]) -> Vec<RecordId> {
        raw.iter().copied().map(RecordId::new).collect()
    }

    #[test]
    fn primary_and_repeats_are_dropped_in_order() {
        let plan = MergePlan::new(EntityType::new("band").unwrap(), RecordId::new(2), ids(&[3, 2, 1, 3]));
        assert_eq!(plan.secondaries, ids(&[3, 1]));
        assert_eq!(plan.record_count(), 3);
    }

    #[test]
    fn hand_built_plans_are_normalised_on_use() {
        let mut plan = MergePlan::new(EntityType::new("band").unwrap(), RecordId::new(1), Vec::new());
        plan.secondaries = ids(&[1, 4, 4]);
        assert_eq!(plan.distinct_secondaries(), ids(&[4]));
        assert_eq!(plan.secondary_refs()[0].to_string(), "band#4");
    }

    #[test]
    fn builder() {
        let plan = MergePlan::new(EntityType::new("band").unwrap(), RecordId::new(1), ids(&[2]))
            .expand(false)
            .actor(ActorId::new(7))
            .resolve("rank", json!(2));
        assert!(!plan.expand);
        assert_eq!(plan.actor, ActorId::new(7));
        assert_eq!(plan.resolved_updates["rank"], json!(2));
    }
}
