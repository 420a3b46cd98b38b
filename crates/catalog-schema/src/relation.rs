//! Relation descriptors.
//!
//! Every relationship instance in the store is a row holding a foreign key:
//! either a row of the declaring entity (many-to-one) or a row of a join
//! entity (many-to-many). A [`RelationEnd`] names that foreign key, and
//! [`RelationDescriptor::ends_towards`] answers "which rows point at a record
//! of this entity type through this relation".

use std::fmt;

use catalog_types::EntityType;
use serde::{Deserialize, Serialize};

/// What happens to referencing rows when the referenced record is deleted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeletePolicy {
    /// Delete the referencing rows too.
    #[default]
    Cascade,
    /// Refuse the deletion while referencing rows exist.
    Protect,
    /// Null out the foreign key on referencing rows.
    SetNull,
    /// Leave referencing rows untouched.
    DoNothing,
}

impl DeletePolicy {
    /// Strictness order used to summarise a join entity's two roles.
    fn rank(self) -> u8 {
        match self {
            Self::Protect => 3,
            Self::Cascade => 2,
            Self::SetNull => 1,
            Self::DoNothing => 0,
        }
    }

    pub(crate) fn strictest(a: Self, b: Self) -> Self {
        if a.rank() >= b.rank() {
            a
        } else {
            b
        }
    }
}

impl fmt::Display for DeletePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Cascade => "cascade",
            Self::Protect => "protect",
            Self::SetNull => "set-null",
            Self::DoNothing => "do-nothing",
        };
        f.write_str(s)
    }
}

/// The four relationship kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationKind {
    ManyToOneForward,
    OneToManyReverse,
    ManyToManyDirect,
    ManyToManyViaJoin,
}

impl RelationKind {
    pub fn is_many_to_many(self) -> bool {
        matches!(self, Self::ManyToManyDirect | Self::ManyToManyViaJoin)
    }
}

impl fmt::Display for RelationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::ManyToOneForward => "many-to-one",
            Self::OneToManyReverse => "one-to-many",
            Self::ManyToManyDirect => "many-to-many",
            Self::ManyToManyViaJoin => "many-to-many (join)",
        };
        f.write_str(s)
    }
}

/// A foreign-key field that points at some entity type.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RelationEnd {
    /// Entity whose rows hold the foreign key.
    pub entity: EntityType,
    /// Name of the foreign-key field on those rows.
    pub field: String,
    pub on_delete: DeletePolicy,
}

impl fmt::Display for RelationEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.entity, self.field)
    }
}

/// The join entity of a many-to-many relation and its two roles.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinDescriptor {
    pub entity: EntityType,
    /// Foreign key pointing at the relation's owner.
    pub source_field: String,
    pub source_on_delete: DeletePolicy,
    /// Foreign key pointing at the relation's target.
    pub target_field: String,
    pub target_on_delete: DeletePolicy,
}

impl JoinDescriptor {
    pub fn source_end(&self) -> RelationEnd {
        RelationEnd {
            entity: self.entity.clone(),
            field: self.source_field.clone(),
            on_delete: self.source_on_delete,
        }
    }

    pub fn target_end(&self) -> RelationEnd {
        RelationEnd {
            entity: self.entity.clone(),
            field: self.target_field.clone(),
            on_delete: self.target_on_delete,
        }
    }
}

/// One relationship kind between two entity types.
///
/// Descriptors are produced by the catalog and never change afterwards.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationDescriptor {
    /// `<owner>.<field>`, unique within a catalog for a given kind.
    pub name: String,
    pub kind: RelationKind,
    /// Entity declaring the foreign key or the many-to-many field.
    pub owner: EntityType,
    pub target: EntityType,
    /// Foreign-key field on `owner`, or the many-to-many field name.
    pub field: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join: Option<JoinDescriptor>,
    pub delete_policy: DeletePolicy,
    /// Unique field sets of the entity whose rows implement the relation.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unique_together: Vec<Vec<String>>,
}

impl RelationDescriptor {
    pub fn is_many_to_many(&self) -> bool {
        self.kind.is_many_to_many()
    }

    pub fn is_self_referential(&self) -> bool {
        self.owner == self.target
    }

    /// Entity whose rows are the relationship instances.
    pub fn implementing_entity(&self) -> &EntityType {
        match &self.join {
            Some(join) => &join.entity,
            None => &self.owner,
        }
    }

    /// Foreign keys through which rows of this relation point at `entity`.
    ///
    /// Forward and reverse foreign keys yield at most one end. A
    /// many-to-many relation yields the role pointing back at `entity`; a
    /// self-referential one yields both roles, the outgoing (source) role
    /// first.
    pub fn ends_towards(&self, entity: &EntityType) -> Vec<RelationEnd> {
        match &self.join {
            Some(join) => {
                let mut ends = Vec::with_capacity(2);
                if &self.owner == entity {
                    ends.push(join.source_end());
                }
                if &self.target == entity {
                    ends.push(join.target_end());
                }
                ends
            }
            None if &self.target == entity => vec![RelationEnd {
                entity: self.owner.clone(),
                field: self.field.clone(),
                on_delete: self.delete_policy,
            }],
            None => Vec::new(),
        }
    }

    /// Foreign key on the join entity pointing at the side opposite `end`.
    ///
    /// `None` for relations without a join entity.
    pub fn opposite_field(&self, end: &RelationEnd) -> Option<&str> {
        let join = self.join.as_ref()?;
        if end.field == join.source_field {
            Some(&join.target_field)
        } else {
            Some(&join.source_field)
        }
    }

    /// Unique sets involving `field`, with `field` itself removed.
    ///
    /// Sets that do not mention the relation field cannot be violated by
    /// repointing it and are left out; sets that reduce to nothing are
    /// dropped too.
    pub fn unique_sets_without(&self, field: &str) -> Vec<Vec<String>> {
        self.unique_together
            .iter()
            .filter(|set| set.iter().any(|f| f == field))
            .map(|set| set.iter().filter(|f| *f != field).cloned().collect::<Vec<_>>())
            .filter(|rest| !rest.is_empty())
            .collect()
    }
}

impl fmt::Display for RelationDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.name, self.kind)
    }
}
