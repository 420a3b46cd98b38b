//! The relation catalog.
//!
//! [`RelationCatalog::build`] resolves inheritance, synthesises join entities
//! for direct many-to-many relations, picks the join roles of declared join
//! entities and produces the immutable list of [`RelationDescriptor`]s.

use std::collections::{BTreeMap, HashMap, HashSet};

use catalog_types::identity::validate_name;
use catalog_types::EntityType;
use tracing::debug;

use crate::definition::{EntityDef, FieldDef, ManyToManyDef, SchemaDef, PRIMARY_KEY};
use crate::error::{SchemaError, SchemaResult};
use crate::relation::{DeletePolicy, JoinDescriptor, RelationDescriptor, RelationEnd, RelationKind};

/// A concrete entity type after inheritance has been flattened.
#[derive(Clone, Debug, PartialEq)]
pub struct EntitySchema {
    pub name: EntityType,
    pub parent: Option<EntityType>,
    /// Own and inherited fields, supertype fields first.
    pub fields: Vec<FieldDef>,
    pub unique_together: Vec<Vec<String>>,
    pub merge_scope: Option<String>,
    /// `true` for join entities synthesised by the catalog.
    pub auto_created: bool,
}

impl EntitySchema {
    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn has_field(&self, name: &str) -> bool {
        name == PRIMARY_KEY || self.field(name).is_some()
    }

    pub fn foreign_keys(&self) -> impl Iterator<Item = &FieldDef> {
        self.fields.iter().filter(|f| f.is_foreign_key())
    }
}

/// Immutable registry of entity types and the relations between them.
#[derive(Clone, Debug)]
pub struct RelationCatalog {
    definition: SchemaDef,
    entities: BTreeMap<EntityType, EntitySchema>,
    order: Vec<EntityType>,
    relations: Vec<RelationDescriptor>,
}

impl RelationCatalog {
    /// Build the catalog, reporting every topology problem as a [`SchemaError`].
    pub fn build(definition: SchemaDef) -> SchemaResult<Self> {
        let declared = index_declarations(&definition)?;

        let mut entities = BTreeMap::new();
        let mut order = Vec::new();
        let mut m2m_decls: Vec<(EntityType, ManyToManyDef)> = Vec::new();

        for def in &definition.entities {
            let chain = lineage(def, &declared)?;
            if def.is_abstract {
                continue;
            }
            let name = EntityType::new(def.name.as_str())?;
            let schema = flatten(&name, &chain)?;
            for ancestor in &chain {
                for m2m in &ancestor.many_to_many {
                    m2m_decls.push((name.clone(), m2m.clone()));
                }
            }
            order.push(name.clone());
            entities.insert(name, schema);
        }

        for name in &order {
            validate_entity(&entities[name], &declared)?;
        }

        let mut join_roles: HashSet<(EntityType, String)> = HashSet::new();
        let mut m2m_relations = Vec::with_capacity(m2m_decls.len());
        for (owner, m2m) in &m2m_decls {
            let relation = resolve_many_to_many(owner, m2m, &declared, &mut entities, &mut order)?;
            if let Some(join) = &relation.join {
                join_roles.insert((join.entity.clone(), join.source_field.clone()));
                join_roles.insert((join.entity.clone(), join.target_field.clone()));
            }
            m2m_relations.push(relation);
        }

        let mut relations = Vec::new();
        for name in &order {
            let schema = &entities[name];
            for field in schema.foreign_keys() {
                let Some((target, on_delete)) = field.foreign_target() else {
                    continue;
                };
                let forward = RelationDescriptor {
                    name: format!("{}.{}", name, field.name),
                    kind: RelationKind::ManyToOneForward,
                    owner: name.clone(),
                    target: EntityType::new(target)?,
                    field: field.name.clone(),
                    join: None,
                    delete_policy: on_delete,
                    unique_together: schema.unique_together.clone(),
                };
                // Join roles are part of their many-to-many relation.
                if !join_roles.contains(&(name.clone(), field.name.clone())) {
                    relations.push(RelationDescriptor {
                        kind: RelationKind::OneToManyReverse,
                        ..forward.clone()
                    });
                }
                relations.push(forward);
            }
        }
        relations.extend(m2m_relations);

        debug!(
            entities = entities.len(),
            relations = relations.len(),
            "relation catalog built"
        );

        Ok(Self {
            definition,
            entities,
            order,
            relations,
        })
    }

    /// The schema description the catalog was built from.
    pub fn definition(&self) -> &SchemaDef {
        &self.definition
    }

    pub fn entity(&self, name: &EntityType) -> Option<&EntitySchema> {
        self.entities.get(name)
    }

    pub fn require_entity(&self, name: &EntityType) -> SchemaResult<&EntitySchema> {
        self.entity(name)
            .ok_or_else(|| SchemaError::UnknownEntity(name.to_string()))
    }

    /// Concrete entity types in declaration order, join entities included.
    pub fn entities(&self) -> impl Iterator<Item = &EntitySchema> {
        self.order.iter().map(move |name| &self.entities[name])
    }

    pub fn all_relations(&self) -> &[RelationDescriptor] {
        &self.relations
    }

    /// Relations involving `entity`.
    ///
    /// `forward` selects foreign keys declared on `entity`, `reverse` selects
    /// foreign keys declared elsewhere that target it. Many-to-many relations
    /// are always included, exactly once, whichever side `entity` is on.
    pub fn relations_of(
        &self,
        entity: &EntityType,
        forward: bool,
        reverse: bool,
    ) -> Vec<&RelationDescriptor> {
        self.relations
            .iter()
            .filter(|rel| match rel.kind {
                RelationKind::ManyToOneForward => forward && &rel.owner == entity,
                RelationKind::OneToManyReverse => reverse && &rel.target == entity,
                RelationKind::ManyToManyDirect | RelationKind::ManyToManyViaJoin => {
                    &rel.owner == entity || &rel.target == entity
                }
            })
            .collect()
    }

    /// Every foreign key in the schema that targets `entity`, join roles included.
    pub fn foreign_keys_to(&self, entity: &EntityType) -> Vec<RelationEnd> {
        self.entities()
            .flat_map(|schema| {
                schema.foreign_keys().filter_map(move |field| {
                    let (target, on_delete) = field.foreign_target()?;
                    (target == entity.as_str()).then(|| RelationEnd {
                        entity: schema.name.clone(),
                        field: field.name.clone(),
                        on_delete,
                    })
                })
            })
            .collect()
    }
}

fn index_declarations(definition: &SchemaDef) -> SchemaResult<HashMap<&str, &EntityDef>> {
    let mut declared = HashMap::with_capacity(definition.entities.len());
    for def in &definition.entities {
        validate_name(&def.name)?;
        if declared.insert(def.name.as_str(), def).is_some() {
            return Err(SchemaError::DuplicateEntity(def.name.clone()));
        }
    }
    Ok(declared)
}

/// The inheritance chain of `def`, root supertype first.
fn lineage<'a>(
    def: &'a EntityDef,
    declared: &HashMap<&str, &'a EntityDef>,
) -> SchemaResult<Vec<&'a EntityDef>> {
    let mut chain = vec![def];
    let mut seen = HashSet::from([def.name.as_str()]);
    let mut current = def;
    while let Some(parent) = &current.parent {
        let parent_def = declared
            .get(parent.as_str())
            .copied()
            .ok_or_else(|| SchemaError::UnknownParent {
                entity: current.name.clone(),
                parent: parent.clone(),
            })?;
        if !seen.insert(parent_def.name.as_str()) {
            return Err(SchemaError::InheritanceCycle(def.name.clone()));
        }
        chain.push(parent_def);
        current = parent_def;
    }
    chain.reverse();
    Ok(chain)
}

fn validate_field_name(entity: &EntityType, name: &str) -> SchemaResult<()> {
    if name == PRIMARY_KEY {
        return Err(SchemaError::ReservedField {
            entity: entity.to_string(),
            field: name.to_string(),
        });
    }
    // Internal fields keep their leading underscores.
    validate_name(name.trim_start_matches('_'))?;
    Ok(())
}

fn flatten(name: &EntityType, chain: &[&EntityDef]) -> SchemaResult<EntitySchema> {
    let mut fields: Vec<FieldDef> = Vec::new();
    let mut names = HashSet::new();
    let mut unique_together = Vec::new();
    let mut merge_scope = None;

    for def in chain {
        let declared_names = def
            .fields
            .iter()
            .map(|f| f.name.as_str())
            .chain(def.many_to_many.iter().map(|m| m.name.as_str()));
        for field_name in declared_names {
            validate_field_name(name, field_name)?;
            if !names.insert(field_name.to_string()) {
                return Err(SchemaError::DuplicateField {
                    entity: name.to_string(),
                    field: field_name.to_string(),
                });
            }
        }
        fields.extend(def.fields.iter().cloned());
        unique_together.extend(def.unique_together.iter().cloned());
        if def.merge_scope.is_some() {
            merge_scope = def.merge_scope.clone();
        }
    }

    let parent = match chain.len() {
        0 | 1 => None,
        n => Some(EntityType::new(chain[n - 2].name.as_str())?),
    };

    Ok(EntitySchema {
        name: name.clone(),
        parent,
        fields,
        unique_together,
        merge_scope,
        auto_created: false,
    })
}

fn require_concrete(
    declared: &HashMap<&str, &EntityDef>,
    entity: &EntityType,
    field: &str,
    target: &str,
) -> SchemaResult<EntityType> {
    match declared.get(target) {
        None => Err(SchemaError::UnknownTarget {
            entity: entity.to_string(),
            field: field.to_string(),
            target: target.to_string(),
        }),
        Some(def) if def.is_abstract => Err(SchemaError::AbstractTarget {
            entity: entity.to_string(),
            field: field.to_string(),
            target: target.to_string(),
        }),
        Some(_) => Ok(EntityType::new(target)?),
    }
}

fn validate_entity(schema: &EntitySchema, declared: &HashMap<&str, &EntityDef>) -> SchemaResult<()> {
    for field in &schema.fields {
        if let Some((target, _)) = field.foreign_target() {
            require_concrete(declared, &schema.name, &field.name, target)?;
        }
    }
    let referenced = schema
        .unique_together
        .iter()
        .flatten()
        .chain(schema.merge_scope.iter());
    for field in referenced {
        if !schema.has_field(field) {
            return Err(SchemaError::UnknownField {
                entity: schema.name.to_string(),
                field: field.clone(),
            });
        }
    }
    Ok(())
}

fn resolve_many_to_many(
    owner: &EntityType,
    m2m: &ManyToManyDef,
    declared: &HashMap<&str, &EntityDef>,
    entities: &mut BTreeMap<EntityType, EntitySchema>,
    order: &mut Vec<EntityType>,
) -> SchemaResult<RelationDescriptor> {
    let target = require_concrete(declared, owner, &m2m.name, &m2m.target)?;
    let relation_name = format!("{}.{}", owner, m2m.name);

    let (kind, join) = match &m2m.through {
        None => {
            let join = synthesise_join(owner, &m2m.name, &target, entities, order)?;
            (RelationKind::ManyToManyDirect, join)
        }
        Some(through) => {
            let join_entity = require_concrete(declared, owner, &m2m.name, through)?;
            let schema = &entities[&join_entity];
            let join = pick_join_roles(&relation_name, owner, &target, schema, m2m)?;
            (RelationKind::ManyToManyViaJoin, join)
        }
    };

    Ok(RelationDescriptor {
        name: relation_name,
        kind,
        owner: owner.clone(),
        target,
        field: m2m.name.clone(),
        delete_policy: DeletePolicy::strictest(join.source_on_delete, join.target_on_delete),
        unique_together: entities[&join.entity].unique_together.clone(),
        join: Some(join),
    })
}

fn synthesise_join(
    owner: &EntityType,
    field: &str,
    target: &EntityType,
    entities: &mut BTreeMap<EntityType, EntitySchema>,
    order: &mut Vec<EntityType>,
) -> SchemaResult<JoinDescriptor> {
    let name = EntityType::new(format!("{owner}_{field}"))?;
    if entities.contains_key(&name) {
        return Err(SchemaError::DuplicateEntity(name.to_string()));
    }
    let (source_field, target_field) = if owner == target {
        (format!("from_{owner}"), format!("to_{owner}"))
    } else {
        (owner.to_string(), target.to_string())
    };

    entities.insert(
        name.clone(),
        EntitySchema {
            name: name.clone(),
            parent: None,
            fields: vec![
                FieldDef::foreign_key(&source_field, owner.as_str(), DeletePolicy::Cascade),
                FieldDef::foreign_key(&target_field, target.as_str(), DeletePolicy::Cascade),
            ],
            unique_together: vec![vec![source_field.clone(), target_field.clone()]],
            merge_scope: None,
            auto_created: true,
        },
    );
    order.push(name.clone());

    Ok(JoinDescriptor {
        entity: name,
        source_field,
        source_on_delete: DeletePolicy::Cascade,
        target_field,
        target_on_delete: DeletePolicy::Cascade,
    })
}

fn pick_join_roles(
    relation: &str,
    owner: &EntityType,
    target: &EntityType,
    join: &EntitySchema,
    m2m: &ManyToManyDef,
) -> SchemaResult<JoinDescriptor> {
    let pointing_at = |entity: &EntityType| -> Vec<&FieldDef> {
        join.foreign_keys()
            .filter(|f| matches!(f.foreign_target(), Some((t, _)) if t == entity.as_str()))
            .collect()
    };
    let to_owner = pointing_at(owner);
    let to_target = pointing_at(target);

    let (source, target_fk) = match &m2m.through_fields {
        Some((source, target_name)) => {
            fn find<'f>(
                relation: &str,
                join: &EntitySchema,
                name: &str,
                candidates: &[&'f FieldDef],
                side: &str,
            ) -> SchemaResult<&'f FieldDef> {
                candidates
                    .iter()
                    .copied()
                    .find(|f| f.name == name)
                    .ok_or_else(|| SchemaError::InvalidThroughFields {
                        relation: relation.to_string(),
                        reason: format!("{}.{name} is not a foreign key to the {side}", join.name),
                    })
            }
            if source == target_name {
                return Err(SchemaError::InvalidThroughFields {
                    relation: relation.to_string(),
                    reason: "source and target roles must differ".into(),
                });
            }
            (
                find(relation, join, source, &to_owner, "owner")?,
                find(relation, join, target_name, &to_target, "target")?,
            )
        }
        None if owner == target => match to_owner.as_slice() {
            // Declaration order disambiguates: first role is outgoing.
            [source, target_fk] => (*source, *target_fk),
            [] | [_] => {
                return Err(SchemaError::MissingJoinRole {
                    relation: relation.to_string(),
                    join: join.name.to_string(),
                    side: "target",
                })
            }
            candidates => return Err(ambiguous(relation, join, candidates)),
        },
        None => (
            single_role(relation, join, &to_owner, "owner")?,
            single_role(relation, join, &to_target, "target")?,
        ),
    };

    let policy = |f: &FieldDef| f.foreign_target().map(|(_, p)| p).unwrap_or_default();
    Ok(JoinDescriptor {
        entity: join.name.clone(),
        source_field: source.name.clone(),
        source_on_delete: policy(source),
        target_field: target_fk.name.clone(),
        target_on_delete: policy(target_fk),
    })
}

fn single_role<'a>(
    relation: &str,
    join: &EntitySchema,
    candidates: &[&'a FieldDef],
    side: &'static str,
) -> SchemaResult<&'a FieldDef> {
    match candidates {
        [only] => Ok(*only),
        [] => Err(SchemaError::MissingJoinRole {
            relation: relation.to_string(),
            join: join.name.to_string(),
            side,
        }),
        many => Err(ambiguous(relation, join, many)),
    }
}

fn ambiguous(relation: &str, join: &EntitySchema, candidates: &[&FieldDef]) -> SchemaError {
    SchemaError::AmbiguousJoin {
        relation: relation.to_string(),
        join: join.name.to_string(),
        candidates: candidates.iter().map(|f| f.name.clone()).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::FieldKind;
    use crate::sample::archive_schema;

    fn entity(name: &str) -> EntityType {
        EntityType::new(name).unwrap()
    }

    fn catalog() -> RelationCatalog {
        RelationCatalog::build(archive_schema()).expect("sample schema is valid")
    }

    fn names(relations: &[&RelationDescriptor]) -> Vec<String> {
        relations.iter().map(|r| format!("{}:{:?}", r.name, r.kind)).collect()
    }

    #[test]
    fn reverse_relations_of_magazine() {
        let catalog = catalog();
        let rels = catalog.relations_of(&entity("magazine"), false, true);
        let names = names(&rels);
        assert!(names.contains(&"issue.magazine:OneToManyReverse".to_string()));
        assert!(rels.iter().all(|r| r.kind != RelationKind::ManyToOneForward));
    }

    #[test]
    fn forward_relations_only_when_requested() {
        let catalog = catalog();
        let issue = entity("issue");
        let forward = catalog.relations_of(&issue, true, false);
        assert!(forward
            .iter()
            .any(|r| r.name == "issue.magazine" && r.kind == RelationKind::ManyToOneForward));
        let reverse = catalog.relations_of(&issue, false, true);
        assert!(reverse.iter().all(|r| r.kind != RelationKind::ManyToOneForward));
    }

    #[test]
    fn many_to_many_listed_once_for_both_sides() {
        let catalog = catalog();
        let from_band = catalog.relations_of(&entity("band"), true, true);
        let genres: Vec<_> = from_band.iter().filter(|r| r.name == "band.genres").collect();
        assert_eq!(genres.len(), 1);
        assert_eq!(genres[0].kind, RelationKind::ManyToManyDirect);

        let from_genre = catalog.relations_of(&entity("genre"), false, true);
        assert_eq!(
            from_genre.iter().filter(|r| r.name == "band.genres").count(),
            1
        );
    }

    #[test]
    fn self_referential_many_to_many_listed_once() {
        let catalog = catalog();
        let rels = catalog.relations_of(&entity("band"), false, true);
        let related: Vec<_> = rels.iter().filter(|r| r.name == "band.related").collect();
        assert_eq!(related.len(), 1);
        let join = related[0].join.as_ref().unwrap();
        assert_eq!(join.source_field, "from_band");
        assert_eq!(join.target_field, "to_band");
    }

    #[test]
    fn join_role_foreign_keys_are_not_reverse_relations() {
        let catalog = catalog();
        let rels = catalog.relations_of(&entity("band"), false, true);
        assert!(!rels.iter().any(|r| r.name == "band_member.band"));
        assert!(rels
            .iter()
            .any(|r| r.name == "band.members" && r.kind == RelationKind::ManyToManyViaJoin));
    }

    #[test]
    fn auto_join_entity_is_synthesised() {
        let catalog = catalog();
        let join = catalog.entity(&entity("band_genres")).expect("auto join");
        assert!(join.auto_created);
        assert_eq!(
            join.unique_together,
            vec![vec!["band".to_string(), "genre".to_string()]]
        );
    }

    #[test]
    fn subtype_inherits_fields_and_relations() {
        let catalog = catalog();
        let audio = catalog.entity(&entity("audio")).unwrap();
        assert!(audio.field("title").is_some());
        assert!(audio.field("tracks").is_some());
        assert_eq!(audio.parent, Some(entity("media")));

        let rels = catalog.relations_of(&entity("audio"), true, true);
        assert!(rels.iter().any(|r| r.name == "audio.bands"));
        assert!(catalog.entity(&entity("media")).is_none());
    }

    #[test]
    fn foreign_keys_to_includes_join_roles() {
        let catalog = catalog();
        let ends = catalog.foreign_keys_to(&entity("band"));
        let names: Vec<String> = ends.iter().map(ToString::to_string).collect();
        assert!(names.contains(&"band_member.band".to_string()));
        assert!(names.contains(&"band_genres.band".to_string()));
        assert!(names.contains(&"band_related.from_band".to_string()));
        assert!(names.contains(&"band_related.to_band".to_string()));
    }

    #[test]
    fn unknown_target_is_a_build_error() {
        let schema = SchemaDef::new(vec![EntityDef::new("issue").field(FieldDef::foreign_key(
            "magazine",
            "magazine",
            DeletePolicy::Protect,
        ))]);
        assert!(matches!(
            RelationCatalog::build(schema),
            Err(SchemaError::UnknownTarget { .. })
        ));
    }

    #[test]
    fn abstract_target_is_a_build_error() {
        let schema = SchemaDef::new(vec![
            EntityDef::abstract_base("base").field(FieldDef::text("name")),
            EntityDef::new("item").field(FieldDef::foreign_key(
                "base",
                "base",
                DeletePolicy::Cascade,
            )),
        ]);
        assert!(matches!(
            RelationCatalog::build(schema),
            Err(SchemaError::AbstractTarget { .. })
        ));
    }

    #[test]
    fn ambiguous_join_roles_are_a_build_error() {
        let schema = SchemaDef::new(vec![
            EntityDef::new("person").field(FieldDef::text("name")),
            EntityDef::new("band")
                .field(FieldDef::text("name"))
                .many_to_many(ManyToManyDef::new("members", "person").through("membership")),
            EntityDef::new("membership")
                .field(FieldDef::foreign_key("band", "band", DeletePolicy::Cascade))
                .field(FieldDef::foreign_key("person", "person", DeletePolicy::Cascade))
                .field(FieldDef::foreign_key("sponsor", "person", DeletePolicy::SetNull)),
        ]);
        match RelationCatalog::build(schema) {
            Err(SchemaError::AmbiguousJoin { candidates, .. }) => {
                assert_eq!(candidates, vec!["person".to_string(), "sponsor".to_string()]);
            }
            other => panic!("expected AmbiguousJoin, got {other:?}"),
        }
    }

    #[test]
    fn through_fields_disambiguate() {
        let schema = SchemaDef::new(vec![
            EntityDef::new("person").field(FieldDef::text("name")),
            EntityDef::new("band").many_to_many(
                ManyToManyDef::new("members", "person")
                    .through("membership")
                    .through_fields("band", "person"),
            ),
            EntityDef::new("membership")
                .field(FieldDef::foreign_key("band", "band", DeletePolicy::Cascade))
                .field(FieldDef::foreign_key("person", "person", DeletePolicy::Protect))
                .field(FieldDef::foreign_key("sponsor", "person", DeletePolicy::SetNull)),
        ]);
        let catalog = RelationCatalog::build(schema).unwrap();
        let rels = catalog.relations_of(&entity("person"), false, true);
        let members = rels.iter().find(|r| r.name == "band.members").unwrap();
        let join = members.join.as_ref().unwrap();
        assert_eq!(join.target_field, "person");
        assert_eq!(join.target_on_delete, DeletePolicy::Protect);
        assert_eq!(members.delete_policy, DeletePolicy::Protect);
        // The extra foreign key stays an ordinary reverse relation.
        assert!(rels.iter().any(|r| r.name == "membership.sponsor"));
    }

    #[test]
    fn through_fields_must_name_foreign_keys() {
        let schema = SchemaDef::new(vec![
            EntityDef::new("person").field(FieldDef::text("name")),
            EntityDef::new("band").many_to_many(
                ManyToManyDef::new("members", "person")
                    .through("membership")
                    .through_fields("band", "role"),
            ),
            EntityDef::new("membership")
                .field(FieldDef::foreign_key("band", "band", DeletePolicy::Cascade))
                .field(FieldDef::foreign_key("person", "person", DeletePolicy::Cascade))
                .field(FieldDef::text("role")),
        ]);
        match RelationCatalog::build(schema) {
            Err(SchemaError::InvalidThroughFields { relation, reason }) => {
                assert_eq!(relation, "band.members");
                assert!(reason.contains("membership.role"));
            }
            other => panic!("expected InvalidThroughFields, got {other:?}"),
        }
    }

    #[test]
    fn self_referential_join_uses_declaration_order() {
        let schema = SchemaDef::new(vec![
            EntityDef::new("person")
                .many_to_many(ManyToManyDef::new("mentors", "person").through("mentorship")),
            EntityDef::new("mentorship")
                .field(FieldDef::foreign_key("mentee", "person", DeletePolicy::Cascade))
                .field(FieldDef::foreign_key("mentor", "person", DeletePolicy::Cascade)),
        ]);
        let catalog = RelationCatalog::build(schema).unwrap();
        let rel = &catalog.relations_of(&entity("person"), false, true)[0];
        let ends = rel.ends_towards(&entity("person"));
        assert_eq!(ends[0].field, "mentee");
        assert_eq!(ends[1].field, "mentor");
    }

    #[test]
    fn inheritance_cycle_detected() {
        let schema = SchemaDef::new(vec![
            EntityDef::new("a").extends("b"),
            EntityDef::new("b").extends("a"),
        ]);
        assert!(matches!(
            RelationCatalog::build(schema),
            Err(SchemaError::InheritanceCycle(_))
        ));
    }

    #[test]
    fn duplicate_and_reserved_fields_rejected() {
        let dup = SchemaDef::new(vec![EntityDef::new("a")
            .field(FieldDef::text("name"))
            .field(FieldDef::integer("name"))]);
        assert!(matches!(
            RelationCatalog::build(dup),
            Err(SchemaError::DuplicateField { .. })
        ));

        let reserved = SchemaDef::new(vec![EntityDef::new("a").field(FieldDef::integer("id"))]);
        assert!(matches!(
            RelationCatalog::build(reserved),
            Err(SchemaError::ReservedField { .. })
        ));
    }

    #[test]
    fn unknown_unique_field_rejected() {
        let schema = SchemaDef::new(vec![EntityDef::new("a")
            .field(FieldDef::text("name"))
            .unique_together(&["name", "missing"])]);
        assert!(matches!(
            RelationCatalog::build(schema),
            Err(SchemaError::UnknownField { .. })
        ));
    }

    #[test]
    fn internal_field_names_allowed() {
        let schema = SchemaDef::new(vec![EntityDef::new("a").field(FieldDef::text("_name").computed())]);
        let catalog = RelationCatalog::build(schema).unwrap();
        let field = catalog.entity(&entity("a")).unwrap().field("_name").unwrap();
        assert_eq!(field.kind, FieldKind::Text);
        assert!(field.computed);
    }
}
