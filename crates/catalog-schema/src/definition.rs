//! Serde types describing a schema.
//!
//! A [`SchemaDef`] is the explicit, static input to the relation catalog. It
//! is usually loaded from JSON next to the data it describes, or built in
//! code with the small builder methods below.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::relation::DeletePolicy;

/// Name of the implicit primary key attribute.
pub const PRIMARY_KEY: &str = "id";

/// Complete schema: every entity type and its declared relations.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaDef {
    pub entities: Vec<EntityDef>,
}

impl SchemaDef {
    pub fn new(entities: Vec<EntityDef>) -> Self {
        Self { entities }
    }
}

/// Declaration of one entity type.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EntityDef {
    pub name: String,
    /// Supertype whose fields and relations this entity inherits.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    /// Abstract entities hold no rows and only contribute declarations.
    #[serde(default, rename = "abstract")]
    pub is_abstract: bool,
    #[serde(default)]
    pub fields: Vec<FieldDef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub many_to_many: Vec<ManyToManyDef>,
    /// Field sets that must not repeat across rows.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unique_together: Vec<Vec<String>>,
    /// Records may only be merged when they agree on this field.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merge_scope: Option<String>,
}

impl EntityDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: None,
            is_abstract: false,
            fields: Vec::new(),
            many_to_many: Vec::new(),
            unique_together: Vec::new(),
            merge_scope: None,
        }
    }

    pub fn abstract_base(name: impl Into<String>) -> Self {
        Self {
            is_abstract: true,
            ..Self::new(name)
        }
    }

    pub fn extends(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn field(mut self, field: FieldDef) -> Self {
        self.fields.push(field);
        self
    }

    pub fn many_to_many(mut self, m2m: ManyToManyDef) -> Self {
        self.many_to_many.push(m2m);
        self
    }

    pub fn unique_together(mut self, fields: &[&str]) -> Self {
        self.unique_together
            .push(fields.iter().map(|f| f.to_string()).collect());
        self
    }

    pub fn merge_scope(mut self, field: impl Into<String>) -> Self {
        self.merge_scope = Some(field.into());
        self
    }
}

/// Declaration of one attribute.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    pub kind: FieldKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    /// Derived from other data; never filled in from another record.
    #[serde(default)]
    pub computed: bool,
}

impl FieldDef {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            default: None,
            computed: false,
        }
    }

    pub fn text(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Text)
    }

    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Integer)
    }

    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Boolean)
    }

    pub fn date(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Date)
    }

    pub fn foreign_key(
        name: impl Into<String>,
        target: impl Into<String>,
        on_delete: DeletePolicy,
    ) -> Self {
        Self::new(
            name,
            FieldKind::ForeignKey {
                target: target.into(),
                on_delete,
            },
        )
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    pub fn computed(mut self) -> Self {
        self.computed = true;
        self
    }

    /// Internal fields start with an underscore.
    pub fn is_internal(&self) -> bool {
        self.name.starts_with('_')
    }

    pub fn is_foreign_key(&self) -> bool {
        matches!(self.kind, FieldKind::ForeignKey { .. })
    }

    /// The target entity name and delete policy of a foreign key field.
    pub fn foreign_target(&self) -> Option<(&str, DeletePolicy)> {
        match &self.kind {
            FieldKind::ForeignKey { target, on_delete } => Some((target.as_str(), *on_delete)),
            _ => None,
        }
    }
}

/// Storage kind of an attribute.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldKind {
    Text,
    Integer,
    Float,
    Boolean,
    Date,
    ForeignKey {
        target: String,
        #[serde(default)]
        on_delete: DeletePolicy,
    },
}

/// Declaration of a many-to-many link set on its owning entity.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManyToManyDef {
    pub name: String,
    pub target: String,
    /// Declared join entity; synthesised when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub through: Option<String>,
    /// `(source, target)` foreign-key names on the join entity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub through_fields: Option<(String, String)>,
}

impl ManyToManyDef {
    pub fn new(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
            through: None,
            through_fields: None,
        }
    }

    pub fn through(mut self, join: impl Into<String>) -> Self {
        self.through = Some(join.into());
        self
    }

    pub fn through_fields(mut self, source: impl Into<String>, target: impl Into<String>) -> Self {
        self.through_fields = Some((source.into(), target.into()));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn field_kind_json_shape() {
        let field = FieldDef::foreign_key("magazine", "magazine", DeletePolicy::Protect);
        let json = serde_json::to_value(&field).unwrap();
        assert_eq!(
            json["kind"],
            json!({"type": "foreign_key", "target": "magazine", "on_delete": "protect"})
        );
    }

    #[test]
    fn entity_def_parses_with_defaults() {
        let def: EntityDef = serde_json::from_value(json!({
            "name": "genre",
            "fields": [{"name": "name", "kind": {"type": "text"}}]
        }))
        .unwrap();
        assert!(!def.is_abstract);
        assert!(def.parent.is_none());
        assert!(def.many_to_many.is_empty());
        assert_eq!(def.fields[0].kind, FieldKind::Text);
    }

    #[test]
    fn foreign_key_defaults_to_cascade() {
        let kind: FieldKind =
            serde_json::from_value(json!({"type": "foreign_key", "target": "band"})).unwrap();
        assert_eq!(
            kind,
            FieldKind::ForeignKey {
                target: "band".into(),
                on_delete: DeletePolicy::Cascade
            }
        );
    }

    #[test]
    fn internal_field_detection() {
        assert!(FieldDef::text("_name").is_internal());
        assert!(!FieldDef::text("name").is_internal());
    }
}
