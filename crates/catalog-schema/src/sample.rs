//! The archive schema.
//!
//! A small but complete schema covering every relation kind: plain foreign
//! keys with each delete policy, direct and join-mediated many-to-many
//! relations, a self-referential link set, a merge scope and an abstract
//! supertype. The CLI's `init` data and most tests are built on it.

use serde_json::json;

use crate::definition::{EntityDef, FieldDef, ManyToManyDef, SchemaDef};
use crate::relation::DeletePolicy;

pub fn archive_schema() -> SchemaDef {
    SchemaDef::new(vec![
        EntityDef::new("genre").field(FieldDef::text("name")),
        EntityDef::new("place")
            .field(FieldDef::text("name"))
            .field(FieldDef::text("country")),
        EntityDef::new("person")
            .field(FieldDef::text("name"))
            .field(FieldDef::text("description"))
            .field(FieldDef::integer("birth_year"))
            .field(FieldDef::boolean("alive").with_default(json!(true)))
            .field(FieldDef::text("_search").computed())
            .field(FieldDef::foreign_key(
                "mentor",
                "person",
                DeletePolicy::SetNull,
            )),
        EntityDef::new("band")
            .field(FieldDef::text("name"))
            .field(FieldDef::text("description"))
            .field(FieldDef::integer("rank").with_default(json!(0)))
            .field(FieldDef::boolean("active").with_default(json!(false)))
            .field(FieldDef::date("founded"))
            .field(FieldDef::foreign_key(
                "origin",
                "place",
                DeletePolicy::SetNull,
            ))
            .many_to_many(ManyToManyDef::new("genres", "genre"))
            .many_to_many(ManyToManyDef::new("members", "person").through("band_member"))
            .many_to_many(ManyToManyDef::new("related", "band")),
        EntityDef::new("band_member")
            .field(FieldDef::foreign_key("band", "band", DeletePolicy::Cascade))
            .field(FieldDef::foreign_key("person", "person", DeletePolicy::Cascade))
            .field(FieldDef::text("role"))
            .unique_together(&["band", "person"]),
        EntityDef::new("magazine")
            .field(FieldDef::text("name"))
            .field(FieldDef::text("description"))
            .field(FieldDef::text("issn")),
        EntityDef::new("issue")
            .field(FieldDef::foreign_key(
                "magazine",
                "magazine",
                DeletePolicy::Protect,
            ))
            .field(FieldDef::text("name"))
            .unique_together(&["magazine", "name"])
            .merge_scope("magazine"),
        EntityDef::new("article")
            .field(FieldDef::foreign_key("issue", "issue", DeletePolicy::Protect))
            .field(FieldDef::text("title"))
            .field(FieldDef::integer("page"))
            .many_to_many(ManyToManyDef::new("bands", "band"))
            .many_to_many(ManyToManyDef::new("people", "person"))
            .merge_scope("issue"),
        EntityDef::abstract_base("media")
            .field(FieldDef::text("title"))
            .field(FieldDef::text("description"))
            .field(FieldDef::text("_name").computed())
            .many_to_many(ManyToManyDef::new("bands", "band")),
        EntityDef::new("audio")
            .extends("media")
            .field(FieldDef::integer("tracks")),
        EntityDef::new("video")
            .extends("media")
            .field(FieldDef::integer("minutes")),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RelationCatalog;

    #[test]
    fn archive_schema_builds() {
        let catalog = RelationCatalog::build(archive_schema()).unwrap();
        let names: Vec<&str> = catalog.entities().map(|e| e.name.as_str()).collect();
        assert!(names.contains(&"band_genres"));
        assert!(names.contains(&"band_related"));
        assert!(names.contains(&"article_bands"));
        assert!(names.contains(&"audio_bands"));
        assert!(names.contains(&"video_bands"));
        assert!(!names.contains(&"media"));
    }

    #[test]
    fn archive_schema_survives_json() {
        let schema = archive_schema();
        let text = serde_json::to_string(&schema).unwrap();
        let parsed: SchemaDef = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed, schema);
    }
}
