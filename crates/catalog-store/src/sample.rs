//! Sample archive data.
//!
//! Duplicates on purpose: bands 1 and 2 are both "Nirvana", persons 1 and 2
//! are both "Kurt Cobain", magazines 1 and 2 are both "Rolling Stone".

use serde_json::{json, Value};

use catalog_schema::sample::archive_schema;

use crate::snapshot::Snapshot;

pub fn archive_snapshot() -> Snapshot {
    let mut snapshot = Snapshot::new(archive_schema());
    let rows: Value = json!({
        "genre": [
            {"id": 1, "name": "rock"},
            {"id": 2, "name": "grunge"},
            {"id": 3, "name": "jazz"}
        ],
        "place": [
            {"id": 1, "name": "Seattle", "country": "US"},
            {"id": 2, "name": "Aberdeen", "country": "US"}
        ],
        "person": [
            {"id": 1, "name": "Kurt Cobain", "description": "", "birth_year": 1967, "alive": false},
            {"id": 2, "name": "Kurt Cobain", "description": "Singer", "birth_year": 1967, "alive": false},
            {"id": 3, "name": "Dave Grohl", "description": "Drummer", "birth_year": 1969, "alive": true, "mentor": 2}
        ],
        "band": [
            {"id": 1, "name": "Nirvana", "description": "", "rank": 0, "active": false, "origin": 1},
            {"id": 2, "name": "Nirvana", "description": "Grunge band", "rank": 1, "active": false, "founded": "1987-01-01", "origin": 2},
            {"id": 3, "name": "Nirvana (UK)", "description": "Psychedelic band", "rank": 2, "active": true},
            {"id": 4, "name": "Foo Fighters", "description": "", "rank": 0, "active": true, "origin": 1}
        ],
        "band_genres": [
            {"id": 1, "band": 1, "genre": 1},
            {"id": 2, "band": 2, "genre": 1},
            {"id": 3, "band": 2, "genre": 2}
        ],
        "band_member": [
            {"id": 1, "band": 1, "person": 1, "role": "vocals"},
            {"id": 2, "band": 2, "person": 2, "role": "guitar"},
            {"id": 3, "band": 2, "person": 3, "role": "drums"}
        ],
        "band_related": [
            {"id": 1, "from_band": 2, "to_band": 4},
            {"id": 2, "from_band": 4, "to_band": 3}
        ],
        "magazine": [
            {"id": 1, "name": "Rolling Stone", "description": "", "issn": ""},
            {"id": 2, "name": "Rolling Stone", "description": "Music magazine", "issn": "0035-791X"},
            {"id": 3, "name": "Spin", "description": "", "issn": ""}
        ],
        "issue": [
            {"id": 1, "magazine": 1, "name": "1991-09"},
            {"id": 2, "magazine": 2, "name": "1991-09"},
            {"id": 3, "magazine": 2, "name": "1992-01"},
            {"id": 4, "magazine": 3, "name": "1991-09"}
        ],
        "article": [
            {"id": 1, "issue": 1, "title": "Teen Spirit", "page": 12},
            {"id": 2, "issue": 2, "title": "Teen Spirit"}
        ],
        "article_bands": [
            {"id": 1, "article": 1, "band": 1},
            {"id": 2, "article": 2, "band": 2}
        ],
        "audio": [
            {"id": 1, "title": "Nevermind", "description": "", "tracks": 12}
        ],
        "audio_bands": [
            {"id": 1, "audio": 1, "band": 2}
        ]
    });
    snapshot.records = serde_json::from_value(rows).unwrap_or_default();
    snapshot
}
