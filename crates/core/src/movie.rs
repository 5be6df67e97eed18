//! Radarr catalog snapshot models and the classification fingerprint.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// A Radarr tag: numeric id plus the human-readable label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: i64,
    pub label: String,
}

/// A movie as fetched from Radarr.
///
/// Only the fields relevant for classification and tag management are
/// modeled explicitly; everything else the API returned is retained in
/// `extra` so an update PUT can echo the full document back without
/// nulling fields Radarr expects.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Movie {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub overview: Option<String>,
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(default)]
    pub studio: Option<String>,
    #[serde(default, rename = "alternativeTitles")]
    pub alternate_titles: Vec<AlternateTitle>,
    #[serde(default)]
    pub directors: Vec<String>,
    #[serde(default)]
    pub actors: Vec<String>,
    #[serde(default, rename = "tags")]
    pub tag_ids: Vec<i64>,

    /// Fields we do not interpret but must round-trip on update.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// An alternate title entry from the Radarr payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlternateTitle {
    #[serde(default)]
    pub title: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Movie {
    /// Titles of all alternate-title entries, in payload order.
    pub fn alternate_title_strings(&self) -> Vec<String> {
        self.alternate_titles
            .iter()
            .map(|t| t.title.clone())
            .collect()
    }

    /// Deterministic digest of the classification-relevant metadata.
    ///
    /// Two movies with equal fingerprints are treated as equivalent for
    /// decision-cache purposes: a cached decision is reused as long as the
    /// fingerprint is unchanged.
    ///
    /// The digest covers title, year, overview, and the sorted genre,
    /// director, and top-five actor lists. List entries are trimmed and
    /// lowercased before sorting (the catalog is inconsistent about case
    /// there); title and overview are hashed verbatim. Keys are emitted in
    /// sorted order via `serde_json::Map`, so the encoding is canonical.
    pub fn fingerprint(&self) -> String {
        let mut map = Map::new();
        map.insert("title".to_string(), Value::String(self.title.clone()));
        map.insert(
            "year".to_string(),
            self.year.map(Value::from).unwrap_or(Value::Null),
        );
        map.insert(
            "overview".to_string(),
            self.overview
                .clone()
                .map(Value::String)
                .unwrap_or(Value::Null),
        );
        map.insert("genres".to_string(), normalized_list(&self.genres));
        map.insert("directors".to_string(), normalized_list(&self.directors));

        let top_actors: Vec<String> = self.actors.iter().take(5).cloned().collect();
        map.insert("actors".to_string(), normalized_list(&top_actors));

        let canonical = serde_json::to_string(&Value::Object(map))
            .expect("fingerprint serialization cannot fail");
        let hash = Sha256::digest(canonical.as_bytes());
        format!("{:x}", hash)
    }
}

/// Trim, lowercase, and sort a string list into a canonical JSON array.
fn normalized_list(items: &[String]) -> Value {
    let mut cleaned: Vec<String> = items
        .iter()
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect();
    cleaned.sort();
    Value::Array(cleaned.into_iter().map(Value::String).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn movie() -> Movie {
        Movie {
            id: 1,
            title: "Chinatown".to_string(),
            year: Some(1974),
            overview: Some("A private detective in 1930s Los Angeles.".to_string()),
            genres: vec!["Crime".to_string(), "Drama".to_string()],
            studio: Some("Paramount".to_string()),
            alternate_titles: vec![],
            directors: vec!["Roman Polanski".to_string()],
            actors: vec![
                "Jack Nicholson".to_string(),
                "Faye Dunaway".to_string(),
                "John Huston".to_string(),
            ],
            tag_ids: vec![],
            extra: Map::new(),
        }
    }

    #[test]
    fn test_fingerprint_is_stable() {
        let m = movie();
        assert_eq!(m.fingerprint(), m.fingerprint());
        assert_eq!(m.fingerprint().len(), 64);
    }

    #[test]
    fn test_fingerprint_ignores_genre_order() {
        let mut a = movie();
        let mut b = movie();
        a.genres = vec!["Crime".to_string(), "Drama".to_string()];
        b.genres = vec!["Drama".to_string(), "Crime".to_string()];
        assert_eq!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn test_fingerprint_ignores_top_actor_order() {
        let mut a = movie();
        let mut b = movie();
        b.actors = vec![
            "John Huston".to_string(),
            "Jack Nicholson".to_string(),
            "Faye Dunaway".to_string(),
        ];
        assert_eq!(a.fingerprint(), b.fingerprint());
        // A sixth actor does not participate at all.
        a.actors.extend([
            "A".to_string(),
            "B".to_string(),
            "Diane Ladd".to_string(),
        ]);
        b.actors.extend([
            "A".to_string(),
            "B".to_string(),
            "Someone Else".to_string(),
        ]);
        assert_eq!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn test_fingerprint_changes_with_year() {
        let a = movie();
        let mut b = movie();
        b.year = Some(1975);
        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn test_fingerprint_changes_with_overview() {
        let a = movie();
        let mut b = movie();
        b.overview = Some("Something else entirely.".to_string());
        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn test_fingerprint_title_case_sensitive() {
        // Title is hashed verbatim; only list fields are case-folded.
        let a = movie();
        let mut b = movie();
        b.title = "chinatown".to_string();
        assert_ne!(a.fingerprint(), b.fingerprint());

        let mut c = movie();
        c.genres = vec!["crime".to_string(), " DRAMA ".to_string()];
        assert_eq!(a.fingerprint(), c.fingerprint());
    }

    #[test]
    fn test_movie_roundtrips_unknown_fields() {
        let json = serde_json::json!({
            "id": 7,
            "title": "Toy Story",
            "year": 1995,
            "genres": ["Animation"],
            "tags": [3, 9],
            "monitored": true,
            "qualityProfileId": 4
        });
        let m: Movie = serde_json::from_value(json.clone()).unwrap();
        assert_eq!(m.tag_ids, vec![3, 9]);
        let back = serde_json::to_value(&m).unwrap();
        assert_eq!(back.get("monitored"), json.get("monitored"));
        assert_eq!(back.get("qualityProfileId"), json.get("qualityProfileId"));
    }
}
