//! Read-only views over a region document: counts, structure checks,
//! entity lookup and listings.

use crate::document::{digest, RegionDocument};
use crate::error::{RegistryError, Result};
use crate::kind::EntityKind;
use crate::matcher::IdentityPredicate;
use crate::model::{record_id, record_names};
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

/// Entity counts and file facts for one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentStats {
    pub path: PathBuf,
    pub file_size: u64,
    pub digest: String,
    pub counts: BTreeMap<String, usize>,
}

pub fn stats(path: &Path) -> Result<DocumentStats> {
    let bytes = RegionDocument::read_bytes(path)?;
    let value = serde_json::from_slice(&bytes).map_err(|source| RegistryError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    let doc = RegionDocument::from_value(path, value)?;
    let counts = doc
        .root()
        .iter()
        .filter_map(|(k, v)| v.as_array().map(|a| (k.clone(), a.len())))
        .collect();
    Ok(DocumentStats {
        path: path.to_path_buf(),
        file_size: bytes.len() as u64,
        digest: digest(&bytes),
        counts,
    })
}

/// A structural problem found by [`validate`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collection: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
    pub message: String,
}

impl ValidationIssue {
    fn at(collection: &str, index: Option<usize>, message: impl Into<String>) -> Self {
        Self {
            collection: Some(collection.to_string()),
            index,
            message: message.into(),
        }
    }
}

fn is_type_collection(name: &str) -> bool {
    name.ends_with("Types")
}

fn has_type_key(record: &Value) -> bool {
    record.as_object().is_some_and(|obj| {
        obj.iter()
            .any(|(k, v)| (k == "type" || k.ends_with("Type")) && v.is_string())
    })
}

/// Check a parsed document. Reports issues instead of failing.
///
/// Collections are recognized by shape: every top-level array is one, and
/// the catalog's collection names must be arrays when present.
pub fn validate(root: &Value) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    let Some(obj) = root.as_object() else {
        issues.push(ValidationIssue {
            collection: None,
            index: None,
            message: "document must be a JSON object".into(),
        });
        return issues;
    };

    for kind in EntityKind::catalog() {
        for name in [&kind.collection, &kind.type_collection] {
            if obj.get(name.as_str()).is_some_and(|v| !v.is_array()) {
                issues.push(ValidationIssue::at(name, None, format!("`{name}` must be an array")));
            }
        }
    }

    for (name, value) in obj {
        let Some(items) = value.as_array() else {
            continue;
        };
        let entity_collection = !is_type_collection(name);
        let mut seen = HashSet::new();
        for (index, item) in items.iter().enumerate() {
            if !item.is_object() {
                issues.push(ValidationIssue::at(name, Some(index), "record must be an object"));
                continue;
            }
            match record_id(item) {
                None => issues.push(ValidationIssue::at(name, Some(index), "missing required `id`")),
                Some(id) => {
                    if entity_collection && !seen.insert(id.to_string()) {
                        issues.push(ValidationIssue::at(
                            name,
                            Some(index),
                            format!("duplicate id `{id}`"),
                        ));
                    }
                }
            }
            if entity_collection && !has_type_key(item) {
                issues.push(ValidationIssue::at(
                    name,
                    Some(index),
                    "missing `type` or `<kind>Type` reference",
                ));
            }
        }
    }
    issues
}

/// A record found by id, with the collection it came from when known.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FoundEntity {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_type: Option<String>,
    pub entity: Value,
}

/// Look `id` up in the top-level collections, then anywhere in the document.
pub fn find_entity(doc: &RegionDocument, id: &str) -> Option<FoundEntity> {
    for (name, value) in doc.root() {
        let Some(items) = value.as_array() else {
            continue;
        };
        if let Some(hit) = items.iter().find(|r| record_id(r) == Some(id)) {
            return Some(FoundEntity {
                entity_type: Some(name.clone()),
                entity: hit.clone(),
            });
        }
    }
    doc.root()
        .values()
        .find_map(|v| search_recursive(v, id))
        .map(|hit| FoundEntity {
            entity_type: None,
            entity: hit.clone(),
        })
}

fn search_recursive<'a>(value: &'a Value, id: &str) -> Option<&'a Value> {
    match value {
        Value::Object(obj) => {
            if obj.get("id").and_then(Value::as_str) == Some(id) {
                return Some(value);
            }
            obj.values().find_map(|v| search_recursive(v, id))
        }
        Value::Array(items) => items.iter().find_map(|v| search_recursive(v, id)),
        _ => None,
    }
}

/// One row of a listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListedRecord {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub type_key: Option<String>,
    pub matches: bool,
}

pub fn list<P>(doc: &RegionDocument, kind: &EntityKind, identity: &P) -> Result<Vec<ListedRecord>>
where
    P: IdentityPredicate + ?Sized,
{
    Ok(doc
        .collection(&kind.collection)?
        .iter()
        .map(|r| ListedRecord {
            id: record_id(r).unwrap_or_default().to_string(),
            name: record_names(r).next().map(str::to_string),
            type_key: [kind.type_field.as_str(), "type"]
                .iter()
                .find_map(|f| r.get(*f).and_then(Value::as_str))
                .map(str::to_string),
            matches: identity.matches(r),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Value {
        json!({
            "title": "Odesa",
            "vehicles": [
                {"id": "vehicle-a-op7-001", "names": [{"value": "A"}], "vehicleType": "tank"},
                {"id": "vehicle-a-op7-001", "type": "tank"},
                {"names": [{"value": "no id"}]},
                "junk"
            ],
            "vehicleTypes": [{"id": "tank"}],
            "areas": [{"id": "area-1", "type": "port", "units": [{"id": "unit-9", "name": "nested"}]}],
            "aircraft": {"oops": true}
        })
    }

    #[test]
    fn test_validate_reports_shape_problems() {
        let issues = validate(&sample());
        let messages: Vec<_> = issues.iter().map(|i| i.message.as_str()).collect();
        assert!(messages.contains(&"`aircraft` must be an array"));
        assert!(messages.contains(&"duplicate id `vehicle-a-op7-001`"));
        assert!(messages.contains(&"missing required `id`"));
        assert!(messages.contains(&"record must be an object"));
        let untyped = issues
            .iter()
            .filter(|i| i.message.starts_with("missing `type`"))
            .count();
        assert_eq!(untyped, 1);
        assert_eq!(validate(&json!([1])).len(), 1);
        assert!(validate(&json!({"vehicles": [], "vehicleTypes": [{"id": "t"}]})).is_empty());
    }

    #[test]
    fn test_find_entity_prefers_collections_then_recurses() {
        let doc = RegionDocument::from_value("x.json", sample()).unwrap();
        let found = find_entity(&doc, "area-1").unwrap();
        assert_eq!(found.entity_type.as_deref(), Some("areas"));

        let nested = find_entity(&doc, "unit-9").unwrap();
        assert_eq!(nested.entity_type, None);
        assert_eq!(nested.entity["name"], "nested");

        assert!(find_entity(&doc, "missing").is_none());
    }

    #[test]
    fn test_list_flags_matches() {
        let doc = RegionDocument::from_value(
            "x.json",
            json!({"vehicles": [
                {"id": "vehicle-a-op7-001", "names": [{"value": "A"}], "vehicleType": "tank"},
                {"id": "vehicle-b-op7-001", "type": "ifv"}
            ]}),
        )
        .unwrap();
        let kind = EntityKind::lookup("vehicle").unwrap();
        let rows = list(&doc, &kind, &|r: &Value| record_id(r) == Some("vehicle-b-op7-001")).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].name.as_deref(), Some("A"));
        assert_eq!(rows[0].type_key.as_deref(), Some("tank"));
        assert!(!rows[0].matches);
        assert_eq!(rows[1].type_key.as_deref(), Some("ifv"));
        assert!(rows[1].matches);
    }

    #[test]
    fn test_stats_counts_collections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.json");
        std::fs::write(&path, r#"{"vehicles": [{"id": "a"}], "vehicleTypes": [], "title": "x"}"#).unwrap();
        let stats = stats(&path).unwrap();
        assert_eq!(stats.counts.get("vehicles"), Some(&1));
        assert_eq!(stats.counts.get("vehicleTypes"), Some(&0));
        assert!(!stats.counts.contains_key("title"));
        assert_eq!(stats.digest.len(), 64);
    }
}
