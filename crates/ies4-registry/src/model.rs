//! Typed entity records as they appear inside a region document.
//!
//! Documents are edited generically (as `serde_json::Value`) so unknown keys
//! survive a round trip. These types are used to *build* records and to read
//! the handful of fields the editor inspects.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// An alias or translation of an entity's name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityName {
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name_type: Option<String>,
}

/// An external designator: NATO reporting name, serial or unit number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identifier {
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identifier_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuing_authority: Option<String>,
}

/// A lifecycle milestone (development, service entry, regional deployment).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemporalState {
    pub id: String,
    pub state_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Value>,
}

/// One real-world asset or unit.
///
/// The type foreign key lives either in `type` or in a kind-specific field
/// such as `vehicleType`; the latter is kept in `extra` and reached through
/// [`EntityRecord::type_key`]. Everything else (specifications, capabilities,
/// variants) is opaque and copied verbatim.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityRecord {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub names: Vec<EntityName>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub identifiers: Vec<Identifier>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub entity_type: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub temporal_parts: Vec<TemporalState>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub states: Vec<TemporalState>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl EntityRecord {
    /// Value of the type foreign key stored under `field`.
    pub fn type_key(&self, field: &str) -> Option<&str> {
        if field == "type" {
            return self.entity_type.as_deref();
        }
        self.extra.get(field).and_then(Value::as_str)
    }

    /// Point the record at `type_id` through `field`.
    pub fn set_type_key(&mut self, field: &str, type_id: &str) {
        if field == "type" {
            self.entity_type = Some(type_id.to_string());
        } else {
            self.extra
                .insert(field.to_string(), Value::String(type_id.to_string()));
        }
    }

    pub fn primary_name(&self) -> Option<&str> {
        self.names.first().map(|n| n.value.as_str())
    }

    pub fn to_value(&self) -> serde_json::Result<Value> {
        serde_json::to_value(self)
    }
}

/// A category shared by many records, e.g. `attack-helicopter`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeDefinition {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TypeDefinition {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            description: None,
            extra: Map::new(),
        }
    }
}

// ============================================================================
// Read-only helpers over raw records
// ============================================================================

/// `id` of a raw record, if it has a string one.
pub fn record_id(record: &Value) -> Option<&str> {
    record.get("id").and_then(Value::as_str)
}

/// All `names[].value` strings of a raw record.
pub fn record_names(record: &Value) -> impl Iterator<Item = &str> {
    string_values(record, "names")
}

/// All `identifiers[].value` strings of a raw record.
pub fn record_identifiers(record: &Value) -> impl Iterator<Item = &str> {
    string_values(record, "identifiers")
}

fn string_values<'a>(record: &'a Value, field: &str) -> impl Iterator<Item = &'a str> {
    record
        .get(field)
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|entry| match entry {
            Value::String(s) => Some(s.as_str()),
            other => other.get("value").and_then(Value::as_str),
        })
}
