//! Declarative entity kinds and entity definition files.
//!
//! A kind names the collections and the type field an entity lives in. An
//! [`EntityDefinition`] is the payload that replaces one hand-written script
//! per asset: a kind, a slug, a type definition and the record itself.

use crate::error::{RegistryError, Result};
use crate::matcher::IdentityMatcher;
use crate::model::{EntityRecord, TypeDefinition};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

/// Where records of one kind live inside a region document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityKind {
    /// Id prefix, e.g. `vehicle`.
    pub name: String,
    /// Entity collection, e.g. `vehicles`.
    pub collection: String,
    /// Sibling type collection, e.g. `vehicleTypes`.
    pub type_collection: String,
    /// Field holding the type foreign key, e.g. `vehicleType`.
    pub type_field: String,
}

impl EntityKind {
    pub fn new(name: &str, collection: &str, type_collection: &str, type_field: &str) -> Self {
        Self {
            name: name.to_string(),
            collection: collection.to_string(),
            type_collection: type_collection.to_string(),
            type_field: type_field.to_string(),
        }
    }

    /// Built-in kinds, in the order they are listed to users.
    pub fn catalog() -> Vec<EntityKind> {
        vec![
            Self::new("vehicle", "vehicles", "vehicleTypes", "vehicleType"),
            Self::new("aircraft", "aircraft", "aircraftTypes", "aircraftType"),
            Self::new(
                "missileSystem",
                "missileSystems",
                "missileSystemTypes",
                "missileSystemType",
            ),
            Self::new(
                "militaryUnit",
                "militaryUnits",
                "militaryUnitTypes",
                "militaryUnitType",
            ),
            Self::new("person", "people", "peopleTypes", "personType"),
            Self::new("weapon", "weapons", "weaponTypes", "weaponType"),
            Self::new(
                "organization",
                "organizations",
                "organizationTypes",
                "organizationType",
            ),
        ]
    }

    /// Look a kind up by name or by collection name, case-insensitively.
    pub fn lookup(name: &str) -> Result<EntityKind> {
        let wanted = name.trim();
        Self::catalog()
            .into_iter()
            .find(|k| k.name.eq_ignore_ascii_case(wanted) || k.collection.eq_ignore_ascii_case(wanted))
            .ok_or_else(|| RegistryError::UnknownKind {
                name: wanted.to_string(),
                valid: Self::catalog().into_iter().map(|k| k.name).collect(),
            })
    }

    /// True when `record` points at `type_id` through this kind's type field
    /// or through the generic `type` field.
    pub fn references(&self, record: &Value, type_id: &str) -> bool {
        [self.type_field.as_str(), "type"]
            .iter()
            .any(|field| record.get(*field).and_then(Value::as_str) == Some(type_id))
    }

    /// The type `record` points at, kind-specific field first.
    pub fn type_of<'a>(&self, record: &'a Value) -> Option<&'a str> {
        [self.type_field.as_str(), "type"]
            .iter()
            .find_map(|field| record.get(*field).and_then(Value::as_str))
    }

    /// Synthetic id: `<kind>-<slug>-<region>-<sequence>`.
    pub fn record_id(&self, slug: &str, region: &str, sequence: u32) -> String {
        format!(
            "{}-{}-{}-{:03}",
            self.name,
            slugify(slug),
            slugify(region),
            sequence
        )
    }
}

/// Lowercase, ASCII alphanumerics separated by single dashes.
pub fn slugify(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
        } else if !out.is_empty() && !out.ends_with('-') {
            out.push('-');
        }
    }
    while out.ends_with('-') {
        out.pop();
    }
    out
}

/// How a definition names its kind: by catalog name or spelled out.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KindRef {
    Named(String),
    Inline(EntityKind),
}

impl KindRef {
    pub fn resolve(&self) -> Result<EntityKind> {
        match self {
            KindRef::Named(name) => EntityKind::lookup(name),
            KindRef::Inline(kind) => Ok(kind.clone()),
        }
    }
}

/// Identity signature of an entity, as written in a definition file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchSpec {
    #[serde(default)]
    pub id_fragment: Option<String>,
    #[serde(default)]
    pub names: Vec<String>,
    #[serde(default)]
    pub identifiers: Vec<String>,
}

/// One asset fact sheet.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityDefinition {
    pub kind: KindRef,
    pub slug: String,
    pub type_definition: TypeDefinition,
    pub record: EntityRecord,
    #[serde(default, rename = "match")]
    pub match_spec: Option<MatchSpec>,
}

impl EntityDefinition {
    pub fn from_json(text: &str) -> Result<Self> {
        let def: Self = serde_json::from_str(text)
            .map_err(|e| RegistryError::InvalidDefinition(e.to_string()))?;
        def.check()?;
        Ok(def)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                RegistryError::PathNotFound {
                    path: path.to_path_buf(),
                }
            } else {
                RegistryError::io(path, e)
            }
        })?;
        Self::from_json(&text)
    }

    fn check(&self) -> Result<()> {
        if slugify(&self.slug).is_empty() {
            return Err(RegistryError::InvalidDefinition(
                "`slug` must contain at least one alphanumeric character".into(),
            ));
        }
        if self.type_definition.id.trim().is_empty() {
            return Err(RegistryError::InvalidDefinition(
                "`typeDefinition.id` must not be empty".into(),
            ));
        }
        if self.record.names.is_empty() {
            return Err(RegistryError::InvalidDefinition(
                "`record.names` must list at least one name".into(),
            ));
        }
        self.kind.resolve()?;
        Ok(())
    }

    pub fn kind(&self) -> Result<EntityKind> {
        self.kind.resolve()
    }

    /// Identity signature; derived from the slug and the record's own names
    /// and identifiers when the file has no explicit `match` block.
    pub fn match_spec(&self) -> MatchSpec {
        self.match_spec.clone().unwrap_or_else(|| MatchSpec {
            id_fragment: Some(slugify(&self.slug)),
            names: self.record.names.iter().map(|n| n.value.clone()).collect(),
            identifiers: self
                .record
                .identifiers
                .iter()
                .map(|i| i.value.clone())
                .collect(),
        })
    }

    pub fn matcher(&self) -> IdentityMatcher {
        IdentityMatcher::from_spec(&self.match_spec())
    }

    /// The record ready for insertion: type key set, id left for the editor.
    pub fn build_record(&self, kind: &EntityKind) -> EntityRecord {
        let mut record = self.record.clone();
        record.set_type_key(&kind.type_field, &self.type_definition.id);
        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_id_format() {
        let kind = EntityKind::lookup("vehicle").unwrap();
        assert_eq!(
            kind.record_id("Mi-28 Helicopter", "OP7", 1),
            "vehicle-mi-28-helicopter-op7-001"
        );
        assert_eq!(kind.record_id("mi28-helicopter", "op7", 12), "vehicle-mi28-helicopter-op7-012");
    }

    #[test]
    fn test_lookup_by_collection_and_unknown() {
        assert_eq!(EntityKind::lookup("people").unwrap().name, "person");
        let err = EntityKind::lookup("spaceship").unwrap_err();
        assert!(matches!(err, RegistryError::UnknownKind { .. }));
        assert!(err.to_string().contains("vehicle"));
    }

    #[test]
    fn test_references_checks_both_fields() {
        let kind = EntityKind::lookup("vehicle").unwrap();
        assert!(kind.references(&json!({"vehicleType": "tank"}), "tank"));
        assert!(kind.references(&json!({"type": "tank"}), "tank"));
        assert!(!kind.references(&json!({"aircraftType": "tank"}), "tank"));
    }

    #[test]
    fn test_definition_derives_match_spec() {
        let def = EntityDefinition::from_json(
            &json!({
                "kind": "vehicle",
                "slug": "mi28-helicopter",
                "typeDefinition": {"id": "attack-helicopter"},
                "record": {
                    "names": [{"value": "Mi-28"}, {"value": "Havoc"}],
                    "identifiers": [{"value": "NATO-HAVOC"}]
                }
            })
            .to_string(),
        )
        .unwrap();
        let spec = def.match_spec();
        assert_eq!(spec.id_fragment.as_deref(), Some("mi28-helicopter"));
        assert_eq!(spec.names, vec!["Mi-28", "Havoc"]);
        assert_eq!(spec.identifiers, vec!["NATO-HAVOC"]);

        let kind = def.kind().unwrap();
        let record = def.build_record(&kind);
        assert_eq!(record.type_key("vehicleType"), Some("attack-helicopter"));
    }

    #[test]
    fn test_definition_inline_kind_and_validation() {
        let def = EntityDefinition::from_json(
            &json!({
                "kind": {
                    "name": "drone",
                    "collection": "drones",
                    "typeCollection": "droneTypes",
                    "typeField": "droneType"
                },
                "slug": "shahed-136",
                "typeDefinition": {"id": "loitering-munition"},
                "record": {"names": [{"value": "Shahed-136"}]}
            })
            .to_string(),
        )
        .unwrap();
        assert_eq!(def.kind().unwrap().collection, "drones");

        let err = EntityDefinition::from_json(
            &json!({
                "kind": "vehicle",
                "slug": "--",
                "typeDefinition": {"id": "x"},
                "record": {"names": [{"value": "X"}]}
            })
            .to_string(),
        )
        .unwrap_err();
        assert!(matches!(err, RegistryError::InvalidDefinition(_)));
    }
}
