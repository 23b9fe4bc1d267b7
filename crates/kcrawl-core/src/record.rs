//! Canonical entity record and its assembler
//!
//! Records are kept as JSON objects rather than a fixed struct: stage outputs
//! and the correction pass may hand back arbitrarily shaped data, and the
//! schema validator has to be able to inspect (and reject) such a record
//! instead of failing at deserialization time.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::id::canonicalize;

/// Accumulated stage outputs for one entity (description, entity_type, ...)
pub type StageInfo = Map<String, Value>;

// ============================================================================
// Record keys
// ============================================================================

pub const ENTITY_ID: &str = "entity_id";
pub const LABEL: &str = "label";
pub const ALIASES: &str = "aliases";
pub const SOURCE_FILE: &str = "source_file";
pub const DESCRIPTION: &str = "description";
pub const BACKGROUND_CONTEXT: &str = "background_context";
pub const ENTITY_TYPE: &str = "entity_type";
pub const ATTRIBUTES: &str = "attributes";
pub const RELATIONS: &str = "relations";

// ============================================================================
// Typed views
// ============================================================================

/// Two-level entity classification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityType {
    pub primary_type: String,
    pub sub_type: String,
}

/// Directed relation from the record's entity to a roster entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relation {
    pub target_entity_id: String,
    pub target_label: String,
    pub relationship_type: String,
}

impl Relation {
    pub fn new(
        target_entity_id: impl Into<String>,
        target_label: impl Into<String>,
        relationship_type: impl Into<String>,
    ) -> Self {
        Self {
            target_entity_id: target_entity_id.into(),
            target_label: target_label.into(),
            relationship_type: relationship_type.into(),
        }
    }
}

// ============================================================================
// Entity record
// ============================================================================

/// One knowledge-graph entity record, serialized as a JSON object
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityRecord(Map<String, Value>);

impl EntityRecord {
    /// Wrap a JSON value; returns `None` unless it is an object
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            _ => None,
        }
    }

    pub fn entity_id(&self) -> Option<&str> {
        self.0.get(ENTITY_ID).and_then(Value::as_str)
    }

    pub fn label(&self) -> Option<&str> {
        self.0.get(LABEL).and_then(Value::as_str)
    }

    pub fn description(&self) -> Option<&str> {
        self.0.get(DESCRIPTION).and_then(Value::as_str)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Typed entity type, if present and well formed
    pub fn entity_type(&self) -> Option<EntityType> {
        self.0
            .get(ENTITY_TYPE)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Typed relation entries; malformed entries are skipped
    pub fn relations(&self) -> Vec<Relation> {
        self.0
            .get(RELATIONS)
            .and_then(Value::as_array)
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|e| serde_json::from_value(e.clone()).ok())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    /// Pretty JSON with 4-space indentation, non-ASCII kept verbatim
    pub fn to_pretty_json(&self) -> serde_json::Result<String> {
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
        self.serialize(&mut ser)?;
        // serde_json only emits valid UTF-8
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }
}

/// Merge stage outputs into one record with every required key present.
///
/// Missing optional data falls back to defaults: `aliases` to `[]`,
/// `description` and `background_context` to `""`, `entity_type` and
/// `attributes` to `{}`. The function never fails, so a deliberately
/// incomplete record still reaches the schema validator.
pub fn assemble(label: &str, source_file: &str, info: &StageInfo, relations: Vec<Value>) -> EntityRecord {
    let field = |key: &str, default: Value| info.get(key).cloned().unwrap_or(default);

    let mut map = Map::new();
    map.insert(ENTITY_ID.to_string(), Value::String(canonicalize(label)));
    map.insert(LABEL.to_string(), Value::String(label.to_string()));
    map.insert(ALIASES.to_string(), field(ALIASES, Value::Array(Vec::new())));
    map.insert(SOURCE_FILE.to_string(), Value::String(source_file.to_string()));
    map.insert(DESCRIPTION.to_string(), field(DESCRIPTION, Value::String(String::new())));
    map.insert(
        BACKGROUND_CONTEXT.to_string(),
        field(BACKGROUND_CONTEXT, Value::String(String::new())),
    );
    map.insert(ENTITY_TYPE.to_string(), field(ENTITY_TYPE, Value::Object(Map::new())));
    map.insert(ATTRIBUTES.to_string(), field(ATTRIBUTES, Value::Object(Map::new())));
    map.insert(RELATIONS.to_string(), Value::Array(relations));

    EntityRecord(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn info_from(value: Value) -> StageInfo {
        match value {
            Value::Object(map) => map,
            _ => panic!("test info must be an object"),
        }
    }

    #[test]
    fn test_assemble_fills_defaults() {
        let record = assemble("重力坝", "entities.xlsx", &StageInfo::new(), Vec::new());

        assert_eq!(record.entity_id(), Some("ZhongLiBa"));
        assert_eq!(record.label(), Some("重力坝"));
        assert_eq!(record.get(ALIASES), Some(&json!([])));
        assert_eq!(record.get(SOURCE_FILE), Some(&json!("entities.xlsx")));
        assert_eq!(record.get(DESCRIPTION), Some(&json!("")));
        assert_eq!(record.get(BACKGROUND_CONTEXT), Some(&json!("")));
        assert_eq!(record.get(ENTITY_TYPE), Some(&json!({})));
        assert_eq!(record.get(ATTRIBUTES), Some(&json!({})));
        assert_eq!(record.get(RELATIONS), Some(&json!([])));
        assert_eq!(record.as_map().len(), 9);
    }

    #[test]
    fn test_assemble_uses_stage_outputs() {
        let info = info_from(json!({
            "aliases": ["Gravity dam"],
            "description": "依靠自重维持稳定的坝",
            "background_context": "常见于大型水利枢纽",
            "entity_type": {"primary_type": "DomainConcept", "sub_type": "PhysicalObject"},
            "attributes": {"materials": ["混凝土"]},
        }));
        let relations = vec![json!({
            "target_entity_id": "DaDuHe",
            "target_label": "大渡河",
            "relationship_type": "located_on",
        })];

        let record = assemble("重力坝", "entities.xlsx", &info, relations);

        assert_eq!(record.description(), Some("依靠自重维持稳定的坝"));
        assert_eq!(
            record.entity_type(),
            Some(EntityType {
                primary_type: "DomainConcept".to_string(),
                sub_type: "PhysicalObject".to_string(),
            })
        );
        assert_eq!(record.relations(), vec![Relation::new("DaDuHe", "大渡河", "located_on")]);
        assert_eq!(record.get(ALIASES), Some(&json!(["Gravity dam"])));
    }

    #[test]
    fn test_entity_id_ignores_stage_outputs() {
        let info = info_from(json!({"entity_id": "Overridden", "description": "x"}));
        let record = assemble("重力坝", "a.xlsx", &info, Vec::new());
        assert_eq!(record.entity_id(), Some("ZhongLiBa"));
    }

    #[test]
    fn test_from_value_requires_object() {
        assert!(EntityRecord::from_value(json!([1, 2])).is_none());
        assert!(EntityRecord::from_value(json!({"label": "x"})).is_some());
    }

    #[test]
    fn test_pretty_json_keeps_unicode() {
        let record = assemble("水库调度", "entities.xlsx", &StageInfo::new(), Vec::new());
        let text = record.to_pretty_json().unwrap();
        assert!(text.contains("\"label\": \"水库调度\""));
        assert!(text.contains("\n    \"entity_id\""));
    }

    #[test]
    fn test_keys_written_in_schema_order() {
        let info = info_from(json!({"attributes": {"objectives": []}, "description": "x"}));
        let record = assemble("水库调度", "entities.xlsx", &info, Vec::new());

        let keys: Vec<&str> = record.as_map().keys().map(String::as_str).collect();
        assert_eq!(
            keys,
            vec![
                ENTITY_ID,
                LABEL,
                ALIASES,
                SOURCE_FILE,
                DESCRIPTION,
                BACKGROUND_CONTEXT,
                ENTITY_TYPE,
                ATTRIBUTES,
                RELATIONS
            ]
        );

        let text = record.to_pretty_json().unwrap();
        let entity_id_at = text.find("\"entity_id\"").unwrap();
        let aliases_at = text.find("\"aliases\"").unwrap();
        assert!(entity_id_at < aliases_at);
    }
}
