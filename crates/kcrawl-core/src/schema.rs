//! Structural schema validation of entity records
//!
//! The master schema is fixed: nine required top-level keys with declared
//! shapes, plus required nested fields on `entity_type` and on every
//! `relations` entry. Validation is read-only and collects every violation
//! instead of stopping at the first one.

use serde::Serialize;
use serde_json::Value;

use crate::record::{
    EntityRecord, ALIASES, ATTRIBUTES, BACKGROUND_CONTEXT, DESCRIPTION, ENTITY_ID, ENTITY_TYPE,
    LABEL, RELATIONS, SOURCE_FILE,
};

// ============================================================================
// Schema definition
// ============================================================================

/// JSON shape declared for a field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    String,
    Array,
    Object,
}

impl FieldKind {
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Array => value.is_array(),
            Self::Object => value.is_object(),
        }
    }
}

impl std::fmt::Display for FieldKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::String => write!(f, "string"),
            Self::Array => write!(f, "array"),
            Self::Object => write!(f, "object"),
        }
    }
}

/// Top-level fields in schema order; all of them are required
pub const RECORD_FIELDS: [(&str, FieldKind); 9] = [
    (ENTITY_ID, FieldKind::String),
    (LABEL, FieldKind::String),
    (ALIASES, FieldKind::Array),
    (SOURCE_FILE, FieldKind::String),
    (DESCRIPTION, FieldKind::String),
    (BACKGROUND_CONTEXT, FieldKind::String),
    (ENTITY_TYPE, FieldKind::Object),
    (ATTRIBUTES, FieldKind::Object),
    (RELATIONS, FieldKind::Array),
];

/// Required string fields of `entity_type`
pub const ENTITY_TYPE_FIELDS: [&str; 2] = ["primary_type", "sub_type"];

/// Required string fields of each `relations` entry
pub const RELATION_FIELDS: [&str; 3] = ["target_entity_id", "target_label", "relationship_type"];

// ============================================================================
// Violations
// ============================================================================

/// A single schema violation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Violation {
    /// The record is not a JSON object at all
    NotAnObject,

    /// A required top-level key is absent
    MissingKey { key: String },

    /// A top-level key has the wrong JSON shape
    WrongType { key: String, expected: FieldKind },

    /// A nested required field is absent, e.g. `entity_type.sub_type`
    MissingField { path: String },

    /// A nested field or array item is not of the declared shape
    WrongFieldType { path: String, expected: FieldKind },

    /// Identity fields differ from the expected ones
    IdentityMismatch {
        key: String,
        expected: String,
        found: String,
    },
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotAnObject => write!(f, "record is not an object"),
            Self::MissingKey { key } => write!(f, "missing required key '{key}'"),
            Self::WrongType { key, expected } => write!(f, "key '{key}' should be {expected}"),
            Self::MissingField { path } => write!(f, "missing required field '{path}'"),
            Self::WrongFieldType { path, expected } => write!(f, "'{path}' should be {expected}"),
            Self::IdentityMismatch {
                key,
                expected,
                found,
            } => write!(f, "'{key}' changed from '{expected}' to '{found}'"),
        }
    }
}

/// Outcome of validating one record
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub violations: Vec<Violation>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }

    /// Merge another report into this one
    pub fn extend(&mut self, other: ValidationReport) {
        self.violations.extend(other.violations);
    }
}

impl std::fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_valid() {
            return write!(f, "valid");
        }
        let parts: Vec<String> = self.violations.iter().map(ToString::to_string).collect();
        write!(f, "{}", parts.join("; "))
    }
}

// ============================================================================
// Validator
// ============================================================================

/// Validator for the fixed master record schema
#[derive(Debug, Clone, Copy, Default)]
pub struct SchemaValidator;

impl SchemaValidator {
    pub fn new() -> Self {
        Self
    }

    /// Validate an assembled record
    pub fn validate(&self, record: &EntityRecord) -> ValidationReport {
        self.validate_value(&Value::Object(record.as_map().clone()))
    }

    /// Validate arbitrary JSON against the record schema
    pub fn validate_value(&self, value: &Value) -> ValidationReport {
        let mut report = ValidationReport::default();

        let Some(map) = value.as_object() else {
            report.violations.push(Violation::NotAnObject);
            return report;
        };

        // (a) required keys
        for (key, _) in RECORD_FIELDS {
            if !map.contains_key(key) {
                report.violations.push(Violation::MissingKey {
                    key: key.to_string(),
                });
            }
        }

        // (b) declared shapes of present keys
        for (key, kind) in RECORD_FIELDS {
            if let Some(v) = map.get(key) {
                if !kind.matches(v) {
                    report.violations.push(Violation::WrongType {
                        key: key.to_string(),
                        expected: kind,
                    });
                }
            }
        }

        // (c) nested required fields
        if let Some(aliases) = map.get(ALIASES).and_then(Value::as_array) {
            for (i, alias) in aliases.iter().enumerate() {
                if !alias.is_string() {
                    report.violations.push(Violation::WrongFieldType {
                        path: format!("{ALIASES}[{i}]"),
                        expected: FieldKind::String,
                    });
                }
            }
        }

        if let Some(entity_type) = map.get(ENTITY_TYPE).and_then(Value::as_object) {
            for field in ENTITY_TYPE_FIELDS {
                check_string_field(&mut report, entity_type, ENTITY_TYPE, field);
            }
        }

        if let Some(relations) = map.get(RELATIONS).and_then(Value::as_array) {
            for (i, entry) in relations.iter().enumerate() {
                let parent = format!("{RELATIONS}[{i}]");
                let Some(entry) = entry.as_object() else {
                    report.violations.push(Violation::WrongFieldType {
                        path: parent,
                        expected: FieldKind::Object,
                    });
                    continue;
                };
                for field in RELATION_FIELDS {
                    check_string_field(&mut report, entry, &parent, field);
                }
            }
        }

        report
    }

    /// Check that `entity_id` and `label` still carry the expected values
    pub fn validate_identity(
        &self,
        value: &Value,
        expected_id: &str,
        expected_label: &str,
    ) -> ValidationReport {
        let mut report = ValidationReport::default();

        for (key, expected) in [(ENTITY_ID, expected_id), (LABEL, expected_label)] {
            if let Some(found) = value.get(key).and_then(Value::as_str) {
                if found != expected {
                    report.violations.push(Violation::IdentityMismatch {
                        key: key.to_string(),
                        expected: expected.to_string(),
                        found: found.to_string(),
                    });
                }
            }
        }

        report
    }
}

fn check_string_field(
    report: &mut ValidationReport,
    object: &serde_json::Map<String, Value>,
    parent: &str,
    field: &str,
) {
    let path = format!("{parent}.{field}");
    match object.get(field) {
        None => report.violations.push(Violation::MissingField { path }),
        Some(v) if !v.is_string() => report.violations.push(Violation::WrongFieldType {
            path,
            expected: FieldKind::String,
        }),
        Some(_) => {}
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn valid_record() -> Value {
        json!({
            "entity_id": "ShuiKuDiaoDu",
            "label": "水库调度",
            "aliases": ["Reservoir operation"],
            "source_file": "entities.xlsx",
            "description": "水库调度是...",
            "background_context": "",
            "entity_type": {"primary_type": "DomainConcept", "sub_type": "EngineeringProcess"},
            "attributes": {"objectives": ["防洪", "发电"]},
            "relations": [
                {"target_entity_id": "YouHuaSuanFa", "target_label": "优化算法", "relationship_type": "uses_method"}
            ]
        })
    }

    #[test]
    fn test_valid_record_passes() {
        let report = SchemaValidator::new().validate_value(&valid_record());
        assert!(report.is_valid(), "{report}");
    }

    #[test]
    fn test_each_missing_key_fails() {
        for (key, _) in RECORD_FIELDS {
            let mut record = valid_record();
            record.as_object_mut().unwrap().remove(key);

            let report = SchemaValidator::new().validate_value(&record);
            assert_eq!(
                report.violations,
                vec![Violation::MissingKey {
                    key: key.to_string()
                }]
            );
        }
    }

    #[test]
    fn test_wrong_top_level_types() {
        let mut record = valid_record();
        record["label"] = json!(42);
        record["relations"] = json!({});
        record["attributes"] = json!([]);

        let report = SchemaValidator::new().validate_value(&record);
        assert_eq!(report.violations.len(), 3);
        assert!(report.violations.contains(&Violation::WrongType {
            key: "label".to_string(),
            expected: FieldKind::String
        }));
    }

    #[test]
    fn test_entity_type_missing_sub_type() {
        let mut record = valid_record();
        record["entity_type"] = json!({"primary_type": "DomainConcept"});

        let report = SchemaValidator::new().validate_value(&record);
        assert_eq!(
            report.violations,
            vec![Violation::MissingField {
                path: "entity_type.sub_type".to_string()
            }]
        );
    }

    #[test]
    fn test_empty_entity_type_from_assembler_fails() {
        let mut record = valid_record();
        record["entity_type"] = json!({});
        let report = SchemaValidator::new().validate_value(&record);
        assert_eq!(report.violations.len(), 2);
    }

    #[test]
    fn test_relation_entries_checked() {
        let mut record = valid_record();
        record["relations"] = json!([
            {"target_entity_id": "A", "target_label": "甲"},
            "not an object",
            {"target_entity_id": "B", "target_label": "乙", "relationship_type": 7}
        ]);

        let report = SchemaValidator::new().validate_value(&record);
        assert_eq!(report.violations.len(), 3);
        assert!(report.violations.contains(&Violation::MissingField {
            path: "relations[0].relationship_type".to_string()
        }));
    }

    #[test]
    fn test_duplicate_relations_allowed() {
        let mut record = valid_record();
        let entry = record["relations"][0].clone();
        record["relations"].as_array_mut().unwrap().push(entry);
        assert!(SchemaValidator::new().validate_value(&record).is_valid());
    }

    #[test]
    fn test_not_an_object() {
        let report = SchemaValidator::new().validate_value(&json!("text"));
        assert_eq!(report.violations, vec![Violation::NotAnObject]);
    }

    #[test]
    fn test_validation_is_read_only() {
        let record = EntityRecord::from_value(valid_record()).unwrap();
        let before = record.clone();
        let _ = SchemaValidator::new().validate(&record);
        assert_eq!(record, before);
    }

    #[test]
    fn test_identity_mismatch() {
        let validator = SchemaValidator::new();
        let record = valid_record();

        assert!(validator
            .validate_identity(&record, "ShuiKuDiaoDu", "水库调度")
            .is_valid());

        let report = validator.validate_identity(&record, "Other", "水库调度");
        assert_eq!(report.violations.len(), 1);
        assert!(report.to_string().contains("entity_id"));
    }
}
