// Source-form provider configuration documents.
//
// These structs mirror the four YAML files authored per provider plus the
// shared configuration. The compiler deserializes them with serde_yaml and
// enforces the cross-field invariants separately (see spanmap-compiler).

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::event::Section;

/// `structure_patterns.yaml` - signature patterns used for detection.
#[derive(Debug, Clone, Deserialize)]
pub struct StructurePatternsDoc {
    pub version: String,
    pub provider: String,
    pub dsl_type: String,
    #[serde(default)]
    pub patterns: BTreeMap<String, StructurePattern>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StructurePattern {
    pub signature_fields: Vec<String>,
    #[serde(default = "default_confidence")]
    pub confidence_weight: f64,
    #[serde(default)]
    pub optional_fields: Vec<String>,
    #[serde(default)]
    pub priority: Option<u32>,
}

fn default_confidence() -> f64 {
    0.9
}

/// `navigation_rules.yaml` - declarative pointers into the raw attribute map.
#[derive(Debug, Clone, Deserialize)]
pub struct NavigationRulesDoc {
    pub version: String,
    pub provider: String,
    pub dsl_type: String,
    #[serde(default)]
    pub navigation_rules: BTreeMap<String, NavigationRule>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NavigationRule {
    pub source_field: String,
    #[serde(default)]
    pub extraction_method: ExtractionMethod,
    #[serde(default)]
    pub fallback_value: Value,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMethod {
    #[default]
    DirectCopy,
    ArrayFlatten,
    ObjectMerge,
}

/// `field_mappings.yaml` - target fields per event section.
#[derive(Debug, Clone, Deserialize)]
pub struct FieldMappingsDoc {
    pub version: String,
    pub provider: String,
    pub dsl_type: String,
    #[serde(default)]
    pub field_mappings: FieldMappingSections,
}

/// The four mapping sections. Each is optional in the serialized form so
/// that validation can distinguish an absent section from an empty one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldMappingSections {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inputs: Option<BTreeMap<String, FieldMapping>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outputs: Option<BTreeMap<String, FieldMapping>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<BTreeMap<String, FieldMapping>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<BTreeMap<String, FieldMapping>>,
}

impl FieldMappingSections {
    pub fn section(&self, section: Section) -> Option<&BTreeMap<String, FieldMapping>> {
        match section {
            Section::Inputs => self.inputs.as_ref(),
            Section::Outputs => self.outputs.as_ref(),
            Section::Config => self.config.as_ref(),
            Section::Metadata => self.metadata.as_ref(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldMapping {
    pub source_rule: String,
}

/// `transforms.yaml` - named generic transform invocations.
#[derive(Debug, Clone, Deserialize)]
pub struct TransformsDoc {
    pub version: String,
    pub provider: String,
    pub dsl_type: String,
    #[serde(default)]
    pub transforms: BTreeMap<String, TransformSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformSpec {
    pub implementation: String,
    #[serde(default)]
    pub parameters: BTreeMap<String, Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_navigation_rule_defaults() {
        let rule: NavigationRule = serde_json::from_str(r#"{"source_field": "llm.model"}"#).unwrap();
        assert_eq!(rule.extraction_method, ExtractionMethod::DirectCopy);
        assert_eq!(rule.fallback_value, Value::Null);
    }

    #[test]
    fn test_extraction_method_names() {
        let method: ExtractionMethod = serde_json::from_str(r#""array_flatten""#).unwrap();
        assert_eq!(method, ExtractionMethod::ArrayFlatten);
        let method: ExtractionMethod = serde_json::from_str(r#""object_merge""#).unwrap();
        assert_eq!(method, ExtractionMethod::ObjectMerge);
    }

    #[test]
    fn test_missing_section_is_distinguishable_from_empty() {
        let sections: FieldMappingSections =
            serde_json::from_str(r#"{"inputs": {}, "outputs": {}, "config": {}}"#).unwrap();
        assert!(sections.inputs.is_some());
        assert!(sections.section(Section::Metadata).is_none());
    }

    #[test]
    fn test_pattern_confidence_default() {
        let pattern: StructurePattern =
            serde_json::from_str(r#"{"signature_fields": ["a", "b"]}"#).unwrap();
        assert_eq!(pattern.confidence_weight, 0.9);
        assert!(pattern.optional_fields.is_empty());
        assert!(pattern.priority.is_none());
    }
}
