// Provider YAML schema validation.
//
// Works over loosely parsed documents rather than the typed structs so
// every violation in a file is reported, not just the first one serde
// trips over.

use serde_json::Value;
use std::path::{Path, PathBuf};

use crate::CheckReport;

/// Validate provider YAML files against the configuration schema.
/// Unrecognized filenames are counted but not validated.
pub fn check_yaml_schema(files: &[PathBuf]) -> CheckReport {
    let mut diagnostics = Vec::new();
    let mut files_checked = 0usize;

    for path in files {
        if !path.exists() {
            diagnostics.push(format!("{}: file does not exist", path.display()));
            continue;
        }
        files_checked += 1;
        diagnostics.extend(validate_file(path));
    }

    CheckReport {
        ok: diagnostics.is_empty(),
        diagnostics,
        files_checked,
    }
}

fn validate_file(path: &Path) -> Vec<String> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) => return vec![format!("{}: read error: {}", path.display(), err)],
    };

    let data: Value = match serde_yaml::from_str(&content) {
        Ok(data) => data,
        Err(err) => return vec![format!("{}: YAML parsing error: {}", path.display(), err)],
    };

    let Some(data) = data.as_object() else {
        return vec![format!("{}: YAML root must be a mapping", path.display())];
    };

    let filename = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or_default();

    let (expected_dsl_type, primary_section) = match filename {
        "structure_patterns.yaml" => ("provider_structure_patterns", "patterns"),
        "navigation_rules.yaml" => ("provider_navigation_rules", "navigation_rules"),
        "field_mappings.yaml" => ("provider_field_mappings", "field_mappings"),
        "transforms.yaml" => ("provider_transforms", "transforms"),
        _ => return Vec::new(),
    };

    let mut errors = Vec::new();

    for field in ["version", "provider", "dsl_type", primary_section] {
        if !data.contains_key(field) {
            errors.push(format!(
                "{}: missing required top-level field '{}'",
                path.display(),
                field
            ));
        }
    }

    if let Some(version) = data.get("version") {
        let valid = version
            .as_str()
            .map(|v| v.starts_with("1.") || v.starts_with("4."))
            .unwrap_or(false);
        if !valid {
            errors.push(format!(
                "{}: invalid version {}, must be '1.x' or '4.x' format",
                path.display(),
                version
            ));
        }
    }

    if let Some(dsl_type) = data.get("dsl_type")
        && dsl_type.as_str() != Some(expected_dsl_type)
    {
        errors.push(format!(
            "{}: invalid dsl_type {}, expected '{}'",
            path.display(),
            dsl_type,
            expected_dsl_type
        ));
    }

    if let Some(section) = data.get(primary_section) {
        match section.as_object() {
            Some(section_map) => {
                if filename == "structure_patterns.yaml" {
                    errors.extend(validate_patterns(section_map, path));
                }
                if filename == "field_mappings.yaml" {
                    for required in ["inputs", "outputs", "config", "metadata"] {
                        if !section_map.contains_key(required) {
                            errors.push(format!(
                                "{}: missing required schema section '{}'",
                                path.display(),
                                required
                            ));
                        }
                    }
                }
            }
            None => errors.push(format!(
                "{}: '{}' must be a mapping",
                path.display(),
                primary_section
            )),
        }
    }

    errors
}

fn validate_patterns(patterns: &serde_json::Map<String, Value>, path: &Path) -> Vec<String> {
    let mut errors = Vec::new();

    for (pattern_name, pattern) in patterns {
        let Some(pattern) = pattern.as_object() else {
            errors.push(format!(
                "{}: pattern '{}' must be a mapping",
                path.display(),
                pattern_name
            ));
            continue;
        };

        match pattern.get("signature_fields") {
            None => errors.push(format!(
                "{}: pattern '{}' missing required 'signature_fields'",
                path.display(),
                pattern_name
            )),
            Some(Value::Array(fields)) => {
                if fields.len() < 2 {
                    errors.push(format!(
                        "{}: pattern '{}' must have at least 2 signature fields",
                        path.display(),
                        pattern_name
                    ));
                }
            }
            Some(_) => errors.push(format!(
                "{}: pattern '{}' signature_fields must be a list",
                path.display(),
                pattern_name
            )),
        }

        if let Some(confidence) = pattern.get("confidence_weight") {
            let valid = confidence
                .as_f64()
                .map(|c| (0.0..=1.0).contains(&c))
                .unwrap_or(false);
            if !valid {
                errors.push(format!(
                    "{}: pattern '{}' confidence_weight must be a number between 0 and 1",
                    path.display(),
                    pattern_name
                ));
            }
        }

        if let Some(priority) = pattern.get("priority") {
            let valid = priority.as_u64().map(|p| p >= 1).unwrap_or(false);
            if !valid {
                errors.push(format!(
                    "{}: pattern '{}' priority must be a positive integer",
                    path.display(),
                    pattern_name
                ));
            }
        }

        if let Some(optional_fields) = pattern.get("optional_fields")
            && !optional_fields.is_array()
        {
            errors.push(format!(
                "{}: pattern '{}' optional_fields must be a list",
                path.display(),
                pattern_name
            ));
        }
    }

    errors
}
