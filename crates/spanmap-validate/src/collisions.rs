// Signature collision detection across providers.
//
// A signature shared by two providers is resolved at compile time by
// confidence, which can silently shadow a provider. This check surfaces
// every such collision with its resolution.

use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use spanmap_types::Signature;

use crate::CheckReport;

/// Confidence gap below which a collision resolution is considered too
/// close to be a deliberate disambiguation.
const NARROW_GAP: f64 = 0.05;

/// Check for pattern signatures shared by two or more providers. Only
/// `structure_patterns.yaml` files are considered; `files_checked` counts
/// them.
pub fn check_signature_collisions(files: &[PathBuf]) -> CheckReport {
    let structure_files: Vec<&PathBuf> = files
        .iter()
        .filter(|path| {
            path.file_name().and_then(|name| name.to_str()) == Some("structure_patterns.yaml")
        })
        .collect();

    let mut signature_map: BTreeMap<Signature, Vec<(String, f64)>> = BTreeMap::new();
    let mut diagnostics = Vec::new();

    for path in &structure_files {
        for (signature, pattern_id, confidence) in extract_signatures(path, &mut diagnostics) {
            signature_map
                .entry(signature)
                .or_default()
                .push((pattern_id, confidence));
        }
    }

    for (signature, mut patterns) in signature_map {
        if patterns.len() < 2 {
            continue;
        }

        let providers_count = patterns
            .iter()
            .filter_map(|(pattern_id, _)| pattern_id.split(':').next())
            .collect::<std::collections::BTreeSet<&str>>()
            .len();
        if providers_count < 2 {
            continue;
        }

        patterns.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });

        diagnostics.push(format!(
            "signature collision: {:?} used by {} patterns across {} providers",
            signature.iter().collect::<Vec<_>>(),
            patterns.len(),
            providers_count
        ));
        for (pattern_id, confidence) in &patterns {
            diagnostics.push(format!("  - {} (confidence: {})", pattern_id, confidence));
        }

        let (winner, winner_confidence) = &patterns[0];
        let winner_provider = winner.split(':').next().unwrap_or(winner);
        diagnostics.push(format!(
            "  resolution: inverted index keeps '{}' (highest confidence: {})",
            winner_provider, winner_confidence
        ));

        let (_, runner_up_confidence) = &patterns[1];
        let gap = winner_confidence - runner_up_confidence;
        if gap < NARROW_GAP {
            diagnostics.push(format!(
                "  warning: confidence difference is very small ({:.3}); increase it beyond {} for clear disambiguation",
                gap, NARROW_GAP
            ));
        }
    }

    CheckReport {
        ok: diagnostics.is_empty(),
        diagnostics,
        files_checked: structure_files.len(),
    }
}

/// Signatures from one structure_patterns file as
/// `(signature, "provider:pattern", confidence)`.
fn extract_signatures(
    path: &Path,
    diagnostics: &mut Vec<String>,
) -> Vec<(Signature, String, f64)> {
    let mut signatures = Vec::new();

    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) => {
            diagnostics.push(format!("{}: read error: {}", path.display(), err));
            return signatures;
        }
    };

    let data: Value = match serde_yaml::from_str(&content) {
        Ok(data) => data,
        Err(err) => {
            diagnostics.push(format!("{}: YAML parsing error: {}", path.display(), err));
            return signatures;
        }
    };

    let provider = data
        .get("provider")
        .and_then(Value::as_str)
        .map(str::to_string)
        .or_else(|| {
            path.parent()
                .and_then(Path::file_name)
                .and_then(|name| name.to_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| "unknown".to_string());

    let Some(patterns) = data.get("patterns").and_then(Value::as_object) else {
        return signatures;
    };

    for (pattern_name, pattern) in patterns {
        let Some(fields) = pattern.get("signature_fields").and_then(Value::as_array) else {
            continue;
        };
        let signature = Signature::new(fields.iter().filter_map(Value::as_str));
        let confidence = pattern
            .get("confidence_weight")
            .and_then(Value::as_f64)
            .unwrap_or(0.9);
        signatures.push((signature, format!("{}:{}", provider, pattern_name), confidence));
    }

    signatures
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_patterns(dir: &Path, provider: &str, pattern: &str, confidence: f64) -> PathBuf {
        let provider_dir = dir.join(provider);
        fs::create_dir_all(&provider_dir).unwrap();
        let path = provider_dir.join("structure_patterns.yaml");
        fs::write(
            &path,
            format!(
                r#"
version: "4.0"
provider: {provider}
dsl_type: provider_structure_patterns
patterns:
  {pattern}:
    signature_fields:
      - gen_ai.request.model
      - gen_ai.system
    confidence_weight: {confidence}
"#
            ),
        )
        .unwrap();
        path
    }

    #[test]
    fn test_cross_provider_collision_reported_with_winner() {
        let dir = TempDir::new().unwrap();
        let a = write_patterns(dir.path(), "openai", "traceloop_openai", 0.9);
        let b = write_patterns(dir.path(), "anthropic", "traceloop_anthropic", 0.95);

        let report = check_signature_collisions(&[a, b]);
        assert!(!report.ok);
        assert_eq!(report.files_checked, 2);
        assert!(
            report
                .diagnostics
                .iter()
                .any(|d| d.contains("keeps 'anthropic'"))
        );
    }

    #[test]
    fn test_narrow_confidence_gap_warns() {
        let dir = TempDir::new().unwrap();
        let a = write_patterns(dir.path(), "openai", "traceloop_openai", 0.90);
        let b = write_patterns(dir.path(), "anthropic", "traceloop_anthropic", 0.92);

        let report = check_signature_collisions(&[a, b]);
        assert!(!report.ok);
        assert!(
            report
                .diagnostics
                .iter()
                .any(|d| d.contains("confidence difference is very small"))
        );
    }

    #[test]
    fn test_no_collision_passes() {
        let dir = TempDir::new().unwrap();
        let a = write_patterns(dir.path(), "openai", "traceloop_openai", 0.9);
        let path = dir.path().join("anthropic");
        fs::create_dir_all(&path).unwrap();
        let b = path.join("structure_patterns.yaml");
        fs::write(
            &b,
            r#"
version: "4.0"
provider: anthropic
dsl_type: provider_structure_patterns
patterns:
  traceloop_anthropic:
    signature_fields:
      - gen_ai.request.model
      - gen_ai.usage.input_tokens
    confidence_weight: 0.9
"#,
        )
        .unwrap();

        let report = check_signature_collisions(&[a, b]);
        assert!(report.ok, "diagnostics: {:?}", report.diagnostics);
    }

    #[test]
    fn test_same_provider_duplicate_is_not_a_collision() {
        // Two patterns within one provider sharing a signature resolve
        // internally; only cross-provider sharing is reported.
        let dir = TempDir::new().unwrap();
        let provider_dir = dir.path().join("openai");
        fs::create_dir_all(&provider_dir).unwrap();
        let path = provider_dir.join("structure_patterns.yaml");
        fs::write(
            &path,
            r#"
version: "4.0"
provider: openai
dsl_type: provider_structure_patterns
patterns:
  traceloop_openai:
    signature_fields: [gen_ai.request.model, gen_ai.system]
    confidence_weight: 0.9
  openlit_openai:
    signature_fields: [gen_ai.system, gen_ai.request.model]
    confidence_weight: 0.8
"#,
        )
        .unwrap();

        let report = check_signature_collisions(&[path]);
        assert!(report.ok, "diagnostics: {:?}", report.diagnostics);
    }

    #[test]
    fn test_non_structure_files_ignored() {
        let report = check_signature_collisions(&[PathBuf::from("navigation_rules.yaml")]);
        assert!(report.ok);
        assert_eq!(report.files_checked, 0);
    }
}
