// Validation-suite checks against real compiled artifacts.

use serde_json::{Value, json};
use std::fs;
use std::path::PathBuf;

use spanmap_compiler::{BUNDLE_FILE, Compiler};
use spanmap_testing::ConfigTreeBuilder;
use spanmap_validate::{check_bundle, check_performance, check_yaml_schema};
use tempfile::TempDir;

fn compile_fixture(dir: &TempDir) -> PathBuf {
    let tree = ConfigTreeBuilder::new(dir.path().join("config"))
        .with_shared_defaults()
        .add_openai_provider();
    let output = dir.path().join("out");
    Compiler::new(tree.root(), &output).compile(None).unwrap();
    output.join(BUNDLE_FILE)
}

#[test]
fn test_compiled_bundle_passes_integrity_check() {
    let dir = TempDir::new().unwrap();
    let bundle_path = compile_fixture(&dir);

    let report = check_bundle(&bundle_path);
    assert!(report.ok, "diagnostics: {:?}", report.diagnostics);
    assert_eq!(report.files_checked, 1);
}

#[test]
fn test_integrity_check_flags_missing_components() {
    let dir = TempDir::new().unwrap();
    let bundle_path = compile_fixture(&dir);

    let mut raw: Value = serde_json::from_str(&fs::read_to_string(&bundle_path).unwrap()).unwrap();
    raw["field_mappings"] = json!({});
    let broken = dir.path().join("broken.json");
    fs::write(&broken, serde_json::to_vec(&raw).unwrap()).unwrap();

    let report = check_bundle(&broken);
    assert!(!report.ok);
    assert!(
        report
            .diagnostics
            .iter()
            .any(|d| d.contains("no field mappings"))
    );
}

#[test]
fn test_integrity_check_flags_bad_confidence() {
    let dir = TempDir::new().unwrap();
    let bundle_path = compile_fixture(&dir);

    let mut raw: Value = serde_json::from_str(&fs::read_to_string(&bundle_path).unwrap()).unwrap();
    raw["signature_to_provider"][0]["confidence"] = json!(1.5);
    let broken = dir.path().join("broken.json");
    fs::write(&broken, serde_json::to_vec(&raw).unwrap()).unwrap();

    let report = check_bundle(&broken);
    assert!(!report.ok);
    assert!(
        report
            .diagnostics
            .iter()
            .any(|d| d.contains("invalid confidence"))
    );
}

#[test]
fn test_integrity_check_flags_unknown_pattern_provider() {
    let dir = TempDir::new().unwrap();
    let bundle_path = compile_fixture(&dir);

    let mut raw: Value = serde_json::from_str(&fs::read_to_string(&bundle_path).unwrap()).unwrap();
    raw["signature_to_provider"][0]["pattern"] = json!("traceloop_mistral");
    let broken = dir.path().join("broken.json");
    fs::write(&broken, serde_json::to_vec(&raw).unwrap()).unwrap();

    let report = check_bundle(&broken);
    assert!(!report.ok);
    assert!(
        report
            .diagnostics
            .iter()
            .any(|d| d.contains("unknown provider 'mistral'"))
    );
}

#[test]
fn test_integrity_check_missing_file() {
    let report = check_bundle(&PathBuf::from("/nonexistent/compiled_providers.json"));
    assert!(!report.ok);
    assert_eq!(report.files_checked, 0);
}

#[test]
fn test_performance_check_runs_all_four_benchmarks() {
    let dir = TempDir::new().unwrap();
    let bundle_path = compile_fixture(&dir);

    // Timing outcomes vary by machine; assert structure, not verdicts.
    let report = check_performance(&bundle_path);
    assert_eq!(report.files_checked, 1);
    assert_eq!(report.diagnostics.len(), 4);
    assert!(report.diagnostics[0].starts_with("bundle load:"));
    assert!(report.diagnostics[1].starts_with("exact-match detection:"));
    assert!(report.diagnostics[2].starts_with("subset-match detection:"));
    assert!(report.diagnostics[3].starts_with("cached metadata access:"));
}

#[test]
fn test_performance_check_missing_bundle_fails() {
    let report = check_performance(&PathBuf::from("/nonexistent/bundle.json"));
    assert!(!report.ok);
    assert_eq!(report.files_checked, 0);
}

#[test]
fn test_yaml_schema_over_real_provider_tree() {
    let dir = TempDir::new().unwrap();
    let tree = ConfigTreeBuilder::new(dir.path().join("config"))
        .with_shared_defaults()
        .add_openai_provider();

    let provider_dir = tree.provider_dir("openai");
    let files: Vec<PathBuf> = [
        "structure_patterns.yaml",
        "navigation_rules.yaml",
        "field_mappings.yaml",
        "transforms.yaml",
    ]
    .iter()
    .map(|name| provider_dir.join(name))
    .collect();

    let report = check_yaml_schema(&files);
    assert!(report.ok, "diagnostics: {:?}", report.diagnostics);
    assert_eq!(report.files_checked, 4);
}
