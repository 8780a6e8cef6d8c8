use assert_cmd::Command;
use predicates::prelude::*;
use spanmap_testing::ConfigTreeBuilder;
use std::path::Path;
use tempfile::TempDir;

fn spanmap() -> Command {
    Command::cargo_bin("spanmap").expect("binary builds")
}

fn fixture_tree(dir: &TempDir) -> ConfigTreeBuilder {
    ConfigTreeBuilder::new(dir.path().join("config"))
        .with_shared_defaults()
        .add_openai_provider()
}

#[test]
fn test_compile_success_summary_on_stdout() {
    let dir = TempDir::new().unwrap();
    let tree = fixture_tree(&dir);
    let output = dir.path().join("out");

    spanmap()
        .arg("compile")
        .arg("--source-dir")
        .arg(tree.root())
        .arg("--output-dir")
        .arg(&output)
        .assert()
        .success()
        .stdout(predicate::str::contains("Providers: 1"))
        .stdout(predicate::str::contains("Patterns: 2"))
        .stdout(predicate::str::contains("Compilation time:"));

    assert!(output.join("compiled_providers.json").exists());
    assert!(output.join("bundle_metadata.json").exists());
}

#[test]
fn test_compile_missing_source_dir_exits_one() {
    let dir = TempDir::new().unwrap();

    spanmap()
        .arg("compile")
        .arg("--source-dir")
        .arg(dir.path().join("nope"))
        .arg("--output-dir")
        .arg(dir.path().join("out"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn test_compile_single_provider_filter() {
    let dir = TempDir::new().unwrap();
    let tree = fixture_tree(&dir);

    spanmap()
        .arg("compile")
        .arg("--source-dir")
        .arg(tree.root())
        .arg("--output-dir")
        .arg(dir.path().join("out"))
        .arg("--provider")
        .arg("openai")
        .assert()
        .success()
        .stdout(predicate::str::contains("Providers: 1"));

    spanmap()
        .arg("compile")
        .arg("--source-dir")
        .arg(tree.root())
        .arg("--output-dir")
        .arg(dir.path().join("out2"))
        .arg("--provider")
        .arg("mistral")
        .assert()
        .failure();
}

#[test]
fn test_informational_flags_do_not_change_output() {
    let dir = TempDir::new().unwrap();
    let tree = fixture_tree(&dir);

    spanmap()
        .arg("compile")
        .arg("--source-dir")
        .arg(tree.root())
        .arg("--output-dir")
        .arg(dir.path().join("plain"))
        .assert()
        .success();
    spanmap()
        .arg("compile")
        .arg("--source-dir")
        .arg(tree.root())
        .arg("--output-dir")
        .arg(dir.path().join("flagged"))
        .arg("--production")
        .arg("--optimize-size")
        .assert()
        .success();

    let read = |path: &Path| -> serde_json::Value {
        serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
    };
    let mut plain = read(&dir.path().join("plain/compiled_providers.json"));
    let mut flagged = read(&dir.path().join("flagged/compiled_providers.json"));
    // Timestamps may differ; everything else must be identical.
    plain["build_metadata"]["build_timestamp"] = 0.into();
    flagged["build_metadata"]["build_timestamp"] = 0.into();
    assert_eq!(plain, flagged);
}

#[test]
fn test_validate_yaml_failure_exits_one() {
    let dir = TempDir::new().unwrap();
    let bad = dir.path().join("structure_patterns.yaml");
    std::fs::write(
        &bad,
        r#"version: "4.0"
provider: openai
dsl_type: provider_structure_patterns
patterns:
  traceloop_openai:
    signature_fields:
      - only.one.field
"#,
    )
    .unwrap();

    spanmap()
        .arg("validate")
        .arg("yaml")
        .arg(&bad)
        .assert()
        .failure()
        .stderr(predicate::str::contains("at least 2 signature fields"));
}

#[test]
fn test_validate_yaml_success() {
    let dir = TempDir::new().unwrap();
    let tree = fixture_tree(&dir);

    spanmap()
        .arg("validate")
        .arg("yaml")
        .arg(tree.provider_dir("openai").join("structure_patterns.yaml"))
        .assert()
        .success()
        .stdout(predicate::str::contains("YAML schema check passed"));
}

#[test]
fn test_validate_collisions_detects_shared_signature() {
    let dir = TempDir::new().unwrap();
    let tree = ConfigTreeBuilder::new(dir.path().join("config"))
        .with_shared_defaults()
        .add_minimal_provider(
            "openai",
            "traceloop_openai",
            &["gen_ai.request.model", "gen_ai.system"],
            0.9,
        )
        .add_minimal_provider(
            "anthropic",
            "traceloop_anthropic",
            &["gen_ai.request.model", "gen_ai.system"],
            0.95,
        );

    spanmap()
        .arg("validate")
        .arg("collisions")
        .arg(tree.provider_dir("openai").join("structure_patterns.yaml"))
        .arg(tree.provider_dir("anthropic").join("structure_patterns.yaml"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("signature collision"));
}

#[test]
fn test_process_command_emits_normalized_event() {
    let dir = TempDir::new().unwrap();
    let tree = fixture_tree(&dir);
    let output = dir.path().join("out");

    spanmap()
        .arg("compile")
        .arg("--source-dir")
        .arg(tree.root())
        .arg("--output-dir")
        .arg(&output)
        .assert()
        .success();

    let input = dir.path().join("span.json");
    std::fs::write(
        &input,
        r#"{
  "gen_ai.request.model": "gpt-4",
  "gen_ai.system": "openai",
  "gen_ai.usage.completion_tokens": 50,
  "gen_ai.usage.prompt_tokens": 100
}"#,
    )
    .unwrap();

    spanmap()
        .arg("process")
        .arg("--bundle")
        .arg(output.join("compiled_providers.json"))
        .arg(&input)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"provider\": \"openai\""))
        .stdout(predicate::str::contains("\"detection_method\": \"signature_based\""));

    spanmap()
        .arg("process")
        .arg("--bundle")
        .arg(output.join("compiled_providers.json"))
        .arg("--detect-only")
        .arg(&input)
        .assert()
        .success()
        .stdout(predicate::str::contains("instrumentor: traceloop"))
        .stdout(predicate::str::contains("provider: openai"));
}

#[test]
fn test_bundle_info_prints_metadata() {
    let dir = TempDir::new().unwrap();
    let tree = fixture_tree(&dir);
    let output = dir.path().join("out");

    spanmap()
        .arg("compile")
        .arg("--source-dir")
        .arg(tree.root())
        .arg("--output-dir")
        .arg(&output)
        .assert()
        .success();

    spanmap()
        .arg("bundle-info")
        .arg("--bundle")
        .arg(output.join("compiled_providers.json"))
        .assert()
        .success()
        .stdout(predicate::str::contains("Providers: 1"))
        .stdout(predicate::str::contains("Supported providers: openai"));

    spanmap()
        .arg("bundle-info")
        .arg("--bundle")
        .arg(dir.path().join("missing.json"))
        .assert()
        .failure();
}

#[test]
fn test_validate_bundle_roundtrip() {
    let dir = TempDir::new().unwrap();
    let tree = fixture_tree(&dir);
    let output = dir.path().join("out");

    spanmap()
        .arg("compile")
        .arg("--source-dir")
        .arg(tree.root())
        .arg("--output-dir")
        .arg(&output)
        .assert()
        .success();

    spanmap()
        .arg("validate")
        .arg("bundle")
        .arg("--bundle")
        .arg(output.join("compiled_providers.json"))
        .assert()
        .success()
        .stdout(predicate::str::contains("Bundle integrity check passed"));

    spanmap()
        .arg("validate")
        .arg("bundle")
        .arg("--bundle")
        .arg(dir.path().join("missing.json"))
        .assert()
        .failure();
}
