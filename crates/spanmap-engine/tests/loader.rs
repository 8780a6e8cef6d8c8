// Bundle loader behavior: caching, lazy plan materialization, legacy
// index rebuild, and corruption handling.

use serde_json::{Value, json};
use std::fs;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use spanmap_compiler::{BUNDLE_FILE, Compiler};
use spanmap_engine::{BundleLoader, Error, LoaderOptions, Processor};
use spanmap_testing::{ConfigTreeBuilder, attrs};
use spanmap_types::{CompiledBundle, Signature};
use tempfile::TempDir;

fn compiled_bundle_path(dir: &TempDir) -> std::path::PathBuf {
    let tree = ConfigTreeBuilder::new(dir.path().join("config"))
        .with_shared_defaults()
        .add_openai_provider();
    let output = dir.path().join("out");
    Compiler::new(tree.root(), &output).compile(None).unwrap();
    output.join(BUNDLE_FILE)
}

#[test]
fn test_load_caches_bundle_instance() {
    let dir = TempDir::new().unwrap();
    let loader = BundleLoader::new(compiled_bundle_path(&dir));

    let first = loader.load().unwrap();
    let second = loader.load().unwrap();
    assert!(Arc::ptr_eq(&first, &second));
}

#[test]
fn test_metadata_served_without_file_after_first_load() {
    let dir = TempDir::new().unwrap();
    let bundle_path = compiled_bundle_path(&dir);
    let loader = BundleLoader::new(&bundle_path);

    loader.load().unwrap();
    fs::remove_file(&bundle_path).unwrap();

    // No file I/O after the first load: metadata still answers.
    let metadata = loader.metadata().expect("metadata from cache");
    assert_eq!(metadata.providers_count, 1);
}

#[test]
fn test_extraction_program_materialized_once() {
    let dir = TempDir::new().unwrap();
    let loader = BundleLoader::new(compiled_bundle_path(&dir));

    let first = loader.get_extraction_program("openai").unwrap();
    let second = loader.get_extraction_program("openai").unwrap();
    assert!(Arc::ptr_eq(&first, &second));

    assert!(loader.get_extraction_program("nonexistent").is_none());
}

#[test]
fn test_missing_bundle_is_bundle_not_found() {
    let dir = TempDir::new().unwrap();
    let loader = BundleLoader::new(dir.path().join("absent.json"));
    match loader.load() {
        Err(Error::BundleNotFound(path)) => {
            assert!(path.to_string_lossy().contains("absent.json"));
        }
        other => panic!("expected BundleNotFound, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_recompile_hook_runs_once_when_bundle_absent() {
    let dir = TempDir::new().unwrap();
    let tree = ConfigTreeBuilder::new(dir.path().join("config"))
        .with_shared_defaults()
        .add_openai_provider();
    let source_root = tree.root().to_path_buf();
    let output = dir.path().join("out");
    let bundle_path = output.join(BUNDLE_FILE);

    let calls = Arc::new(AtomicUsize::new(0));
    let hook_calls = Arc::clone(&calls);
    let options = LoaderOptions {
        recompile_hook: Some(Box::new(move |_bundle_path: &std::path::Path| {
            hook_calls.fetch_add(1, Ordering::SeqCst);
            spanmap_compiler::compile_source_dir(&source_root, &output)
                .map(|_| ())
                .map_err(|err| err.to_string())
        })),
    };

    let loader = BundleLoader::with_options(&bundle_path, options);
    let bundle = loader.load().expect("hook produced the bundle");
    assert_eq!(bundle.bundle.provider_count(), 1);
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // Cached afterwards; the hook does not fire again.
    loader.load().unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_legacy_bundle_without_inverted_index_is_rebuilt() {
    let dir = TempDir::new().unwrap();
    let bundle_path = compiled_bundle_path(&dir);

    // Strip the inverted index to simulate a legacy artifact.
    let mut bundle: CompiledBundle =
        serde_json::from_str(&fs::read_to_string(&bundle_path).unwrap()).unwrap();
    bundle.signature_to_provider.clear();
    let legacy_path = dir.path().join("legacy.json");
    fs::write(&legacy_path, serde_json::to_vec(&bundle).unwrap()).unwrap();

    let loader = BundleLoader::new(&legacy_path);
    let runtime = loader.load().unwrap();

    // Rebuilt entries carry the fixed legacy confidence and map to the
    // provider name directly.
    let signature = Signature::new([
        "gen_ai.request.model",
        "gen_ai.system",
        "gen_ai.usage.completion_tokens",
        "gen_ai.usage.prompt_tokens",
    ]);
    let (pattern, confidence) = runtime.lookup_signature(&signature).unwrap();
    assert_eq!(pattern, "openai");
    assert_eq!(confidence, 0.9);

    // Detection still works through the rebuilt index.
    let processor = Processor::new(Arc::new(BundleLoader::new(&legacy_path)));
    let (_, provider) = processor.detect(&attrs::traceloop_openai_exact());
    assert_eq!(provider, "openai");
}

#[test]
fn test_corrupt_bundle_rejected() {
    let dir = TempDir::new().unwrap();
    let bundle_path = compiled_bundle_path(&dir);

    // Drop the extraction plans: integrity requires one per provider.
    let mut raw: Value = serde_json::from_str(&fs::read_to_string(&bundle_path).unwrap()).unwrap();
    raw["extraction_plans"] = json!({});
    let corrupt_path = dir.path().join("corrupt.json");
    fs::write(&corrupt_path, serde_json::to_vec(&raw).unwrap()).unwrap();

    let loader = BundleLoader::new(&corrupt_path);
    match loader.load() {
        Err(Error::BundleCorrupt(message)) => {
            assert!(message.contains("extraction plan"));
        }
        other => panic!("expected BundleCorrupt, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_unparseable_bundle_is_json_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("garbage.json");
    fs::write(&path, b"not json at all").unwrap();

    let loader = BundleLoader::new(&path);
    assert!(matches!(loader.load(), Err(Error::Json(_))));
}
