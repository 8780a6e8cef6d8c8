// Bundle loading and lazy extraction-plan materialization.
//
// The bundle is read once, verified, and cached for the loader's
// lifetime; metadata queries never touch the filesystem afterwards.
// Extraction programs materialize on first use per provider.

use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};

use spanmap_types::sink::{DiagnosticSink, Level, emit};
use spanmap_types::{BuildMetadata, CompiledBundle, InvertedEntry, Signature};

use crate::detector::parse_pattern_name;
use crate::error::{Error, Result};
use crate::extract::ExtractionProgram;
use crate::transforms::{TransformTable, registry};

/// Confidence assigned when the inverted index must be rebuilt from a
/// legacy bundle that lacks it.
const LEGACY_REBUILD_CONFIDENCE: f64 = 0.9;

/// Callback invoked at most once when the bundle file is absent. Lets a
/// dev-mode host run the compiler without the loader depending on it.
pub type RecompileHook =
    Box<dyn Fn(&Path) -> std::result::Result<(), String> + Send + Sync>;

#[derive(Default)]
pub struct LoaderOptions {
    pub recompile_hook: Option<RecompileHook>,
}

/// Bundle prepared for runtime lookups: the compiled artifact plus the
/// hash index and precomputed views the detector iterates.
pub struct RuntimeBundle {
    pub bundle: CompiledBundle,
    pub wildcard_overlap_threshold: f64,
    inverted: HashMap<Signature, (String, f64)>,
    by_size: BTreeMap<usize, Vec<InvertedEntry>>,
    sizes_desc: Vec<usize>,
    wildcards: Vec<InvertedEntry>,
    /// One slot per provider; the extraction program materializes on
    /// first use and reads lock-free afterwards.
    programs: BTreeMap<String, OnceLock<Arc<ExtractionProgram>>>,
}

impl RuntimeBundle {
    fn prepare(bundle: CompiledBundle, sink: Option<&dyn DiagnosticSink>) -> Self {
        let entries = if bundle.signature_to_provider.is_empty() {
            // Legacy artifact: rebuild from the forward index. Sorted
            // provider order plus first-insertion-wins keeps it
            // deterministic.
            emit(
                sink,
                Level::Warning,
                "Bundle missing inverted index, rebuilding at runtime (legacy mode)",
            );
            let mut seen: HashMap<Signature, (String, f64)> = HashMap::new();
            let mut rebuilt = Vec::new();
            for (provider, signatures) in &bundle.provider_signatures {
                for signature in signatures {
                    if !seen.contains_key(signature) {
                        seen.insert(
                            signature.clone(),
                            (provider.clone(), LEGACY_REBUILD_CONFIDENCE),
                        );
                        rebuilt.push(InvertedEntry {
                            signature: signature.clone(),
                            pattern: provider.clone(),
                            confidence: LEGACY_REBUILD_CONFIDENCE,
                        });
                    }
                }
            }
            rebuilt
        } else {
            bundle.signature_to_provider.clone()
        };

        let mut inverted = HashMap::with_capacity(entries.len());
        let mut by_size: BTreeMap<usize, Vec<InvertedEntry>> = BTreeMap::new();
        let mut wildcards = Vec::new();

        for entry in entries {
            inverted.insert(
                entry.signature.clone(),
                (entry.pattern.clone(), entry.confidence),
            );
            by_size
                .entry(entry.signature.len())
                .or_default()
                .push(entry.clone());
            if entry.signature.has_wildcard() {
                wildcards.push(entry);
            }
        }

        let sizes_desc: Vec<usize> = by_size.keys().rev().copied().collect();
        let wildcard_overlap_threshold = bundle.wildcard_overlap_threshold();
        let programs = bundle
            .extraction_plans
            .keys()
            .map(|provider| (provider.clone(), OnceLock::new()))
            .collect();

        Self {
            bundle,
            wildcard_overlap_threshold,
            inverted,
            by_size,
            sizes_desc,
            wildcards,
            programs,
        }
    }

    /// Extraction program for a provider, materialized on first call.
    pub fn extraction_program(
        &self,
        provider: &str,
        transforms: &TransformTable,
    ) -> Option<Arc<ExtractionProgram>> {
        let slot = self.programs.get(provider)?;
        let program = slot.get_or_init(|| {
            let plan = &self.bundle.extraction_plans[provider];
            Arc::new(ExtractionProgram::materialize(plan, transforms))
        });
        Some(Arc::clone(program))
    }

    /// Exact lookup by signature. O(1).
    pub fn lookup_signature(&self, signature: &Signature) -> Option<(&str, f64)> {
        self.inverted
            .get(signature)
            .map(|(pattern, confidence)| (pattern.as_str(), *confidence))
    }

    /// Unique signature sizes, largest first.
    pub fn signature_sizes(&self) -> &[usize] {
        &self.sizes_desc
    }

    pub fn entries_of_size(&self, size: usize) -> impl Iterator<Item = &InvertedEntry> {
        self.by_size.get(&size).into_iter().flatten()
    }

    /// Entries whose signature carries at least one wildcard field.
    pub fn wildcard_entries(&self) -> impl Iterator<Item = &InvertedEntry> {
        self.wildcards.iter()
    }

    pub fn inverted_len(&self) -> usize {
        self.inverted.len()
    }
}

/// Loads the compiled bundle and serves lazily materialized extraction
/// programs. Shared across processors via `Arc`.
pub struct BundleLoader {
    bundle_path: PathBuf,
    options: LoaderOptions,
    sink: Option<Arc<dyn DiagnosticSink>>,
    cached: Mutex<Option<Arc<RuntimeBundle>>>,
    transforms: &'static TransformTable,
}

impl BundleLoader {
    pub fn new(bundle_path: impl Into<PathBuf>) -> Self {
        Self::with_options(bundle_path, LoaderOptions::default())
    }

    pub fn with_options(bundle_path: impl Into<PathBuf>, options: LoaderOptions) -> Self {
        Self {
            bundle_path: bundle_path.into(),
            options,
            sink: None,
            cached: Mutex::new(None),
            transforms: registry(),
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn bundle_path(&self) -> &Path {
        &self.bundle_path
    }

    fn sink_ref(&self) -> Option<&dyn DiagnosticSink> {
        self.sink.as_deref()
    }

    /// Load, verify, and cache the bundle. Subsequent calls return the
    /// cached instance without touching the filesystem.
    pub fn load(&self) -> Result<Arc<RuntimeBundle>> {
        let mut cached = self
            .cached
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(bundle) = cached.as_ref() {
            return Ok(Arc::clone(bundle));
        }

        if !self.bundle_path.exists()
            && let Some(hook) = &self.options.recompile_hook
        {
            emit(
                self.sink_ref(),
                Level::Info,
                "Bundle absent, invoking dev-mode recompilation",
            );
            if let Err(message) = hook(&self.bundle_path) {
                emit(
                    self.sink_ref(),
                    Level::Error,
                    &format!("Dev-mode recompilation failed: {}", message),
                );
            }
        }

        if !self.bundle_path.exists() {
            return Err(Error::BundleNotFound(self.bundle_path.clone()));
        }

        let contents = fs::read(&self.bundle_path)?;
        let bundle: CompiledBundle = serde_json::from_slice(&contents)?;
        verify_bundle(&bundle)?;

        let runtime = Arc::new(RuntimeBundle::prepare(bundle, self.sink_ref()));
        emit(
            self.sink_ref(),
            Level::Info,
            &format!(
                "Loaded bundle: {} providers, {} signatures",
                runtime.bundle.provider_count(),
                runtime.inverted_len()
            ),
        );

        *cached = Some(Arc::clone(&runtime));
        Ok(runtime)
    }

    /// Extraction program for a provider, materialized on first call and
    /// cached inside the runtime bundle for its lifetime.
    pub fn get_extraction_program(&self, provider: &str) -> Option<Arc<ExtractionProgram>> {
        let runtime = self.load().ok()?;
        runtime.extraction_program(provider, self.transforms)
    }

    /// Build metadata from the cached bundle; loads it on first call.
    pub fn metadata(&self) -> Option<BuildMetadata> {
        self.load().ok().map(|runtime| runtime.bundle.build_metadata.clone())
    }
}

/// Structural integrity checks applied right after deserialization.
fn verify_bundle(bundle: &CompiledBundle) -> Result<()> {
    if bundle.provider_signatures.is_empty() {
        return Err(Error::BundleCorrupt(
            "provider_signatures is empty - no providers compiled".into(),
        ));
    }

    let forward_total: usize = bundle.provider_signatures.values().map(Vec::len).sum();
    if bundle.signature_to_provider.len() > forward_total {
        return Err(Error::BundleCorrupt(format!(
            "inverted index has more signatures ({}) than forward index ({})",
            bundle.signature_to_provider.len(),
            forward_total
        )));
    }

    for entry in &bundle.signature_to_provider {
        let (_, provider) = parse_pattern_name(&entry.pattern);
        if !bundle.provider_signatures.contains_key(&provider) {
            return Err(Error::BundleCorrupt(format!(
                "inverted index references unknown provider '{}'",
                provider
            )));
        }
        if !(0.0..=1.0).contains(&entry.confidence) {
            return Err(Error::BundleCorrupt(format!(
                "pattern '{}' has invalid confidence {}",
                entry.pattern, entry.confidence
            )));
        }
    }

    if !bundle.validate_integrity() {
        return Err(Error::BundleCorrupt(
            "provider missing extraction plan or field mappings".into(),
        ));
    }

    // The shared validation rules must deserialize to a mapping or null.
    match &bundle.validation_rules {
        Value::Object(_) | Value::Null => {}
        other => {
            return Err(Error::BundleCorrupt(format!(
                "validation_rules must be a mapping, got {}",
                match other {
                    Value::Array(_) => "array",
                    Value::String(_) => "string",
                    Value::Number(_) => "number",
                    Value::Bool(_) => "boolean",
                    _ => "unknown",
                }
            )));
        }
    }

    Ok(())
}
