use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use spanmap_types::sink::{DiagnosticSink, Level, emit};
use spanmap_types::{BuildMetadata, CompiledBundle, bundle::BUNDLE_FORMAT_VERSION};

use crate::error::{Error, Result};
use crate::indices::compile_signature_indices;
use crate::loader::{ProviderConfig, load_providers, load_shared};
use crate::output::{source_hash, write_bundle};
use crate::plan::compile_extraction_plan;
use crate::validate::validate_provider;

/// Counters reported after a compilation run.
#[derive(Debug, Clone, Default)]
pub struct CompilationStats {
    pub providers_processed: usize,
    pub patterns_compiled: usize,
    pub plans_generated: usize,
    pub collisions_detected: usize,
    pub elapsed: Duration,
}

/// Compiles provider YAML configuration into a runtime bundle.
///
/// Single-threaded batch pipeline: load shared config, load providers,
/// validate, compile indices and plans, then write the artifact plus its
/// metadata sidecar atomically.
pub struct Compiler<'a> {
    source_dir: PathBuf,
    output_dir: PathBuf,
    sink: Option<&'a dyn DiagnosticSink>,
    stats: CompilationStats,
}

impl<'a> Compiler<'a> {
    pub fn new(source_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            source_dir: source_dir.into(),
            output_dir: output_dir.into(),
            sink: None,
            stats: CompilationStats::default(),
        }
    }

    pub fn with_sink(mut self, sink: &'a dyn DiagnosticSink) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn stats(&self) -> &CompilationStats {
        &self.stats
    }

    fn providers_dir(&self) -> PathBuf {
        self.source_dir.join("providers")
    }

    fn shared_dir(&self) -> PathBuf {
        self.source_dir.join("shared")
    }

    /// Compile every provider (or just `provider_filter`) and write the
    /// bundle into the output directory.
    pub fn compile(&mut self, provider_filter: Option<&str>) -> Result<CompiledBundle> {
        let start = Instant::now();
        emit(self.sink, Level::Info, "Starting provider bundle compilation");

        let shared = load_shared(&self.shared_dir())?;
        let providers = load_providers(&self.providers_dir(), provider_filter, self.sink)?;
        self.stats.providers_processed = providers.len();

        for config in providers.values() {
            validate_provider(config)?;
            emit(
                self.sink,
                Level::Debug,
                &format!("Validated provider: {}", config.name),
            );
        }

        let indices = compile_signature_indices(&providers, self.sink);
        self.stats.patterns_compiled = indices.patterns_compiled;
        self.stats.collisions_detected = indices.collisions_detected;

        let mut extraction_plans = BTreeMap::new();
        let mut field_mappings = BTreeMap::new();
        let mut transform_registry = BTreeMap::new();
        for (name, config) in &providers {
            extraction_plans.insert(name.clone(), compile_extraction_plan(config));
            field_mappings.insert(name.clone(), config.field_mappings.field_mappings.clone());
            transform_registry.insert(name.clone(), config.transforms.transforms.clone());
        }
        self.stats.plans_generated = extraction_plans.len();

        let build_metadata = BuildMetadata {
            version: BUNDLE_FORMAT_VERSION.to_string(),
            build_timestamp: chrono::Utc::now().timestamp(),
            providers_count: providers.len(),
            patterns_count: indices.patterns_compiled,
            source_hash: source_hash(&self.providers_dir(), &self.shared_dir(), &providers)?,
            compiler_version: env!("CARGO_PKG_VERSION").to_string(),
        };

        let bundle = CompiledBundle {
            provider_signatures: indices.forward,
            signature_to_provider: indices.inverted,
            extraction_plans,
            field_mappings,
            transform_registry,
            validation_rules: shared.validation_rules,
            build_metadata,
        };

        self.validate_bundle(&bundle, &providers)?;

        let (bundle_path, metadata_path) = write_bundle(&self.output_dir, &bundle)?;
        emit(
            self.sink,
            Level::Info,
            &format!("Bundle saved to: {}", bundle_path.display()),
        );
        emit(
            self.sink,
            Level::Info,
            &format!("Metadata saved to: {}", metadata_path.display()),
        );

        self.stats.elapsed = start.elapsed();
        emit(
            self.sink,
            Level::Info,
            &format!(
                "Compiled {} providers ({} patterns) in {:.2?}",
                self.stats.providers_processed, self.stats.patterns_compiled, self.stats.elapsed
            ),
        );

        Ok(bundle)
    }

    /// Post-compilation bundle checks, mirroring the runtime loader's
    /// expectations so a bad artifact never leaves the compiler.
    fn validate_bundle(
        &self,
        bundle: &CompiledBundle,
        providers: &BTreeMap<String, ProviderConfig>,
    ) -> Result<()> {
        if bundle.provider_signatures.is_empty() {
            return Err(Error::Bundle("bundle contains no provider signatures".into()));
        }
        if bundle.extraction_plans.is_empty() {
            return Err(Error::Bundle("bundle contains no extraction plans".into()));
        }

        for (provider, signatures) in &bundle.provider_signatures {
            if signatures.is_empty() {
                return Err(Error::Bundle(format!("provider {} has no signatures", provider)));
            }
            for signature in signatures {
                if signature.len() < 2 {
                    return Err(Error::Bundle(format!(
                        "provider {} has signature with < 2 fields",
                        provider
                    )));
                }
            }
        }

        for provider in providers.keys() {
            if !bundle.extraction_plans.contains_key(provider) {
                return Err(Error::Bundle(format!(
                    "provider {} missing extraction plan",
                    provider
                )));
            }
        }

        if !bundle.validate_integrity() {
            return Err(Error::Bundle("bundle integrity check failed".into()));
        }

        Ok(())
    }
}

/// Convenience wrapper for hosts that just need a path compiled with the
/// default options (used by the dev-mode recompile hook).
pub fn compile_source_dir(source_dir: &Path, output_dir: &Path) -> Result<CompiledBundle> {
    Compiler::new(source_dir, output_dir).compile(None)
}
