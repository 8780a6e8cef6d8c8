// The provider processor: the engine's main entry point.
//
// `process` never panics and never returns an error. Detection failures,
// missing plans, transform faults, and malformed input all degrade to a
// fallback event so the host application keeps running.

use serde_json::{Map, Value, json};
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, RwLock};
use std::time::Instant;

use spanmap_types::sink::{DiagnosticSink, Level, emit};
use spanmap_types::{AttributeMap, BuildMetadata, DetectionMethod, NormalizedEvent, PROCESSING_ENGINE};

use crate::detector::{self, Detection, DetectionTier};
use crate::loader::BundleLoader;
use crate::stats::{ProcessingStats, StatsSnapshot};

// Ordered substring lists for the fallback heuristic. First match wins;
// unmatched keys land in metadata.
const INPUT_PATTERNS: [&str; 5] = ["input", "prompt", "message", "query", "request"];
const OUTPUT_PATTERNS: [&str; 5] = ["output", "completion", "response", "result", "answer"];
const CONFIG_PATTERNS: [&str; 5] = ["model", "temperature", "max_token", "top_p", "parameter"];

/// Detection results cached by an order-independent fingerprint of the
/// raw key set. Only key-set-determined tiers are stored; later tiers
/// read attribute values, which the fingerprint does not cover.
pub struct DetectionCache {
    inner: RwLock<HashMap<u64, (String, String)>>,
}

impl DetectionCache {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }

    fn fingerprint(attributes: &AttributeMap) -> u64 {
        // Keys iterate in sorted order (BTreeSet), so the fingerprint is
        // independent of attribute insertion order.
        let keys: std::collections::BTreeSet<&str> =
            attributes.keys().map(String::as_str).collect();
        let mut hasher = std::hash::DefaultHasher::new();
        for key in keys {
            key.hash(&mut hasher);
            0xffu8.hash(&mut hasher);
        }
        hasher.finish()
    }

    fn get(&self, fingerprint: u64) -> Option<(String, String)> {
        self.inner
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&fingerprint)
            .cloned()
    }

    fn insert(&self, fingerprint: u64, instrumentor: &str, provider: &str) {
        self.inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(fingerprint, (instrumentor.to_string(), provider.to_string()));
    }

    pub fn len(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for DetectionCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Converts raw span attributes into normalized four-section events.
/// Owned by a tracer instance; stateless apart from the statistics
/// record and the optional detection cache.
///
/// The bundle loads once at construction. A load failure is tolerated:
/// the processor then runs in pure fallback mode.
pub struct Processor {
    loader: Arc<BundleLoader>,
    bundle: Option<Arc<crate::loader::RuntimeBundle>>,
    sink: Option<Arc<dyn DiagnosticSink>>,
    stats: ProcessingStats,
    cache: Option<DetectionCache>,
}

impl Processor {
    pub fn new(loader: Arc<BundleLoader>) -> Self {
        let bundle = loader.load().ok();
        Self {
            loader,
            bundle,
            sink: None,
            stats: ProcessingStats::new(),
            cache: None,
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn with_cache(mut self) -> Self {
        self.cache = Some(DetectionCache::new());
        self
    }

    fn sink_ref(&self) -> Option<&dyn DiagnosticSink> {
        self.sink.as_deref()
    }

    /// Main entry point. Always returns a valid four-section event with
    /// `metadata.provider` set; exceptions never propagate to the host.
    pub fn process(&self, attributes: &Value) -> NormalizedEvent {
        let Some(attribute_map) = attributes.as_object() else {
            emit(
                self.sink_ref(),
                Level::Debug,
                "Non-map attributes received, using fallback processing",
            );
            let empty = AttributeMap::new();
            let event = self.fallback_processing(&empty);
            return self.validate_and_enhance(event, "unknown");
        };

        self.process_map(attribute_map)
    }

    /// Process an already-extracted attribute map.
    pub fn process_map(&self, attributes: &AttributeMap) -> NormalizedEvent {
        let start = Instant::now();
        let detection = self.detect_internal(attributes);

        self.stats.record_processed();

        let event = if !detection.is_known() {
            emit(
                self.sink_ref(),
                Level::Debug,
                &format!(
                    "No provider detected (instrumentor: {}), using fallback processing",
                    detection.instrumentor
                ),
            );
            self.stats.record_fallback();
            self.fallback_processing(attributes)
        } else {
            self.stats.record_detection(&detection.provider);
            self.extract_provider_data(&detection, attributes)
        };

        let event = self.validate_and_enhance(event, &detection.provider);
        self.stats.record_time(start.elapsed());
        event
    }

    /// Two-tier detection over the raw attribute map. Returns the
    /// `(instrumentor, provider)` pair, `("unknown", "unknown")` when
    /// nothing matches.
    pub fn detect(&self, attributes: &AttributeMap) -> (String, String) {
        let detection = self.detect_internal(attributes);
        (detection.instrumentor, detection.provider)
    }

    fn detect_internal(&self, attributes: &AttributeMap) -> Detection {
        let Some(bundle) = self.bundle.as_ref() else {
            self.stats.record_errors(1);
            emit(
                self.sink_ref(),
                Level::Warning,
                "No bundle available, operating in fallback mode",
            );
            return Detection {
                instrumentor: "unknown".to_string(),
                provider: "unknown".to_string(),
                tier: DetectionTier::Unknown,
            };
        };

        let fingerprint = self
            .cache
            .as_ref()
            .map(|_| DetectionCache::fingerprint(attributes));

        if let (Some(cache), Some(fingerprint)) = (&self.cache, fingerprint)
            && let Some((instrumentor, provider)) = cache.get(fingerprint)
        {
            return Detection {
                instrumentor,
                provider,
                tier: DetectionTier::Exact,
            };
        }

        let detection = detector::detect(bundle, attributes, self.sink_ref());

        if let (Some(cache), Some(fingerprint)) = (&self.cache, fingerprint)
            && detection.tier.cacheable()
        {
            cache.insert(fingerprint, &detection.instrumentor, &detection.provider);
        }

        detection
    }

    /// Signature subset test for one provider.
    pub fn validate_attributes(&self, attributes: &AttributeMap, provider: &str) -> bool {
        match self.bundle.as_ref() {
            Some(bundle) => {
                detector::validate_attributes_for_provider(bundle, attributes, provider)
            }
            None => false,
        }
    }

    pub fn supported_providers(&self) -> Vec<String> {
        match self.bundle.as_ref() {
            Some(bundle) => bundle.bundle.provider_signatures.keys().cloned().collect(),
            None => Vec::new(),
        }
    }

    /// Signature patterns registered for one provider.
    pub fn provider_signatures(&self, provider: &str) -> Option<Vec<spanmap_types::Signature>> {
        self.bundle
            .as_ref()?
            .bundle
            .provider_signatures
            .get(provider)
            .cloned()
    }

    pub fn bundle_metadata(&self) -> Option<BuildMetadata> {
        self.loader.metadata()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    pub fn reset_stats(&self) {
        self.stats.reset();
    }

    fn extract_provider_data(
        &self,
        detection: &Detection,
        attributes: &AttributeMap,
    ) -> NormalizedEvent {
        let program = self
            .bundle
            .as_ref()
            .and_then(|bundle| bundle.extraction_program(&detection.provider, crate::transforms::registry()));
        let Some(program) = program else {
            emit(
                self.sink_ref(),
                Level::Debug,
                &format!(
                    "No extraction plan found for provider: {}",
                    detection.provider
                ),
            );
            self.stats.record_fallback();
            return self.fallback_processing(attributes);
        };

        let (event, faults) = program.run(attributes, &detection.instrumentor, self.sink_ref());
        self.stats.record_errors(faults);
        event
    }

    /// Heuristic classification for unknown providers: one walk over the
    /// attribute map, each key routed by substring match.
    fn fallback_processing(&self, attributes: &AttributeMap) -> NormalizedEvent {
        emit(
            self.sink_ref(),
            Level::Debug,
            "Using fallback processing for unknown provider",
        );

        let mut event = NormalizedEvent::new();
        event
            .metadata
            .insert("provider".to_string(), json!("unknown"));
        event.metadata.insert(
            "detection_method".to_string(),
            json!(DetectionMethod::FallbackHeuristic.as_str()),
        );

        for (key, value) in attributes {
            let key_lower = key.to_lowercase();
            let section: &mut Map<String, Value> = if INPUT_PATTERNS
                .iter()
                .any(|pattern| key_lower.contains(pattern))
            {
                &mut event.inputs
            } else if OUTPUT_PATTERNS
                .iter()
                .any(|pattern| key_lower.contains(pattern))
            {
                &mut event.outputs
            } else if CONFIG_PATTERNS
                .iter()
                .any(|pattern| key_lower.contains(pattern))
            {
                &mut event.config
            } else {
                &mut event.metadata
            };
            section.insert(key.clone(), value.clone());
        }

        event
    }

    /// Final event stamping: provider, engine id, detection method, and
    /// the processing timestamp.
    fn validate_and_enhance(&self, mut event: NormalizedEvent, provider: &str) -> NormalizedEvent {
        if !event.metadata.contains_key("provider") {
            event
                .metadata
                .insert("provider".to_string(), json!(provider));
        }

        event
            .metadata
            .insert("processing_engine".to_string(), json!(PROCESSING_ENGINE));

        // Keep fallback_heuristic when the fallback path already set it.
        if !event.metadata.contains_key("detection_method") {
            event.metadata.insert(
                "detection_method".to_string(),
                json!(DetectionMethod::SignatureBased.as_str()),
            );
        }

        event.metadata.insert(
            "processed_at".to_string(),
            json!(chrono::Utc::now().timestamp()),
        );

        self.apply_validation_rules(&event);
        event
    }

    /// Advisory checks from the shared validation rules; violations are
    /// reported through the sink, never enforced.
    fn apply_validation_rules(&self, event: &NormalizedEvent) {
        let Some(bundle) = self.bundle.as_ref() else {
            return;
        };
        let Some(schema_validation) = bundle
            .bundle
            .validation_rules
            .get("schema_validation")
            .and_then(Value::as_object)
        else {
            return;
        };

        for section in spanmap_types::Section::ALL {
            let Some(rules) = schema_validation
                .get(section.as_str())
                .and_then(Value::as_object)
            else {
                continue;
            };
            let data = event.section(section);

            if let Some(max_fields) = rules.get("max_fields").and_then(Value::as_u64)
                && data.len() as u64 > max_fields
            {
                emit(
                    self.sink_ref(),
                    Level::Warning,
                    &format!(
                        "Section {} has {} fields, max is {}",
                        section.as_str(),
                        data.len(),
                        max_fields
                    ),
                );
            }

            if section == spanmap_types::Section::Config
                && rules
                    .get("require_model_recommended")
                    .and_then(Value::as_bool)
                    .unwrap_or(false)
                && !data.contains_key("model")
            {
                emit(
                    self.sink_ref(),
                    Level::Debug,
                    "Recommended model field missing in config",
                );
            }
        }
    }
}
