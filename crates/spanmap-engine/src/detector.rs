// Two-tier detection: instrumentor (attribute shape) plus provider
// (semantic content).
//
// Tier order, cheapest first:
//   1. exact signature match on the raw key set
//   2. exact match on the normalized key set
//   3. wildcard overlap match
//   4. size-bucketed subset match (value-based tiebreak)
//   5. value-based detection over explicit indicator fields
// Anything else is unknown.

use serde_json::Value;
use std::collections::BTreeSet;

use spanmap_types::AttributeMap;
use spanmap_types::Signature;
use spanmap_types::sink::{DiagnosticSink, Level, emit};

use crate::loader::RuntimeBundle;
use crate::normalize::normalize_attribute_keys;

/// Result of a detection run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Detection {
    pub instrumentor: String,
    pub provider: String,
    pub tier: DetectionTier,
}

impl Detection {
    fn unknown() -> Self {
        Detection {
            instrumentor: "unknown".to_string(),
            provider: "unknown".to_string(),
            tier: DetectionTier::Unknown,
        }
    }

    fn from_pattern(pattern: &str, tier: DetectionTier) -> Self {
        let (instrumentor, provider) = parse_pattern_name(pattern);
        Detection {
            instrumentor,
            provider,
            tier,
        }
    }

    pub fn is_known(&self) -> bool {
        self.provider != "unknown"
    }
}

/// Which tier produced the detection. Exact and normalized-exact results
/// depend only on the key set and are safe to cache by fingerprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectionTier {
    Exact,
    NormalizedExact,
    Wildcard,
    Subset,
    ValueBased,
    Unknown,
}

impl DetectionTier {
    pub fn cacheable(&self) -> bool {
        matches!(self, DetectionTier::Exact | DetectionTier::NormalizedExact)
    }
}

/// Split a compound pattern name at the first underscore into
/// `(instrumentor, provider)`. A name without an underscore is a bare
/// provider with an unknown instrumentor.
pub fn parse_pattern_name(pattern_name: &str) -> (String, String) {
    if pattern_name == "unknown" {
        return ("unknown".to_string(), "unknown".to_string());
    }
    match pattern_name.split_once('_') {
        Some((instrumentor, provider)) => (instrumentor.to_string(), provider.to_string()),
        None => ("unknown".to_string(), pattern_name.to_string()),
    }
}

/// Infer the instrumentor from the prevalent attribute-key prefix.
/// Used as a subset-match tiebreak and for extraction routing.
pub fn infer_instrumentor(attributes: &AttributeMap) -> String {
    let mut traceloop = 0usize;
    let mut openinference = 0usize;
    let mut openlit = 0usize;
    let mut direct_otel = 0usize;

    for key in attributes.keys() {
        if key.starts_with("gen_ai.") {
            traceloop += 1;
        } else if key.starts_with("llm.") {
            openinference += 1;
        } else if key.starts_with("openlit.") {
            openlit += 1;
        } else if key.starts_with("otel.") || key.starts_with("custom.") {
            direct_otel += 1;
        }
    }

    let counts = [
        ("traceloop", traceloop),
        ("openinference", openinference),
        ("openlit", openlit),
        ("direct_otel", direct_otel),
    ];
    let max = counts.iter().map(|(_, count)| *count).max().unwrap_or(0);
    if max == 0 {
        return "unknown".to_string();
    }
    counts
        .iter()
        .find(|(_, count)| *count == max)
        .map(|(name, _)| name.to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Run the full detection ladder over a raw attribute map.
pub fn detect(
    bundle: &RuntimeBundle,
    attributes: &AttributeMap,
    sink: Option<&dyn DiagnosticSink>,
) -> Detection {
    if attributes.is_empty() {
        emit(sink, Level::Debug, "No attributes, returning unknown");
        return Detection::unknown();
    }

    let raw_keys: BTreeSet<String> = attributes.keys().cloned().collect();
    let normalized_keys = normalize_attribute_keys(attributes.keys().map(String::as_str));

    // Tier 1: exact match on the raw key set.
    let raw_signature = Signature::from(raw_keys);
    if let Some((pattern, confidence)) = bundle.lookup_signature(&raw_signature) {
        emit(
            sink,
            Level::Debug,
            &format!(
                "Exact signature match: {} (confidence: {:.2})",
                pattern, confidence
            ),
        );
        return Detection::from_pattern(pattern, DetectionTier::Exact);
    }

    // Tier 2: exact match on the normalized key set.
    let normalized_signature = Signature::from(normalized_keys.clone());
    if let Some((pattern, confidence)) = bundle.lookup_signature(&normalized_signature) {
        emit(
            sink,
            Level::Debug,
            &format!(
                "Normalized signature match: {} (confidence: {:.2})",
                pattern, confidence
            ),
        );
        return Detection::from_pattern(pattern, DetectionTier::NormalizedExact);
    }

    // Tier 3: wildcard overlap match.
    if let Some(pattern) = match_wildcard_signatures(bundle, &normalized_keys, sink) {
        return Detection::from_pattern(&pattern, DetectionTier::Wildcard);
    }

    // Tier 4: size-bucketed subset match.
    emit(
        sink,
        Level::Debug,
        "No exact or wildcard match, trying subset matching",
    );
    if let Some(pattern) = find_best_subset_match(bundle, &normalized_keys, attributes, sink) {
        emit(sink, Level::Debug, &format!("Subset match: {}", pattern));
        return Detection::from_pattern(&pattern, DetectionTier::Subset);
    }

    // Tier 5: value-based detection, last resort.
    let instrumentor = infer_instrumentor(attributes);
    if let Some(provider) = detect_provider_by_values(attributes, sink) {
        emit(
            sink,
            Level::Debug,
            &format!("Value-based detection: [{}, {}]", instrumentor, provider),
        );
        return Detection {
            instrumentor,
            provider,
            tier: DetectionTier::ValueBased,
        };
    }

    Detection::unknown()
}

/// Signature subset test for one provider, O(#signatures of provider).
pub fn validate_attributes_for_provider(
    bundle: &RuntimeBundle,
    attributes: &AttributeMap,
    provider: &str,
) -> bool {
    let Some(signatures) = bundle.bundle.provider_signatures.get(provider) else {
        return false;
    };
    let keys: BTreeSet<String> = attributes.keys().cloned().collect();
    signatures
        .iter()
        .any(|signature| signature.is_subset_of(&keys))
}

// --- Tier 3: wildcard matching ---

fn match_wildcard_signatures(
    bundle: &RuntimeBundle,
    normalized_keys: &BTreeSet<String>,
    sink: Option<&dyn DiagnosticSink>,
) -> Option<String> {
    let threshold = bundle.wildcard_overlap_threshold;
    let mut best: Option<(String, f64)> = None;

    for entry in bundle.wildcard_entries() {
        let matched = entry.signature.overlap(normalized_keys);
        let ratio = matched as f64 / entry.signature.len() as f64;
        if ratio < threshold {
            continue;
        }
        let adjusted = entry.confidence * ratio;
        emit(
            sink,
            Level::Debug,
            &format!(
                "Wildcard signature match: {} (adjusted confidence: {:.2}, matched: {}/{})",
                entry.pattern,
                adjusted,
                matched,
                entry.signature.len()
            ),
        );
        let better = match &best {
            Some((_, best_adjusted)) => adjusted > *best_adjusted,
            None => true,
        };
        if better {
            best = Some((entry.pattern.clone(), adjusted));
        }
    }

    best.map(|(pattern, _)| pattern)
}

// --- Tier 4: size-bucketed subset matching ---

fn find_best_subset_match(
    bundle: &RuntimeBundle,
    normalized_keys: &BTreeSet<String>,
    attributes: &AttributeMap,
    sink: Option<&dyn DiagnosticSink>,
) -> Option<String> {
    let mut best: Option<(String, f64, usize)> = None;

    for &size in bundle.signature_sizes() {
        if size > normalized_keys.len() {
            continue;
        }

        // Candidates in this size bucket: (pattern, adjusted confidence).
        let mut bucket: Vec<(String, f64)> = Vec::new();
        for entry in bundle.entries_of_size(size) {
            if entry.signature.is_subset_of(normalized_keys) {
                let coverage = size as f64 / normalized_keys.len() as f64;
                bucket.push((entry.pattern.clone(), coverage * entry.confidence));
            }
        }

        if bucket.is_empty() {
            continue;
        }

        // Value-based tiebreak when a bucket is ambiguous.
        if bucket.len() > 1
            && let Some(value_provider) = detect_provider_by_values(attributes, sink)
        {
            let matching: Vec<(String, f64)> = bucket
                .iter()
                .filter(|(pattern, _)| pattern.contains(&value_provider))
                .cloned()
                .collect();
            if !matching.is_empty() {
                emit(
                    sink,
                    Level::Debug,
                    &format!("Subset tiebreak by value-based provider: {}", value_provider),
                );
                bucket = matching;
            }
        }

        bucket.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        let (pattern, confidence) = bucket.remove(0);

        let better = match &best {
            Some((_, best_confidence, best_size)) => {
                size > *best_size || (size == *best_size && confidence > *best_confidence)
            }
            None => true,
        };
        if better {
            best = Some((pattern, confidence, size));
        }

        // Buckets iterate largest first; a confident match here cannot be
        // beaten by a smaller signature.
        if let Some((_, best_confidence, best_size)) = &best
            && *best_size == size
            && *best_confidence > 0.8
        {
            break;
        }
    }

    best.map(|(pattern, _, _)| pattern)
}

// --- Tier 5: value-based detection ---

struct ProviderIndicators {
    provider: &'static str,
    explicit_fields: &'static [(&'static str, &'static [&'static str])],
    model_patterns: &'static [&'static str],
    url_patterns: &'static [&'static str],
}

// Sorted by provider name; ties in scoring resolve to the first entry,
// which is the lexicographically smallest provider.
const PROVIDER_INDICATORS: &[ProviderIndicators] = &[
    ProviderIndicators {
        provider: "anthropic",
        explicit_fields: &[
            ("gen_ai.system", &["anthropic", "Anthropic", "ANTHROPIC"]),
            ("llm.provider", &["anthropic", "Anthropic", "ANTHROPIC"]),
            ("openlit.provider", &["anthropic", "Anthropic", "ANTHROPIC"]),
        ],
        model_patterns: &["claude-"],
        url_patterns: &["api.anthropic.com", "anthropic.com"],
    },
    ProviderIndicators {
        provider: "gemini",
        explicit_fields: &[
            ("gen_ai.system", &["google", "Google", "GOOGLE", "gemini", "Gemini"]),
            ("llm.provider", &["google", "Google", "gemini", "Gemini"]),
            ("openlit.provider", &["google", "Google", "GOOGLE", "gemini", "Gemini"]),
        ],
        model_patterns: &["gemini-", "models/gemini"],
        url_patterns: &["generativelanguage.googleapis.com", "ai.google.dev"],
    },
    ProviderIndicators {
        provider: "openai",
        explicit_fields: &[
            ("gen_ai.system", &["openai", "OpenAI", "OPENAI"]),
            ("llm.provider", &["openai", "OpenAI", "OPENAI"]),
            ("openlit.provider", &["openai", "OpenAI", "OPENAI"]),
        ],
        model_patterns: &["gpt-", "text-davinci", "text-embedding"],
        url_patterns: &["api.openai.com", "openai.com"],
    },
];

const MODEL_FIELDS: &[&str] = &["gen_ai.request.model", "llm.model_name", "llm.model", "model"];
const URL_FIELDS: &[&str] = &["http.url", "server.address", "url.full", "http.target"];

const EXPLICIT_FIELD_SCORE: i64 = 100;
const MODEL_PATTERN_SCORE: i64 = 50;
const URL_PATTERN_SCORE: i64 = 30;

fn value_as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_string(),
        other => other.to_string(),
    }
}

/// Score explicit provider indicators over attribute values. Accepted
/// only when the composite score reaches the explicit-field threshold.
fn detect_provider_by_values(
    attributes: &AttributeMap,
    sink: Option<&dyn DiagnosticSink>,
) -> Option<String> {
    let mut best: Option<(&'static str, i64)> = None;

    for indicators in PROVIDER_INDICATORS {
        let mut score = 0i64;

        for (field, expected_values) in indicators.explicit_fields {
            if let Some(value) = attributes.get(*field) {
                let text = value_as_text(value);
                if expected_values.contains(&text.as_str()) {
                    score += EXPLICIT_FIELD_SCORE;
                }
            }
        }

        for field in MODEL_FIELDS {
            if let Some(value) = attributes.get(*field) {
                let model = value_as_text(value).to_lowercase();
                if indicators
                    .model_patterns
                    .iter()
                    .any(|pattern| model.contains(&pattern.to_lowercase()))
                {
                    score += MODEL_PATTERN_SCORE;
                }
            }
        }

        for field in URL_FIELDS {
            if let Some(value) = attributes.get(*field) {
                let url = value_as_text(value).to_lowercase();
                if indicators
                    .url_patterns
                    .iter()
                    .any(|pattern| url.contains(&pattern.to_lowercase()))
                {
                    score += URL_PATTERN_SCORE;
                }
            }
        }

        // Strict comparison plus sorted indicator order: ties keep the
        // lexicographically smallest provider.
        let better = match best {
            Some((_, best_score)) => score > best_score,
            None => score > 0,
        };
        if better {
            best = Some((indicators.provider, score));
        }
    }

    match best {
        Some((provider, score)) if score >= EXPLICIT_FIELD_SCORE => {
            emit(
                sink,
                Level::Debug,
                &format!("Value-based detection: {} (score: {})", provider, score),
            );
            Some(provider.to_string())
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn attrs(value: Value) -> AttributeMap {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn test_parse_pattern_name_variants() {
        assert_eq!(
            parse_pattern_name("traceloop_openai"),
            ("traceloop".to_string(), "openai".to_string())
        );
        assert_eq!(
            parse_pattern_name("openinference_anthropic"),
            ("openinference".to_string(), "anthropic".to_string())
        );
        assert_eq!(
            parse_pattern_name("gemini"),
            ("unknown".to_string(), "gemini".to_string())
        );
        assert_eq!(
            parse_pattern_name("unknown"),
            ("unknown".to_string(), "unknown".to_string())
        );
    }

    #[test]
    fn test_infer_instrumentor_by_prefix() {
        assert_eq!(
            infer_instrumentor(&attrs(json!({"gen_ai.system": "x", "gen_ai.request.model": "y"}))),
            "traceloop"
        );
        assert_eq!(
            infer_instrumentor(&attrs(json!({"llm.model_name": "x"}))),
            "openinference"
        );
        assert_eq!(
            infer_instrumentor(&attrs(json!({"openlit.provider": "x"}))),
            "openlit"
        );
        assert_eq!(
            infer_instrumentor(&attrs(json!({"otel.kind": "x", "custom.key": "y"}))),
            "direct_otel"
        );
        assert_eq!(infer_instrumentor(&attrs(json!({"plain": "x"}))), "unknown");
    }

    #[test]
    fn test_value_detection_requires_explicit_field() {
        // Model pattern alone scores 50 - below the acceptance threshold.
        let attributes = attrs(json!({"gen_ai.request.model": "gpt-4"}));
        assert_eq!(detect_provider_by_values(&attributes, None), None);

        let attributes = attrs(json!({
            "gen_ai.request.model": "gpt-4",
            "gen_ai.system": "openai"
        }));
        assert_eq!(
            detect_provider_by_values(&attributes, None),
            Some("openai".to_string())
        );
    }

    #[test]
    fn test_value_detection_anthropic_by_system_field() {
        let attributes = attrs(json!({
            "gen_ai.request.model": "claude-3-sonnet",
            "gen_ai.system": "anthropic"
        }));
        assert_eq!(
            detect_provider_by_values(&attributes, None),
            Some("anthropic".to_string())
        );
    }

    #[test]
    fn test_value_detection_url_contributes_but_never_decides() {
        let attributes = attrs(json!({"http.url": "https://api.openai.com/v1/chat"}));
        assert_eq!(detect_provider_by_values(&attributes, None), None);

        let attributes = attrs(json!({
            "http.url": "https://api.openai.com/v1/chat",
            "llm.provider": "openai"
        }));
        assert_eq!(
            detect_provider_by_values(&attributes, None),
            Some("openai".to_string())
        );
    }
}
