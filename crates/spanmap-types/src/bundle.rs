// Compiled bundle - the immutable artifact produced by the compiler and
// consumed by the runtime engine.
//
// Serialization is deterministic for identical inputs: every map is a
// BTreeMap, signatures are ordered sets, and the inverted index is stored
// as a list sorted by signature.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

use crate::event::Section;
use crate::source::{FieldMappingSections, NavigationRule, TransformSpec};

/// Current bundle format version.
pub const BUNDLE_FORMAT_VERSION: &str = "4.0";

/// Unordered set of attribute key names identifying one instrumentor/provider
/// combination. Equality and hashing ignore declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Signature(BTreeSet<String>);

impl Signature {
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Signature(fields.into_iter().map(Into::into).collect())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains(field)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn is_subset_of(&self, keys: &BTreeSet<String>) -> bool {
        self.0.iter().all(|field| keys.contains(field))
    }

    /// Number of fields shared with the given key set.
    pub fn overlap(&self, keys: &BTreeSet<String>) -> usize {
        self.0.iter().filter(|field| keys.contains(*field)).count()
    }

    /// True when any field is a wildcard pattern (reconstructed from
    /// flattened array keys, e.g. `llm.input_messages.*`).
    pub fn has_wildcard(&self) -> bool {
        self.0.iter().any(|field| field == "*" || field.ends_with(".*"))
    }
}

impl From<BTreeSet<String>> for Signature {
    fn from(fields: BTreeSet<String>) -> Self {
        Signature(fields)
    }
}

/// One entry of the inverted signature index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvertedEntry {
    pub signature: Signature,
    pub pattern: String,
    pub confidence: f64,
}

/// A single extraction instruction, compiled from a field mapping's
/// `source_rule`. Replaces the dynamically generated code of earlier
/// engine generations with data the interpreter can execute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Instruction {
    /// Emit a literal value.
    Static { value: Value },
    /// Read from the raw attribute map through a navigation rule.
    DirectNavigation {
        rule: String,
        navigation: NavigationRule,
    },
    /// Invoke a registered generic transform over the extracted map.
    Transform {
        name: String,
        implementation: String,
        parameters: BTreeMap<String, Value>,
    },
    /// Choose a navigation rule by the instrumentor detected at runtime.
    /// No matching alternative yields null.
    InstrumentorRouted { alternatives: Vec<RoutedAlternative> },
    /// The source rule resolved to nothing.
    Null,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutedAlternative {
    pub instrumentor: String,
    pub rule: String,
    pub navigation: NavigationRule,
}

/// One target field of the extraction plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanStep {
    pub section: Section,
    pub target_field: String,
    pub instruction: Instruction,
    /// Literal substituted when the instruction faults at runtime.
    #[serde(default)]
    pub fallback: Value,
}

/// Ordered per-provider extraction plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionPlan {
    pub provider: String,
    pub steps: Vec<PlanStep>,
}

/// Build provenance carried inside the bundle and mirrored into the
/// `bundle_metadata.json` sidecar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildMetadata {
    pub version: String,
    pub build_timestamp: i64,
    pub providers_count: usize,
    pub patterns_count: usize,
    pub source_hash: String,
    pub compiler_version: String,
}

/// The compiled provider bundle. Read-only at runtime; one per process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledBundle {
    /// Forward index: provider -> signatures, for subset matching.
    pub provider_signatures: BTreeMap<String, Vec<Signature>>,
    /// Inverted index: signature -> (pattern, confidence), for exact
    /// matching. Absent in legacy artifacts; the loader rebuilds it.
    #[serde(default)]
    pub signature_to_provider: Vec<InvertedEntry>,
    /// Per-provider extraction plans.
    pub extraction_plans: BTreeMap<String, ExtractionPlan>,
    /// Per-provider field mappings as authored.
    pub field_mappings: BTreeMap<String, FieldMappingSections>,
    /// Per-provider transform configuration.
    pub transform_registry: BTreeMap<String, BTreeMap<String, TransformSpec>>,
    /// Shared validation rules, carried verbatim.
    pub validation_rules: Value,
    pub build_metadata: BuildMetadata,
}

impl CompiledBundle {
    pub fn provider_count(&self) -> usize {
        self.provider_signatures.len()
    }

    /// Total number of signatures across the forward index.
    pub fn pattern_count(&self) -> usize {
        self.provider_signatures.values().map(Vec::len).sum()
    }

    pub fn plan_count(&self) -> usize {
        self.extraction_plans.len()
    }

    /// Internal consistency: every provider with signatures also has an
    /// extraction plan and field mappings.
    pub fn validate_integrity(&self) -> bool {
        self.provider_signatures.keys().all(|provider| {
            self.extraction_plans.contains_key(provider)
                && self.field_mappings.contains_key(provider)
        })
    }

    /// Tunable threshold for wildcard signature matching, read from the
    /// shared validation rules. Defaults to 0.80.
    pub fn wildcard_overlap_threshold(&self) -> f64 {
        self.validation_rules
            .get("detection")
            .and_then(|detection| detection.get("wildcard_overlap_threshold"))
            .and_then(Value::as_f64)
            .unwrap_or(0.80)
    }
}
