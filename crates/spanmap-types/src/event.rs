use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Identifier stamped into `metadata.processing_engine` of every event.
pub const PROCESSING_ENGINE: &str = "spanmap_discovery_engine";

/// The four sections of a normalized event, in extraction order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Section {
    Inputs,
    Outputs,
    Config,
    Metadata,
}

impl Section {
    pub const ALL: [Section; 4] = [
        Section::Inputs,
        Section::Outputs,
        Section::Config,
        Section::Metadata,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Section::Inputs => "inputs",
            Section::Outputs => "outputs",
            Section::Config => "config",
            Section::Metadata => "metadata",
        }
    }
}

/// How the provider was identified for an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionMethod {
    SignatureBased,
    FallbackHeuristic,
}

impl DetectionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            DetectionMethod::SignatureBased => "signature_based",
            DetectionMethod::FallbackHeuristic => "fallback_heuristic",
        }
    }
}

/// Normalized event consumed by the rest of the tracing SDK.
///
/// Always carries exactly four sections. `metadata.provider` is set for
/// every event the processor emits (`"unknown"` when detection failed).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizedEvent {
    pub inputs: Map<String, Value>,
    pub outputs: Map<String, Value>,
    pub config: Map<String, Value>,
    pub metadata: Map<String, Value>,
}

impl NormalizedEvent {
    pub fn new() -> Self {
        Self::default()
    }

    /// Provider recorded in metadata, `"unknown"` when absent.
    pub fn provider(&self) -> &str {
        self.metadata
            .get("provider")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
    }

    pub fn section(&self, section: Section) -> &Map<String, Value> {
        match section {
            Section::Inputs => &self.inputs,
            Section::Outputs => &self.outputs,
            Section::Config => &self.config,
            Section::Metadata => &self.metadata,
        }
    }

    pub fn section_mut(&mut self, section: Section) -> &mut Map<String, Value> {
        match section {
            Section::Inputs => &mut self.inputs,
            Section::Outputs => &mut self.outputs,
            Section::Config => &mut self.config,
            Section::Metadata => &mut self.metadata,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_provider_defaults_to_unknown() {
        let event = NormalizedEvent::new();
        assert_eq!(event.provider(), "unknown");
    }

    #[test]
    fn test_provider_reads_metadata() {
        let mut event = NormalizedEvent::new();
        event
            .metadata
            .insert("provider".to_string(), json!("openai"));
        assert_eq!(event.provider(), "openai");
    }

    #[test]
    fn test_non_string_provider_is_unknown() {
        let mut event = NormalizedEvent::new();
        event.metadata.insert("provider".to_string(), json!(42));
        assert_eq!(event.provider(), "unknown");
    }

    #[test]
    fn test_section_serialization_names() {
        for section in Section::ALL {
            let serialized = serde_json::to_value(section).unwrap();
            assert_eq!(serialized, json!(section.as_str()));
        }
    }

    #[test]
    fn test_event_round_trip() {
        let mut event = NormalizedEvent::new();
        event.inputs.insert("prompt".to_string(), json!("hi"));
        event
            .metadata
            .insert("provider".to_string(), json!("gemini"));

        let serialized = serde_json::to_string(&event).unwrap();
        let deserialized: NormalizedEvent = serde_json::from_str(&serialized).unwrap();
        assert_eq!(event, deserialized);
    }
}
