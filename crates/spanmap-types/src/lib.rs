// Core types shared by the compiler and the runtime engine.
//
// Span attributes are dynamically typed, so everything in this crate is
// built around serde_json::Value: attribute maps, navigation fallbacks,
// transform parameters, and the four event sections all carry Value.

pub mod bundle;
pub mod event;
pub mod sink;
pub mod source;

pub use bundle::{
    BuildMetadata, CompiledBundle, ExtractionPlan, Instruction, InvertedEntry, PlanStep,
    RoutedAlternative, Signature,
};
pub use event::{DetectionMethod, NormalizedEvent, PROCESSING_ENGINE, Section};
pub use sink::{DiagnosticSink, Level, NullSink, StderrSink, emit};
pub use source::{
    ExtractionMethod, FieldMapping, FieldMappingSections, FieldMappingsDoc, NavigationRule,
    NavigationRulesDoc, StructurePattern, StructurePatternsDoc, TransformSpec, TransformsDoc,
};

/// Raw span attribute map as handed over by the host tracing SDK.
pub type AttributeMap = serde_json::Map<String, serde_json::Value>;
