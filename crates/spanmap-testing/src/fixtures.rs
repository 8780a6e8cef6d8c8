// On-disk configuration tree builder.
//
// Materializes a `providers/` + `shared/` source layout inside a test
// directory, with helpers for the common shapes: a complete provider in
// one call, or individual raw documents for malformed-input tests.

use std::fs;
use std::path::{Path, PathBuf};

pub struct ConfigTreeBuilder {
    root: PathBuf,
}

impl ConfigTreeBuilder {
    /// Create `providers/` and `shared/` under the given root.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        fs::create_dir_all(root.join("providers")).expect("create providers dir");
        fs::create_dir_all(root.join("shared")).expect("create shared dir");
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn providers_dir(&self) -> PathBuf {
        self.root.join("providers")
    }

    pub fn provider_dir(&self, provider: &str) -> PathBuf {
        self.providers_dir().join(provider)
    }

    /// Write the three shared documents with workable defaults.
    pub fn with_shared_defaults(self) -> Self {
        self.write_shared(
            "core_schema.yaml",
            r#"version: "4.0"
dsl_type: core_schema
schema:
  sections:
    - inputs
    - outputs
    - config
    - metadata
  metadata:
    required:
      - provider
"#,
        );
        self.write_shared(
            "instrumentor_mappings.yaml",
            r#"version: "4.0"
dsl_type: instrumentor_mappings
instrumentors:
  traceloop:
    prefix: gen_ai.
  openinference:
    prefix: llm.
  openlit:
    prefix: openlit.
  direct_otel:
    prefixes:
      - otel.
      - custom.
"#,
        );
        self.write_shared(
            "validation_rules.yaml",
            r#"version: "4.0"
dsl_type: validation_rules
schema_validation:
  metadata:
    require_provider: true
    max_fields: 100
  config:
    require_model_recommended: true
    max_fields: 100
detection:
  wildcard_overlap_threshold: 0.8
  min_signature_fields: 2
"#,
        );
        self
    }

    pub fn write_shared(&self, filename: &str, content: &str) {
        fs::write(self.root.join("shared").join(filename), content).expect("write shared file");
    }

    /// Write one raw document into a provider directory, creating it if
    /// needed.
    pub fn write_provider_file(&self, provider: &str, filename: &str, content: &str) {
        let dir = self.provider_dir(provider);
        fs::create_dir_all(&dir).expect("create provider dir");
        fs::write(dir.join(filename), content).expect("write provider file");
    }

    /// Complete minimal provider: one signature pattern, a model
    /// navigation rule, the four mapping sections, and no transforms.
    pub fn add_minimal_provider(
        self,
        provider: &str,
        pattern_name: &str,
        signature_fields: &[&str],
        confidence: f64,
    ) -> Self {
        let fields_yaml: String = signature_fields
            .iter()
            .map(|field| format!("      - {}\n", field))
            .collect();

        self.write_provider_file(
            provider,
            "structure_patterns.yaml",
            &format!(
                r#"version: "4.0"
provider: {provider}
dsl_type: provider_structure_patterns
patterns:
  {pattern_name}:
    signature_fields:
{fields_yaml}    confidence_weight: {confidence}
"#
            ),
        );
        self.write_provider_file(
            provider,
            "navigation_rules.yaml",
            &format!(
                r#"version: "4.0"
provider: {provider}
dsl_type: provider_navigation_rules
navigation_rules:
  model:
    source_field: gen_ai.request.model
    extraction_method: direct_copy
    fallback_value: unknown
"#
            ),
        );
        self.write_provider_file(
            provider,
            "field_mappings.yaml",
            &format!(
                r#"version: "4.0"
provider: {provider}
dsl_type: provider_field_mappings
field_mappings:
  inputs: {{}}
  outputs: {{}}
  config:
    model:
      source_rule: model
  metadata:
    provider:
      source_rule: static_{provider}
"#
            ),
        );
        self.write_provider_file(
            provider,
            "transforms.yaml",
            &format!(
                r#"version: "4.0"
provider: {provider}
dsl_type: provider_transforms
transforms: {{}}
"#
            ),
        );
        self
    }

    /// OpenAI provider with the full shape the end-to-end scenarios
    /// exercise: traceloop + openinference patterns, routed model rule,
    /// message transforms, and token summation.
    pub fn add_openai_provider(self) -> Self {
        self.write_provider_file(
            "openai",
            "structure_patterns.yaml",
            r#"version: "4.0"
provider: openai
dsl_type: provider_structure_patterns
patterns:
  traceloop_openai:
    signature_fields:
      - gen_ai.request.model
      - gen_ai.system
      - gen_ai.usage.completion_tokens
      - gen_ai.usage.prompt_tokens
    confidence_weight: 0.95
    priority: 1
  openinference_openai:
    signature_fields:
      - llm.model_name
      - llm.provider
    confidence_weight: 0.9
    priority: 2
"#,
        );
        self.write_provider_file(
            "openai",
            "navigation_rules.yaml",
            r#"version: "4.0"
provider: openai
dsl_type: provider_navigation_rules
navigation_rules:
  traceloop_model:
    source_field: gen_ai.request.model
    extraction_method: direct_copy
    fallback_value: unknown
  openinference_model:
    source_field: llm.model_name
    extraction_method: direct_copy
    fallback_value: unknown
  input_messages:
    source_field: llm.input_messages
    extraction_method: array_flatten
    fallback_value: []
  output_messages:
    source_field: llm.output_messages
    extraction_method: array_flatten
    fallback_value: []
  temperature:
    source_field: gen_ai.request.temperature
    extraction_method: direct_copy
    fallback_value: null
"#,
        );
        self.write_provider_file(
            "openai",
            "field_mappings.yaml",
            r#"version: "4.0"
provider: openai
dsl_type: provider_field_mappings
field_mappings:
  inputs:
    user_content:
      source_rule: user_message_content
    chat_history:
      source_rule: input_messages
  outputs:
    assistant_content:
      source_rule: assistant_message_content
  config:
    model:
      source_rule: model
    temperature:
      source_rule: temperature
  metadata:
    provider:
      source_rule: static_openai
    total_tokens:
      source_rule: token_total
"#,
        );
        self.write_provider_file(
            "openai",
            "transforms.yaml",
            r#"version: "4.0"
provider: openai
dsl_type: provider_transforms
transforms:
  user_message_content:
    implementation: extract_user_message_content
    parameters:
      source_field: llm.input_messages
      role_filter: user
      content_field: content
      join_multiple: true
      separator: "\n\n"
  assistant_message_content:
    implementation: extract_assistant_message_content
    parameters:
      source_field: llm.output_messages
      role_filter: assistant
      content_field: content
      join_multiple: true
      separator: "\n"
  token_total:
    implementation: sum_fields
    parameters:
      source_fields:
        - gen_ai.usage.prompt_tokens
        - gen_ai.usage.completion_tokens
      fallback_value: 0
"#,
        );
        self
    }
}
