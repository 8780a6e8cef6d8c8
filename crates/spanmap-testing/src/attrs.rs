// Canonical attribute maps used across the workspace's scenario tests.

use serde_json::{Map, Value, json};

fn as_map(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap_or_default()
}

/// Exact traceloop/OpenAI signature: all four usage fields present.
pub fn traceloop_openai_exact() -> Map<String, Value> {
    as_map(json!({
        "gen_ai.request.model": "gpt-4",
        "gen_ai.system": "openai",
        "gen_ai.usage.completion_tokens": 50,
        "gen_ai.usage.prompt_tokens": 100
    }))
}

/// OpenInference span that only subset-matches (extra message array).
pub fn openinference_openai_subset() -> Map<String, Value> {
    as_map(json!({
        "llm.model_name": "gpt-4",
        "llm.provider": "openai",
        "llm.input_messages": [{"role": "user", "content": "hi"}]
    }))
}

/// Two user messages, exercising the joining transform.
pub fn openinference_multi_message() -> Map<String, Value> {
    as_map(json!({
        "llm.model_name": "gpt-4",
        "llm.provider": "openai",
        "llm.input_messages": [
            {"role": "user", "content": "A"},
            {"role": "user", "content": "B"}
        ]
    }))
}

/// Flattened OpenInference keys that normalize to a wildcard pattern.
pub fn openinference_flattened() -> Map<String, Value> {
    as_map(json!({
        "llm.input_messages.0.message.role": "user",
        "llm.input_messages.0.message.content": "hi",
        "llm.model_name": "gpt-4"
    }))
}

/// Attributes no signature or indicator matches.
pub fn unmatched() -> Map<String, Value> {
    as_map(json!({
        "custom.field": "x",
        "other": "y"
    }))
}

/// Anthropic span distinguished only by attribute values.
pub fn anthropic_by_values() -> Map<String, Value> {
    as_map(json!({
        "gen_ai.request.model": "claude-3-sonnet",
        "gen_ai.system": "anthropic"
    }))
}
