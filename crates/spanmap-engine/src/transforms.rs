// Process-wide transform registry.
//
// Transforms are generic, provider-agnostic pure functions; all
// provider-specific behavior arrives through the YAML-configured
// parameters. Every transform is total over well-typed input - an
// internal fault surfaces as TransformError, which the plan interpreter
// converts into the step's fallback literal.

use once_cell::sync::Lazy;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Parameters as copied from the provider's transforms.yaml.
pub type Params = BTreeMap<String, Value>;

/// Extracted intermediate map handed to transforms (raw attributes plus
/// resolved navigation-rule outputs).
pub type ExtractedMap = Map<String, Value>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformError(pub String);

impl fmt::Display for TransformError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "transform failed: {}", self.0)
    }
}

impl std::error::Error for TransformError {}

pub type TransformFn = fn(&ExtractedMap, &Params) -> Result<Value, TransformError>;

/// Named table of transform functions. The process-wide instance is
/// built once; tests may compose a local table with overrides.
pub struct TransformTable {
    entries: HashMap<String, TransformFn>,
}

impl TransformTable {
    /// Table with all built-in transforms registered.
    pub fn builtin() -> Self {
        let mut entries: HashMap<String, TransformFn> = HashMap::new();
        entries.insert(
            "extract_user_message_content".to_string(),
            extract_user_message_content,
        );
        entries.insert(
            "extract_assistant_message_content".to_string(),
            extract_assistant_message_content,
        );
        entries.insert("sum_fields".to_string(), sum_fields);
        entries.insert(
            "detect_instrumentor_framework".to_string(),
            detect_instrumentor_framework,
        );
        entries.insert("parse_json_or_direct".to_string(), parse_json_or_direct);
        entries.insert("serialize_to_json".to_string(), serialize_to_json);
        entries.insert("parse_messages".to_string(), parse_messages);
        entries.insert("extract_finish_reason".to_string(), extract_finish_reason);
        entries.insert("create_user_message".to_string(), create_user_message);
        entries.insert(
            "create_assistant_message".to_string(),
            create_assistant_message,
        );
        entries.insert("create_system_message".to_string(), create_system_message);
        entries.insert(
            "error_message_extraction".to_string(),
            error_message_extraction,
        );
        Self { entries }
    }

    pub fn get(&self, implementation: &str) -> Option<TransformFn> {
        self.entries.get(implementation).copied()
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.keys().map(String::as_str).collect()
    }

    /// Register or replace an implementation (test composition).
    pub fn with_override(mut self, implementation: impl Into<String>, func: TransformFn) -> Self {
        self.entries.insert(implementation.into(), func);
        self
    }
}

static REGISTRY: Lazy<TransformTable> = Lazy::new(TransformTable::builtin);

/// The process-wide transform registry, initialized on first use.
pub fn registry() -> &'static TransformTable {
    &REGISTRY
}

// --- Parameter helpers ---

fn param_str<'a>(params: &'a Params, key: &str, default: &'a str) -> &'a str {
    params.get(key).and_then(Value::as_str).unwrap_or(default)
}

fn param_bool(params: &Params, key: &str, default: bool) -> bool {
    params.get(key).and_then(Value::as_bool).unwrap_or(default)
}

/// Stringify a scalar the way a dynamic runtime would.
fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

// --- Message collection ---

/// Collect message objects from the extracted map. Handles both an
/// in-place array under `source_field` and flattened indexed keys
/// (`<source_field>.<index>...role` / `...content`).
fn collect_messages(extracted: &ExtractedMap, source_field: &str) -> Vec<Map<String, Value>> {
    if let Some(Value::Array(items)) = extracted.get(source_field) {
        return items
            .iter()
            .filter_map(Value::as_object)
            .cloned()
            .collect();
    }

    // Flattened reconstruction, e.g. "llm.input_messages.0.message.role".
    let prefix = format!("{}.", source_field);
    let mut by_index: BTreeMap<u64, Map<String, Value>> = BTreeMap::new();

    for (key, value) in extracted {
        let Some(rest) = key.strip_prefix(&prefix) else {
            continue;
        };
        let mut parts = rest.split('.');
        let Some(index) = parts.next().and_then(|part| part.parse::<u64>().ok()) else {
            continue;
        };
        let remaining: Vec<&str> = parts.collect();
        let Some(field) = message_field_name(&remaining) else {
            continue;
        };
        by_index
            .entry(index)
            .or_default()
            .insert(field.to_string(), value.clone());
    }

    by_index.into_values().collect()
}

/// Locate the role/content field in the key segments after the index.
/// Accepts both `role` and the OpenInference `message.role` nesting.
fn message_field_name<'a>(parts: &[&'a str]) -> Option<&'a str> {
    parts
        .iter()
        .copied()
        .find(|part| *part == "role" || *part == "content")
}

/// Read a message field, tolerating both `{"role": ...}` and the
/// OpenInference `{"message.role": ...}` shapes.
fn message_field<'a>(message: &'a Map<String, Value>, field: &str) -> Option<&'a Value> {
    message
        .get(field)
        .or_else(|| message.get(&format!("message.{}", field)))
}

fn extract_message_content(
    extracted: &ExtractedMap,
    params: &Params,
    default_source: &str,
    default_role: &str,
    default_separator: &str,
) -> Result<Value, TransformError> {
    let source_field = param_str(params, "source_field", default_source);
    let role_filter = param_str(params, "role_filter", default_role);
    let content_field = param_str(params, "content_field", "content");
    let join_multiple = param_bool(params, "join_multiple", true);
    let separator = param_str(params, "separator", default_separator);

    let mut contents = Vec::new();
    for message in collect_messages(extracted, source_field) {
        let role_matches = message_field(&message, "role")
            .map(|role| value_to_string(role) == role_filter)
            .unwrap_or(false);
        if !role_matches {
            continue;
        }
        if let Some(content) = message_field(&message, content_field) {
            let text = value_to_string(content);
            if !text.is_empty() {
                contents.push(text);
            }
        }
    }

    let joined = if join_multiple {
        contents.join(separator)
    } else {
        contents.into_iter().next().unwrap_or_default()
    };

    Ok(Value::String(joined))
}

// --- Built-in transforms ---

/// Filter a message array by role and collect each element's content.
pub fn extract_user_message_content(
    extracted: &ExtractedMap,
    params: &Params,
) -> Result<Value, TransformError> {
    extract_message_content(extracted, params, "llm.input_messages", "user", "\n\n")
}

pub fn extract_assistant_message_content(
    extracted: &ExtractedMap,
    params: &Params,
) -> Result<Value, TransformError> {
    extract_message_content(extracted, params, "llm.output_messages", "assistant", "\n")
}

/// Sum numeric values at the configured keys; the fallback value is
/// returned when the total is zero and nothing numeric was seen.
pub fn sum_fields(extracted: &ExtractedMap, params: &Params) -> Result<Value, TransformError> {
    let source_fields = params
        .get("source_fields")
        .and_then(Value::as_array)
        .map(|fields| {
            fields
                .iter()
                .filter_map(Value::as_str)
                .collect::<Vec<&str>>()
        })
        .unwrap_or_default();

    let mut total = 0.0f64;
    let mut saw_numeric = false;
    for field in source_fields {
        if let Some(value) = extracted.get(field).and_then(Value::as_f64) {
            total += value;
            saw_numeric = true;
        }
    }

    if total == 0.0 && !saw_numeric {
        return Ok(params.get("fallback_value").cloned().unwrap_or(Value::Null));
    }

    if total.fract() == 0.0 && total.abs() < i64::MAX as f64 {
        Ok(Value::from(total as i64))
    } else {
        Ok(Value::from(total))
    }
}

/// Return the instrumentor whose required attribute set is fully present
/// in the extracted map; `"unknown"` when none applies.
pub fn detect_instrumentor_framework(
    extracted: &ExtractedMap,
    params: &Params,
) -> Result<Value, TransformError> {
    let Some(Value::Object(attribute_patterns)) = params.get("attribute_patterns") else {
        return Ok(Value::String("unknown".to_string()));
    };

    for (instrumentor, required) in attribute_patterns {
        let Some(required) = required.as_array() else {
            continue;
        };
        let all_present = required
            .iter()
            .filter_map(Value::as_str)
            .all(|key| extracted.contains_key(key));
        if all_present && !required.is_empty() {
            return Ok(Value::String(instrumentor.clone()));
        }
    }

    Ok(Value::String("unknown".to_string()))
}

/// Parse a JSON string at `source_field`, or return the value unchanged
/// when it is not a string or not valid JSON.
pub fn parse_json_or_direct(
    extracted: &ExtractedMap,
    params: &Params,
) -> Result<Value, TransformError> {
    let source_field = param_str(params, "source_field", "");
    let Some(value) = extracted.get(source_field) else {
        return Ok(Value::Null);
    };
    if let Value::String(s) = value
        && let Ok(parsed) = serde_json::from_str::<Value>(s)
    {
        return Ok(parsed);
    }
    Ok(value.clone())
}

/// Serialize the value at `source_field` to a JSON string.
pub fn serialize_to_json(
    extracted: &ExtractedMap,
    params: &Params,
) -> Result<Value, TransformError> {
    let source_field = param_str(params, "source_field", "");
    let Some(value) = extracted.get(source_field) else {
        return Ok(Value::Null);
    };
    serde_json::to_string(value)
        .map(Value::String)
        .map_err(|err| TransformError(err.to_string()))
}

/// Normalize the value at `source_field` into a chat-history list of
/// `{role, content}` objects. Accepts a JSON-encoded string, a message
/// array (plain or OpenInference-nested), a single message object, or a
/// bare scalar (wrapped as a user message).
pub fn parse_messages(extracted: &ExtractedMap, params: &Params) -> Result<Value, TransformError> {
    let source_field = param_str(params, "source_field", "llm.input_messages");
    let Some(value) = extracted.get(source_field) else {
        return Ok(Value::Array(Vec::new()));
    };

    Ok(Value::Array(normalize_message_value(value)))
}

fn normalize_message_value(value: &Value) -> Vec<Value> {
    match value {
        Value::String(s) => match serde_json::from_str::<Value>(s) {
            Ok(parsed) => normalize_message_value(&parsed),
            Err(_) => vec![chat_message("user", s)],
        },
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_object)
            .map(normalize_message_object)
            .collect(),
        Value::Object(message) => vec![normalize_message_object(message)],
        Value::Null => Vec::new(),
        other => vec![chat_message("user", &value_to_string(other))],
    }
}

fn normalize_message_object(message: &Map<String, Value>) -> Value {
    let role = message_field(message, "role")
        .map(value_to_string)
        .unwrap_or_else(|| "user".to_string());
    let content = message_field(message, "content")
        .map(value_to_string)
        .unwrap_or_default();
    chat_message(&role, &content)
}

fn chat_message(role: &str, content: &str) -> Value {
    let mut message = Map::new();
    message.insert("role".to_string(), Value::String(role.to_string()));
    message.insert("content".to_string(), Value::String(content.to_string()));
    Value::Object(message)
}

/// Finish reason from a completion payload: a direct string, the first
/// element of a reasons array, or the `choices[0].finish_reason` of a
/// JSON-encoded response. Defaults to `"stop"`.
pub fn extract_finish_reason(
    extracted: &ExtractedMap,
    params: &Params,
) -> Result<Value, TransformError> {
    let source_field = param_str(params, "source_field", "gen_ai.response.finish_reasons");
    let default = param_str(params, "default", "stop");

    let Some(value) = extracted.get(source_field) else {
        return Ok(Value::String(default.to_string()));
    };

    let reason = match value {
        Value::String(s) => match serde_json::from_str::<Value>(s) {
            Ok(response) => finish_reason_from_response(&response),
            Err(_) => Some(s.clone()),
        },
        Value::Array(reasons) => reasons.first().map(value_to_string),
        other => finish_reason_from_response(other),
    };

    Ok(Value::String(
        reason.unwrap_or_else(|| default.to_string()),
    ))
}

fn finish_reason_from_response(response: &Value) -> Option<String> {
    if let Some(choices) = response.get("choices").and_then(Value::as_array) {
        return choices
            .first()
            .and_then(|choice| choice.get("finish_reason"))
            .map(value_to_string);
    }
    response.get("finish_reason").map(value_to_string)
}

fn create_message_with_role(
    extracted: &ExtractedMap,
    params: &Params,
    role: &str,
) -> Result<Value, TransformError> {
    let source_field = param_str(params, "source_field", "");
    let content = extracted
        .get(source_field)
        .map(value_to_string)
        .unwrap_or_default();
    Ok(Value::Array(vec![chat_message(role, &content)]))
}

/// Wrap the value at `source_field` as a single-element user message list.
pub fn create_user_message(
    extracted: &ExtractedMap,
    params: &Params,
) -> Result<Value, TransformError> {
    create_message_with_role(extracted, params, "user")
}

pub fn create_assistant_message(
    extracted: &ExtractedMap,
    params: &Params,
) -> Result<Value, TransformError> {
    create_message_with_role(extracted, params, "assistant")
}

pub fn create_system_message(
    extracted: &ExtractedMap,
    params: &Params,
) -> Result<Value, TransformError> {
    create_message_with_role(extracted, params, "system")
}

/// Pull a human-readable error message out of the value at
/// `source_field`: a string passes through, objects are probed for the
/// common message fields, anything else is stringified.
pub fn error_message_extraction(
    extracted: &ExtractedMap,
    params: &Params,
) -> Result<Value, TransformError> {
    let source_field = param_str(params, "source_field", "error");
    let Some(value) = extracted.get(source_field) else {
        return Ok(Value::Null);
    };

    let message = match value {
        Value::String(s) => s.clone(),
        Value::Object(object) => ["message", "error", "description", "detail"]
            .iter()
            .find_map(|field| object.get(*field))
            .map(value_to_string)
            .unwrap_or_else(|| Value::Object(object.clone()).to_string()),
        other => other.to_string(),
    };

    Ok(Value::String(message))
}
