// Attribute key normalization.
//
// Instrumentors flatten message arrays into indexed keys
// (`llm.input_messages.0.message.role`). Detection reconstructs the
// structural pattern by truncating at the first integer segment and
// terminating the key with `*`, so differently sized arrays collapse to
// the same signature field.

use std::collections::BTreeSet;

/// Normalize a set of attribute keys: a key whose dot-separated segments
/// contain a non-negative integer is replaced by its prefix plus `.*`;
/// keys without an integer segment pass through unchanged.
pub fn normalize_attribute_keys<'a, I>(keys: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut normalized = BTreeSet::new();

    for key in keys {
        match wildcard_form(key) {
            Some(pattern) => {
                normalized.insert(pattern);
            }
            None => {
                normalized.insert(key.to_string());
            }
        }
    }

    normalized
}

/// Wildcard form of one key, or None when it has no integer segment.
pub fn wildcard_form(key: &str) -> Option<String> {
    let mut prefix_parts = Vec::new();

    for part in key.split('.') {
        if is_index_segment(part) {
            return Some(if prefix_parts.is_empty() {
                "*".to_string()
            } else {
                format!("{}.*", prefix_parts.join("."))
            });
        }
        prefix_parts.push(part);
    }

    None
}

fn is_index_segment(part: &str) -> bool {
    !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalize(keys: &[&str]) -> BTreeSet<String> {
        normalize_attribute_keys(keys.iter().copied())
    }

    #[test]
    fn test_flattened_keys_collapse_to_wildcard() {
        let normalized = normalize(&[
            "llm.input_messages.0.message.role",
            "llm.input_messages.0.message.content",
            "llm.input_messages.1.message.role",
        ]);
        let expected: BTreeSet<String> = ["llm.input_messages.*".to_string()].into();
        assert_eq!(normalized, expected);
    }

    #[test]
    fn test_single_and_multiple_indices_normalize_identically() {
        let one = normalize(&["k.0.x"]);
        let two = normalize(&["k.0.x", "k.1.x"]);
        let expected: BTreeSet<String> = ["k.*".to_string()].into();
        assert_eq!(one, expected);
        assert_eq!(two, expected);
    }

    #[test]
    fn test_plain_keys_pass_through() {
        let normalized = normalize(&["llm.model_name", "gen_ai.system"]);
        assert!(normalized.contains("llm.model_name"));
        assert!(normalized.contains("gen_ai.system"));
        assert_eq!(normalized.len(), 2);
    }

    #[test]
    fn test_mixed_keys() {
        let normalized = normalize(&["llm.input_messages.0.message.role", "llm.model_name"]);
        assert!(normalized.contains("llm.input_messages.*"));
        assert!(normalized.contains("llm.model_name"));
        assert_eq!(normalized.len(), 2);
    }

    #[test]
    fn test_leading_index_becomes_bare_wildcard() {
        assert_eq!(wildcard_form("0.role"), Some("*".to_string()));
    }

    #[test]
    fn test_non_numeric_segments_are_not_indices() {
        assert_eq!(wildcard_form("llm.v2.model"), None);
        assert_eq!(wildcard_form("llm.0x1.model"), None);
    }
}
