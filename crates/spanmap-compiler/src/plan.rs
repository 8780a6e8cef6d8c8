// Extraction plan compilation.
//
// Each field mapping's source_rule resolves to one tagged instruction:
//   static_<literal>            -> Static
//   name of a provider transform -> Transform over the extracted map
//   name of a navigation rule    -> DirectNavigation
//   instrumentor-prefixed name,
//   or a base with prefixed
//   variants                     -> InstrumentorRouted (null tail)
//   anything else                -> Null

use serde_json::Value;
use std::collections::BTreeMap;

use spanmap_types::{
    ExtractionPlan, FieldMapping, Instruction, NavigationRule, PlanStep, RoutedAlternative, Section,
};

use crate::loader::ProviderConfig;

/// Rule-name prefixes that select an instrumentor-specific variant.
pub const INSTRUMENTOR_PREFIXES: [&str; 3] = ["traceloop_", "openinference_", "openlit_"];

/// Compile the ordered extraction plan for one provider. Sections are
/// emitted in `inputs, outputs, config, metadata` order.
pub fn compile_extraction_plan(config: &ProviderConfig) -> ExtractionPlan {
    let navigation = &config.navigation_rules.navigation_rules;
    let transforms = &config.transforms.transforms;

    let mut steps = Vec::new();
    for section in Section::ALL {
        let Some(mappings) = config.field_mappings.field_mappings.section(section) else {
            continue;
        };
        for (target_field, mapping) in mappings {
            let instruction = compile_instruction(mapping, navigation, transforms);
            let fallback = fallback_for(&mapping.source_rule, navigation);
            steps.push(PlanStep {
                section,
                target_field: target_field.clone(),
                instruction,
                fallback,
            });
        }
    }

    ExtractionPlan {
        provider: config.name.clone(),
        steps,
    }
}

fn compile_instruction(
    mapping: &FieldMapping,
    navigation: &BTreeMap<String, NavigationRule>,
    transforms: &BTreeMap<String, spanmap_types::TransformSpec>,
) -> Instruction {
    let source_rule = mapping.source_rule.as_str();

    if let Some(literal) = source_rule.strip_prefix("static_") {
        return Instruction::Static {
            value: Value::String(literal.to_string()),
        };
    }

    // Transforms shadow navigation rules of the same name.
    if let Some(spec) = transforms.get(source_rule) {
        return Instruction::Transform {
            name: source_rule.to_string(),
            implementation: spec.implementation.clone(),
            parameters: spec.parameters.clone(),
        };
    }

    if let Some(rule) = navigation.get(source_rule) {
        return Instruction::DirectNavigation {
            rule: source_rule.to_string(),
            navigation: rule.clone(),
        };
    }

    // An instrumentor-prefixed rule that wasn't found routes on its base
    // name; a bare base name routes on its prefixed variants.
    let base_rule = INSTRUMENTOR_PREFIXES
        .iter()
        .find_map(|prefix| source_rule.strip_prefix(prefix))
        .unwrap_or(source_rule);

    let alternatives = routed_alternatives(base_rule, navigation);
    if alternatives.is_empty() {
        Instruction::Null
    } else {
        Instruction::InstrumentorRouted { alternatives }
    }
}

/// Collect every `<instrumentor>_<base_rule>` navigation rule, keyed by
/// the instrumentor prefix detected at runtime.
fn routed_alternatives(
    base_rule: &str,
    navigation: &BTreeMap<String, NavigationRule>,
) -> Vec<RoutedAlternative> {
    let suffix = format!("_{}", base_rule);
    navigation
        .iter()
        .filter_map(|(rule_name, rule)| {
            let instrumentor = rule_name.strip_suffix(&suffix)?;
            if instrumentor.is_empty() {
                return None;
            }
            Some(RoutedAlternative {
                instrumentor: instrumentor.to_string(),
                rule: rule_name.clone(),
                navigation: rule.clone(),
            })
        })
        .collect()
}

/// Fallback literal for a plan step: the navigation rule's fallback when
/// the source rule names one, null otherwise.
fn fallback_for(source_rule: &str, navigation: &BTreeMap<String, NavigationRule>) -> Value {
    navigation
        .get(source_rule)
        .map(|rule| rule.fallback_value.clone())
        .unwrap_or(Value::Null)
}
