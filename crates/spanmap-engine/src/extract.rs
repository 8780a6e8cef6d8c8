// Two-pass extraction.
//
// PASS 1 builds the extracted intermediate map: a copy of the raw
// attributes plus the output of every direct navigation rule, written
// under the rule's name. PASS 2 interprets the compiled plan in section
// order; transforms read the extracted map, direct navigation reads the
// raw attributes. No step failure escapes - faults substitute the step's
// fallback literal.

use serde_json::{Map, Value};

use spanmap_types::sink::{DiagnosticSink, Level, emit};
use spanmap_types::{
    AttributeMap, ExtractionMethod, ExtractionPlan, Instruction, NavigationRule, NormalizedEvent,
    PlanStep,
};

use crate::transforms::{Params, TransformFn, TransformTable};

/// A plan materialized for execution: transform implementations resolved
/// against the registry. Built lazily per provider and cached by the
/// bundle loader.
pub struct ExtractionProgram {
    pub provider: String,
    steps: Vec<CompiledStep>,
    /// Direct navigation rules referenced by the plan, executed in PASS 1.
    pass_one: Vec<(String, NavigationRule)>,
}

struct CompiledStep {
    step: PlanStep,
    op: CompiledOp,
}

enum CompiledOp {
    Static(Value),
    Navigate(NavigationRule),
    Transform {
        name: String,
        func: Option<TransformFn>,
        parameters: Params,
    },
    Routed(Vec<(String, NavigationRule)>),
    Null,
}

impl ExtractionProgram {
    /// Materialize a serialized plan: resolve transform implementations
    /// and collect the PASS 1 rule set.
    pub fn materialize(plan: &ExtractionPlan, transforms: &TransformTable) -> Self {
        let mut steps = Vec::with_capacity(plan.steps.len());
        let mut pass_one: Vec<(String, NavigationRule)> = Vec::new();

        for step in &plan.steps {
            let op = match &step.instruction {
                Instruction::Static { value } => CompiledOp::Static(value.clone()),
                Instruction::DirectNavigation { rule, navigation } => {
                    if !pass_one.iter().any(|(name, _)| name == rule) {
                        pass_one.push((rule.clone(), navigation.clone()));
                    }
                    CompiledOp::Navigate(navigation.clone())
                }
                Instruction::Transform {
                    name,
                    implementation,
                    parameters,
                } => CompiledOp::Transform {
                    name: name.clone(),
                    func: transforms.get(implementation),
                    parameters: parameters.clone(),
                },
                Instruction::InstrumentorRouted { alternatives } => CompiledOp::Routed(
                    alternatives
                        .iter()
                        .map(|alt| (alt.instrumentor.clone(), alt.navigation.clone()))
                        .collect(),
                ),
                Instruction::Null => CompiledOp::Null,
            };
            steps.push(CompiledStep {
                step: step.clone(),
                op,
            });
        }

        Self {
            provider: plan.provider.clone(),
            steps,
            pass_one,
        }
    }

    /// Execute both passes. Returns the event sections and the number of
    /// step faults absorbed.
    pub fn run(
        &self,
        attributes: &AttributeMap,
        instrumentor: &str,
        sink: Option<&dyn DiagnosticSink>,
    ) -> (NormalizedEvent, usize) {
        let extracted = self.build_extracted_map(attributes);

        let mut event = NormalizedEvent::new();
        let mut faults = 0usize;

        for compiled in &self.steps {
            let value = match &compiled.op {
                CompiledOp::Static(value) => value.clone(),
                CompiledOp::Navigate(rule) => execute_navigation(rule, attributes),
                CompiledOp::Transform {
                    name,
                    func,
                    parameters,
                } => match func {
                    Some(func) => match func(&extracted, parameters) {
                        Ok(value) => value,
                        Err(err) => {
                            faults += 1;
                            emit(
                                sink,
                                Level::Debug,
                                &format!(
                                    "Transform {} failed for {}.{}: {}",
                                    name,
                                    compiled.step.section.as_str(),
                                    compiled.step.target_field,
                                    err
                                ),
                            );
                            compiled.step.fallback.clone()
                        }
                    },
                    None => {
                        faults += 1;
                        emit(
                            sink,
                            Level::Debug,
                            &format!("Unknown transform implementation for {}", name),
                        );
                        compiled.step.fallback.clone()
                    }
                },
                CompiledOp::Routed(alternatives) => alternatives
                    .iter()
                    .find(|(candidate, _)| candidate == instrumentor)
                    .map(|(_, rule)| execute_navigation(rule, attributes))
                    .unwrap_or(Value::Null),
                CompiledOp::Null => Value::Null,
            };

            event
                .section_mut(compiled.step.section)
                .insert(compiled.step.target_field.clone(), value);
        }

        (event, faults)
    }

    /// PASS 1: raw attribute copy plus resolved direct rules under their
    /// source-rule names.
    fn build_extracted_map(&self, attributes: &AttributeMap) -> Map<String, Value> {
        let mut extracted = attributes.clone();
        for (rule_name, rule) in &self.pass_one {
            let value = execute_navigation(rule, attributes);
            extracted.insert(rule_name.clone(), value);
        }
        extracted
    }
}

/// Execute one navigation rule against the raw attributes; the rule's
/// fallback substitutes on absence.
pub fn execute_navigation(rule: &NavigationRule, attributes: &AttributeMap) -> Value {
    let value = attributes
        .get(&rule.source_field)
        .cloned()
        .unwrap_or_else(|| rule.fallback_value.clone());

    match rule.extraction_method {
        ExtractionMethod::DirectCopy => value,
        ExtractionMethod::ArrayFlatten => flatten_array(value),
        ExtractionMethod::ObjectMerge => merge_objects(value),
    }
}

/// Recursively flatten nested arrays; non-arrays pass through.
fn flatten_array(value: Value) -> Value {
    let Value::Array(items) = value else {
        return value;
    };

    let mut result = Vec::new();
    for item in items {
        match flatten_array(item) {
            Value::Array(nested) => result.extend(nested),
            flat => result.push(flat),
        }
    }
    Value::Array(result)
}

/// Merge a list of maps left-to-right into a single map. A single map is
/// returned as-is; anything else passes through.
fn merge_objects(value: Value) -> Value {
    let Value::Array(items) = value else {
        return value;
    };

    let mut result = Map::new();
    for item in items {
        if let Value::Object(object) = item {
            result.extend(object);
        }
    }
    Value::Object(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn attrs(value: Value) -> AttributeMap {
        value.as_object().cloned().unwrap_or_default()
    }

    fn rule(source_field: &str, method: ExtractionMethod, fallback: Value) -> NavigationRule {
        NavigationRule {
            source_field: source_field.to_string(),
            extraction_method: method,
            fallback_value: fallback,
        }
    }

    #[test]
    fn test_direct_copy_with_fallback() {
        let attributes = attrs(json!({"gen_ai.request.model": "gpt-4"}));
        let present = rule("gen_ai.request.model", ExtractionMethod::DirectCopy, json!("unknown"));
        let absent = rule("gen_ai.response.model", ExtractionMethod::DirectCopy, json!("unknown"));

        assert_eq!(execute_navigation(&present, &attributes), json!("gpt-4"));
        assert_eq!(execute_navigation(&absent, &attributes), json!("unknown"));
    }

    #[test]
    fn test_array_flatten_recurses() {
        let attributes = attrs(json!({"msgs": [[1, 2], [3, [4, 5]], 6]}));
        let flatten = rule("msgs", ExtractionMethod::ArrayFlatten, json!([]));
        assert_eq!(execute_navigation(&flatten, &attributes), json!([1, 2, 3, 4, 5, 6]));
    }

    #[test]
    fn test_array_flatten_passes_non_arrays_through() {
        let attributes = attrs(json!({"msgs": "scalar"}));
        let flatten = rule("msgs", ExtractionMethod::ArrayFlatten, json!([]));
        assert_eq!(execute_navigation(&flatten, &attributes), json!("scalar"));
    }

    #[test]
    fn test_object_merge_left_to_right() {
        let attributes = attrs(json!({"cfg": [{"a": 1, "b": 1}, {"b": 2}, "skipped"]}));
        let merge = rule("cfg", ExtractionMethod::ObjectMerge, json!({}));
        assert_eq!(execute_navigation(&merge, &attributes), json!({"a": 1, "b": 2}));
    }

    #[test]
    fn test_object_merge_single_map_as_is() {
        let attributes = attrs(json!({"cfg": {"a": 1}}));
        let merge = rule("cfg", ExtractionMethod::ObjectMerge, json!({}));
        assert_eq!(execute_navigation(&merge, &attributes), json!({"a": 1}));
    }
}
