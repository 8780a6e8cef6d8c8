// Signature index compilation.
//
// Forward index: provider -> signatures, used for subset matching.
// Inverted index: signature -> (pattern, confidence), used for exact
// matching. Providers and patterns iterate in sorted order, so collision
// resolution is deterministic across compilations.

use std::collections::{BTreeMap, HashMap};

use spanmap_types::sink::{DiagnosticSink, Level, emit};
use spanmap_types::{InvertedEntry, Signature};

use crate::loader::ProviderConfig;

#[derive(Debug)]
pub struct SignatureIndices {
    pub forward: BTreeMap<String, Vec<Signature>>,
    pub inverted: Vec<InvertedEntry>,
    pub patterns_compiled: usize,
    pub collisions_detected: usize,
}

/// Compile both indices. On collision the strictly higher confidence
/// entry wins; at equal confidence the first insertion is kept. Both the
/// kept and the discarded entries are logged either way.
pub fn compile_signature_indices(
    providers: &BTreeMap<String, ProviderConfig>,
    sink: Option<&dyn DiagnosticSink>,
) -> SignatureIndices {
    let mut forward: BTreeMap<String, Vec<Signature>> = BTreeMap::new();
    let mut inverted: HashMap<Signature, (String, f64)> = HashMap::new();
    let mut patterns_compiled = 0usize;
    let mut collisions_detected = 0usize;

    for (provider_name, config) in providers {
        let mut provider_signatures = Vec::new();

        for (pattern_name, pattern) in &config.structure_patterns.patterns {
            let signature = Signature::new(pattern.signature_fields.iter().cloned());
            let confidence = pattern.confidence_weight;

            provider_signatures.push(signature.clone());
            patterns_compiled += 1;

            match inverted.get(&signature) {
                Some((existing_pattern, existing_confidence)) => {
                    collisions_detected += 1;
                    emit(
                        sink,
                        Level::Warning,
                        &format!(
                            "Signature collision: {:?} held by {} ({:.2}), contested by {} ({:.2})",
                            signature.iter().collect::<Vec<_>>(),
                            existing_pattern,
                            existing_confidence,
                            pattern_name,
                            confidence
                        ),
                    );

                    if confidence > *existing_confidence {
                        emit(
                            sink,
                            Level::Warning,
                            &format!(
                                "Keeping {} over {} ({:.2} > {:.2})",
                                pattern_name, existing_pattern, confidence, existing_confidence
                            ),
                        );
                        inverted.insert(signature, (pattern_name.clone(), confidence));
                    } else {
                        emit(
                            sink,
                            Level::Warning,
                            &format!(
                                "Keeping {} over {} ({:.2} >= {:.2})",
                                existing_pattern, pattern_name, existing_confidence, confidence
                            ),
                        );
                    }
                }
                None => {
                    inverted.insert(signature, (pattern_name.clone(), confidence));
                }
            }
        }

        emit(
            sink,
            Level::Debug,
            &format!(
                "Compiled {} signatures for {}",
                provider_signatures.len(),
                provider_name
            ),
        );
        forward.insert(provider_name.clone(), provider_signatures);
    }

    let mut inverted: Vec<InvertedEntry> = inverted
        .into_iter()
        .map(|(signature, (pattern, confidence))| InvertedEntry {
            signature,
            pattern,
            confidence,
        })
        .collect();
    inverted.sort_by(|a, b| a.signature.cmp(&b.signature));

    emit(
        sink,
        Level::Info,
        &format!(
            "Signature indices: {} providers, {} unique signatures, {} collisions",
            forward.len(),
            inverted.len(),
            collisions_detected
        ),
    );

    SignatureIndices {
        forward,
        inverted,
        patterns_compiled,
        collisions_detected,
    }
}
