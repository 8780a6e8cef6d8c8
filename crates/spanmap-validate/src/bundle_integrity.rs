// Compiled-bundle integrity verification.

use std::path::Path;

use spanmap_engine::parse_pattern_name;
use spanmap_types::CompiledBundle;

use crate::CheckReport;

/// Verify a compiled bundle artifact on disk: structural presence,
/// cross-component provider consistency, inverted-index invariants, and
/// the bundle's own integrity predicate.
pub fn check_bundle(bundle_path: &Path) -> CheckReport {
    let content = match std::fs::read(bundle_path) {
        Ok(content) => content,
        Err(err) => {
            return CheckReport::failed(
                vec![format!("{}: read error: {}", bundle_path.display(), err)],
                0,
            );
        }
    };

    let bundle: CompiledBundle = match serde_json::from_slice(&content) {
        Ok(bundle) => bundle,
        Err(err) => {
            return CheckReport::failed(
                vec![format!(
                    "{}: bundle deserialization failed: {}",
                    bundle_path.display(),
                    err
                )],
                1,
            );
        }
    };

    let mut diagnostics = Vec::new();

    if bundle.provider_signatures.is_empty() {
        diagnostics.push("'provider_signatures' is empty - no providers compiled".to_string());
    }
    if bundle.signature_to_provider.is_empty() {
        diagnostics.push(
            "'signature_to_provider' is empty - inverted index not generated".to_string(),
        );
    }

    diagnostics.extend(verify_provider_consistency(&bundle));
    diagnostics.extend(verify_inverted_index(&bundle));

    if !bundle.validate_integrity() {
        diagnostics.push("bundle integrity predicate returned false".to_string());
    }

    CheckReport {
        ok: diagnostics.is_empty(),
        diagnostics,
        files_checked: 1,
    }
}

/// Every provider must appear in signatures, extraction plans, and field
/// mappings alike.
fn verify_provider_consistency(bundle: &CompiledBundle) -> Vec<String> {
    let mut errors = Vec::new();

    for provider in bundle.provider_signatures.keys() {
        if !bundle.extraction_plans.contains_key(provider) {
            errors.push(format!(
                "provider '{}' has signatures but no extraction plan",
                provider
            ));
        }
        if !bundle.field_mappings.contains_key(provider) {
            errors.push(format!(
                "provider '{}' has signatures but no field mappings",
                provider
            ));
        }
    }

    for provider in bundle.extraction_plans.keys() {
        if !bundle.provider_signatures.contains_key(provider) {
            errors.push(format!(
                "provider '{}' has extraction plan but no signatures",
                provider
            ));
        }
    }

    for provider in bundle.field_mappings.keys() {
        if !bundle.provider_signatures.contains_key(provider) {
            errors.push(format!(
                "provider '{}' has field mappings but no signatures",
                provider
            ));
        }
    }

    errors
}

fn verify_inverted_index(bundle: &CompiledBundle) -> Vec<String> {
    let mut errors = Vec::new();

    let forward_total: usize = bundle.provider_signatures.values().map(Vec::len).sum();
    if bundle.signature_to_provider.len() > forward_total {
        errors.push(format!(
            "inverted index has more signatures ({}) than forward index ({})",
            bundle.signature_to_provider.len(),
            forward_total
        ));
    }

    for entry in &bundle.signature_to_provider {
        let (_, provider) = parse_pattern_name(&entry.pattern);
        if !bundle.provider_signatures.contains_key(&provider) {
            errors.push(format!(
                "inverted index entry '{}' references unknown provider '{}'",
                entry.pattern, provider
            ));
        }
        if !(0.0..=1.0).contains(&entry.confidence) {
            errors.push(format!(
                "pattern '{}' has invalid confidence {} (must be 0-1)",
                entry.pattern, entry.confidence
            ));
        }
    }

    errors
}
