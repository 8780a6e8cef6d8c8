// Provider-level validation, applied after loading and before indexing.

use spanmap_types::Section;

use crate::error::{Error, Result};
use crate::loader::ProviderConfig;

/// Validate one provider configuration against the structural invariants:
/// at least one pattern, >= 2 signature fields per pattern, confidence in
/// [0.5, 1.0], all four mapping sections present, and a `provider` field
/// in the metadata section.
pub fn validate_provider(config: &ProviderConfig) -> Result<()> {
    let patterns = &config.structure_patterns.patterns;
    if patterns.is_empty() {
        return Err(Error::InvalidConfig(format!(
            "no patterns defined for provider {}",
            config.name
        )));
    }

    for (pattern_name, pattern) in patterns {
        if pattern.signature_fields.len() < 2 {
            return Err(Error::InvalidConfig(format!(
                "pattern {} in provider {} must have at least 2 signature fields",
                pattern_name, config.name
            )));
        }

        let confidence = pattern.confidence_weight;
        if !(0.5..=1.0).contains(&confidence) {
            return Err(Error::InvalidConfig(format!(
                "pattern {} confidence must be between 0.5 and 1.0, got {}",
                pattern_name, confidence
            )));
        }

        if let Some(priority) = pattern.priority
            && priority == 0
        {
            return Err(Error::InvalidConfig(format!(
                "pattern {} priority must be a positive integer",
                pattern_name
            )));
        }
    }

    let mappings = &config.field_mappings.field_mappings;
    for section in Section::ALL {
        if mappings.section(section).is_none() {
            return Err(Error::InvalidConfig(format!(
                "provider {} missing required section: {}",
                config.name,
                section.as_str()
            )));
        }
    }

    if let Some(metadata) = mappings.section(Section::Metadata)
        && !metadata.contains_key("provider")
    {
        return Err(Error::InvalidConfig(format!(
            "provider {} metadata section must include 'provider' field",
            config.name
        )));
    }

    Ok(())
}
