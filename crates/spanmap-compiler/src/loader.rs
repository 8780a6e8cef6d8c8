// Configuration loading: shared files plus the per-provider quartet.

use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use spanmap_types::sink::{DiagnosticSink, Level, emit};
use spanmap_types::{FieldMappingsDoc, NavigationRulesDoc, StructurePatternsDoc, TransformsDoc};

use crate::error::{Error, Result};

/// Files every provider directory must contain to be compiled.
pub const REQUIRED_PROVIDER_FILES: [&str; 4] = [
    "structure_patterns.yaml",
    "navigation_rules.yaml",
    "field_mappings.yaml",
    "transforms.yaml",
];

/// Files the shared configuration directory must contain.
pub const REQUIRED_SHARED_FILES: [&str; 3] = [
    "core_schema.yaml",
    "instrumentor_mappings.yaml",
    "validation_rules.yaml",
];

/// Fully loaded configuration for one provider.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub name: String,
    pub structure_patterns: StructurePatternsDoc,
    pub navigation_rules: NavigationRulesDoc,
    pub field_mappings: FieldMappingsDoc,
    pub transforms: TransformsDoc,
}

/// Shared configuration carried loosely; only `validation_rules` is
/// interpreted downstream, the rest travels with the bundle for hosts.
#[derive(Debug, Clone)]
pub struct SharedConfig {
    pub core_schema: Value,
    pub instrumentor_mappings: Value,
    pub validation_rules: Value,
}

/// Load the three required shared configuration files.
pub fn load_shared(shared_dir: &Path) -> Result<SharedConfig> {
    let mut documents = Vec::with_capacity(REQUIRED_SHARED_FILES.len());

    for filename in REQUIRED_SHARED_FILES {
        let path = shared_dir.join(filename);
        if !path.exists() {
            return Err(Error::ConfigNotFound(path));
        }
        let content = fs::read_to_string(&path)?;
        let document: Value = serde_yaml::from_str(&content)
            .map_err(|err| Error::InvalidConfig(format!("{}: {}", path.display(), err)))?;
        documents.push(document);
    }

    let mut documents = documents.into_iter();
    Ok(SharedConfig {
        core_schema: documents.next().unwrap_or(Value::Null),
        instrumentor_mappings: documents.next().unwrap_or(Value::Null),
        validation_rules: documents.next().unwrap_or(Value::Null),
    })
}

/// Load provider configurations.
///
/// Without a filter, only directories containing all four required files
/// are included; incomplete directories are skipped with a diagnostic.
/// With a filter, the named directory must exist.
pub fn load_providers(
    providers_dir: &Path,
    filter: Option<&str>,
    sink: Option<&dyn DiagnosticSink>,
) -> Result<BTreeMap<String, ProviderConfig>> {
    if !providers_dir.is_dir() {
        return Err(Error::ConfigNotFound(providers_dir.to_path_buf()));
    }

    let mut provider_dirs = Vec::new();

    if let Some(name) = filter {
        let dir = providers_dir.join(name);
        if !dir.is_dir() {
            return Err(Error::ConfigNotFound(dir));
        }
        provider_dirs.push(dir);
    } else {
        for entry in walkdir::WalkDir::new(providers_dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            let entry = entry.map_err(|err| {
                Error::InvalidConfig(format!("failed to scan {}: {}", providers_dir.display(), err))
            })?;
            if !entry.file_type().is_dir() {
                continue;
            }
            let dir = entry.into_path();
            if REQUIRED_PROVIDER_FILES
                .iter()
                .all(|file| dir.join(file).exists())
            {
                provider_dirs.push(dir);
            } else {
                emit(
                    sink,
                    Level::Debug,
                    &format!(
                        "Skipping provider {} - missing required files",
                        dir.display()
                    ),
                );
            }
        }
    }

    if provider_dirs.is_empty() {
        return Err(Error::InvalidConfig(format!(
            "no valid provider directories found in {}",
            providers_dir.display()
        )));
    }

    let mut providers = BTreeMap::new();
    for dir in provider_dirs {
        let name = dir
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| {
                Error::InvalidConfig(format!("provider directory name not UTF-8: {}", dir.display()))
            })?
            .to_string();

        let config = load_provider_files(&dir, &name)?;
        emit(sink, Level::Debug, &format!("Loaded provider: {}", name));
        providers.insert(name, config);
    }

    Ok(providers)
}

fn load_provider_files(provider_dir: &Path, provider_name: &str) -> Result<ProviderConfig> {
    let structure_patterns: StructurePatternsDoc =
        load_doc(provider_dir, "structure_patterns.yaml")?;
    let navigation_rules: NavigationRulesDoc = load_doc(provider_dir, "navigation_rules.yaml")?;
    let field_mappings: FieldMappingsDoc = load_doc(provider_dir, "field_mappings.yaml")?;
    let transforms: TransformsDoc = load_doc(provider_dir, "transforms.yaml")?;

    // Every file's declared provider must match its directory.
    for (filename, declared) in [
        ("structure_patterns.yaml", &structure_patterns.provider),
        ("navigation_rules.yaml", &navigation_rules.provider),
        ("field_mappings.yaml", &field_mappings.provider),
        ("transforms.yaml", &transforms.provider),
    ] {
        if declared != provider_name {
            return Err(Error::InvalidConfig(format!(
                "provider name mismatch in {}: expected {}, got {}",
                provider_dir.join(filename).display(),
                provider_name,
                declared
            )));
        }
    }

    Ok(ProviderConfig {
        name: provider_name.to_string(),
        structure_patterns,
        navigation_rules,
        field_mappings,
        transforms,
    })
}

fn load_doc<T: serde::de::DeserializeOwned>(provider_dir: &Path, filename: &str) -> Result<T> {
    let path = provider_dir.join(filename);
    if !path.exists() {
        return Err(Error::ConfigNotFound(path));
    }
    let content = fs::read_to_string(&path)?;
    serde_yaml::from_str(&content)
        .map_err(|err| Error::InvalidConfig(format!("{}: {}", path.display(), err)))
}
