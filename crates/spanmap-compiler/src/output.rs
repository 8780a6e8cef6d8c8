// Bundle artifact output: content hashing and atomic writes.

use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use spanmap_types::CompiledBundle;

use crate::error::Result;
use crate::loader::ProviderConfig;

/// Bundle artifact filename inside the output directory.
pub const BUNDLE_FILE: &str = "compiled_providers.json";

/// Metadata sidecar filename inside the output directory.
pub const METADATA_FILE: &str = "bundle_metadata.json";

/// SHA-256 over every YAML input, in sorted path order: the four files of
/// each compiled provider, then the shared directory. Identical inputs
/// always produce the identical hash.
pub fn source_hash(
    providers_dir: &Path,
    shared_dir: &Path,
    providers: &BTreeMap<String, ProviderConfig>,
) -> Result<String> {
    let mut hasher = Sha256::new();

    for provider_name in providers.keys() {
        let provider_dir = providers_dir.join(provider_name);
        for path in sorted_yaml_files(&provider_dir)? {
            hasher.update(fs::read(&path)?);
        }
    }

    for path in sorted_yaml_files(shared_dir)? {
        hasher.update(fs::read(&path)?);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

fn sorted_yaml_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    if !dir.is_dir() {
        return Ok(files);
    }
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().and_then(|ext| ext.to_str()) == Some("yaml") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Write the bundle and its metadata sidecar atomically (temp file plus
/// rename within the output directory). Returns both final paths.
pub fn write_bundle(output_dir: &Path, bundle: &CompiledBundle) -> Result<(PathBuf, PathBuf)> {
    fs::create_dir_all(output_dir)?;

    let bundle_path = output_dir.join(BUNDLE_FILE);
    let metadata_path = output_dir.join(METADATA_FILE);

    let bundle_json = serde_json::to_vec_pretty(bundle)?;
    let metadata_json = serde_json::to_vec_pretty(&bundle.build_metadata)?;

    write_atomic(&bundle_path, &bundle_json)?;
    write_atomic(&metadata_path, &metadata_json)?;

    Ok((bundle_path, metadata_path))
}

fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let tmp_path = path.with_extension("tmp");
    fs::write(&tmp_path, contents)?;
    fs::rename(&tmp_path, path)?;
    Ok(())
}
