use std::path::Path;
use std::sync::Arc;

use anyhow::{Result, anyhow};

use spanmap_engine::{BundleLoader, Processor};

pub fn run(bundle_path: &Path) -> Result<()> {
    let loader = Arc::new(BundleLoader::new(bundle_path));
    let processor = Processor::new(loader);

    let metadata = processor
        .bundle_metadata()
        .ok_or_else(|| anyhow!("failed to load bundle: {}", bundle_path.display()))?;

    println!("Bundle: {}", bundle_path.display());
    println!("  Format version: {}", metadata.version);
    println!("  Built at: {} (unix)", metadata.build_timestamp);
    println!("  Providers: {}", metadata.providers_count);
    println!("  Patterns: {}", metadata.patterns_count);
    println!("  Source hash: {}", metadata.source_hash);
    println!("  Compiler version: {}", metadata.compiler_version);

    let providers = processor.supported_providers();
    if !providers.is_empty() {
        println!("  Supported providers: {}", providers.join(", "));
    }

    Ok(())
}
