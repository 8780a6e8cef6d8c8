use std::sync::Arc;

use anyhow::{Context, Result};
use serde_json::Value;

use spanmap_engine::{BundleLoader, Processor};
use spanmap_types::sink::{Level, StderrSink};

use crate::args::ProcessArgs;

pub fn run(args: ProcessArgs, verbose: bool) -> Result<()> {
    let content = std::fs::read_to_string(&args.input)
        .with_context(|| format!("failed to read {}", args.input.display()))?;
    let attributes: Value = serde_json::from_str(&content)
        .with_context(|| format!("failed to parse {} as JSON", args.input.display()))?;

    let min_level = if verbose { Level::Debug } else { Level::Warning };
    let loader =
        Arc::new(BundleLoader::new(&args.bundle).with_sink(Arc::new(StderrSink::new(min_level))));
    let processor = Processor::new(loader);

    if args.detect_only {
        let map = attributes.as_object().cloned().unwrap_or_default();
        let (instrumentor, provider) = processor.detect(&map);
        println!("instrumentor: {}", instrumentor);
        println!("provider: {}", provider);
        return Ok(());
    }

    let event = processor.process(&attributes);
    println!("{}", serde_json::to_string_pretty(&event)?);
    Ok(())
}
