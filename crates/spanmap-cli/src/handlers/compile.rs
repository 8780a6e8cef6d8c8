use anyhow::{Result, anyhow};

use spanmap_compiler::{BUNDLE_FILE, Compiler};
use spanmap_types::sink::{Level, StderrSink};
use spanmap_validate::check_performance;

use crate::args::CompileArgs;
use crate::style::check_mark;

pub fn run(args: CompileArgs, verbose: bool) -> Result<()> {
    let min_level = if verbose { Level::Debug } else { Level::Warning };
    let sink = StderrSink::new(min_level);

    if verbose && args.production {
        eprintln!("note: --production is informational and does not change the output");
    }
    if verbose && args.optimize_size {
        eprintln!("note: --optimize-size is informational and does not change the output");
    }

    let mut compiler = Compiler::new(&args.source_dir, &args.output_dir).with_sink(&sink);
    let bundle = compiler
        .compile(args.provider.as_deref())
        .map_err(|err| anyhow!("compilation failed: {}", err))?;
    let stats = compiler.stats();

    println!("{} Compiled provider bundle", check_mark());
    println!(
        "  Bundle location: {}",
        args.output_dir.join(BUNDLE_FILE).display()
    );
    println!("  Providers: {}", bundle.provider_count());
    println!("  Patterns: {}", bundle.pattern_count());
    println!("  Compilation time: {:.2?}", stats.elapsed);

    if args.validate_performance {
        let report = check_performance(&args.output_dir.join(BUNDLE_FILE));
        for line in &report.diagnostics {
            eprintln!("{}", line);
        }
        if !report.ok {
            return Err(anyhow!("performance validation failed"));
        }
        println!("{} Performance validation passed", check_mark());
    }

    Ok(())
}
