use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "spanmap")]
#[command(about = "Compile and validate LLM provider discovery configuration", long_about = None)]
#[command(version)]
pub struct Cli {
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Compile provider YAML configuration into a runtime bundle
    Compile(CompileArgs),

    /// Run standalone validation checks
    Validate {
        #[command(subcommand)]
        check: ValidateCommands,
    },

    /// Process a span attribute map through a compiled bundle and print
    /// the normalized event (debugging aid)
    Process(ProcessArgs),

    /// Print a compiled bundle's build metadata and supported providers
    BundleInfo {
        #[arg(long, default_value = "bundle/compiled_providers.json")]
        bundle: PathBuf,
    },
}

#[derive(Args)]
pub struct ProcessArgs {
    /// Compiled bundle to load
    #[arg(long, default_value = "bundle/compiled_providers.json")]
    pub bundle: PathBuf,

    /// JSON file holding the raw attribute map
    pub input: PathBuf,

    /// Only report the detected (instrumentor, provider) pair
    #[arg(long)]
    pub detect_only: bool,
}

#[derive(Args)]
pub struct CompileArgs {
    /// Directory containing providers/ and shared/ configuration
    #[arg(long, default_value = "config")]
    pub source_dir: PathBuf,

    /// Directory the bundle and metadata sidecar are written to
    #[arg(long, default_value = "bundle")]
    pub output_dir: PathBuf,

    /// Compile only the named provider
    #[arg(long)]
    pub provider: Option<String>,

    /// Run the performance checks against the freshly written bundle
    #[arg(long)]
    pub validate_performance: bool,

    /// Informational: production build (no semantic effect)
    #[arg(long)]
    pub production: bool,

    /// Informational: optimize for bundle size (no semantic effect)
    #[arg(long)]
    pub optimize_size: bool,
}

#[derive(Subcommand)]
pub enum ValidateCommands {
    /// Check provider YAML files against the configuration schema
    Yaml {
        /// YAML files to check
        files: Vec<PathBuf>,
    },

    /// Detect pattern signatures shared across providers
    Collisions {
        /// structure_patterns.yaml files to check
        files: Vec<PathBuf>,
    },

    /// Verify the structural integrity of a compiled bundle
    Bundle {
        #[arg(long, default_value = "bundle/compiled_providers.json")]
        bundle: PathBuf,
    },

    /// Run the performance micro-benchmarks against a compiled bundle
    Perf {
        #[arg(long, default_value = "bundle/compiled_providers.json")]
        bundle: PathBuf,
    },
}
