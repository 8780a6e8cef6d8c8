// Compiler for the spanmap discovery engine.
//
// Converts per-provider declarative YAML configuration into an immutable
// compiled bundle: signature indices for detection, tagged extraction
// plans per provider, and the shared registries. Batch, single-threaded;
// runs at build time, never on the tracing hot path.

pub mod error;
pub mod indices;
pub mod loader;
pub mod output;
pub mod plan;
pub mod validate;

mod compiler;

pub use compiler::{CompilationStats, Compiler, compile_source_dir};
pub use error::{Error, Result};
pub use loader::{ProviderConfig, SharedConfig, REQUIRED_PROVIDER_FILES, REQUIRED_SHARED_FILES};
pub use output::{BUNDLE_FILE, METADATA_FILE};
