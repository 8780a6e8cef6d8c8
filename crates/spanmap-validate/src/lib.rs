// Standalone validation checks, each independently invocable from the
// CLI or from tests. A check never panics; problems surface as
// diagnostics in the report.

pub mod bundle_integrity;
pub mod collisions;
pub mod performance;
pub mod yaml_schema;

pub use bundle_integrity::check_bundle;
pub use collisions::check_signature_collisions;
pub use performance::{PerformanceBaselines, check_performance, check_performance_with};
pub use yaml_schema::check_yaml_schema;

/// Outcome of one validation check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckReport {
    pub ok: bool,
    pub diagnostics: Vec<String>,
    pub files_checked: usize,
}

impl CheckReport {
    pub fn passed(files_checked: usize) -> Self {
        Self {
            ok: true,
            diagnostics: Vec::new(),
            files_checked,
        }
    }

    pub fn failed(diagnostics: Vec<String>, files_checked: usize) -> Self {
        Self {
            ok: false,
            diagnostics,
            files_checked,
        }
    }
}
