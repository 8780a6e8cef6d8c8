// Performance regression detection.
//
// Four timed micro-benchmarks against fixed baselines. Results within
// the baseline pass; up to 20% over produce a warning; beyond that the
// check fails.

use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use spanmap_engine::{BundleLoader, Processor};

use crate::CheckReport;

/// Per-check baselines in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PerformanceBaselines {
    pub bundle_load_ms: f64,
    pub exact_match_detection_ms: f64,
    pub subset_match_detection_ms: f64,
    pub metadata_access_ms: f64,
}

impl Default for PerformanceBaselines {
    fn default() -> Self {
        Self {
            bundle_load_ms: 5.0,
            exact_match_detection_ms: 0.1,
            subset_match_detection_ms: 0.15,
            metadata_access_ms: 0.01,
        }
    }
}

/// Band over the baseline that downgrades a failure to a warning.
const REGRESSION_THRESHOLD: f64 = 0.20;

const LOAD_ITERATIONS: usize = 5;
const DETECTION_ITERATIONS: usize = 100;
const WARMUP_ITERATIONS: usize = 5;

/// Run the four micro-benchmarks against a bundle on disk.
pub fn check_performance(bundle_path: &Path) -> CheckReport {
    check_performance_with(bundle_path, PerformanceBaselines::default())
}

pub fn check_performance_with(bundle_path: &Path, baselines: PerformanceBaselines) -> CheckReport {
    if !bundle_path.exists() {
        return CheckReport::failed(
            vec![format!("bundle file not found: {}", bundle_path.display())],
            0,
        );
    }

    let mut diagnostics = Vec::new();
    let mut ok = true;

    // Benchmark 1: bundle load (fresh loader each iteration).
    let mut load_total = 0.0f64;
    for _ in 0..LOAD_ITERATIONS {
        let loader = BundleLoader::new(bundle_path);
        let start = Instant::now();
        if let Err(err) = loader.load() {
            return CheckReport::failed(vec![format!("bundle load failed: {}", err)], 1);
        }
        load_total += start.elapsed().as_secs_f64() * 1000.0;
    }
    let load_avg = load_total / LOAD_ITERATIONS as f64;
    ok &= record(
        &mut diagnostics,
        "bundle load",
        load_avg,
        baselines.bundle_load_ms,
    );

    let loader = Arc::new(BundleLoader::new(bundle_path));
    let processor = Processor::new(Arc::clone(&loader));

    // Benchmark 2: exact-match detection over a known full signature.
    let exact_attrs = json!({
        "gen_ai.request.model": "gpt-4",
        "gen_ai.system": "openai",
        "gen_ai.usage.completion_tokens": 50,
        "gen_ai.usage.prompt_tokens": 100
    });
    let exact_map = exact_attrs.as_object().cloned().unwrap_or_default();
    for _ in 0..WARMUP_ITERATIONS {
        processor.detect(&exact_map);
    }
    let (_, provider) = processor.detect(&exact_map);
    if provider != "openai" {
        diagnostics.push(format!(
            "exact-match detection: FAIL (detected '{}' instead of 'openai')",
            provider
        ));
        ok = false;
    } else {
        let start = Instant::now();
        for _ in 0..DETECTION_ITERATIONS {
            processor.detect(&exact_map);
        }
        let exact_avg = start.elapsed().as_secs_f64() * 1000.0 / DETECTION_ITERATIONS as f64;
        ok &= record(
            &mut diagnostics,
            "exact-match detection",
            exact_avg,
            baselines.exact_match_detection_ms,
        );
    }

    // Benchmark 3: subset-match detection (extra key forces the
    // size-bucketed fallback path).
    let subset_attrs = json!({
        "gen_ai.request.model": "gpt-4",
        "gen_ai.system": "openai",
        "gen_ai.usage.completion_tokens": 50,
        "gen_ai.usage.prompt_tokens": 100,
        "session.id": "bench"
    });
    let subset_map = subset_attrs.as_object().cloned().unwrap_or_default();
    for _ in 0..WARMUP_ITERATIONS {
        processor.detect(&subset_map);
    }
    let start = Instant::now();
    for _ in 0..DETECTION_ITERATIONS {
        processor.detect(&subset_map);
    }
    let subset_avg = start.elapsed().as_secs_f64() * 1000.0 / DETECTION_ITERATIONS as f64;
    ok &= record(
        &mut diagnostics,
        "subset-match detection",
        subset_avg,
        baselines.subset_match_detection_ms,
    );

    // Benchmark 4: cached metadata access.
    let _ = loader.metadata();
    let start = Instant::now();
    for _ in 0..DETECTION_ITERATIONS {
        let _ = loader.metadata();
    }
    let metadata_avg = start.elapsed().as_secs_f64() * 1000.0 / DETECTION_ITERATIONS as f64;
    ok &= record(
        &mut diagnostics,
        "cached metadata access",
        metadata_avg,
        baselines.metadata_access_ms,
    );

    CheckReport {
        ok,
        diagnostics,
        files_checked: 1,
    }
}

/// Append a status line; returns false only above the warn band.
fn record(diagnostics: &mut Vec<String>, name: &str, measured_ms: f64, baseline_ms: f64) -> bool {
    let warn_limit = baseline_ms * (1.0 + REGRESSION_THRESHOLD);
    if measured_ms <= baseline_ms {
        diagnostics.push(format!(
            "{}: PASS ({:.4}ms <= {:.4}ms baseline)",
            name, measured_ms, baseline_ms
        ));
        true
    } else if measured_ms <= warn_limit {
        diagnostics.push(format!(
            "{}: WARN ({:.4}ms > {:.4}ms baseline, within threshold)",
            name, measured_ms, baseline_ms
        ));
        true
    } else {
        diagnostics.push(format!(
            "{}: FAIL ({:.4}ms > {:.4}ms limit)",
            name, measured_ms, warn_limit
        ));
        false
    }
}
