// Processing statistics.
//
// Counters are updated from concurrent `process` calls: plain totals are
// atomics, the per-provider map and the time samples sit behind mutexes.
// Ordering across calls is unspecified; no update is lost.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Upper bound on retained processing-time samples.
const TIME_SAMPLE_CAP: usize = 1024;

#[derive(Default)]
pub struct ProcessingStats {
    total_processed: AtomicU64,
    fallback_usage: AtomicU64,
    errors: AtomicU64,
    provider_detections: Mutex<HashMap<String, u64>>,
    processing_times_us: Mutex<Vec<u64>>,
}

impl ProcessingStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_processed(&self) {
        self.total_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_fallback(&self) {
        self.fallback_usage.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_errors(&self, count: usize) {
        if count > 0 {
            self.errors.fetch_add(count as u64, Ordering::Relaxed);
        }
    }

    pub fn record_detection(&self, provider: &str) {
        let mut detections = self
            .provider_detections
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *detections.entry(provider.to_string()).or_insert(0) += 1;
    }

    pub fn record_time(&self, elapsed: Duration) {
        let mut times = self
            .processing_times_us
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if times.len() < TIME_SAMPLE_CAP {
            times.push(elapsed.as_micros() as u64);
        }
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let provider_detections = self
            .provider_detections
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();
        let times = self
            .processing_times_us
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();

        let total_processed = self.total_processed.load(Ordering::Relaxed);
        let fallback_usage = self.fallback_usage.load(Ordering::Relaxed);

        let (avg, min, max) = if times.is_empty() {
            (0.0, 0.0, 0.0)
        } else {
            let sum: u64 = times.iter().sum();
            let min = *times.iter().min().unwrap_or(&0);
            let max = *times.iter().max().unwrap_or(&0);
            (
                sum as f64 / times.len() as f64 / 1000.0,
                min as f64 / 1000.0,
                max as f64 / 1000.0,
            )
        };

        StatsSnapshot {
            total_processed,
            fallback_usage,
            errors: self.errors.load(Ordering::Relaxed),
            provider_detections,
            avg_processing_time_ms: avg,
            min_processing_time_ms: min,
            max_processing_time_ms: max,
            fallback_rate: if total_processed > 0 {
                fallback_usage as f64 / total_processed as f64
            } else {
                0.0
            },
        }
    }

    pub fn reset(&self) {
        self.total_processed.store(0, Ordering::Relaxed);
        self.fallback_usage.store(0, Ordering::Relaxed);
        self.errors.store(0, Ordering::Relaxed);
        self.provider_detections
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clear();
        self.processing_times_us
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clear();
    }
}

/// Point-in-time view of the counters.
#[derive(Debug, Clone, PartialEq)]
pub struct StatsSnapshot {
    pub total_processed: u64,
    pub fallback_usage: u64,
    pub errors: u64,
    pub provider_detections: HashMap<String, u64>,
    pub avg_processing_time_ms: f64,
    pub min_processing_time_ms: f64,
    pub max_processing_time_ms: f64,
    pub fallback_rate: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let stats = ProcessingStats::new();
        stats.record_processed();
        stats.record_processed();
        stats.record_fallback();
        stats.record_detection("openai");
        stats.record_detection("openai");
        stats.record_errors(3);
        stats.record_time(Duration::from_micros(1500));

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.total_processed, 2);
        assert_eq!(snapshot.fallback_usage, 1);
        assert_eq!(snapshot.errors, 3);
        assert_eq!(snapshot.provider_detections.get("openai"), Some(&2));
        assert_eq!(snapshot.fallback_rate, 0.5);
        assert!(snapshot.avg_processing_time_ms > 1.0);
    }

    #[test]
    fn test_reset_clears_everything() {
        let stats = ProcessingStats::new();
        stats.record_processed();
        stats.record_detection("gemini");
        stats.reset();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.total_processed, 0);
        assert!(snapshot.provider_detections.is_empty());
        assert_eq!(snapshot.fallback_rate, 0.0);
    }

    #[test]
    fn test_concurrent_updates_are_not_lost() {
        use std::sync::Arc;

        let stats = Arc::new(ProcessingStats::new());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let stats = Arc::clone(&stats);
            handles.push(std::thread::spawn(move || {
                for _ in 0..1000 {
                    stats.record_processed();
                    stats.record_detection("openai");
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.total_processed, 8000);
        assert_eq!(snapshot.provider_detections.get("openai"), Some(&8000));
    }
}
