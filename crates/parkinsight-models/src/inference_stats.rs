//! Per-model inference latency with percentile statistics.
//!
//! [`InferenceStatsTracker`] keeps a sliding window of recent durations for
//! each model name and computes P50/P95/P99 on demand from a sorted snapshot.
//! Every recorded duration is also forwarded to the registered
//! [`InferenceObserver`]s, which is how the HTTP layer feeds its exporter.

use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Default number of samples retained per model.
pub const DEFAULT_MAX_SAMPLES: usize = 1000;

/// Latency summary for one model, in milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LatencyStats {
    /// Samples in the window.
    pub count: usize,
    /// Median.
    pub p50_ms: f64,
    /// 95th percentile.
    pub p95_ms: f64,
    /// 99th percentile.
    pub p99_ms: f64,
    /// Fastest sample.
    pub min_ms: f64,
    /// Slowest sample.
    pub max_ms: f64,
    /// Arithmetic mean.
    pub mean_ms: f64,
}

/// Sink for individual inference durations.
pub trait InferenceObserver: Send + Sync {
    /// Called once per inference, successful or not.
    fn observe(&self, model: &str, duration: Duration);
}

/// Thread-safe per-model latency windows.
///
/// # Example
///
/// ```
/// use parkinsight_models::inference_stats::InferenceStatsTracker;
/// use std::time::Duration;
///
/// let tracker = InferenceStatsTracker::new(100);
/// tracker.record("svm", Duration::from_millis(10));
/// tracker.record("svm", Duration::from_millis(20));
///
/// let stats = tracker.stats("svm").unwrap();
/// assert_eq!(stats.count, 2);
/// assert!(stats.min_ms <= stats.max_ms);
/// ```
pub struct InferenceStatsTracker {
    windows: Mutex<BTreeMap<String, VecDeque<Duration>>>,
    max_samples: usize,
    observers: Vec<Arc<dyn InferenceObserver>>,
}

impl InferenceStatsTracker {
    /// Tracker keeping at most `max_samples` durations per model.
    #[must_use]
    pub fn new(max_samples: usize) -> Self {
        Self {
            windows: Mutex::new(BTreeMap::new()),
            max_samples: max_samples.max(1),
            observers: Vec::new(),
        }
    }

    /// Forward every future sample to `observer` as well.
    pub fn add_observer(&mut self, observer: Arc<dyn InferenceObserver>) {
        self.observers.push(observer);
    }

    /// Record one inference; evicts the model's oldest sample when full.
    pub fn record(&self, model: &str, duration: Duration) {
        let mut windows = self.windows.lock().unwrap_or_else(|e| e.into_inner());
        let window = windows.entry(model.to_string()).or_default();
        if window.len() >= self.max_samples {
            window.pop_front();
        }
        window.push_back(duration);
        drop(windows);

        for observer in &self.observers {
            observer.observe(model, duration);
        }
    }

    /// Statistics for one model, `None` if it has no samples.
    #[must_use]
    pub fn stats(&self, model: &str) -> Option<LatencyStats> {
        let windows = self.windows.lock().unwrap_or_else(|e| e.into_inner());
        windows.get(model).and_then(summarize)
    }

    /// Statistics for every model with samples.
    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<String, LatencyStats> {
        let windows = self.windows.lock().unwrap_or_else(|e| e.into_inner());
        windows
            .iter()
            .filter_map(|(name, w)| summarize(w).map(|s| (name.clone(), s)))
            .collect()
    }
}

impl fmt::Debug for InferenceStatsTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InferenceStatsTracker")
            .field("max_samples", &self.max_samples)
            .field("observers", &self.observers.len())
            .finish_non_exhaustive()
    }
}

impl Default for InferenceStatsTracker {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_SAMPLES)
    }
}

fn summarize(window: &VecDeque<Duration>) -> Option<LatencyStats> {
    if window.is_empty() {
        return None;
    }
    let mut sorted: Vec<Duration> = window.iter().copied().collect();
    sorted.sort();

    let count = sorted.len();
    let total: Duration = sorted.iter().sum();
    let ms = |d: Duration| d.as_secs_f64() * 1000.0;

    Some(LatencyStats {
        count,
        p50_ms: ms(percentile(&sorted, 50.0)),
        p95_ms: ms(percentile(&sorted, 95.0)),
        p99_ms: ms(percentile(&sorted, 99.0)),
        min_ms: ms(sorted[0]),
        max_ms: ms(sorted[count - 1]),
        mean_ms: ms(total) / count as f64,
    })
}

/// Nearest-rank value at `pct` from a sorted slice.
fn percentile(sorted: &[Duration], pct: f64) -> Duration {
    if sorted.is_empty() {
        return Duration::ZERO;
    }
    let idx = ((pct / 100.0) * (sorted.len() - 1) as f64).round() as usize;
    sorted[idx.min(sorted.len() - 1)]
}
