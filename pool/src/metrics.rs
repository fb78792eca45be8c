//! Per-endpoint request accounting.
//!
//! Counters are atomics bumped under the map's shared lock; the EWMA and
//! last-use bookkeeping sit behind a small per-entry mutex so the hot
//! increment path never serializes on the map itself.

use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

/// Smoothing factor for the response-time average.
pub const EWMA_ALPHA: f64 = 0.3;

/// What the consumer observed for one use of an endpoint.
#[derive(Debug, Clone, Copy)]
pub struct RequestOutcome {
    pub success: bool,
    pub elapsed_ms: u64,
}

impl RequestOutcome {
    pub fn success(elapsed_ms: u64) -> Self {
        RequestOutcome {
            success: true,
            elapsed_ms,
        }
    }

    pub fn failure() -> Self {
        RequestOutcome {
            success: false,
            elapsed_ms: 0,
        }
    }
}

#[derive(Debug, Default)]
struct StatsDetail {
    avg_response_ms: f64,
    last_used: Option<SystemTime>,
    last_success: Option<bool>,
}

#[derive(Debug, Default)]
pub struct EndpointStats {
    total: AtomicU64,
    success: AtomicU64,
    failed: AtomicU64,
    detail: Mutex<StatsDetail>,
}

impl EndpointStats {
    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    pub fn success_count(&self) -> u64 {
        self.success.load(Ordering::Relaxed)
    }

    pub fn failed_count(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    /// Fraction of successful uses. An endpoint that was never used scores
    /// 1.0, so fresh entries are not starved by score-based selectors.
    pub fn success_rate(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 1.0;
        }
        self.success_count() as f64 / total as f64
    }

    /// Smoothed response time of successful uses, `None` until the first
    /// positive sample lands.
    pub fn avg_response_ms(&self) -> Option<f64> {
        let detail = self.detail.lock();
        (detail.avg_response_ms > 0.0).then_some(detail.avg_response_ms)
    }

    pub fn last_used(&self) -> Option<SystemTime> {
        self.detail.lock().last_used
    }

    pub fn last_success(&self) -> Option<bool> {
        self.detail.lock().last_success
    }

    fn record(&self, outcome: RequestOutcome) {
        self.total.fetch_add(1, Ordering::Relaxed);
        if outcome.success {
            self.success.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed.fetch_add(1, Ordering::Relaxed);
        }

        let mut detail = self.detail.lock();
        detail.last_used = Some(SystemTime::now());
        detail.last_success = Some(outcome.success);
        // Only successful uses with a measured elapsed time move the average.
        if outcome.success && outcome.elapsed_ms > 0 {
            let sample = outcome.elapsed_ms as f64;
            detail.avg_response_ms = if detail.avg_response_ms > 0.0 {
                EWMA_ALPHA * sample + (1.0 - EWMA_ALPHA) * detail.avg_response_ms
            } else {
                sample
            };
        }
    }
}

/// key -> stats map. Entries are created lazily on first record and removed
/// only by [`reset`](Self::reset).
#[derive(Default)]
pub struct MetricsCollector {
    entries: RwLock<HashMap<String, Arc<EndpointStats>>>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        MetricsCollector::default()
    }

    pub fn record(&self, key: &str, outcome: RequestOutcome) {
        let stats = self.entry(key);
        stats.record(outcome);
        let result = if outcome.success { "success" } else { "failure" };
        metrics::counter!("pool.requests", "result" => result).increment(1);
    }

    pub fn get(&self, key: &str) -> Option<Arc<EndpointStats>> {
        self.entries.read().get(key).cloned()
    }

    /// Success rate for a key; unseen keys score 1.0.
    pub fn success_rate(&self, key: &str) -> f64 {
        self.get(key).map(|s| s.success_rate()).unwrap_or(1.0)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn reset(&self) {
        self.entries.write().clear();
    }

    fn entry(&self, key: &str) -> Arc<EndpointStats> {
        if let Some(stats) = self.entries.read().get(key) {
            return stats.clone();
        }
        self.entries
            .write()
            .entry(key.to_string())
            .or_default()
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_add_up() {
        let collector = MetricsCollector::new();
        for _ in 0..7 {
            collector.record("1.1.1.1:80", RequestOutcome::success(100));
        }
        for _ in 0..3 {
            collector.record("1.1.1.1:80", RequestOutcome::failure());
        }

        let stats = collector.get("1.1.1.1:80").unwrap();
        assert_eq!(stats.total(), 10);
        assert_eq!(stats.success_count(), 7);
        assert_eq!(stats.failed_count(), 3);
        assert!((stats.success_rate() - 0.7).abs() < 1e-9);
        assert_eq!(stats.last_success(), Some(false));
    }

    #[test]
    fn test_unseen_key_is_optimistic() {
        let collector = MetricsCollector::new();
        assert_eq!(collector.success_rate("never:1"), 1.0);
        assert!(collector.get("never:1").is_none());
    }

    #[test]
    fn test_ewma_tracks_successful_samples_only() {
        let collector = MetricsCollector::new();
        collector.record("p:1", RequestOutcome::success(1000));
        let stats = collector.get("p:1").unwrap();
        assert_eq!(stats.avg_response_ms(), Some(1000.0));

        collector.record("p:1", RequestOutcome::success(500));
        let expected = EWMA_ALPHA * 500.0 + (1.0 - EWMA_ALPHA) * 1000.0;
        assert!((stats.avg_response_ms().unwrap() - expected).abs() < 1e-9);

        // Failures and zero-elapsed successes leave the average alone.
        collector.record("p:1", RequestOutcome::failure());
        collector.record("p:1", RequestOutcome::success(0));
        assert!((stats.avg_response_ms().unwrap() - expected).abs() < 1e-9);
    }

    #[test]
    fn test_reset_forgets_everything() {
        let collector = MetricsCollector::new();
        collector.record("p:1", RequestOutcome::success(10));
        collector.reset();
        assert!(collector.is_empty());
        assert_eq!(collector.success_rate("p:1"), 1.0);
    }
}
