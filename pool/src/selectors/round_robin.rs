use super::Selector;
use super::base::SelectorBase;
use crate::endpoint::Endpoint;
use crate::live::PoolView;
use crate::metrics::{MetricsCollector, RequestOutcome};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Cycles through the snapshot in order. The counter is shared, so two
/// concurrent selections observe distinct positions modulo the pool size.
pub struct RoundRobinSelector {
    base: SelectorBase,
    counter: AtomicUsize,
}

impl RoundRobinSelector {
    pub fn new(collector: Arc<MetricsCollector>) -> Self {
        RoundRobinSelector {
            base: SelectorBase::new(collector),
            counter: AtomicUsize::new(0),
        }
    }
}

impl Selector for RoundRobinSelector {
    fn select(&self, pool: &dyn PoolView) -> Option<Endpoint> {
        let snapshot = pool.snapshot();
        if snapshot.is_empty() {
            return None;
        }
        // Pre-increment, then index with the new value.
        let position = self.counter.fetch_add(1, Ordering::SeqCst).wrapping_add(1);
        Some(snapshot[position % snapshot.len()].endpoint.clone())
    }

    fn update_metrics(&self, endpoint: &Endpoint, outcome: RequestOutcome) {
        self.base.record_use(endpoint, outcome);
    }

    fn name(&self) -> &'static str {
        "round_robin"
    }
}

#[cfg(test)]
mod tests {
    use super::super::testutil::pool_of;
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_rotation_is_fair() {
        let pool = pool_of(&[("a", 1, 0, ""), ("b", 2, 0, ""), ("c", 3, 0, "")]);
        let selector = RoundRobinSelector::new(Arc::new(MetricsCollector::new()));

        let mut seen: HashMap<String, usize> = HashMap::new();
        for _ in 0..6 {
            let ep = selector.select(&pool).unwrap();
            *seen.entry(ep.key()).or_default() += 1;
        }
        assert!(seen.values().all(|&n| n == 2), "uneven: {seen:?}");
    }

    #[test]
    fn test_empty_pool() {
        let pool = pool_of(&[]);
        let selector = RoundRobinSelector::new(Arc::new(MetricsCollector::new()));
        assert!(selector.select(&pool).is_none());
    }
}
