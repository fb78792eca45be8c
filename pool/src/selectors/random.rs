use super::Selector;
use super::base::SelectorBase;
use crate::endpoint::Endpoint;
use crate::live::PoolView;
use crate::metrics::{MetricsCollector, RequestOutcome};
use rand::Rng;
use std::sync::Arc;

/// Uniform random pick from the snapshot.
pub struct RandomSelector {
    base: SelectorBase,
}

impl RandomSelector {
    pub fn new(collector: Arc<MetricsCollector>) -> Self {
        RandomSelector {
            base: SelectorBase::new(collector),
        }
    }
}

impl Selector for RandomSelector {
    fn select(&self, pool: &dyn PoolView) -> Option<Endpoint> {
        let snapshot = pool.snapshot();
        if snapshot.is_empty() {
            return None;
        }
        let position = rand::thread_rng().gen_range(0..snapshot.len());
        Some(snapshot[position].endpoint.clone())
    }

    fn update_metrics(&self, endpoint: &Endpoint, outcome: RequestOutcome) {
        self.base.record_use(endpoint, outcome);
    }

    fn name(&self) -> &'static str {
        "random"
    }
}

#[cfg(test)]
mod tests {
    use super::super::testutil::pool_of;
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_eventually_covers_the_snapshot() {
        let pool = pool_of(&[("a", 1, 0, ""), ("b", 2, 0, ""), ("c", 3, 0, "")]);
        let selector = RandomSelector::new(Arc::new(MetricsCollector::new()));

        let mut seen = HashSet::new();
        for _ in 0..200 {
            seen.insert(selector.select(&pool).unwrap().key());
        }
        assert_eq!(seen.len(), 3);
    }
}
