use super::Selector;
use super::base::SelectorBase;
use crate::endpoint::Endpoint;
use crate::live::PoolView;
use crate::metrics::{MetricsCollector, RequestOutcome};
use std::sync::Arc;

/// Picks the endpoint with the highest observed success rate. Endpoints with
/// no history score 1.0, so new arrivals get tried. Ties go to the earliest
/// entry in the snapshot.
pub struct SuccessRateSelector {
    base: SelectorBase,
}

impl SuccessRateSelector {
    pub fn new(collector: Arc<MetricsCollector>) -> Self {
        SuccessRateSelector {
            base: SelectorBase::new(collector),
        }
    }
}

impl Selector for SuccessRateSelector {
    fn select(&self, pool: &dyn PoolView) -> Option<Endpoint> {
        let snapshot = pool.snapshot();
        let mut best: Option<(usize, f64)> = None;
        for (position, live) in snapshot.iter().enumerate() {
            let rate = self.base.collector().success_rate(&live.key());
            match best {
                Some((_, best_rate)) if rate <= best_rate => {}
                _ => best = Some((position, rate)),
            }
        }
        best.map(|(position, _)| snapshot[position].endpoint.clone())
    }

    fn update_metrics(&self, endpoint: &Endpoint, outcome: RequestOutcome) {
        self.base.record_use(endpoint, outcome);
    }

    fn name(&self) -> &'static str {
        "success_rate"
    }
}

#[cfg(test)]
mod tests {
    use super::super::testutil::pool_of;
    use super::*;

    #[test]
    fn test_prefers_the_reliable_endpoint() {
        let pool = pool_of(&[("a", 1, 0, ""), ("b", 2, 0, "")]);
        let collector = Arc::new(MetricsCollector::new());
        let selector = SuccessRateSelector::new(collector.clone());

        // a: 1/2 success, b: 2/2 success.
        collector.record("a:1", RequestOutcome::success(10));
        collector.record("a:1", RequestOutcome::failure());
        collector.record("b:2", RequestOutcome::success(10));
        collector.record("b:2", RequestOutcome::success(10));

        assert_eq!(selector.select(&pool).unwrap().key(), "b:2");
    }

    #[test]
    fn test_unseen_endpoint_wins_over_flaky_one() {
        let pool = pool_of(&[("flaky", 1, 0, ""), ("fresh", 2, 0, "")]);
        let collector = Arc::new(MetricsCollector::new());
        let selector = SuccessRateSelector::new(collector.clone());

        collector.record("flaky:1", RequestOutcome::failure());

        assert_eq!(selector.select(&pool).unwrap().key(), "fresh:2");
    }

    #[test]
    fn test_ties_break_first_seen() {
        let pool = pool_of(&[("a", 1, 0, ""), ("b", 2, 0, "")]);
        let selector = SuccessRateSelector::new(Arc::new(MetricsCollector::new()));
        assert_eq!(selector.select(&pool).unwrap().key(), "a:1");
    }
}
