use super::Selector;
use super::base::SelectorBase;
use crate::endpoint::Endpoint;
use crate::live::PoolView;
use crate::metrics::{MetricsCollector, RequestOutcome};
use std::sync::Arc;

/// Picks the endpoint this selector has handed out the fewest times. Ties go
/// to the earliest entry in the snapshot.
pub struct LeastUsedSelector {
    base: SelectorBase,
}

impl LeastUsedSelector {
    pub fn new(collector: Arc<MetricsCollector>) -> Self {
        LeastUsedSelector {
            base: SelectorBase::new(collector),
        }
    }
}

impl Selector for LeastUsedSelector {
    fn select(&self, pool: &dyn PoolView) -> Option<Endpoint> {
        let snapshot = pool.snapshot();
        let mut best: Option<(&crate::live::LiveEndpoint, u64)> = None;
        for live in &snapshot {
            let count = self.base.use_count(&live.key());
            match best {
                Some((_, best_count)) if count >= best_count => {}
                _ => best = Some((live, count)),
            }
        }
        best.map(|(live, _)| live.endpoint.clone())
    }

    fn update_metrics(&self, endpoint: &Endpoint, outcome: RequestOutcome) {
        self.base.record_use(endpoint, outcome);
    }

    fn name(&self) -> &'static str {
        "least_used"
    }
}
