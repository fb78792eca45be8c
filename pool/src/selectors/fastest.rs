use super::Selector;
use super::base::SelectorBase;
use crate::endpoint::Endpoint;
use crate::live::PoolView;
use crate::metrics::{MetricsCollector, RequestOutcome};
use std::sync::Arc;

/// Picks the endpoint with the lowest positive probe latency. Entries that
/// were never measured (latency 0, e.g. unchecked adds) are skipped; if no
/// entry has a measurement, the first in the snapshot wins.
pub struct FastestSelector {
    base: SelectorBase,
}

impl FastestSelector {
    pub fn new(collector: Arc<MetricsCollector>) -> Self {
        FastestSelector {
            base: SelectorBase::new(collector),
        }
    }
}

impl Selector for FastestSelector {
    fn select(&self, pool: &dyn PoolView) -> Option<Endpoint> {
        let snapshot = pool.snapshot();
        let mut best: Option<(usize, u64)> = None;
        for (position, live) in snapshot.iter().enumerate() {
            if live.latency_ms == 0 {
                continue;
            }
            match best {
                Some((_, best_latency)) if live.latency_ms >= best_latency => {}
                _ => best = Some((position, live.latency_ms)),
            }
        }
        match best {
            Some((position, _)) => Some(snapshot[position].endpoint.clone()),
            None => snapshot.first().map(|live| live.endpoint.clone()),
        }
    }

    fn update_metrics(&self, endpoint: &Endpoint, outcome: RequestOutcome) {
        self.base.record_use(endpoint, outcome);
    }

    fn name(&self) -> &'static str {
        "fastest"
    }
}
