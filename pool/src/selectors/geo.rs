use super::Selector;
use super::base::SelectorBase;
use crate::endpoint::Endpoint;
use crate::live::PoolView;
use crate::metrics::{MetricsCollector, RequestOutcome};
use rand::Rng;
use std::sync::Arc;

/// Uniform random pick among endpoints whose country is in the preferred
/// set; falls back to the whole snapshot when the set is empty or nothing
/// matches.
pub struct GeoSelector {
    base: SelectorBase,
    preferred: Vec<String>,
}

impl GeoSelector {
    pub fn new(collector: Arc<MetricsCollector>, preferred: Vec<String>) -> Self {
        GeoSelector {
            base: SelectorBase::new(collector),
            preferred,
        }
    }
}

impl Selector for GeoSelector {
    fn select(&self, pool: &dyn PoolView) -> Option<Endpoint> {
        let snapshot = pool.snapshot();
        if snapshot.is_empty() {
            return None;
        }

        let matching: Vec<&crate::live::LiveEndpoint> = if self.preferred.is_empty() {
            Vec::new()
        } else {
            snapshot
                .iter()
                .filter(|live| self.preferred.iter().any(|c| c == &live.country))
                .collect()
        };

        let mut rng = rand::thread_rng();
        if matching.is_empty() {
            let position = rng.gen_range(0..snapshot.len());
            return Some(snapshot[position].endpoint.clone());
        }
        let position = rng.gen_range(0..matching.len());
        Some(matching[position].endpoint.clone())
    }

    fn update_metrics(&self, endpoint: &Endpoint, outcome: RequestOutcome) {
        self.base.record_use(endpoint, outcome);
    }

    fn name(&self) -> &'static str {
        "geo"
    }
}
