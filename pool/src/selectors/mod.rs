//! Pluggable endpoint selection.
//!
//! A [`Selector`] picks one endpoint from a point-in-time snapshot of the
//! live pool. Removals that land after the snapshot are tolerated: the
//! endpoint is returned by value and the caller drops it on use failure.

mod base;
mod fastest;
mod geo;
mod least_used;
mod random;
mod round_robin;
mod success_rate;
mod weighted;

pub use fastest::FastestSelector;
pub use geo::GeoSelector;
pub use least_used::LeastUsedSelector;
pub use random::RandomSelector;
pub use round_robin::RoundRobinSelector;
pub use success_rate::SuccessRateSelector;
pub use weighted::WeightedSelector;

use crate::endpoint::Endpoint;
use crate::errors::PoolError;
use crate::live::PoolView;
use crate::metrics::{MetricsCollector, RequestOutcome};
use std::sync::Arc;

pub trait Selector: Send + Sync {
    /// Picks an endpoint from the pool's current snapshot, or `None` when
    /// the pool is empty.
    fn select(&self, pool: &dyn PoolView) -> Option<Endpoint>;

    /// Records the outcome of one use: bumps the selector's own usage
    /// bookkeeping, then forwards to the shared metrics collector.
    fn update_metrics(&self, endpoint: &Endpoint, outcome: RequestOutcome);

    fn name(&self) -> &'static str;
}

/// Builds a selector by its configured name.
pub fn make_selector(
    name: &str,
    collector: Arc<MetricsCollector>,
    preferred_countries: Vec<String>,
) -> Result<Arc<dyn Selector>, PoolError> {
    let selector: Arc<dyn Selector> = match name {
        "round_robin" => Arc::new(RoundRobinSelector::new(collector)),
        "random" => Arc::new(RandomSelector::new(collector)),
        "least_used" => Arc::new(LeastUsedSelector::new(collector)),
        "fastest" => Arc::new(FastestSelector::new(collector)),
        "success_rate" => Arc::new(SuccessRateSelector::new(collector)),
        "geo" => Arc::new(GeoSelector::new(collector, preferred_countries)),
        "weighted" => Arc::new(WeightedSelector::new(collector)),
        other => return Err(PoolError::UnknownStrategy(other.to_string())),
    };
    Ok(selector)
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_make_selector_by_name() {
        let collector = Arc::new(MetricsCollector::new());
        for name in [
            "round_robin",
            "random",
            "least_used",
            "fastest",
            "success_rate",
            "geo",
            "weighted",
        ] {
            let selector = make_selector(name, collector.clone(), vec![]).unwrap();
            assert_eq!(selector.name(), name);
        }
        assert!(matches!(
            make_selector("coin_flip", collector, vec![]),
            Err(PoolError::UnknownStrategy(_))
        ));
    }
}
