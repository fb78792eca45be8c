use super::Selector;
use super::base::SelectorBase;
use crate::endpoint::Endpoint;
use crate::live::{LiveEndpoint, PoolView};
use crate::metrics::{MetricsCollector, RequestOutcome};
use rand::Rng;
use std::sync::Arc;

const SUCCESS_WEIGHT: f64 = 0.4;
const SPEED_WEIGHT: f64 = 0.3;
const RECENCY_WEIGHT: f64 = 0.2;
const JITTER_WEIGHT: f64 = 0.1;

// Latency at or above this scores 0 on the speed axis.
const SPEED_CEILING_MS: f64 = 5000.0;

/// Roulette-wheel pick over a composite of success rate, probe speed, how
/// long the endpoint has rested, and a jitter term that keeps the wheel from
/// freezing on one winner.
pub struct WeightedSelector {
    base: SelectorBase,
}

impl WeightedSelector {
    pub fn new(collector: Arc<MetricsCollector>) -> Self {
        WeightedSelector {
            base: SelectorBase::new(collector),
        }
    }

    fn score(&self, live: &LiveEndpoint, rng: &mut impl Rng) -> f64 {
        let key = live.key();
        let success = self.base.collector().success_rate(&key);
        let speed = speed_score(live.latency_ms);
        let recency = recency_score(self.base.minutes_since_use(&key));

        SUCCESS_WEIGHT * success
            + SPEED_WEIGHT * speed
            + RECENCY_WEIGHT * recency
            + JITTER_WEIGHT * rng.r#gen::<f64>()
    }
}

fn speed_score(latency_ms: u64) -> f64 {
    if latency_ms == 0 {
        // Never measured.
        return 0.5;
    }
    (1.0 - latency_ms as f64 / SPEED_CEILING_MS).max(0.0)
}

/// The longer an endpoint has rested, the more attractive it is.
fn recency_score(minutes_since_use: Option<f64>) -> f64 {
    match minutes_since_use {
        None => 1.0,
        Some(minutes) if minutes < 1.0 => 0.1,
        Some(minutes) if minutes < 5.0 => 0.3,
        Some(minutes) if minutes < 10.0 => 0.6,
        Some(minutes) if minutes < 30.0 => 0.8,
        Some(_) => 1.0,
    }
}

impl Selector for WeightedSelector {
    fn select(&self, pool: &dyn PoolView) -> Option<Endpoint> {
        let snapshot = pool.snapshot();
        if snapshot.is_empty() {
            return None;
        }

        let mut rng = rand::thread_rng();
        let scores: Vec<f64> = snapshot
            .iter()
            .map(|live| self.score(live, &mut rng))
            .collect();
        let total: f64 = scores.iter().sum();
        if total <= 0.0 {
            let position = rng.gen_range(0..snapshot.len());
            return Some(snapshot[position].endpoint.clone());
        }

        let target = rng.r#gen::<f64>() * total;
        let mut cumulative = 0.0;
        for (live, score) in snapshot.iter().zip(&scores) {
            cumulative += score;
            if cumulative >= target {
                return Some(live.endpoint.clone());
            }
        }
        // Floating-point undershoot: hand out the last entry.
        snapshot.last().map(|live| live.endpoint.clone())
    }

    fn update_metrics(&self, endpoint: &Endpoint, outcome: RequestOutcome) {
        self.base.record_use(endpoint, outcome);
    }

    fn name(&self) -> &'static str {
        "weighted"
    }
}
