//! State shared by every selection strategy: the metrics collector handle
//! and the selector-private per-key usage ledger.

use crate::endpoint::Endpoint;
use crate::metrics::{MetricsCollector, RequestOutcome};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone, Copy)]
pub(crate) struct Usage {
    pub count: u64,
    pub last_used: Instant,
}

pub(crate) struct SelectorBase {
    collector: Arc<MetricsCollector>,
    usage: RwLock<HashMap<String, Usage>>,
}

impl SelectorBase {
    pub fn new(collector: Arc<MetricsCollector>) -> Self {
        SelectorBase {
            collector,
            usage: RwLock::new(HashMap::new()),
        }
    }

    pub fn collector(&self) -> &MetricsCollector {
        &self.collector
    }

    pub fn record_use(&self, endpoint: &Endpoint, outcome: RequestOutcome) {
        let key = endpoint.key();
        {
            let mut usage = self.usage.write();
            let entry = usage.entry(key.clone()).or_insert(Usage {
                count: 0,
                last_used: Instant::now(),
            });
            entry.count += 1;
            entry.last_used = Instant::now();
        }
        self.collector.record(&key, outcome);
    }

    pub fn use_count(&self, key: &str) -> u64 {
        self.usage.read().get(key).map(|u| u.count).unwrap_or(0)
    }

    /// Minutes since this selector last handed the key out, `None` if never.
    pub fn minutes_since_use(&self, key: &str) -> Option<f64> {
        self.usage
            .read()
            .get(key)
            .map(|u| u.last_used.elapsed().as_secs_f64() / 60.0)
    }
}
