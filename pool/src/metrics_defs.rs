use shared::metrics_defs::{MetricDef, MetricType};

pub const POOL_LIVE: MetricDef = MetricDef {
    name: "pool.live",
    metric_type: MetricType::Gauge,
    description: "Number of endpoints currently in the live pool",
};

pub const POOL_ADDED: MetricDef = MetricDef {
    name: "pool.added",
    metric_type: MetricType::Counter,
    description: "Endpoints admitted to the live pool over the process lifetime",
};

pub const POOL_REMOVED: MetricDef = MetricDef {
    name: "pool.removed",
    metric_type: MetricType::Counter,
    description: "Endpoints retired from the live pool over the process lifetime",
};

pub const POOL_REQUESTS: MetricDef = MetricDef {
    name: "pool.requests",
    metric_type: MetricType::Counter,
    description: "Request outcomes reported per endpoint. Tagged with result.",
};

pub const ALL_METRICS: &[MetricDef] = &[POOL_LIVE, POOL_ADDED, POOL_REMOVED, POOL_REQUESTS];
