use shared::metrics_defs::{MetricDef, MetricType};

pub const QUEUE_DEPTH: MetricDef = MetricDef {
    name: "jobs.queue.depth",
    metric_type: MetricType::Gauge,
    description: "Jobs currently waiting in the priority queue",
};

pub const WORKERS: MetricDef = MetricDef {
    name: "jobs.workers",
    metric_type: MetricType::Gauge,
    description: "Current worker count, including busy workers",
};

pub const COMPLETED: MetricDef = MetricDef {
    name: "jobs.completed",
    metric_type: MetricType::Counter,
    description: "Jobs that reached Completed",
};

pub const FAILED: MetricDef = MetricDef {
    name: "jobs.failed",
    metric_type: MetricType::Counter,
    description: "Jobs that reached Failed or Cancelled",
};

pub const REJECTED: MetricDef = MetricDef {
    name: "jobs.rejected",
    metric_type: MetricType::Counter,
    description: "Submissions refused at admission. Tagged with reason.",
};

pub const BREAKER_OPENED: MetricDef = MetricDef {
    name: "jobs.breaker.opened",
    metric_type: MetricType::Counter,
    description: "Circuit breaker transitions from closed to open",
};

pub const PROCESSING_MS: MetricDef = MetricDef {
    name: "jobs.processing_ms",
    metric_type: MetricType::Histogram,
    description: "Per-job processing time in milliseconds, successful jobs only",
};

pub const ALL_METRICS: &[MetricDef] = &[
    QUEUE_DEPTH,
    WORKERS,
    COMPLETED,
    FAILED,
    REJECTED,
    BREAKER_OPENED,
    PROCESSING_MS,
];
