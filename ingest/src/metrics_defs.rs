use shared::metrics_defs::{MetricDef, MetricType};

pub const SOURCES_FETCHED: MetricDef = MetricDef {
    name: "ingest.sources.fetched",
    metric_type: MetricType::Counter,
    description: "Text feed fetch attempts. Tagged with outcome.",
};

pub const REPOS_FETCHED: MetricDef = MetricDef {
    name: "ingest.repos.fetched",
    metric_type: MetricType::Counter,
    description: "Repository fetch attempts. Tagged with outcome.",
};

pub const CANDIDATES: MetricDef = MetricDef {
    name: "ingest.candidates",
    metric_type: MetricType::Gauge,
    description: "Candidates waiting to be probed",
};

pub const PROBES: MetricDef = MetricDef {
    name: "checker.probes",
    metric_type: MetricType::Counter,
    description: "Finished liveness probes. Tagged with outcome.",
};

pub const ACQUIRED: MetricDef = MetricDef {
    name: "manager.acquired",
    metric_type: MetricType::Counter,
    description: "Endpoints handed to consumers. Tagged with strategy.",
};

pub const ALL_METRICS: &[MetricDef] = &[
    SOURCES_FETCHED,
    REPOS_FETCHED,
    CANDIDATES,
    PROBES,
    ACQUIRED,
];
