//! Common types for metrics definitions.
//!
//! Each crate declares its metrics as a const table of [`MetricDef`] and the
//! bin registers them against the installed recorder at startup.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricType {
    Counter,
    Gauge,
    Histogram,
}

#[derive(Debug, Clone, Copy)]
pub struct MetricDef {
    pub name: &'static str,
    pub metric_type: MetricType,
    pub description: &'static str,
}

/// Describe a set of metric definitions to the installed recorder so
/// exporters that support metadata (units, help text) can surface it.
pub fn register_all(defs: &[MetricDef]) {
    for def in defs {
        match def.metric_type {
            MetricType::Counter => {
                metrics::describe_counter!(def.name, def.description);
            }
            MetricType::Gauge => {
                metrics::describe_gauge!(def.name, def.description);
            }
            MetricType::Histogram => {
                metrics::describe_histogram!(def.name, def.description);
            }
        }
        tracing::debug!(metric = def.name, kind = ?def.metric_type, "registered metric");
    }
}
