pub mod endpoint;
pub mod errors;
pub mod live;
pub mod metrics;
pub mod metrics_defs;
pub mod retry;
pub mod selectors;

pub use endpoint::{Endpoint, Protocol, parse_line};
pub use errors::{ParseError, PoolError};
pub use live::{LiveEndpoint, LivePool, PoolView};
pub use metrics::{MetricsCollector, RequestOutcome};
pub use selectors::Selector;
