//! Construction of the outbound reqwest clients used across the workspace.
//!
//! Every component that talks to the network (feed ingest, repository
//! listing, liveness probes) builds its client through [`build_client`] so
//! timeouts, connection pooling, and proxying are configured in one place.

use std::time::Duration;

/// User-Agent presented to upstream feeds and probe targets. Some free
/// proxy-list hosts serve an empty body to non-browser agents.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

#[derive(thiserror::Error, Debug)]
pub enum HttpError {
    #[error("invalid proxy url: {0}")]
    InvalidProxy(String),
    #[error("failed to build http client: {0}")]
    Build(#[from] reqwest::Error),
}

/// Knobs for an outbound client. `Default` matches the plain ingest client.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub timeout: Duration,
    pub user_agent: Option<String>,
    /// Idle connections kept per host. `None` leaves reqwest's default.
    pub max_idle_per_host: Option<usize>,
    /// Disables gzip/brotli/deflate negotiation. Probe latency measurements
    /// must not include decompression time.
    pub disable_compression: bool,
    /// Route all requests through this HTTP(S) proxy.
    pub proxy: Option<String>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        ClientOptions {
            timeout: Duration::from_secs(25),
            user_agent: Some(BROWSER_USER_AGENT.to_string()),
            max_idle_per_host: None,
            disable_compression: false,
            proxy: None,
        }
    }
}

pub fn build_client(options: ClientOptions) -> Result<reqwest::Client, HttpError> {
    let mut builder = reqwest::Client::builder().timeout(options.timeout);

    if let Some(agent) = options.user_agent {
        builder = builder.user_agent(agent);
    }
    if let Some(max_idle) = options.max_idle_per_host {
        builder = builder.pool_max_idle_per_host(max_idle);
    }
    if options.disable_compression {
        builder = builder.no_gzip().no_brotli().no_deflate();
    }
    if let Some(proxy_url) = options.proxy {
        let proxy = reqwest::Proxy::all(&proxy_url)
            .map_err(|_| HttpError::InvalidProxy(proxy_url.clone()))?;
        builder = builder.proxy(proxy);
    }

    Ok(builder.build()?)
}
