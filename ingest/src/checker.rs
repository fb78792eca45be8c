//! Concurrent liveness probing.
//!
//! Each candidate is probed by issuing a GET to the probe target *through*
//! the candidate acting as an HTTP proxy. A 200 response qualifies the
//! candidate as live; anything else drops it silently.

use pool::endpoint::Endpoint;
use pool::live::LiveEndpoint;
use serde::Deserialize;
use shared::http::{BROWSER_USER_AGENT, ClientOptions, build_client};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_PROBE_URL: &str = "http://ip-api.com/json/?fields=status,country,query";
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

const MIN_WORKERS: usize = 10;
const MAX_WORKERS: usize = 50;

/// Pause inserted after every 2·W submissions to cap burst load on the
/// probe host.
const BATCH_PAUSE: Duration = Duration::from_millis(100);

#[derive(Debug, Clone)]
pub struct CheckerConfig {
    pub workers: usize,
    pub probe_url: String,
    pub probe_timeout: Duration,
}

impl Default for CheckerConfig {
    fn default() -> Self {
        CheckerConfig {
            workers: MIN_WORKERS,
            probe_url: DEFAULT_PROBE_URL.to_string(),
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }
}

/// Shape of the probe target's JSON body. A 200 with an undecodable body is
/// still a success; the country just stays empty.
#[derive(Deserialize)]
struct ProbeReply {
    #[serde(default)]
    country: Option<String>,
}

pub struct Checker {
    config: CheckerConfig,
    checked_total: Arc<AtomicU64>,
    active: Arc<AtomicBool>,
}

impl Checker {
    pub fn new(mut config: CheckerConfig) -> Self {
        config.workers = config.workers.clamp(MIN_WORKERS, MAX_WORKERS);
        Checker {
            config,
            checked_total: Arc::new(AtomicU64::new(0)),
            active: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn checked_total(&self) -> u64 {
        self.checked_total.load(Ordering::Relaxed)
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Relaxed)
    }

    /// Probes all candidates with at most W in flight. Survivors arrive on
    /// the returned channel, which closes once every started probe has
    /// returned. Cancellation stops new submissions; in-flight probes
    /// observe it through their own request context.
    pub fn run(
        &self,
        candidates: Vec<Endpoint>,
        cancel: CancellationToken,
    ) -> mpsc::Receiver<LiveEndpoint> {
        let (live_tx, live_rx) = mpsc::channel(64);
        let config = self.config.clone();
        let checked_total = self.checked_total.clone();
        let active = self.active.clone();

        tokio::spawn(async move {
            active.store(true, Ordering::Relaxed);
            let total = candidates.len();
            let semaphore = Arc::new(Semaphore::new(config.workers));
            let batch = 2 * config.workers;
            let mut probes = JoinSet::new();

            for (submitted, endpoint) in candidates.into_iter().enumerate() {
                if cancel.is_cancelled() {
                    break;
                }
                if submitted > 0 && submitted % batch == 0 {
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(BATCH_PAUSE) => {}
                    }
                }
                let permit = tokio::select! {
                    _ = cancel.cancelled() => break,
                    acquired = semaphore.clone().acquire_owned() => match acquired {
                        Ok(permit) => permit,
                        Err(_) => break,
                    },
                };

                let live_tx = live_tx.clone();
                let config = config.clone();
                let checked_total = checked_total.clone();
                let cancel = cancel.clone();
                probes.spawn(async move {
                    let _permit = permit;
                    let live = probe(&config, &endpoint, &cancel).await;
                    checked_total.fetch_add(1, Ordering::Relaxed);
                    metrics::counter!(
                        "checker.probes",
                        "outcome" => if live.is_some() { "live" } else { "dead" }
                    )
                    .increment(1);
                    if let Some(live) = live {
                        let _ = live_tx.send(live).await;
                    }
                });
            }

            drop(live_tx);
            while probes.join_next().await.is_some() {}
            active.store(false, Ordering::Relaxed);
            tracing::info!(candidates = total, "probe batch finished");
        });

        live_rx
    }
}

async fn probe(
    config: &CheckerConfig,
    endpoint: &Endpoint,
    cancel: &CancellationToken,
) -> Option<LiveEndpoint> {
    // Dedicated transport per candidate: the proxy differs every time, and
    // compression would distort the latency measurement.
    let client = match build_client(ClientOptions {
        timeout: config.probe_timeout,
        user_agent: Some(BROWSER_USER_AGENT.to_string()),
        max_idle_per_host: Some(2),
        disable_compression: true,
        proxy: Some(endpoint.to_url()),
    }) {
        Ok(client) => client,
        Err(error) => {
            tracing::debug!(endpoint = %endpoint.key(), error = %error, "probe client rejected");
            return None;
        }
    };

    let started = Instant::now();
    let response = tokio::select! {
        _ = cancel.cancelled() => return None,
        sent = client.get(&config.probe_url).send() => match sent {
            Ok(response) => response,
            Err(error) => {
                tracing::debug!(endpoint = %endpoint.key(), error = %error, "probe failed");
                return None;
            }
        },
    };

    if response.status() != http::StatusCode::OK {
        tracing::debug!(
            endpoint = %endpoint.key(),
            status = %response.status(),
            "probe rejected by status"
        );
        return None;
    }
    // Status settles liveness; the body only contributes the country label.
    let elapsed_ms = (started.elapsed().as_millis() as u64).max(1);
    let country = match response.json::<ProbeReply>().await {
        Ok(reply) => reply.country.unwrap_or_default(),
        Err(_) => String::new(),
    };

    Some(LiveEndpoint::new(endpoint.clone(), elapsed_ms, country))
}
