//! Pipeline orchestration: ingest candidates, probe them, keep survivors in
//! the live pool, and hand endpoints to consumers through the configured
//! selection strategy.

use crate::checker::{Checker, CheckerConfig};
use crate::config::IngestConfig;
use crate::errors::IngestError;
use crate::github::RepoFetcher;
use crate::sources::{fetch_text_sources, source_client};
use parking_lot::Mutex;
use pool::endpoint::Endpoint;
use pool::live::LivePool;
use pool::metrics::{MetricsCollector, RequestOutcome};
use pool::selectors::Selector;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Public observation surface of the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusSnapshot {
    /// Candidates waiting to be probed.
    pub queued: usize,
    pub live: usize,
    pub checking: bool,
    pub checked_total: u64,
    pub added_total: u64,
    pub removed_total: u64,
}

pub struct PoolManager {
    config: IngestConfig,
    live: Arc<LivePool>,
    collector: Arc<MetricsCollector>,
    selector: Arc<dyn Selector>,
    checker: Checker,
    candidates: Mutex<VecDeque<Endpoint>>,
    source_client: reqwest::Client,
    repo_fetcher: RepoFetcher,
}

impl PoolManager {
    pub fn new(
        config: IngestConfig,
        selector: Arc<dyn Selector>,
        collector: Arc<MetricsCollector>,
    ) -> Result<Self, IngestError> {
        let checker = Checker::new(CheckerConfig {
            workers: config.checker_workers,
            probe_url: config.probe_url.clone(),
            probe_timeout: config.probe_timeout(),
        });
        let repo_fetcher = RepoFetcher::new(&config.repo_api_base, &config.repo_raw_base)?;
        Ok(PoolManager {
            source_client: source_client()?,
            config,
            live: Arc::new(LivePool::new()),
            collector,
            selector,
            checker,
            candidates: Mutex::new(VecDeque::new()),
            repo_fetcher,
        })
    }

    pub fn live_pool(&self) -> Arc<LivePool> {
        self.live.clone()
    }

    pub fn collector(&self) -> Arc<MetricsCollector> {
        self.collector.clone()
    }

    /// One ingest → probe → pool cycle.
    pub async fn refresh(&self, cancel: &CancellationToken) {
        let mut batch = fetch_text_sources(&self.source_client, &self.config.sources).await;
        if !self.config.repositories.is_empty() {
            let from_repos = self.repo_fetcher.fetch_all(&self.config.repositories).await;
            let mut keys: std::collections::HashSet<String> =
                batch.iter().map(Endpoint::key).collect();
            for endpoint in from_repos {
                if keys.insert(endpoint.key()) {
                    batch.push(endpoint);
                }
            }
        }

        {
            let mut queued = self.candidates.lock();
            queued.clear();
            queued.extend(batch.iter().cloned());
            metrics::gauge!("ingest.candidates").set(queued.len() as f64);
        }
        tracing::info!(candidates = batch.len(), "ingest cycle collected candidates");

        let to_check: Vec<Endpoint> = self.candidates.lock().drain(..).collect();
        metrics::gauge!("ingest.candidates").set(0.0);
        let mut live_rx = self.checker.run(to_check, cancel.child_token());
        while let Some(live) = live_rx.recv().await {
            self.live.add(live);
        }
        let (added, removed) = self.live.added_removed();
        tracing::info!(
            live = self.live.count(),
            added_total = added,
            removed_total = removed,
            "refresh finished"
        );
    }

    /// Runs refresh cycles until cancelled.
    pub async fn run(&self, cancel: CancellationToken) {
        loop {
            self.refresh(&cancel).await;
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.config.refresh_interval()) => {}
            }
        }
        tracing::info!("pool manager stopped");
    }

    /// Picks an endpoint using the configured strategy.
    pub fn acquire(&self) -> Option<Endpoint> {
        let picked = self.selector.select(self.live.as_ref());
        if picked.is_some() {
            metrics::counter!("manager.acquired", "strategy" => self.selector.name()).increment(1);
        }
        picked
    }

    /// Feeds back one use's outcome. A failed use retires the endpoint from
    /// the live pool; the next refresh may re-admit it if it probes live.
    pub fn report(&self, endpoint: &Endpoint, outcome: RequestOutcome) {
        self.selector.update_metrics(endpoint, outcome);
        if !outcome.success {
            self.live.remove(endpoint);
        }
    }

    pub fn status(&self) -> StatusSnapshot {
        let (added_total, removed_total) = self.live.added_removed();
        StatusSnapshot {
            queued: self.candidates.lock().len(),
            live: self.live.count(),
            checking: self.checker.is_active(),
            checked_total: self.checker.checked_total(),
            added_total,
            removed_total,
        }
    }

    pub fn export_text(&self) -> String {
        self.live.export_text()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pool::selectors::make_selector;
    use wiremock::matchers::{any, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn manager_with(config: IngestConfig) -> PoolManager {
        let collector = Arc::new(MetricsCollector::new());
        let selector = make_selector("round_robin", collector.clone(), vec![]).unwrap();
        PoolManager::new(config, selector, collector).unwrap()
    }

    fn short_probe_config(feed: &MockServer) -> IngestConfig {
        IngestConfig {
            sources: vec![format!("{}/feed.txt", feed.uri())],
            probe_url: "http://probe.test/json".to_string(),
            probe_timeout_secs: 1,
            ..IngestConfig::default()
        }
    }

    #[tokio::test]
    async fn test_liveness_filtering_end_to_end() {
        // One mock plays both the feed host and the live candidate proxy.
        let server = MockServer::start().await;
        let proxy_address = server.address();
        let body = format!(
            "{}:{}\n127.0.0.1:1\nbad\n",
            proxy_address.ip(),
            proxy_address.port()
        );
        Mock::given(method("GET"))
            .and(path("/feed.txt"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(&server)
            .await;
        Mock::given(any())
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "status": "success", "country": "US" })),
            )
            .mount(&server)
            .await;

        let manager = manager_with(short_probe_config(&server)).await;
        manager.refresh(&CancellationToken::new()).await;

        let status = manager.status();
        assert_eq!(status.live, 1);
        assert_eq!(status.checked_total, 2);
        assert_eq!(status.added_total, 1);
        assert!(!status.checking);
        assert_eq!(
            manager.export_text(),
            format!("http://{}:{}\n", proxy_address.ip(), proxy_address.port())
        );
    }

    #[tokio::test]
    async fn test_acquire_and_report_failure_retires_endpoint() {
        let manager = manager_with(IngestConfig::default()).await;
        let pool = manager.live_pool();
        pool.add_unchecked(Endpoint::new("1.1.1.1", 80));
        pool.add_unchecked(Endpoint::new("2.2.2.2", 80));

        let picked = manager.acquire().expect("pool has entries");
        manager.report(&picked, RequestOutcome::failure());

        assert_eq!(manager.status().live, 1);
        assert_eq!(manager.status().removed_total, 1);
        // The failure landed in the shared metrics collector.
        assert!(manager.collector().success_rate(&picked.key()) < 1.0);
    }

    #[tokio::test]
    async fn test_report_success_keeps_endpoint() {
        let manager = manager_with(IngestConfig::default()).await;
        manager.live_pool().add_unchecked(Endpoint::new("1.1.1.1", 80));

        let picked = manager.acquire().unwrap();
        manager.report(&picked, RequestOutcome::success(120));

        assert_eq!(manager.status().live, 1);
        assert_eq!(manager.collector().success_rate(&picked.key()), 1.0);
    }

    #[tokio::test]
    async fn test_acquire_on_empty_pool() {
        let manager = manager_with(IngestConfig::default()).await;
        assert!(manager.acquire().is_none());
    }
}
