use clap::Parser;
use ingest::PoolManager;
use jobs::{Job, JobError, JobHandler, Priority, WorkerPool};
use metrics_exporter_statsd::StatsdBuilder;
use pool::metrics::MetricsCollector;
use pool::selectors::make_selector;
use serde_json::{Value, json};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

mod config;
use config::{Config, MetricsConfig};

#[derive(Parser)]
#[command(name = "turnstile", about = "Self-refreshing HTTP proxy pool")]
struct Cli {
    #[arg(long)]
    config_file_path: PathBuf,
}

/// Runs one ingest/probe cycle as a worker-pool job, so refreshes get the
/// pool's retry, timeout, and circuit-breaking behavior.
struct RefreshHandler {
    manager: Arc<PoolManager>,
    cancel: CancellationToken,
}

#[async_trait::async_trait]
impl JobHandler for RefreshHandler {
    async fn execute(&self, _job: &Job) -> Result<Value, JobError> {
        self.manager.refresh(&self.cancel).await;
        let status = self.manager.status();
        Ok(json!({ "live": status.live, "checked_total": status.checked_total }))
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = Config::from_file(&cli.config_file_path)?;
    if let Some(metrics_config) = &config.metrics {
        install_statsd(metrics_config)?;
    }
    register_metric_defs();

    let collector = Arc::new(MetricsCollector::new());
    let selector = make_selector(
        &config.selector.strategy,
        collector.clone(),
        config.selector.preferred_countries.clone(),
    )?;
    tracing::info!(strategy = selector.name(), "selection strategy configured");

    let refresh_interval = config.ingest.refresh_interval();
    let manager = Arc::new(PoolManager::new(config.ingest, selector, collector)?);

    let cancel = CancellationToken::new();
    let worker_pool = Arc::new(WorkerPool::new(config.worker_pool));
    worker_pool.start();
    worker_pool.register_handler(
        "refresh",
        Arc::new(RefreshHandler {
            manager: manager.clone(),
            cancel: cancel.child_token(),
        }),
    );

    {
        let listener = config.status_listener;
        let manager = manager.clone();
        tokio::spawn(async move {
            if let Err(error) = ingest::api::serve(listener, manager).await {
                tracing::error!(error = %error, "status api terminated");
            }
        });
    }

    tracing::info!(interval_secs = refresh_interval.as_secs(), "starting refresh cycles");
    loop {
        let job = Job::new("refresh", Value::Null)
            .with_priority(Priority::High)
            .with_timeout(refresh_timeout(refresh_interval));
        if let Err(error) = worker_pool.submit(job) {
            tracing::warn!(error = %error, "refresh cycle skipped");
        }
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = tokio::time::sleep(refresh_interval) => {}
        }
    }

    tracing::info!("shutting down");
    cancel.cancel();
    worker_pool.stop().await;
    Ok(())
}

/// A cycle may legitimately outlive its interval when feeds are slow; give
/// it headroom but never less than the default job timeout.
fn refresh_timeout(interval: Duration) -> Duration {
    (interval * 2).max(Duration::from_secs(90))
}

fn install_statsd(config: &MetricsConfig) -> Result<(), Box<dyn std::error::Error>> {
    let recorder = StatsdBuilder::from(config.statsd_host.as_str(), config.statsd_port)
        .build(Some(&config.prefix))?;
    metrics::set_global_recorder(recorder)
        .map_err(|error| format!("failed to install statsd recorder: {error}"))?;
    tracing::info!(
        host = %config.statsd_host,
        port = config.statsd_port,
        "statsd metrics enabled"
    );
    Ok(())
}

fn register_metric_defs() {
    shared::metrics_defs::register_all(pool::metrics_defs::ALL_METRICS);
    shared::metrics_defs::register_all(ingest::metrics_defs::ALL_METRICS);
    shared::metrics_defs::register_all(jobs::metrics_defs::ALL_METRICS);
}
