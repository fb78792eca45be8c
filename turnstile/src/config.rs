use ingest::IngestConfig;
use ingest::config::Listener;
use jobs::WorkerPoolConfig;
use serde::Deserialize;
use std::path::Path;

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config file: {0}")]
    Parse(#[from] serde_yaml::Error),
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    pub statsd_host: String,
    pub statsd_port: u16,
    #[serde(default = "default_metrics_prefix")]
    pub prefix: String,
}

fn default_metrics_prefix() -> String {
    "turnstile".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct SelectorConfig {
    #[serde(default = "default_strategy")]
    pub strategy: String,
    /// Only consulted by the geo strategy.
    #[serde(default)]
    pub preferred_countries: Vec<String>,
}

fn default_strategy() -> String {
    "weighted".to_string()
}

impl Default for SelectorConfig {
    fn default() -> Self {
        SelectorConfig {
            strategy: default_strategy(),
            preferred_countries: Vec::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub selector: SelectorConfig,
    #[serde(default)]
    pub worker_pool: WorkerPoolConfig,
    #[serde(default)]
    pub status_listener: Listener,
    pub metrics: Option<MetricsConfig>,
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Config, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&raw)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_full_config_round_trip() {
        let raw = r#"
ingest:
  sources:
    - "https://feeds.example.com/http.txt"
  repositories:
    - "someone/proxy-list"
  checker_workers: 20
selector:
  strategy: geo
  preferred_countries: [US, DE]
worker_pool:
  queue_capacity: 64
  breaker_threshold: 3
status_listener:
  host: "127.0.0.1"
  port: 9111
metrics:
  statsd_host: "127.0.0.1"
  statsd_port: 8125
"#;
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(raw.as_bytes()).unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.ingest.sources.len(), 1);
        assert_eq!(config.ingest.checker_workers, 20);
        assert_eq!(config.selector.strategy, "geo");
        assert_eq!(config.selector.preferred_countries, vec!["US", "DE"]);
        assert_eq!(config.worker_pool.queue_capacity, 64);
        assert_eq!(config.worker_pool.breaker_threshold, 3);
        assert_eq!(config.status_listener.port, 9111);
        assert_eq!(config.metrics.unwrap().prefix, "turnstile");
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"{}").unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.selector.strategy, "weighted");
        assert_eq!(config.worker_pool.queue_capacity, 100);
        assert_eq!(config.status_listener.port, 8880);
        assert!(config.metrics.is_none());
    }

    #[test]
    fn test_missing_file_errors() {
        assert!(matches!(
            Config::from_file(Path::new("/nonexistent/config.yaml")),
            Err(ConfigError::Io(_))
        ));
    }
}
