use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct IngestConfig {
    /// URLs of plain-text proxy list feeds.
    #[serde(default)]
    pub sources: Vec<String>,
    /// Repository references, `owner/repo` or full github.com URLs.
    #[serde(default)]
    pub repositories: Vec<String>,
    #[serde(default = "default_checker_workers")]
    pub checker_workers: usize,
    #[serde(default = "default_probe_url")]
    pub probe_url: String,
    #[serde(default = "default_probe_timeout_secs")]
    pub probe_timeout_secs: u64,
    /// How often the ingest/check cycle re-runs.
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,
    #[serde(default = "default_repo_api_base")]
    pub repo_api_base: String,
    #[serde(default = "default_repo_raw_base")]
    pub repo_raw_base: String,
}

fn default_checker_workers() -> usize {
    10
}

fn default_probe_url() -> String {
    crate::checker::DEFAULT_PROBE_URL.to_string()
}

fn default_probe_timeout_secs() -> u64 {
    10
}

fn default_refresh_interval_secs() -> u64 {
    600
}

fn default_repo_api_base() -> String {
    "https://api.github.com".to_string()
}

fn default_repo_raw_base() -> String {
    "https://raw.githubusercontent.com".to_string()
}

impl Default for IngestConfig {
    fn default() -> Self {
        IngestConfig {
            sources: Vec::new(),
            repositories: Vec::new(),
            checker_workers: default_checker_workers(),
            probe_url: default_probe_url(),
            probe_timeout_secs: default_probe_timeout_secs(),
            refresh_interval_secs: default_refresh_interval_secs(),
            repo_api_base: default_repo_api_base(),
            repo_raw_base: default_repo_raw_base(),
        }
    }
}

impl IngestConfig {
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }
}

/// Bind address for the status API.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Listener {
    pub host: String,
    pub port: u16,
}

impl Default for Listener {
    fn default() -> Self {
        Listener {
            host: "0.0.0.0".into(),
            port: 8880,
        }
    }
}
