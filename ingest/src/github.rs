//! Repository ingest: list every `.txt` blob in a repository's default
//! branch and parse its raw content as a proxy list.

use crate::errors::IngestError;
use crate::sources::parse_body;
use pool::endpoint::Endpoint;
use regex::Regex;
use serde::Deserialize;
use shared::http::{ClientOptions, build_client};
use std::collections::HashSet;
use std::sync::LazyLock;
use std::time::Duration;

const REPO_CLIENT_TIMEOUT: Duration = Duration::from_secs(45);
const FALLBACK_BRANCH: &str = "main";

static GITHUB_URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"github\.com[/:]([0-9A-Za-z_.-]+)/([0-9A-Za-z_.-]+)(?:/.*)?$")
        .expect("static pattern")
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoRef {
    pub owner: String,
    pub repo: String,
}

impl RepoRef {
    /// Accepts `owner/repo` or any URL containing `github.com/owner/repo`.
    pub fn parse(raw: &str) -> Result<RepoRef, IngestError> {
        let raw = raw.trim();
        if let Some(caps) = GITHUB_URL_RE.captures(raw) {
            return Ok(RepoRef {
                owner: caps[1].to_string(),
                repo: caps[2].trim_end_matches(".git").to_string(),
            });
        }
        let mut parts = raw.split('/');
        if let (Some(owner), Some(repo), None) = (parts.next(), parts.next(), parts.next())
            && !owner.is_empty()
            && !repo.is_empty()
        {
            return Ok(RepoRef {
                owner: owner.to_string(),
                repo: repo.to_string(),
            });
        }
        Err(IngestError::InvalidRepoRef(raw.to_string()))
    }
}

#[derive(Deserialize)]
struct RepoInfo {
    default_branch: Option<String>,
}

#[derive(Deserialize)]
struct TreeResponse {
    #[serde(default)]
    tree: Vec<TreeEntry>,
}

#[derive(Deserialize)]
struct TreeEntry {
    path: String,
    #[serde(rename = "type")]
    kind: String,
}

pub struct RepoFetcher {
    client: reqwest::Client,
    api_base: String,
    raw_base: String,
}

impl RepoFetcher {
    pub fn new(
        api_base: impl Into<String>,
        raw_base: impl Into<String>,
    ) -> Result<Self, IngestError> {
        let client = build_client(ClientOptions {
            timeout: REPO_CLIENT_TIMEOUT,
            ..ClientOptions::default()
        })?;
        Ok(RepoFetcher {
            client,
            api_base: api_base.into(),
            raw_base: raw_base.into(),
        })
    }

    /// Fetches every referenced repository, deduplicating endpoints by key
    /// across all of them. A repository that fails at any step is skipped.
    pub async fn fetch_all(&self, references: &[String]) -> Vec<Endpoint> {
        let mut seen = HashSet::new();
        let mut endpoints = Vec::new();
        for reference in references {
            let repo = match RepoRef::parse(reference) {
                Ok(repo) => repo,
                Err(error) => {
                    tracing::warn!(reference = %reference, error = %error, "bad repository reference, skipping");
                    continue;
                }
            };
            match self.fetch_repo(&repo, &mut seen, &mut endpoints).await {
                Ok(()) => {
                    metrics::counter!("ingest.repos.fetched", "outcome" => "ok").increment(1);
                }
                Err(error) => {
                    metrics::counter!("ingest.repos.fetched", "outcome" => "error").increment(1);
                    tracing::warn!(
                        owner = %repo.owner,
                        repo = %repo.repo,
                        error = %error,
                        "repository fetch failed, skipping"
                    );
                }
            }
        }
        endpoints
    }

    async fn fetch_repo(
        &self,
        repo: &RepoRef,
        seen: &mut HashSet<String>,
        endpoints: &mut Vec<Endpoint>,
    ) -> Result<(), IngestError> {
        let branch = self.default_branch(repo).await?;
        let tree = self.tree(repo, &branch).await?;

        for entry in &tree {
            if entry.kind != "blob" || !entry.path.to_lowercase().ends_with(".txt") {
                continue;
            }
            let body = self.raw_content(repo, &branch, &entry.path).await?;
            for endpoint in parse_body(&body) {
                if seen.insert(endpoint.key()) {
                    endpoints.push(endpoint);
                }
            }
        }
        Ok(())
    }

    async fn default_branch(&self, repo: &RepoRef) -> Result<String, IngestError> {
        let url = format!("{}/repos/{}/{}", self.api_base, repo.owner, repo.repo);
        let info: RepoInfo = self.get_json(&url).await?;
        Ok(info
            .default_branch
            .unwrap_or_else(|| FALLBACK_BRANCH.to_string()))
    }

    async fn tree(&self, repo: &RepoRef, branch: &str) -> Result<Vec<TreeEntry>, IngestError> {
        let url = format!(
            "{}/repos/{}/{}/git/trees/{}?recursive=1",
            self.api_base, repo.owner, repo.repo, branch
        );
        let response: TreeResponse = self.get_json(&url).await?;
        Ok(response.tree)
    }

    async fn raw_content(
        &self,
        repo: &RepoRef,
        branch: &str,
        path: &str,
    ) -> Result<String, IngestError> {
        let url = format!(
            "{}/{}/{}/{}/{}",
            self.raw_base, repo.owner, repo.repo, branch, path
        );
        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(IngestError::Protocol { status, url });
        }
        Ok(response.text().await?)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T, IngestError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(IngestError::Protocol {
                status,
                url: url.to_string(),
            });
        }
        Ok(response.json().await?)
    }
}
