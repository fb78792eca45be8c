//! Text-list ingest: fetch every configured feed concurrently, parse each
//! body line by line, and collapse duplicates by endpoint key.

use crate::errors::IngestError;
use pool::endpoint::{Endpoint, parse_line};
use shared::http::{ClientOptions, build_client};
use std::collections::HashSet;
use tokio::task::JoinSet;

/// Client for feed fetches: 25 s timeout, browser User-Agent, pooled idle
/// connections (the reqwest defaults).
pub fn source_client() -> Result<reqwest::Client, IngestError> {
    Ok(build_client(ClientOptions::default())?)
}

/// Fetches all feeds in parallel. A broken or missing feed is logged and
/// skipped; it never stalls the batch.
pub async fn fetch_text_sources(client: &reqwest::Client, urls: &[String]) -> Vec<Endpoint> {
    let mut join_set = JoinSet::new();
    for url in urls {
        let client = client.clone();
        let url = url.clone();
        join_set.spawn(async move {
            let fetched = fetch_one(&client, &url).await;
            (url, fetched)
        });
    }

    let mut seen = HashSet::new();
    let mut endpoints = Vec::new();
    while let Some(joined) = join_set.join_next().await {
        match joined {
            Ok((url, Ok(parsed))) => {
                let mut fresh = 0usize;
                for endpoint in parsed {
                    if seen.insert(endpoint.key()) {
                        endpoints.push(endpoint);
                        fresh += 1;
                    }
                }
                metrics::counter!("ingest.sources.fetched", "outcome" => "ok").increment(1);
                tracing::info!(source = %url, endpoints = fresh, "fetched proxy feed");
            }
            Ok((url, Err(error))) => {
                metrics::counter!("ingest.sources.fetched", "outcome" => "error").increment(1);
                tracing::warn!(source = %url, error = %error, "feed fetch failed, skipping");
            }
            Err(error) => {
                tracing::error!(error = %error, "feed fetch task failed");
            }
        }
    }
    endpoints
}

async fn fetch_one(client: &reqwest::Client, url: &str) -> Result<Vec<Endpoint>, IngestError> {
    let response = client.get(url).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(IngestError::Protocol {
            status,
            url: url.to_string(),
        });
    }
    let body = response.text().await?;
    Ok(parse_body(&body))
}

/// Parses every line of a feed body, dropping blanks, comments, and
/// malformed entries.
pub fn parse_body(body: &str) -> Vec<Endpoint> {
    body.lines()
        .filter_map(|line| parse_line(line).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_parse_body_skips_junk() {
        let body = "# list header\n\n1.2.3.4:8080\nnot a proxy\nhttps://5.6.7.8:443\n";
        let endpoints = parse_body(body);
        assert_eq!(endpoints.len(), 2);
        assert_eq!(endpoints[0].key(), "1.2.3.4:8080");
        assert_eq!(endpoints[1].key(), "5.6.7.8:443");
    }

    #[tokio::test]
    async fn test_fetch_collapses_duplicates_by_key() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/a.txt"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string("http://9.9.9.9:8080\n1.1.1.1:80\n"),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/b.txt"))
            .respond_with(ResponseTemplate::new(200).set_body_string("9.9.9.9:8080\n"))
            .mount(&server)
            .await;

        let client = source_client().unwrap();
        let urls = vec![
            format!("{}/a.txt", server.uri()),
            format!("{}/b.txt", server.uri()),
        ];
        let endpoints = fetch_text_sources(&client, &urls).await;

        assert_eq!(endpoints.len(), 2);
        let keys: Vec<String> = endpoints.iter().map(Endpoint::key).collect();
        assert!(keys.contains(&"9.9.9.9:8080".to_string()));
        assert!(keys.contains(&"1.1.1.1:80".to_string()));
    }

    #[tokio::test]
    async fn test_broken_source_does_not_stall_the_batch() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/good.txt"))
            .respond_with(ResponseTemplate::new(200).set_body_string("2.2.2.2:3128\n"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/broken.txt"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = source_client().unwrap();
        let urls = vec![
            format!("{}/broken.txt", server.uri()),
            format!("{}/good.txt", server.uri()),
            "http://127.0.0.1:1/unreachable.txt".to_string(),
        ];
        let endpoints = fetch_text_sources(&client, &urls).await;

        assert_eq!(endpoints.len(), 1);
        assert_eq!(endpoints[0].key(), "2.2.2.2:3128");
    }
}
