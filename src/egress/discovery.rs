//! Discovery feeds and reachability probes for egress identities

use crate::config::{EgressConfig, HttpConfig};
use crate::sources::build_http_client;
use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use std::collections::HashSet;
use std::net::SocketAddr;
use std::time::Duration;

/// Matches `a.b.c.d:port` anywhere in a text or HTML list
const ADDRESS_PATTERN: &str = r"\b\d{1,3}(?:\.\d{1,3}){3}:\d{1,5}\b";

/// Timeout for fetching one feed
const FEED_TIMEOUT: Duration = Duration::from_secs(10);

/// A provider of untested egress addresses
#[async_trait]
pub trait DiscoveryFeed: Send + Sync {
    /// Returns candidate `host:port` addresses; failures yield an empty list
    async fn fetch_candidate_identities(&self) -> Vec<String>;
}

/// Checks that an address can actually carry traffic
#[async_trait]
pub trait ReachabilityProbe: Send + Sync {
    async fn probe(&self, address: &str) -> bool;
}

/// Pulls proxy lists from plain HTTP endpoints
#[derive(Debug)]
pub struct HttpListFeed {
    client: Client,
    urls: Vec<String>,
    pattern: Regex,
}

impl HttpListFeed {
    pub fn new(config: &EgressConfig, http: &HttpConfig) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_http_client(http, None, FEED_TIMEOUT)?,
            urls: config.feeds.clone(),
            pattern: address_pattern(),
        })
    }

    /// Extracts unique, well-formed socket addresses from a feed body
    pub fn extract_addresses(&self, body: &str) -> Vec<String> {
        extract_with(&self.pattern, body)
    }
}

#[async_trait]
impl DiscoveryFeed for HttpListFeed {
    async fn fetch_candidate_identities(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut addresses = Vec::new();

        for url in &self.urls {
            let body = match self.client.get(url).send().await {
                Ok(response) if response.status().is_success() => match response.text().await {
                    Ok(body) => body,
                    Err(e) => {
                        tracing::debug!("Failed to read feed {}: {}", url, e);
                        continue;
                    }
                },
                Ok(response) => {
                    tracing::debug!("Feed {} returned HTTP {}", url, response.status());
                    continue;
                }
                Err(e) => {
                    tracing::debug!("Failed to fetch feed {}: {}", url, e);
                    continue;
                }
            };

            let found = self.extract_addresses(&body);
            tracing::debug!("Feed {} listed {} addresses", url, found.len());
            for address in found {
                if seen.insert(address.clone()) {
                    addresses.push(address);
                }
            }
        }

        addresses
    }
}

/// Fetches a fixed low-cost URL through the candidate proxy
#[derive(Debug, Clone)]
pub struct HttpProbe {
    probe_url: String,
    timeout: Duration,
    http: HttpConfig,
}

impl HttpProbe {
    pub fn new(config: &EgressConfig, http: &HttpConfig) -> Self {
        Self {
            probe_url: config.probe_url.clone(),
            timeout: config.probe_timeout(),
            http: http.clone(),
        }
    }
}

#[async_trait]
impl ReachabilityProbe for HttpProbe {
    async fn probe(&self, address: &str) -> bool {
        let client = match build_http_client(&self.http, Some(address), self.timeout) {
            Ok(client) => client,
            Err(e) => {
                tracing::debug!("Cannot build client for {}: {}", address, e);
                return false;
            }
        };

        match client.get(&self.probe_url).send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }
}

fn address_pattern() -> Regex {
    Regex::new(ADDRESS_PATTERN).expect("address pattern compiles")
}

fn extract_with(pattern: &Regex, body: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    pattern
        .find_iter(body)
        .map(|m| m.as_str())
        .filter(|s| s.parse::<SocketAddr>().is_ok())
        .filter(|s| seen.insert(*s))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn feed_config(urls: Vec<String>) -> EgressConfig {
        EgressConfig {
            feeds: urls,
            ..EgressConfig::default()
        }
    }

    #[test]
    fn test_extract_addresses_from_text_and_html() {
        let pattern = address_pattern();
        let body = "1.2.3.4:8080\n5.6.7.8:3128\n<td>9.9.9.9:80</td> junk 1.2.3.4:8080 \
                    300.1.1.1:80 1.2.3.4:99999";

        let found = extract_with(&pattern, body);
        assert_eq!(found, vec!["1.2.3.4:8080", "5.6.7.8:3128", "9.9.9.9:80"]);
    }

    #[tokio::test]
    async fn test_feed_merges_sources_and_skips_failures() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/a.txt"))
            .respond_with(ResponseTemplate::new(200).set_body_string("1.1.1.1:80\n2.2.2.2:8080\n"))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/b.txt"))
            .respond_with(ResponseTemplate::new(200).set_body_string("2.2.2.2:8080\n3.3.3.3:3128"))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/down.txt"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let config = feed_config(vec![
            format!("{}/a.txt", server.uri()),
            format!("{}/down.txt", server.uri()),
            format!("{}/b.txt", server.uri()),
        ]);
        let feed = HttpListFeed::new(&config, &HttpConfig::default()).unwrap();

        let addresses = feed.fetch_candidate_identities().await;
        assert_eq!(addresses, vec!["1.1.1.1:80", "2.2.2.2:8080", "3.3.3.3:3128"]);
    }

    #[tokio::test]
    async fn test_probe_through_working_proxy() {
        // The mock server plays the proxy: it receives the absolute-form request
        let proxy = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{\"origin\":\"1.2.3.4\"}"))
            .mount(&proxy)
            .await;

        let config = EgressConfig {
            probe_url: "http://probe.invalid/ip".to_string(),
            ..EgressConfig::default()
        };
        let probe = HttpProbe::new(&config, &HttpConfig::default());

        let address = proxy.address().to_string();
        assert!(probe.probe(&address).await);
    }

    #[tokio::test]
    async fn test_probe_fails_for_dead_proxy() {
        let config = EgressConfig {
            probe_url: "http://probe.invalid/ip".to_string(),
            probe_timeout_ms: 2_000,
            ..EgressConfig::default()
        };
        let probe = HttpProbe::new(&config, &HttpConfig::default());

        assert!(!probe.probe("127.0.0.1:9").await);
    }
}
