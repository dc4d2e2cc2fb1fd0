//! HTTP client construction for sources and egress probes
//!
//! Every egress identity gets its own `reqwest::Client` configured with that
//! identity as proxy. Clients are pooled per address so connection reuse
//! survives across queries.

use crate::config::HttpConfig;
use crate::egress::EgressIdentity;
use parking_lot::Mutex;
use rand::seq::SliceRandom;
use reqwest::{Client, Proxy};
use std::collections::HashMap;
use std::time::Duration;

/// Cached proxied clients are dropped wholesale beyond this many
const MAX_CACHED_CLIENTS: usize = 256;

/// Builds an HTTP client, optionally routed through a proxy
///
/// # Arguments
///
/// * `config` - Outgoing HTTP configuration
/// * `proxy` - `host:port` of an HTTP proxy, or None for the primary egress
/// * `timeout` - Whole-request timeout
pub fn build_http_client(
    config: &HttpConfig,
    proxy: Option<&str>,
    timeout: Duration,
) -> Result<Client, reqwest::Error> {
    let mut builder = Client::builder()
        .timeout(timeout)
        .connect_timeout(config.connect_timeout())
        .gzip(true)
        .brotli(true);

    if let Some(address) = proxy {
        builder = builder.proxy(Proxy::all(format!("http://{}", address))?);
    }

    builder.build()
}

/// Picks one of the configured user agents at random
pub fn random_user_agent(config: &HttpConfig) -> Option<&str> {
    config
        .user_agents
        .choose(&mut rand::thread_rng())
        .map(String::as_str)
}

/// Per-egress client pool shared by all HTTP sources
#[derive(Debug)]
pub struct ClientCache {
    config: HttpConfig,
    timeout: Duration,
    clients: Mutex<HashMap<Option<String>, Client>>,
}

impl ClientCache {
    pub fn new(config: HttpConfig, timeout: Duration) -> Self {
        Self {
            config,
            timeout,
            clients: Mutex::new(HashMap::new()),
        }
    }

    pub fn http_config(&self) -> &HttpConfig {
        &self.config
    }

    /// Returns the client for an egress, building it on first use
    pub fn client_for(&self, egress: Option<&EgressIdentity>) -> Result<Client, reqwest::Error> {
        let key = egress.map(|e| e.address.clone());

        let mut clients = self.clients.lock();
        if let Some(client) = clients.get(&key) {
            return Ok(client.clone());
        }

        if clients.len() >= MAX_CACHED_CLIENTS {
            clients.retain(|k, _| k.is_none());
        }

        let client = build_http_client(&self.config, key.as_deref(), self.timeout)?;
        clients.insert(key, client.clone());
        Ok(client)
    }

    /// Number of cached clients, primary included
    pub fn len(&self) -> usize {
        self.clients.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
