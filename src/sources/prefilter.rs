//! Cheap checks that rule candidates out before full classification

use crate::cursor::Candidate;
use async_trait::async_trait;
use std::time::Duration;

/// A fast yes/no oracle consulted before the consensus round
#[async_trait]
pub trait PreFilter: Send + Sync {
    /// True if the candidate is worth classifying; false means taken
    async fn quick_check(&self, candidate: &Candidate) -> bool;
}

/// Treats any name that resolves in DNS as taken
///
/// Lookup errors and timeouts let the candidate through: an unresolvable
/// name proves nothing about registration, so the sources decide.
#[derive(Debug, Clone)]
pub struct DnsPreFilter {
    timeout: Duration,
}

impl DnsPreFilter {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl PreFilter for DnsPreFilter {
    async fn quick_check(&self, candidate: &Candidate) -> bool {
        let domain = candidate.domain();
        let lookup = tokio::net::lookup_host((domain.as_str(), 80));

        let resolves = match tokio::time::timeout(self.timeout, lookup).await {
            Ok(Ok(mut addrs)) => addrs.next().is_some(),
            Ok(Err(_)) => false,
            Err(_) => {
                tracing::debug!("DNS lookup for {} timed out", domain);
                false
            }
        };

        if resolves {
            tracing::trace!("{} resolves, skipping", domain);
        }
        !resolves
    }
}

/// Passes every candidate through to classification
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPreFilter;

#[async_trait]
impl PreFilter for NoPreFilter {
    async fn quick_check(&self, _candidate: &Candidate) -> bool {
        true
    }
}
