//! Availability sources and the cheap pre-filter
//!
//! A source is anything that can look at a candidate and say whether it found
//! evidence of a registration. Sources are fixed at startup and dispatched
//! through the [`Source`] trait; the registry owns their health.

mod fetcher;
mod http_source;
mod prefilter;

pub use fetcher::{build_http_client, ClientCache};
pub use http_source::{Detection, HttpSource};
pub use prefilter::{DnsPreFilter, NoPreFilter, PreFilter};

use crate::config::Config;
use crate::cursor::Candidate;
use crate::egress::EgressIdentity;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// One source's opinion about a candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signal {
    /// No registration evidence found
    Positive,
    /// Registration evidence found
    Negative,
    /// The request failed, timed out, or the answer was inconclusive
    Unknown,
}

impl Signal {
    /// Positive and Negative are conclusive; Unknown is not
    pub fn is_conclusive(&self) -> bool {
        !matches!(self, Self::Unknown)
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Positive => "positive",
            Self::Negative => "negative",
            Self::Unknown => "unknown",
        };
        write!(f, "{}", s)
    }
}

/// Ways a source query can fail
///
/// None of these escape the registry: each is charged to the pair's health
/// and the query reports `Signal::Unknown`.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SourceError {
    #[error("source unavailable: {0}")]
    Unavailable(String),

    #[error("rate limited")]
    RateLimited,

    #[error("query timed out")]
    Timeout,
}

/// A pluggable availability-signal provider
#[async_trait]
pub trait Source: Send + Sync + fmt::Debug {
    /// Unique, stable name used for health bookkeeping and logs
    fn id(&self) -> &str;

    /// Relative weight when the registry samples a batch
    fn weight(&self) -> u32 {
        1
    }

    /// Looks the candidate up, through `egress` when one is given
    async fn check(
        &self,
        candidate: &Candidate,
        egress: Option<&EgressIdentity>,
    ) -> Result<Signal, SourceError>;
}

/// Shared handle to a registered source
pub type SourceHandle = Arc<dyn Source>;

/// Builds the configured HTTP sources, sharing one client cache
pub fn build_sources(config: &Config, clients: Arc<ClientCache>) -> Vec<SourceHandle> {
    config
        .sources
        .iter()
        .map(|entry| Arc::new(HttpSource::from_entry(entry, clients.clone())) as SourceHandle)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_conclusive() {
        assert!(Signal::Positive.is_conclusive());
        assert!(Signal::Negative.is_conclusive());
        assert!(!Signal::Unknown.is_conclusive());
    }

    #[test]
    fn test_signal_display() {
        assert_eq!(Signal::Negative.to_string(), "negative");
    }
}
