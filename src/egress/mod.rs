//! Alternate network egress identities (proxies)
//!
//! The pool holds a bounded ring of identities that passed a reachability
//! probe. Sources borrow identities from it to spread requests across many
//! addresses; a background cycle keeps it topped up from discovery feeds.

mod discovery;
mod pool;

pub use discovery::{DiscoveryFeed, HttpListFeed, HttpProbe, ReachabilityProbe};
pub use pool::{CycleReport, EgressPool};

use chrono::{DateTime, Utc};

/// An alternate network path
///
/// The pool owns these; everyone else only sees clones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EgressIdentity {
    /// `host:port` of the proxy
    pub address: String,

    /// Whether the last probe succeeded
    pub alive: bool,

    /// When the last successful probe finished
    pub last_validated: DateTime<Utc>,
}

impl EgressIdentity {
    /// A freshly validated identity
    pub fn validated(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            alive: true,
            last_validated: Utc::now(),
        }
    }
}
