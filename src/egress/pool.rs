//! Bounded, self-maintaining pool of validated egress identities
//!
//! This module handles:
//! - Round-robin hand-out of identities so no single proxy is hammered
//! - Lease counting for diagnostics
//! - Immediate eviction of identities reported bad
//! - Periodic discovery, validation and re-validation of identities

use crate::config::EgressConfig;
use crate::egress::discovery::{DiscoveryFeed, ReachabilityProbe};
use crate::egress::EgressIdentity;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// An admitted identity plus pool bookkeeping
#[derive(Debug, Clone)]
struct PooledIdentity {
    identity: EgressIdentity,
    leases: usize,
    validated_at: Instant,
}

#[derive(Debug, Default)]
struct PoolInner {
    /// Front of the ring is handed out next
    ring: VecDeque<PooledIdentity>,

    /// Discovered addresses awaiting their first probe
    pending: VecDeque<String>,

    /// Every address currently pending or admitted
    seen: HashSet<String>,

    last_discovery: Option<Instant>,
}

/// What one validation cycle did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// New addresses taken from the discovery feed
    pub discovered: usize,

    /// Probes run, first-time and re-validation combined
    pub tested: usize,

    pub admitted: usize,

    /// Admitted identities that failed re-validation
    pub evicted: usize,
}

/// Validated set of alternate egress identities
///
/// All state sits behind one `parking_lot` mutex that is never held across
/// an `.await`; probes run with the lock released.
#[derive(Debug)]
pub struct EgressPool {
    config: EgressConfig,
    inner: Mutex<PoolInner>,
}

impl EgressPool {
    pub fn new(config: EgressConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(PoolInner::default()),
        }
    }

    /// Hands out the next identity in the ring, or None when the pool is empty
    pub fn acquire(&self) -> Option<EgressIdentity> {
        let mut inner = self.inner.lock();
        let mut entry = inner.ring.pop_front()?;
        entry.leases += 1;
        let identity = entry.identity.clone();
        inner.ring.push_back(entry);
        Some(identity)
    }

    /// Returns a lease taken by `acquire`
    pub fn release(&self, address: &str) {
        let mut inner = self.inner.lock();
        if let Some(entry) = inner.ring.iter_mut().find(|e| e.identity.address == address) {
            entry.leases = entry.leases.saturating_sub(1);
        }
    }

    /// Removes an identity immediately
    ///
    /// The address is forgotten entirely, so it can only come back through a
    /// later discovery followed by a successful probe.
    ///
    /// # Returns
    ///
    /// `true` if the identity was in the pool
    pub fn report_bad(&self, address: &str) -> bool {
        let mut inner = self.inner.lock();
        let before = inner.ring.len();
        inner.ring.retain(|e| e.identity.address != address);
        inner.seen.remove(address);
        let removed = inner.ring.len() < before;
        if removed {
            tracing::debug!("Evicted egress {} ({} left)", address, inner.ring.len());
        }
        removed
    }

    /// Outstanding leases for an admitted identity
    pub fn leases(&self, address: &str) -> Option<usize> {
        self.inner
            .lock()
            .ring
            .iter()
            .find(|e| e.identity.address == address)
            .map(|e| e.leases)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Addresses discovered but not yet probed
    pub fn pending_len(&self) -> usize {
        self.inner.lock().pending.len()
    }

    /// Whether a discovery pull is due
    ///
    /// Only below the low-water mark, and at most once per discovery interval.
    pub fn needs_discovery(&self, now: Instant) -> bool {
        let inner = self.inner.lock();
        inner.ring.len() < self.config.low_water
            && inner
                .last_discovery
                .map_or(true, |last| now.duration_since(last) >= self.config.discovery_interval())
    }

    /// Admits a validated address if there is room and it is not already present
    fn admit(&self, address: String, now: Instant) -> bool {
        let mut inner = self.inner.lock();
        if inner.ring.iter().any(|e| e.identity.address == address) {
            return false;
        }
        if inner.ring.len() >= self.config.target_size {
            inner.seen.remove(&address);
            return false;
        }

        inner.seen.insert(address.clone());
        inner.ring.push_back(PooledIdentity {
            identity: EgressIdentity::validated(address),
            leases: 0,
            validated_at: now,
        });
        true
    }

    /// Queues freshly discovered addresses, skipping ones already known
    fn enqueue_discovered(&self, addresses: Vec<String>) -> usize {
        let mut inner = self.inner.lock();
        let mut added = 0;
        for address in addresses {
            if inner.seen.insert(address.clone()) {
                inner.pending.push_back(address);
                added += 1;
            }
        }
        added
    }

    /// Takes the next batch of pending addresses if the ring has room
    fn take_probe_batch(&self) -> Vec<String> {
        let mut inner = self.inner.lock();
        if inner.ring.len() >= self.config.target_size {
            return Vec::new();
        }
        let count = self.config.max_probe_batch.min(inner.pending.len());
        inner.pending.drain(..count).collect()
    }

    fn stale_addresses(&self, now: Instant) -> Vec<String> {
        let max_age = self.config.revalidate_after();
        self.inner
            .lock()
            .ring
            .iter()
            .filter(|e| now.duration_since(e.validated_at) >= max_age)
            .map(|e| e.identity.address.clone())
            .collect()
    }

    fn refresh(&self, address: &str, now: Instant) {
        let mut inner = self.inner.lock();
        if let Some(entry) = inner.ring.iter_mut().find(|e| e.identity.address == address) {
            entry.validated_at = now;
            entry.identity.alive = true;
            entry.identity.last_validated = Utc::now();
        }
    }

    /// Runs one maintenance pass
    ///
    /// 1. Pulls the discovery feed if the pool is below its low-water mark
    /// 2. Re-probes admitted identities older than `revalidate-after`
    /// 3. Probes a batch of pending addresses and admits the successes
    pub async fn run_validation_cycle(
        &self,
        feed: &Arc<dyn DiscoveryFeed>,
        probe: &Arc<dyn ReachabilityProbe>,
    ) -> CycleReport {
        let mut report = CycleReport::default();

        let now = Instant::now();
        if self.needs_discovery(now) {
            self.inner.lock().last_discovery = Some(now);
            let addresses = feed.fetch_candidate_identities().await;
            report.discovered = self.enqueue_discovered(addresses);
            tracing::debug!("Discovery yielded {} new egress addresses", report.discovered);
        }

        let stale = self.stale_addresses(Instant::now());
        if !stale.is_empty() {
            report.tested += stale.len();
            for (address, ok) in self.probe_all(probe, stale).await {
                if ok {
                    self.refresh(&address, Instant::now());
                } else if self.report_bad(&address) {
                    report.evicted += 1;
                }
            }
        }

        let batch = self.take_probe_batch();
        if !batch.is_empty() {
            report.tested += batch.len();
            for (address, ok) in self.probe_all(probe, batch).await {
                if ok {
                    if self.admit(address, Instant::now()) {
                        report.admitted += 1;
                    }
                } else {
                    self.inner.lock().seen.remove(&address);
                }
            }
        }

        if report.tested > 0 {
            tracing::info!(
                "Egress pool: {} working ({} tested, {} admitted, {} evicted)",
                self.len(),
                report.tested,
                report.admitted,
                report.evicted
            );
        }

        report
    }

    /// Probes addresses with at most `probe-concurrency` in flight
    async fn probe_all(
        &self,
        probe: &Arc<dyn ReachabilityProbe>,
        addresses: Vec<String>,
    ) -> Vec<(String, bool)> {
        let semaphore = Arc::new(Semaphore::new(self.config.probe_concurrency.max(1)));
        let mut tasks = JoinSet::new();

        for address in addresses {
            let probe = Arc::clone(probe);
            let semaphore = Arc::clone(&semaphore);
            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                let ok = probe.probe(&address).await;
                (address, ok)
            });
        }

        let mut results = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(result) => results.push(result),
                Err(e) => tracing::warn!("Egress probe task failed: {}", e),
            }
        }
        results
    }

    /// Starts the background maintenance loop
    ///
    /// Runs a validation cycle every `validation-interval` until `token` is
    /// cancelled.
    pub fn spawn_maintenance(
        self: Arc<Self>,
        feed: Arc<dyn DiscoveryFeed>,
        probe: Arc<dyn ReachabilityProbe>,
        token: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.config.validation_interval());
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        tokio::select! {
                            _ = token.cancelled() => break,
                            _ = self.run_validation_cycle(&feed, &probe) => {}
                        }
                    }
                }
            }
            tracing::debug!("Egress maintenance stopped");
        })
    }
}
