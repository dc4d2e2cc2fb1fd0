//! Source registry: batch selection, egress choice and per-pair health
//!
//! This module handles:
//! - Weighted random batch selection among sources not in backoff
//! - Choosing the primary egress or a pooled proxy for each query
//! - Minimum spacing between requests on one (source, egress) pair
//! - Failure accounting, exponential backoff and bad-proxy reporting

mod tasks;

use crate::config::HealthConfig;
use crate::cursor::Candidate;
use crate::egress::{EgressIdentity, EgressPool};
use crate::sources::{Signal, SourceError, SourceHandle};
use crate::state::{FailureKind, HealthState};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Proxies tried per query before falling back to the primary egress
const MAX_EGRESS_ATTEMPTS: usize = 3;

/// The network path a query leaves through
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EgressKey {
    Primary,
    Proxy(String),
}

impl EgressKey {
    fn of(egress: Option<&EgressIdentity>) -> Self {
        match egress {
            Some(identity) => Self::Proxy(identity.address.clone()),
            None => Self::Primary,
        }
    }
}

/// Sources picked for one classification round
#[derive(Debug, Clone)]
pub struct Batch {
    pub sources: Vec<SourceHandle>,

    /// How many sources were eligible when the batch was drawn
    pub eligible: usize,
}

/// Returns a pool lease when dropped, including on task abort
struct EgressLease<'a> {
    pool: &'a EgressPool,
    identity: EgressIdentity,
}

impl Drop for EgressLease<'_> {
    fn drop(&mut self) {
        self.pool.release(&self.identity.address);
    }
}

/// Owns the sources and the health of every (source, egress) pair
///
/// Health lives behind a `parking_lot` mutex that is never held across an
/// `.await`. Queries only touch health after the source answered, so a query
/// aborted mid-flight leaves no failure behind.
#[derive(Debug)]
pub struct SourceRegistry {
    sources: Vec<SourceHandle>,
    health: Mutex<HashMap<(String, EgressKey), HealthState>>,
    pool: Arc<EgressPool>,
    config: HealthConfig,
    query_timeout: Duration,
    rng: Mutex<StdRng>,
}

impl SourceRegistry {
    /// Creates a registry over a fixed list of sources
    ///
    /// # Arguments
    ///
    /// * `sources` - Every source available for the lifetime of the scan
    /// * `pool` - Egress pool consulted for rotated queries
    /// * `config` - Backoff and spacing settings
    /// * `query_timeout` - Upper bound on a single `check` call
    pub fn new(
        sources: Vec<SourceHandle>,
        pool: Arc<EgressPool>,
        config: HealthConfig,
        query_timeout: Duration,
    ) -> Self {
        Self::with_rng(sources, pool, config, query_timeout, StdRng::from_entropy())
    }

    /// Same as `new` with a deterministic random source
    pub fn with_seed(
        sources: Vec<SourceHandle>,
        pool: Arc<EgressPool>,
        config: HealthConfig,
        query_timeout: Duration,
        seed: u64,
    ) -> Self {
        Self::with_rng(sources, pool, config, query_timeout, StdRng::seed_from_u64(seed))
    }

    fn with_rng(
        sources: Vec<SourceHandle>,
        pool: Arc<EgressPool>,
        config: HealthConfig,
        query_timeout: Duration,
        rng: StdRng,
    ) -> Self {
        Self {
            sources,
            health: Mutex::new(HashMap::new()),
            pool,
            config,
            query_timeout,
            rng: Mutex::new(rng),
        }
    }

    pub fn sources(&self) -> &[SourceHandle] {
        &self.sources
    }

    pub fn pool(&self) -> &Arc<EgressPool> {
        &self.pool
    }

    /// Draws up to `k` eligible sources
    pub fn select_batch(&self, k: usize) -> Batch {
        self.select_batch_excluding(k, &[])
    }

    /// Draws up to `k` eligible sources whose id is not in `exclude`
    ///
    /// A source is eligible while its primary-egress pair is out of backoff.
    /// Sampling is weighted by `Source::weight` and without replacement.
    pub fn select_batch_excluding(&self, k: usize, exclude: &[String]) -> Batch {
        let now = Instant::now();
        let eligible: Vec<SourceHandle> = {
            let health = self.health.lock();
            self.sources
                .iter()
                .filter(|s| !exclude.iter().any(|id| id == s.id()))
                .filter(|s| {
                    health
                        .get(&(s.id().to_string(), EgressKey::Primary))
                        .map_or(true, |h| !h.in_backoff(now))
                })
                .cloned()
                .collect()
        };

        let mut rng = self.rng.lock();
        let sources: Vec<SourceHandle> =
            match eligible.choose_multiple_weighted(&mut *rng, k, |s| f64::from(s.weight().max(1))) {
                Ok(chosen) => chosen.cloned().collect(),
                Err(_) => eligible.choose_multiple(&mut *rng, k).cloned().collect(),
            };

        Batch {
            sources,
            eligible: eligible.len(),
        }
    }

    /// Number of sources currently out of backoff on the primary egress
    pub fn healthy_count(&self) -> usize {
        let now = Instant::now();
        let health = self.health.lock();
        self.sources
            .iter()
            .filter(|s| {
                health
                    .get(&(s.id().to_string(), EgressKey::Primary))
                    .map_or(true, |h| !h.in_backoff(now))
            })
            .count()
    }

    /// Copy of one pair's health, if it was ever used
    pub fn health_snapshot(&self, source_id: &str, egress: &EgressKey) -> Option<HealthState> {
        self.health
            .lock()
            .get(&(source_id.to_string(), egress.clone()))
            .cloned()
    }

    /// Asks one source about a candidate
    ///
    /// Never fails: errors and timeouts are charged to the pair's health and
    /// come back as `Signal::Unknown`.
    pub async fn query(&self, source: &SourceHandle, candidate: &Candidate) -> Signal {
        let lease = self.choose_egress(source.id());
        let identity = lease.as_ref().map(|l| &l.identity);
        let key = EgressKey::of(identity);
        let pair = (source.id().to_string(), key.clone());

        let wait = {
            let mut health = self.health.lock();
            health
                .entry(pair.clone())
                .or_default()
                .reserve_slot(&self.config, Instant::now())
        };
        if !wait.is_zero() {
            tracing::trace!("Deferring {} by {:?}", source.id(), wait);
            tokio::time::sleep(wait).await;
        }

        let outcome = match tokio::time::timeout(self.query_timeout, source.check(candidate, identity)).await {
            Ok(result) => result,
            Err(_) => Err(SourceError::Timeout),
        };

        let signal = self.record_outcome(&pair, &outcome);
        if let Err(e) = &outcome {
            tracing::debug!("{} failed for {} via {:?}: {}", source.id(), candidate, key, e);
        }
        signal
    }

    /// Picks the egress for one query and leases it from the pool
    ///
    /// Returns None for the primary egress.
    fn choose_egress(&self, source_id: &str) -> Option<EgressLease<'_>> {
        let use_primary = self.rng.lock().gen_bool(self.config.primary_weight.clamp(0.0, 1.0));
        if use_primary {
            return None;
        }

        let now = Instant::now();
        for _ in 0..MAX_EGRESS_ATTEMPTS {
            let identity = match self.pool.acquire() {
                Some(identity) => identity,
                None => {
                    tracing::debug!("Egress pool empty, using primary egress");
                    return None;
                }
            };
            let lease = EgressLease {
                pool: &self.pool,
                identity,
            };

            let backed_off = self
                .health
                .lock()
                .get(&(source_id.to_string(), EgressKey::of(Some(&lease.identity))))
                .is_some_and(|h| h.in_backoff(now));
            if !backed_off {
                return Some(lease);
            }
        }

        None
    }

    /// Applies a query outcome to the pair's health and returns its signal
    fn record_outcome(
        &self,
        pair: &(String, EgressKey),
        outcome: &Result<Signal, SourceError>,
    ) -> Signal {
        let now = Instant::now();
        let mut health = self.health.lock();
        let state = health.entry(pair.clone()).or_default();

        let signal = match outcome {
            Ok(signal) if signal.is_conclusive() => {
                state.record_success();
                return *signal;
            }
            Ok(_) => {
                state.record_failure(&self.config, now, FailureKind::Unavailable);
                Signal::Unknown
            }
            Err(SourceError::RateLimited) => {
                state.record_failure(&self.config, now, FailureKind::RateLimited);
                Signal::Unknown
            }
            Err(_) => {
                state.record_failure(&self.config, now, FailureKind::Unavailable);
                Signal::Unknown
            }
        };

        if state.in_backoff(now) && state.consecutive_failures == self.config.failure_threshold {
            tracing::warn!("{} entered backoff via {:?}", pair.0, pair.1);
        }

        if let EgressKey::Proxy(address) = &pair.1 {
            if state.consecutive_failures >= self.config.egress_failure_limit {
                health.retain(|(_, key), _| key != &pair.1);
                drop(health);
                if self.pool.report_bad(address) {
                    tracing::info!("Egress {} reported bad after failures on {}", address, pair.0);
                }
            }
        }

        signal
    }

    /// Closes elapsed backoff windows, halving their level
    ///
    /// Returns the number of windows closed.
    pub fn decay_backoffs(&self, now: Instant) -> usize {
        self.health
            .lock()
            .values_mut()
            .map(|state| state.decay(now))
            .filter(|closed| *closed)
            .count()
    }

    /// Re-probes backed-off sources with a known-registered name
    ///
    /// A Negative proves the source works again and clears its backoff early.
    /// Anything else leaves the backoff in place without charging a failure.
    ///
    /// # Returns
    ///
    /// Number of sources recovered
    pub async fn recover_backed_off(&self, reference: &Candidate) -> usize {
        let now = Instant::now();
        let backed_off: Vec<SourceHandle> = {
            let health = self.health.lock();
            self.sources
                .iter()
                .filter(|s| {
                    health
                        .get(&(s.id().to_string(), EgressKey::Primary))
                        .is_some_and(|h| h.in_backoff(now))
                })
                .cloned()
                .collect()
        };

        let mut recovered = 0;
        for source in backed_off {
            let pair = (source.id().to_string(), EgressKey::Primary);
            let wait = {
                let mut health = self.health.lock();
                health
                    .entry(pair)
                    .or_default()
                    .reserve_slot(&self.config, Instant::now())
            };
            if !wait.is_zero() {
                tracing::trace!("Deferring recovery check of {} by {:?}", source.id(), wait);
                tokio::time::sleep(wait).await;
            }

            let result = tokio::time::timeout(self.query_timeout, source.check(reference, None)).await;
            if let Ok(Ok(Signal::Negative)) = result {
                {
                    let mut health = self.health.lock();
                    if let Some(state) = health.get_mut(&(source.id().to_string(), EgressKey::Primary)) {
                        state.record_success();
                    }
                }
                tracing::info!("{} recovered from backoff", source.id());
                recovered += 1;
            }
        }
        recovered
    }
}
