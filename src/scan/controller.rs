//! Scan controller - the candidate loop
//!
//! This module contains the loop that drives one candidate at a time
//! through pre-filter, classification, recording and checkpointing, and
//! flushes everything on shutdown.

use crate::config::ScanConfig;
use crate::consensus::{ConsensusClassifier, Verdict};
use crate::cursor::{Candidate, EnumerationCursor, KeyspaceLayout, Step};
use crate::notify::Notifier;
use crate::scan::burst::BurstGuard;
use crate::sources::PreFilter;
use crate::state::ScanPhase;
use crate::storage::{Checkpoint, FoundRecord, Storage};
use crate::HunterError;
use chrono::Utc;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// What happened to one candidate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub candidate: Candidate,
    pub verdict: Verdict,

    /// Rejected by the pre-filter without classification
    pub prefiltered: bool,

    /// Recorded as a new find
    pub recorded: bool,
}

/// Drives the enumeration and owns all persisted progress
pub struct ScanController {
    cursor: EnumerationCursor,
    prefilter: Arc<dyn PreFilter>,
    classifier: ConsensusClassifier,
    storage: Box<dyn Storage>,
    config: ScanConfig,
    config_hash: Option<String>,
    phase: ScanPhase,
    total_checked: u64,
    total_found: u64,

    /// Finds not yet written to storage
    pending_found: Vec<FoundRecord>,

    /// Candidates processed since the last successful checkpoint
    since_checkpoint: u64,

    burst: BurstGuard,
    notifier: Option<Arc<dyn Notifier>>,
}

impl ScanController {
    /// Creates a controller, resuming from the stored checkpoint
    ///
    /// # Arguments
    ///
    /// * `config` - Keyspace and pacing settings
    /// * `classifier` - Consensus classifier for candidates
    /// * `prefilter` - Cheap check consulted before classification
    /// * `storage` - Checkpoint and found-list backend
    /// * `config_hash` - Hash of the configuration file, stored in checkpoints
    /// * `fresh` - Ignore any stored checkpoint and start from the beginning
    ///
    /// # Returns
    ///
    /// * `Ok(ScanController)` - Ready to run
    /// * `Err(HunterError)` - The checkpoint exists but could not be read
    pub fn new(
        config: &ScanConfig,
        classifier: ConsensusClassifier,
        prefilter: Arc<dyn PreFilter>,
        storage: Box<dyn Storage>,
        config_hash: Option<String>,
        fresh: bool,
    ) -> Result<Self, HunterError> {
        let layout = KeyspaceLayout::from_config(config);

        let (cursor, total_checked, total_found) = if fresh {
            tracing::info!("Starting fresh scan (ignoring saved progress)");
            (EnumerationCursor::new(layout), 0, 0)
        } else {
            match storage.load_checkpoint()? {
                Some(checkpoint) => {
                    if let (Some(saved), Some(current)) = (&checkpoint.config_hash, &config_hash) {
                        if saved != current {
                            tracing::warn!(
                                "Configuration changed since the checkpoint was written ({} -> {})",
                                saved,
                                current
                            );
                        }
                    }
                    let cursor = EnumerationCursor::from_position(layout, checkpoint.position());
                    tracing::info!(
                        "Resuming at {} ({} checked, {} found so far)",
                        cursor.current(),
                        checkpoint.total_checked,
                        checkpoint.total_found
                    );
                    (cursor, checkpoint.total_checked, checkpoint.total_found)
                }
                None => {
                    tracing::info!("No checkpoint found, starting from the beginning");
                    (EnumerationCursor::new(layout), 0, 0)
                }
            }
        };

        Ok(Self {
            cursor,
            prefilter,
            classifier,
            storage,
            burst: BurstGuard::new(config.burst_window(), config.burst_threshold),
            config: config.clone(),
            config_hash,
            phase: ScanPhase::Idle,
            total_checked,
            total_found,
            pending_found: Vec::new(),
            since_checkpoint: 0,
            notifier: None,
        })
    }

    /// Announces every new find through `notifier`
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn phase(&self) -> ScanPhase {
        self.phase
    }

    pub fn cursor(&self) -> &EnumerationCursor {
        &self.cursor
    }

    pub fn total_checked(&self) -> u64 {
        self.total_checked
    }

    /// Finds written to storage, duplicates excluded
    pub fn total_found(&self) -> u64 {
        self.total_found
    }

    /// Finds still waiting to be written
    pub fn pending_found(&self) -> usize {
        self.pending_found.len()
    }

    fn transition(&mut self, to: ScanPhase) -> Result<(), HunterError> {
        if !self.phase.can_transition_to(to) {
            return Err(HunterError::InvalidTransition {
                from: self.phase,
                to,
            });
        }
        tracing::trace!("Scan phase {} -> {}", self.phase, to);
        self.phase = to;
        Ok(())
    }

    /// Runs until `token` is cancelled, then flushes state
    ///
    /// Only startup problems and persistence failures during the final flush
    /// are returned; failures while scanning are logged and retried.
    pub async fn run(&mut self, token: CancellationToken) -> Result<(), HunterError> {
        tracing::info!("Starting scan at {}", self.cursor.current());

        loop {
            let outcome = tokio::select! {
                biased;
                _ = token.cancelled() => break,
                outcome = self.step() => outcome?,
            };

            let pause = if outcome.recorded {
                self.config.find_cooldown()
            } else if outcome.prefiltered {
                Duration::ZERO
            } else {
                self.pacing_delay()
            };

            if !pause.is_zero() {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = tokio::time::sleep(pause) => {}
                }
            }
        }

        tracing::info!("Shutdown requested, saving progress");
        self.shutdown()
    }

    /// Processes exactly one candidate
    ///
    /// Pre-filter, classify, record a find, advance, checkpoint when due. A
    /// find is written before the checkpoint that moves past it.
    pub async fn step(&mut self) -> Result<Outcome, HunterError> {
        if self.phase == ScanPhase::Idle {
            self.transition(ScanPhase::Scanning)?;
        }

        let candidate = self.cursor.current();

        let (verdict, prefiltered) = if self.prefilter.quick_check(&candidate).await {
            (self.classify(&candidate).await, false)
        } else {
            tracing::debug!("{} rejected by pre-filter", candidate);
            (Verdict::Taken, true)
        };

        let recorded = if verdict.is_available() {
            self.transition(ScanPhase::Found)?;
            self.record_find(&candidate).await
        } else {
            self.transition(ScanPhase::NotFound)?;
            false
        };

        self.total_checked += 1;
        self.since_checkpoint += 1;

        let step = self.cursor.advance();
        match step {
            Step::NextLength => {
                tracing::info!("Moving on to {}-character names", self.cursor.position().length)
            }
            Step::Wrapped => tracing::info!("Keyspace exhausted, wrapping around to the start"),
            Step::Combo | Step::NextTld => {}
        }

        if self.since_checkpoint >= self.config.checkpoint_every || step.is_boundary() {
            self.checkpoint();
        }

        if self.total_checked % self.config.progress_every == 0 {
            let registry = self.classifier.registry();
            tracing::info!(
                "Progress: {} | Checked: {} | Found: {} | Healthy sources: {}/{}",
                candidate,
                self.total_checked,
                self.total_found,
                registry.healthy_count(),
                registry.sources().len()
            );
        }

        self.transition(ScanPhase::Scanning)?;

        Ok(Outcome {
            candidate,
            verdict,
            prefiltered,
            recorded,
        })
    }

    /// Classifies, re-verifying an Available verdict during a burst of finds
    async fn classify(&mut self, candidate: &Candidate) -> Verdict {
        let first = self.classifier.classify(candidate).await;
        if !first.is_available() || !self.burst.is_bursting(Instant::now()) {
            return first.verdict;
        }

        tracing::warn!(
            "Burst of finds detected, re-verifying {} in {:?}",
            candidate,
            self.config.burst_cooldown()
        );
        tokio::time::sleep(self.config.burst_cooldown()).await;

        let second = self.classifier.classify(candidate).await;
        if !second.is_available() {
            tracing::info!("{} did not hold up on re-verification", candidate);
        }
        second.verdict
    }

    async fn record_find(&mut self, candidate: &Candidate) -> bool {
        let domain = candidate.domain();
        if self.pending_found.iter().any(|r| r.domain == domain) {
            return false;
        }

        tracing::info!("FOUND: {}", domain);
        self.burst.record_find(Instant::now());
        let record = FoundRecord {
            domain,
            length: candidate.length(),
            found_at: Utc::now(),
        };
        self.pending_found.push(record.clone());

        // Names already in the found list are not announced again
        let before = self.total_found;
        let is_new = !self.flush_found() || self.total_found > before;

        if let (true, Some(notifier)) = (is_new, &self.notifier) {
            if let Err(e) = notifier.notify(&record).await {
                tracing::warn!("Failed to announce {}: {}", record.domain, e);
            }
        }
        true
    }

    /// Writes pending finds; on failure they stay pending for the next try
    fn flush_found(&mut self) -> bool {
        if self.pending_found.is_empty() {
            return true;
        }

        match self.storage.append_found(&self.pending_found) {
            Ok(appended) => {
                self.total_found += appended as u64;
                if appended < self.pending_found.len() {
                    tracing::debug!(
                        "{} finds were already recorded",
                        self.pending_found.len() - appended
                    );
                }
                self.pending_found.clear();
                true
            }
            Err(e) => {
                tracing::warn!("Failed to save found domains, will retry: {}", e);
                false
            }
        }
    }

    fn snapshot(&self) -> Checkpoint {
        let position = self.cursor.position();
        Checkpoint {
            length: position.length,
            tld_index: position.tld_index,
            combo_index: position.combo_index,
            total_checked: self.total_checked,
            total_found: self.total_found,
            last_update: Utc::now(),
            config_hash: self.config_hash.clone(),
        }
    }

    /// Saves progress unless finds are still unsaved
    fn checkpoint(&mut self) {
        if !self.flush_found() {
            tracing::warn!("Skipping checkpoint while finds are unsaved");
            return;
        }

        match self.storage.save_checkpoint(&self.snapshot()) {
            Ok(()) => self.since_checkpoint = 0,
            Err(e) => tracing::warn!("Failed to save checkpoint, will retry: {}", e),
        }
    }

    /// Flushes finds and the cursor and enters the terminal phase
    ///
    /// A failed flush leaves the phase unchanged so a later call retries it.
    pub fn shutdown(&mut self) -> Result<(), HunterError> {
        if self.phase.is_terminal() {
            return Ok(());
        }

        if !self.pending_found.is_empty() {
            let appended = self.storage.append_found(&self.pending_found)?;
            self.total_found += appended as u64;
            self.pending_found.clear();
        }
        self.storage.save_checkpoint(&self.snapshot())?;
        self.since_checkpoint = 0;
        self.transition(ScanPhase::Stopped)?;

        tracing::info!(
            "Progress saved at {} ({} checked, {} found)",
            self.cursor.current(),
            self.total_checked,
            self.total_found
        );
        Ok(())
    }

    /// Random pause between candidates
    fn pacing_delay(&self) -> Duration {
        let min = self.config.candidate_delay_min_ms;
        let max = self.config.candidate_delay_max_ms.max(min);
        Duration::from_millis(rand::thread_rng().gen_range(min..=max))
    }
}
