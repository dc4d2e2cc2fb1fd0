//! Concurrent fan-out and early termination for one candidate

use super::{Classification, Tally, Verdict};
use crate::config::ConsensusConfig;
use crate::cursor::Candidate;
use crate::registry::SourceRegistry;
use crate::sources::Signal;
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio::time::Instant;

/// Reconciles many unreliable source answers into one verdict
#[derive(Debug, Clone)]
pub struct ConsensusClassifier {
    registry: Arc<SourceRegistry>,
    config: ConsensusConfig,
}

impl ConsensusClassifier {
    pub fn new(registry: Arc<SourceRegistry>, config: ConsensusConfig) -> Self {
        Self { registry, config }
    }

    pub fn registry(&self) -> &Arc<SourceRegistry> {
        &self.registry
    }

    /// Classifies one candidate
    ///
    /// 1. Draws `batch-size` sources from the registry
    /// 2. Queries them all at once and reads answers in arrival order
    /// 3. Stops at the first Negative, or once `quorum` Positives arrived
    /// 4. At the round deadline, decides from what arrived
    /// 5. Optionally confirms an Available verdict with one more source
    ///
    /// Queries still running when the verdict is reached are aborted.
    pub async fn classify(&self, candidate: &Candidate) -> Classification {
        let batch = self.registry.select_batch(self.config.batch_size);
        let shortage = batch.eligible < self.config.min_eligible_sources;
        if shortage {
            tracing::warn!(
                "Only {} sources eligible (minimum {}) for {}",
                batch.eligible,
                self.config.min_eligible_sources,
                candidate
            );
        }

        let dispatched = batch.sources.len();
        let mut tasks = JoinSet::new();
        for source in batch.sources {
            let registry = Arc::clone(&self.registry);
            let candidate = candidate.clone();
            tasks.spawn(async move {
                let signal = registry.query(&source, &candidate).await;
                (source.id().to_string(), signal)
            });
        }

        let mut tally = Tally::new(self.config.quorum);
        let mut answered = Vec::with_capacity(dispatched);
        let deadline = tokio::time::sleep_until(Instant::now() + self.config.round_deadline());
        tokio::pin!(deadline);

        let verdict = loop {
            tokio::select! {
                biased;

                joined = tasks.join_next() => match joined {
                    Some(Ok((id, signal))) => {
                        answered.push(id);
                        if let Some(verdict) = tally.observe(signal) {
                            break verdict;
                        }
                    }
                    Some(Err(e)) => {
                        tracing::warn!("Source query task failed: {}", e);
                        tally.observe(Signal::Unknown);
                    }
                    None => break tally.conclude(),
                },

                _ = &mut deadline => {
                    tracing::debug!("Round deadline reached for {}", candidate);
                    break tally.conclude();
                }
            }
        };

        let cancelled = tasks.len();
        tasks.abort_all();

        let mut classification = Classification {
            verdict,
            positives: tally.positives,
            negatives: tally.negatives,
            unknowns: tally.unknowns,
            dispatched,
            cancelled,
            shortage,
            confirmation: None,
        };

        if verdict.is_available() && self.config.confirm_available {
            let signal = self.confirm(candidate, &answered).await;
            classification.confirmation = signal;
            let rejected = if self.config.strict_confirmation {
                signal != Some(Signal::Positive)
            } else {
                signal == Some(Signal::Negative)
            };
            if rejected {
                tracing::info!("Confirmation flipped {} to taken", candidate);
                classification.verdict = Verdict::Taken;
            }
        }

        tracing::debug!("{}: {}", candidate, classification);
        classification
    }

    /// One extra query, preferring a source whose answer was not counted
    ///
    /// Falls back to any eligible source when every one answered. Returns
    /// None when no source is eligible at all.
    async fn confirm(&self, candidate: &Candidate, answered: &[String]) -> Option<Signal> {
        let mut batch = self.registry.select_batch_excluding(1, answered);
        if batch.sources.is_empty() {
            batch = self.registry.select_batch(1);
        }

        let source = batch.sources.into_iter().next()?;
        Some(self.registry.query(&source, candidate).await)
    }
}
