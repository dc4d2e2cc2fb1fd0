//! Background upkeep for the source registry

use super::SourceRegistry;
use crate::cursor::Candidate;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

impl SourceRegistry {
    /// Starts the recovery and decay loops
    ///
    /// Recovery re-probes backed-off sources with `reference` every
    /// `recovery-interval`; decay closes elapsed backoff windows every
    /// `decay-interval`. Both stop when `token` is cancelled.
    pub fn spawn_background(
        self: Arc<Self>,
        reference: Candidate,
        token: CancellationToken,
    ) -> Vec<JoinHandle<()>> {
        let recovery = {
            let registry = Arc::clone(&self);
            let token = token.clone();
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(registry.config.recovery_interval());
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                loop {
                    tokio::select! {
                        _ = token.cancelled() => break,
                        _ = ticker.tick() => {
                            tokio::select! {
                                _ = token.cancelled() => break,
                                recovered = registry.recover_backed_off(&reference) => {
                                    if recovered > 0 {
                                        tracing::debug!("Recovery pass cleared {} sources", recovered);
                                    }
                                }
                            }
                        }
                    }
                }
                tracing::debug!("Source recovery stopped");
            })
        };

        let decay = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.config.decay_interval());
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        let closed = self.decay_backoffs(Instant::now());
                        if closed > 0 {
                            tracing::trace!("Closed {} elapsed backoff windows", closed);
                        }
                    }
                }
            }
            tracing::debug!("Backoff decay stopped");
        });

        vec![recovery, decay]
    }
}
