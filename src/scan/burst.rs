use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;

/// Detects suspicious clusters of finds
///
/// Real availability is rare; several finds in a short window usually mean
/// the sources are failing open, so the next find gets re-verified.
#[derive(Debug, Clone)]
pub struct BurstGuard {
    window: Duration,
    threshold: usize,
    finds: VecDeque<Instant>,
}

impl BurstGuard {
    pub fn new(window: Duration, threshold: usize) -> Self {
        Self {
            window,
            threshold,
            finds: VecDeque::new(),
        }
    }

    pub fn record_find(&mut self, now: Instant) {
        self.prune(now);
        self.finds.push_back(now);
    }

    /// True if `threshold` finds fell within the window ending at `now`
    pub fn is_bursting(&mut self, now: Instant) -> bool {
        self.prune(now);
        self.finds.len() >= self.threshold
    }

    fn prune(&mut self, now: Instant) {
        while let Some(&oldest) = self.finds.front() {
            if now.duration_since(oldest) > self.window {
                self.finds.pop_front();
            } else {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_burst_within_window() {
        let mut guard = BurstGuard::new(Duration::from_secs(60), 2);
        let start = Instant::now();

        assert!(!guard.is_bursting(start));
        guard.record_find(start);
        assert!(!guard.is_bursting(start));
        guard.record_find(start + Duration::from_secs(30));
        assert!(guard.is_bursting(start + Duration::from_secs(30)));

        // The first find ages out
        assert!(!guard.is_bursting(start + Duration::from_secs(61)));
    }
}
