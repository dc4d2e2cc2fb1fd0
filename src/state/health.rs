use crate::config::HealthConfig;
use std::time::Duration;
use tokio::time::Instant;

/// Backoff levels beyond this no longer change the (capped) window
const MAX_BACKOFF_LEVEL: u32 = 32;

/// How a failed query should be charged against a pair's health
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Network error, timeout, unexpected status or inconclusive answer
    Unavailable,
    /// The source explicitly told us to slow down
    RateLimited,
}

/// Tracks the health of one (source, egress) pair
///
/// Owned by the source registry and only mutated under its lock.
#[derive(Debug, Clone, Default)]
pub struct HealthState {
    /// Failures since the last success
    pub consecutive_failures: u32,

    /// Exponent of the current backoff window
    pub backoff_level: u32,

    /// The pair is not queried before this instant
    pub backoff_until: Option<Instant>,

    /// Time of the most recent (or reserved) request slot
    pub last_used: Option<Instant>,

    /// Time of the most recent failure
    pub last_failure: Option<Instant>,
}

impl HealthState {
    pub fn new() -> Self {
        Self::default()
    }

    /// True while a backoff window is open
    pub fn in_backoff(&self, now: Instant) -> bool {
        self.backoff_until.is_some_and(|until| now < until)
    }

    /// Checks if a request can be made right now
    ///
    /// Enforces both the backoff window and the minimum spacing between
    /// requests on this pair.
    pub fn can_request(&self, config: &HealthConfig, now: Instant) -> bool {
        !self.in_backoff(now) && self.time_until_next_request(config, now).is_none()
    }

    /// Time left before the spacing rule allows another request
    ///
    /// Returns None if a request can be made now.
    pub fn time_until_next_request(&self, config: &HealthConfig, now: Instant) -> Option<Duration> {
        let last = self.last_used?;
        let ready_at = last + config.min_spacing();
        if now < ready_at {
            Some(ready_at - now)
        } else {
            None
        }
    }

    /// Claims the next request slot and returns how long to wait for it
    ///
    /// The slot is recorded immediately so concurrent callers on the same
    /// pair queue up behind each other instead of firing together.
    pub fn reserve_slot(&mut self, config: &HealthConfig, now: Instant) -> Duration {
        let wait = self
            .time_until_next_request(config, now)
            .unwrap_or(Duration::ZERO);
        self.last_used = Some(now + wait);
        wait
    }

    /// A conclusive answer: clears failures and any backoff
    pub fn record_success(&mut self) {
        self.consecutive_failures = 0;
        self.backoff_level = 0;
        self.backoff_until = None;
    }

    /// Charges a failure and opens or extends the backoff window
    ///
    /// Once the failure threshold is reached every further failure raises
    /// the backoff level, doubling the window up to the configured cap.
    pub fn record_failure(&mut self, config: &HealthConfig, now: Instant, kind: FailureKind) {
        let weight = match kind {
            FailureKind::Unavailable => 1,
            FailureKind::RateLimited => config.rate_limit_penalty,
        };

        self.consecutive_failures = self.consecutive_failures.saturating_add(weight);
        self.last_failure = Some(now);

        if self.consecutive_failures < config.failure_threshold {
            return;
        }

        self.backoff_level = self.backoff_level.saturating_add(weight).min(MAX_BACKOFF_LEVEL);
        let until = now + backoff_duration(config, self.backoff_level);
        self.backoff_until = Some(match self.backoff_until {
            Some(existing) if existing > until => existing,
            _ => until,
        });
    }

    /// Closes an elapsed backoff window and halves the backoff level
    ///
    /// Returns true if a window was closed.
    pub fn decay(&mut self, now: Instant) -> bool {
        match self.backoff_until {
            Some(until) if now >= until => {
                self.backoff_until = None;
                self.backoff_level /= 2;
                true
            }
            _ => false,
        }
    }
}

/// Backoff window for a level: `base * 2^(level - 1)`, capped
pub fn backoff_duration(config: &HealthConfig, level: u32) -> Duration {
    if level == 0 {
        return Duration::ZERO;
    }

    let factor = 1u32.checked_shl(level - 1).unwrap_or(u32::MAX);
    config
        .base_backoff()
        .checked_mul(factor)
        .map_or(config.max_backoff(), |d| d.min(config.max_backoff()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_config() -> HealthConfig {
        HealthConfig {
            failure_threshold: 2,
            base_backoff_ms: 1_000,
            max_backoff_ms: 8_000,
            rate_limit_penalty: 3,
            min_spacing_ms: 1_000,
            ..HealthConfig::default()
        }
    }

    #[test]
    fn test_new_health_state() {
        let state = HealthState::new();
        assert_eq!(state.consecutive_failures, 0);
        assert!(state.backoff_until.is_none());
        assert!(state.last_used.is_none());
    }

    #[test]
    fn test_can_request_initially() {
        let state = HealthState::new();
        assert!(state.can_request(&create_test_config(), Instant::now()));
    }

    #[test]
    fn test_spacing_between_requests() {
        let config = create_test_config();
        let mut state = HealthState::new();
        let now = Instant::now();

        assert_eq!(state.reserve_slot(&config, now), Duration::ZERO);
        assert!(!state.can_request(&config, now));
        assert_eq!(
            state.time_until_next_request(&config, now + Duration::from_millis(400)),
            Some(Duration::from_millis(600))
        );
        assert!(state.can_request(&config, now + Duration::from_millis(1_100)));
    }

    #[test]
    fn test_reserved_slots_queue_up() {
        let config = create_test_config();
        let mut state = HealthState::new();
        let now = Instant::now();

        assert_eq!(state.reserve_slot(&config, now), Duration::ZERO);
        assert_eq!(state.reserve_slot(&config, now), Duration::from_secs(1));
        assert_eq!(state.reserve_slot(&config, now), Duration::from_secs(2));
    }

    #[test]
    fn test_failures_below_threshold_do_not_back_off() {
        let config = create_test_config();
        let mut state = HealthState::new();
        let now = Instant::now();

        state.record_failure(&config, now, FailureKind::Unavailable);
        assert_eq!(state.consecutive_failures, 1);
        assert!(!state.in_backoff(now));
    }

    #[test]
    fn test_backoff_until_strictly_increases_until_cap() {
        let config = create_test_config();
        let mut state = HealthState::new();
        let start = Instant::now();

        state.record_failure(&config, start, FailureKind::Unavailable);

        let mut previous: Option<Instant> = None;
        let mut windows = Vec::new();
        for i in 1..=6u64 {
            let now = start + Duration::from_millis(i * 10);
            state.record_failure(&config, now, FailureKind::Unavailable);
            let until = state.backoff_until.unwrap();
            if let Some(prev) = previous {
                assert!(until > prev, "failure {} did not extend backoff", i);
            }
            windows.push(until - now);
            previous = Some(until);
        }

        let secs: Vec<u64> = windows.iter().map(|w| w.as_secs()).collect();
        assert_eq!(secs, vec![1, 2, 4, 8, 8, 8]);
    }

    #[test]
    fn test_success_resets_failures() {
        let config = create_test_config();
        let mut state = HealthState::new();
        let now = Instant::now();

        for _ in 0..4 {
            state.record_failure(&config, now, FailureKind::Unavailable);
        }
        assert!(state.in_backoff(now));

        state.record_success();
        assert_eq!(state.consecutive_failures, 0);
        assert_eq!(state.backoff_level, 0);
        assert!(!state.in_backoff(now));
    }

    #[test]
    fn test_rate_limit_accelerates_backoff() {
        let config = create_test_config();
        let now = Instant::now();

        let mut limited = HealthState::new();
        limited.record_failure(&config, now, FailureKind::RateLimited);
        assert_eq!(limited.consecutive_failures, 3);
        assert!(limited.in_backoff(now));

        let mut plain = HealthState::new();
        plain.record_failure(&config, now, FailureKind::Unavailable);
        plain.record_failure(&config, now, FailureKind::Unavailable);
        assert!(limited.backoff_until.unwrap() > plain.backoff_until.unwrap());
    }

    #[test]
    fn test_decay_halves_level_after_window() {
        let config = create_test_config();
        let mut state = HealthState::new();
        let now = Instant::now();

        for _ in 0..5 {
            state.record_failure(&config, now, FailureKind::Unavailable);
        }
        assert_eq!(state.backoff_level, 4);
        let until = state.backoff_until.unwrap();

        // Still inside the window
        assert!(!state.decay(until - Duration::from_millis(1)));
        assert!(state.in_backoff(until - Duration::from_millis(1)));

        assert!(state.decay(until));
        assert_eq!(state.backoff_level, 2);
        assert!(state.backoff_until.is_none());
        // Only a success clears the failure count
        assert_eq!(state.consecutive_failures, 5);
    }

    #[test]
    fn test_backoff_duration_caps() {
        let config = create_test_config();
        assert_eq!(backoff_duration(&config, 0), Duration::ZERO);
        assert_eq!(backoff_duration(&config, 1), Duration::from_secs(1));
        assert_eq!(backoff_duration(&config, 3), Duration::from_secs(4));
        assert_eq!(backoff_duration(&config, 40), Duration::from_secs(8));
    }
}
