/// Scan phase definitions for the controller's state machine
use std::fmt;

/// Represents where the scan controller is in its loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScanPhase {
    /// Constructed but the loop has not started
    Idle,

    /// A candidate is being pre-filtered or classified
    Scanning,

    /// The last candidate was classified available and recorded
    Found,

    /// The last candidate was classified taken (or left undecided)
    NotFound,

    /// Shutdown was requested and state has been flushed
    Stopped,
}

impl ScanPhase {
    /// Returns true if the controller will not process further candidates
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Stopped)
    }

    /// Returns true if `next` is a legal successor of this phase
    pub fn can_transition_to(&self, next: ScanPhase) -> bool {
        use ScanPhase::*;
        match (self, next) {
            (Stopped, _) => false,
            (_, Stopped) => true,
            (Idle, Scanning) => true,
            (Scanning, Found | NotFound) => true,
            (Found | NotFound, Scanning) => true,
            _ => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Scanning => "scanning",
            Self::Found => "found",
            Self::NotFound => "not_found",
            Self::Stopped => "stopped",
        }
    }
}

impl fmt::Display for ScanPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
