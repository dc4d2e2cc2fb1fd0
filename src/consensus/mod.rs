//! Consensus classification of candidates
//!
//! A candidate is polled against a batch of sources concurrently and the
//! answers are reconciled conservatively: one Negative is enough to call a
//! name taken, while availability needs a quorum of Positives.

mod classifier;
mod tally;

pub use classifier::ConsensusClassifier;
pub use tally::Tally;

use crate::sources::Signal;
use std::fmt;

/// Outcome of one classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verdict {
    Available,
    Taken,
    /// Not enough evidence either way; treated as taken
    Indeterminate,
}

impl Verdict {
    /// Only an explicit Available counts as available
    pub fn is_available(&self) -> bool {
        matches!(self, Self::Available)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Available => "available",
            Self::Taken => "taken",
            Self::Indeterminate => "indeterminate",
        };
        write!(f, "{}", s)
    }
}

/// A verdict plus the evidence behind it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub verdict: Verdict,
    pub positives: usize,
    pub negatives: usize,
    pub unknowns: usize,

    /// Queries dispatched in the round
    pub dispatched: usize,

    /// Queries still in flight when the verdict was reached
    pub cancelled: usize,

    /// Fewer sources were eligible than the configured minimum
    pub shortage: bool,

    /// Answer of the confirmation query, if one was made
    pub confirmation: Option<Signal>,
}

impl Classification {
    pub fn is_available(&self) -> bool {
        self.verdict.is_available()
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}+ {}- {}? of {}, {} cancelled)",
            self.verdict, self.positives, self.negatives, self.unknowns, self.dispatched, self.cancelled
        )?;
        if self.shortage {
            write!(f, " [shortage]")?;
        }
        if let Some(signal) = self.confirmation {
            write!(f, " [confirm: {}]", signal)?;
        }
        Ok(())
    }
}
