use super::Verdict;
use crate::sources::Signal;

/// Running count of signals in one round
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tally {
    quorum: usize,
    pub positives: usize,
    pub negatives: usize,
    pub unknowns: usize,
}

impl Tally {
    pub fn new(quorum: usize) -> Self {
        Self {
            quorum,
            positives: 0,
            negatives: 0,
            unknowns: 0,
        }
    }

    /// Counts one signal and returns a verdict as soon as one is certain
    ///
    /// A Negative ends the round at once. Positives end it on reaching the
    /// quorum, which can only happen with no Negative seen.
    pub fn observe(&mut self, signal: Signal) -> Option<Verdict> {
        match signal {
            Signal::Negative => {
                self.negatives += 1;
                Some(Verdict::Taken)
            }
            Signal::Positive => {
                self.positives += 1;
                (self.negatives == 0 && self.positives >= self.quorum).then_some(Verdict::Available)
            }
            Signal::Unknown => {
                self.unknowns += 1;
                None
            }
        }
    }

    /// Verdict from whatever arrived before the round ended
    pub fn conclude(&self) -> Verdict {
        if self.negatives > 0 {
            Verdict::Taken
        } else if self.positives >= self.quorum {
            Verdict::Available
        } else {
            Verdict::Indeterminate
        }
    }

    /// Signals counted so far
    pub fn answered(&self) -> usize {
        self.positives + self.negatives + self.unknowns
    }
}
