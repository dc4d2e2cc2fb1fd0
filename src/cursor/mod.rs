//! Deterministic traversal of the candidate keyspace
//!
//! The keyspace is ordered by label length, then TLD priority, then the
//! lexicographic index of the label over the length's alphabet. A cursor
//! position is three integers, which is all that has to be persisted to
//! resume a scan exactly where it stopped.

mod candidate;
mod enumeration;

pub use candidate::Candidate;
pub use enumeration::{EnumerationCursor, KeyspaceLayout, Position, Step};

/// Alphabet for lengths that are scanned letters-only
pub const LETTERS: &[u8] = b"abcdefghijklmnopqrstuvwxyz";

/// Alphabet for longer lengths
pub const LETTERS_AND_DIGITS: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
