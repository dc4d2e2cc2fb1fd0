use crate::config::ScanConfig;
use crate::cursor::{Candidate, LETTERS, LETTERS_AND_DIGITS};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// The shape of the keyspace: which lengths, which TLDs, which alphabets
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyspaceLayout {
    pub min_length: u32,
    pub max_length: u32,
    pub letters_only_max_length: u32,
    pub tlds: Arc<[String]>,
}

impl KeyspaceLayout {
    pub fn from_config(config: &ScanConfig) -> Self {
        Self {
            min_length: config.min_length,
            max_length: config.max_length,
            letters_only_max_length: config.letters_only_max_length,
            tlds: config.tlds.iter().cloned().collect(),
        }
    }

    /// Alphabet used for labels of the given length
    pub fn alphabet(&self, length: u32) -> &'static [u8] {
        if length <= self.letters_only_max_length {
            LETTERS
        } else {
            LETTERS_AND_DIGITS
        }
    }

    /// Number of labels of the given length (per TLD)
    pub fn space_size(&self, length: u32) -> u64 {
        (self.alphabet(length).len() as u64)
            .checked_pow(length)
            .unwrap_or(u64::MAX)
    }

    /// Label at `index` in lexicographic order over the length's alphabet
    pub fn label(&self, length: u32, mut index: u64) -> String {
        let alphabet = self.alphabet(length);
        let base = alphabet.len() as u64;
        let mut bytes = vec![alphabet[0]; length as usize];

        for slot in bytes.iter_mut().rev() {
            *slot = alphabet[(index % base) as usize];
            index /= base;
        }

        // Alphabets are ASCII
        bytes.into_iter().map(char::from).collect()
    }

    fn start(&self) -> Position {
        Position {
            length: self.min_length,
            tld_index: 0,
            combo_index: 0,
        }
    }
}

/// A point in the keyspace; the only progress state that is persisted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub length: u32,
    pub tld_index: usize,
    pub combo_index: u64,
}

/// What an `advance` crossed, coarsest boundary wins
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Next label under the same length and TLD
    Combo,
    /// Moved on to the next TLD
    NextTld,
    /// Moved on to the next length
    NextLength,
    /// Passed the maximum length and restarted at the minimum
    Wrapped,
}

impl Step {
    /// True when a TLD or length boundary was crossed
    pub fn is_boundary(&self) -> bool {
        !matches!(self, Self::Combo)
    }
}

/// Cyclic cursor over the candidate keyspace
///
/// The current candidate is a pure function of the position, so a cursor
/// restored from a saved position yields exactly the candidate that would
/// have come next before the restart.
#[derive(Debug, Clone)]
pub struct EnumerationCursor {
    layout: KeyspaceLayout,
    position: Position,
}

impl EnumerationCursor {
    /// Creates a cursor at the very start of the keyspace
    pub fn new(layout: KeyspaceLayout) -> Self {
        let position = layout.start();
        Self { layout, position }
    }

    /// Restores a cursor from a persisted position
    ///
    /// Positions that no longer fit the layout (the TLD list shrank, the
    /// length bounds moved) are carried forward to the next valid position
    /// rather than rewound.
    pub fn from_position(layout: KeyspaceLayout, position: Position) -> Self {
        let mut cursor = Self { layout, position };
        cursor.normalize();
        cursor
    }

    pub fn layout(&self) -> &KeyspaceLayout {
        &self.layout
    }

    pub fn position(&self) -> Position {
        self.position
    }

    /// The candidate at the current position
    pub fn current(&self) -> Candidate {
        let Position {
            length,
            tld_index,
            combo_index,
        } = self.position;
        Candidate::new(
            self.layout.label(length, combo_index),
            self.layout.tlds[tld_index].clone(),
        )
    }

    /// Moves to the next candidate in the total order
    pub fn advance(&mut self) -> Step {
        self.position.combo_index += 1;
        if self.position.combo_index < self.layout.space_size(self.position.length) {
            return Step::Combo;
        }

        self.position.combo_index = 0;
        self.position.tld_index += 1;
        if self.position.tld_index < self.layout.tlds.len() {
            return Step::NextTld;
        }

        self.position.tld_index = 0;
        self.position.length += 1;
        if self.position.length <= self.layout.max_length {
            return Step::NextLength;
        }

        self.position = self.layout.start();
        Step::Wrapped
    }

    /// Number of labels per TLD at the current length
    pub fn space_size(&self) -> u64 {
        self.layout.space_size(self.position.length)
    }

    fn normalize(&mut self) {
        let layout = &self.layout;
        let pos = &mut self.position;

        if pos.length < layout.min_length || pos.length > layout.max_length {
            *pos = layout.start();
            return;
        }

        if pos.combo_index >= layout.space_size(pos.length) {
            pos.combo_index = 0;
            pos.tld_index += 1;
        }

        if pos.tld_index >= layout.tlds.len() {
            pos.combo_index = 0;
            pos.tld_index = 0;
            pos.length += 1;
            if pos.length > layout.max_length {
                *pos = layout.start();
            }
        }
    }
}
