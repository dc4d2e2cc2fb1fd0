//! Storage module for persisting scan progress and finds
//!
//! This module handles:
//! - The checkpoint, which names the next unprocessed candidate
//! - The append-only list of available domains found
//! - Crash-safe writes for both

mod json_file;
mod traits;

pub use json_file::{write_atomic, JsonFileStorage};
pub use traits::{Storage, StorageError, StorageResult};

use crate::config::OutputConfig;
use crate::cursor::Position;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opens the JSON storage named in the output configuration
pub fn open_storage(config: &OutputConfig) -> JsonFileStorage {
    JsonFileStorage::new(&config.checkpoint_path, &config.found_path)
}

/// Persisted scan progress
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    #[serde(rename = "current_length")]
    pub length: u32,

    #[serde(rename = "current_tld_index")]
    pub tld_index: usize,

    #[serde(rename = "current_combo_index")]
    pub combo_index: u64,

    pub total_checked: u64,
    pub total_found: u64,
    pub last_update: DateTime<Utc>,

    /// Hash of the configuration the scan ran with
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_hash: Option<String>,
}

impl Checkpoint {
    /// Cursor position this checkpoint resumes from
    pub fn position(&self) -> Position {
        Position {
            length: self.length,
            tld_index: self.tld_index,
            combo_index: self.combo_index,
        }
    }
}

impl Default for Checkpoint {
    fn default() -> Self {
        Self {
            length: 0,
            tld_index: 0,
            combo_index: 0,
            total_checked: 0,
            total_found: 0,
            last_update: Utc::now(),
            config_hash: None,
        }
    }
}

/// One available domain, as recorded when found
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FoundRecord {
    pub domain: String,
    pub length: u32,
    pub found_at: DateTime<Utc>,
}
