//! Domain Hunter: a consensus-driven short domain scanner
//!
//! This crate enumerates short domain names in a fixed, resumable order and
//! classifies each one by polling many unreliable, rate-limited availability
//! sources, reconciling their signals into a single conservative verdict.

pub mod config;
pub mod consensus;
pub mod cursor;
pub mod egress;
pub mod notify;
pub mod output;
pub mod registry;
pub mod scan;
pub mod sources;
pub mod state;
pub mod storage;

use thiserror::Error;

/// Main error type for Domain Hunter operations
#[derive(Debug, Error)]
pub enum HunterError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Invalid scan phase transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: state::ScanPhase,
        to: state::ScanPhase,
    },
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid TLD: {0}")]
    InvalidTld(String),
}

/// Result type alias for Domain Hunter operations
pub type Result<T> = std::result::Result<T, HunterError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use consensus::{Classification, ConsensusClassifier, Verdict};
pub use cursor::{Candidate, EnumerationCursor};
pub use egress::{EgressIdentity, EgressPool};
pub use registry::SourceRegistry;
pub use scan::ScanController;
pub use sources::{Signal, Source, SourceError};
