//! Configuration module for Domain Hunter
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use domain_hunter::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("hunter.toml")).unwrap();
//! println!("Scanning lengths {}..={}", config.scan.min_length, config.scan.max_length);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, ConsensusConfig, DetectionKind, EgressConfig, HealthConfig, HttpConfig,
    NotifyConfig, OutputConfig, ScanConfig, SourceEntry, DEFAULT_TLDS,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
pub use validation::validate;
