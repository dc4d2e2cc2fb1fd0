//! State module for tracking scan progress and source health
//!
//! # Components
//!
//! - `HealthState`: per (source, egress) spacing, failure counting and backoff
//! - `ScanPhase`: the phases of the scan controller's state machine

mod health;
mod scan_phase;

// Re-export main types
pub use health::{FailureKind, HealthState};
pub use scan_phase::ScanPhase;
