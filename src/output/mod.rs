//! Output module for reporting scan progress
//!
//! This module handles:
//! - Summarising the checkpoint and found list from storage
//! - Rendering that summary for the `--stats` command

pub mod stats;

pub use stats::{load_statistics, print_statistics, render_statistics, ScanStatistics};
