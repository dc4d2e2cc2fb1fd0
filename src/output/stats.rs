//! Statistics generation from stored scan state
//!
//! This module provides functionality for extracting and displaying
//! progress and finds from the storage layer.

use crate::storage::{Checkpoint, FoundRecord, Storage, StorageResult};
use std::collections::BTreeMap;
use std::fmt::Write;

/// Finds listed per length before the rest are summarised
const MAX_LISTED_PER_LENGTH: usize = 10;

/// Scan statistics summary
#[derive(Debug, Clone)]
pub struct ScanStatistics {
    /// Last saved progress, if the scan ever checkpointed
    pub checkpoint: Option<Checkpoint>,

    /// Found domains grouped by label length
    pub found_by_length: BTreeMap<u32, Vec<FoundRecord>>,

    pub total_found: usize,
}

/// Loads statistics from storage
///
/// # Arguments
///
/// * `storage` - The storage backend to read
///
/// # Returns
///
/// * `Ok(ScanStatistics)` - Successfully loaded statistics
/// * `Err(StorageError)` - A file exists but could not be read
pub fn load_statistics(storage: &dyn Storage) -> StorageResult<ScanStatistics> {
    let checkpoint = storage.load_checkpoint()?;
    let found = storage.load_found()?;
    let total_found = found.len();

    let mut found_by_length: BTreeMap<u32, Vec<FoundRecord>> = BTreeMap::new();
    for record in found {
        found_by_length.entry(record.length).or_default().push(record);
    }

    Ok(ScanStatistics {
        checkpoint,
        found_by_length,
        total_found,
    })
}

/// Formats statistics as a human-readable report
///
/// # Arguments
///
/// * `stats` - The statistics to display
/// * `tlds` - Configured TLD order, used to name the current TLD
pub fn render_statistics(stats: &ScanStatistics, tlds: &[String]) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail
    let _ = write_report(&mut out, stats, tlds);
    out
}

fn write_report(out: &mut String, stats: &ScanStatistics, tlds: &[String]) -> std::fmt::Result {
    writeln!(out, "=== Scan Statistics ===\n")?;

    match &stats.checkpoint {
        Some(checkpoint) => {
            let tld = tlds
                .get(checkpoint.tld_index)
                .map_or_else(|| format!("#{}", checkpoint.tld_index), |t| format!(".{}", t));
            writeln!(out, "Progress:")?;
            writeln!(out, "  Current length: {} characters", checkpoint.length)?;
            writeln!(out, "  Current TLD: {}", tld)?;
            writeln!(out, "  Combination index: {}", checkpoint.combo_index)?;
            writeln!(out, "  Total checked: {}", checkpoint.total_checked)?;
            writeln!(out, "  Total found: {}", checkpoint.total_found)?;
            writeln!(out, "  Last update: {}", checkpoint.last_update.to_rfc3339())?;
            writeln!(out)?;
        }
        None => {
            writeln!(out, "No checkpoint yet; the scan has not started.\n")?;
        }
    }

    if stats.total_found == 0 {
        writeln!(out, "No domains found yet")?;
        return Ok(());
    }

    writeln!(out, "Found Domains ({} total):", stats.total_found)?;
    for (length, records) in &stats.found_by_length {
        writeln!(out, "\n  {}-character domains ({}):", length, records.len())?;
        for record in records.iter().take(MAX_LISTED_PER_LENGTH) {
            writeln!(out, "    - {} (found {})", record.domain, record.found_at.to_rfc3339())?;
        }
        if records.len() > MAX_LISTED_PER_LENGTH {
            writeln!(out, "    ... and {} more", records.len() - MAX_LISTED_PER_LENGTH)?;
        }
    }

    Ok(())
}

/// Prints statistics to stdout
pub fn print_statistics(stats: &ScanStatistics, tlds: &[String]) {
    print!("{}", render_statistics(stats, tlds));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::JsonFileStorage;
    use chrono::Utc;
    use tempfile::TempDir;

    fn record(domain: &str, length: u32) -> FoundRecord {
        FoundRecord {
            domain: domain.to_string(),
            length,
            found_at: Utc::now(),
        }
    }

    #[test]
    fn test_load_statistics_groups_by_length() {
        let dir = TempDir::new().unwrap();
        let mut storage = JsonFileStorage::new(dir.path().join("cp.json"), dir.path().join("found.json"));

        let mut records: Vec<FoundRecord> = (0..12).map(|i| record(&format!("q{:03}.io", i), 4)).collect();
        records.push(record("zzz.ai", 3));
        storage.append_found(&records).unwrap();

        let stats = load_statistics(&storage).unwrap();
        assert_eq!(stats.total_found, 13);
        assert_eq!(stats.found_by_length[&3].len(), 1);
        assert_eq!(stats.found_by_length[&4].len(), 12);
        assert!(stats.checkpoint.is_none());

        let report = render_statistics(&stats, &[]);
        assert!(report.contains("Found Domains (13 total)"));
        assert!(report.contains("3-character domains (1)"));
        assert!(report.contains("... and 2 more"));
    }

    #[test]
    fn test_render_names_current_tld() {
        let stats = ScanStatistics {
            checkpoint: Some(Checkpoint {
                length: 4,
                tld_index: 1,
                combo_index: 77,
                total_checked: 1_000,
                ..Checkpoint::default()
            }),
            found_by_length: BTreeMap::new(),
            total_found: 0,
        };

        let report = render_statistics(&stats, &["io".to_string(), "ai".to_string()]);
        assert!(report.contains("Current TLD: .ai"));
        assert!(report.contains("Total checked: 1000"));
        assert!(report.contains("No domains found yet"));
    }
}
