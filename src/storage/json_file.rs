//! JSON file persistence
//!
//! Both files are rewritten whole on every save through a temporary file
//! that is fsynced and renamed over the target, so a crash leaves either the
//! old or the new contents and never a torn write.

use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{Checkpoint, FoundRecord};
use serde::de::DeserializeOwned;
use std::collections::HashSet;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Checkpoint and found list kept as two JSON documents
#[derive(Debug, Clone)]
pub struct JsonFileStorage {
    checkpoint_path: PathBuf,
    found_path: PathBuf,
}

impl JsonFileStorage {
    pub fn new(checkpoint_path: impl Into<PathBuf>, found_path: impl Into<PathBuf>) -> Self {
        Self {
            checkpoint_path: checkpoint_path.into(),
            found_path: found_path.into(),
        }
    }

    pub fn checkpoint_path(&self) -> &Path {
        &self.checkpoint_path
    }

    pub fn found_path(&self) -> &Path {
        &self.found_path
    }
}

impl Storage for JsonFileStorage {
    fn load_checkpoint(&self) -> StorageResult<Option<Checkpoint>> {
        read_json(&self.checkpoint_path)
    }

    fn save_checkpoint(&mut self, checkpoint: &Checkpoint) -> StorageResult<()> {
        let bytes = serde_json::to_vec_pretty(checkpoint)?;
        write_atomic(&self.checkpoint_path, &bytes)
    }

    fn load_found(&self) -> StorageResult<Vec<FoundRecord>> {
        Ok(read_json(&self.found_path)?.unwrap_or_default())
    }

    fn append_found(&mut self, records: &[FoundRecord]) -> StorageResult<usize> {
        if records.is_empty() {
            return Ok(0);
        }

        let mut found = self.load_found()?;
        let mut known: HashSet<String> = found.iter().map(|r| r.domain.clone()).collect();

        let before = found.len();
        for record in records {
            if known.insert(record.domain.clone()) {
                found.push(record.clone());
            }
        }

        let appended = found.len() - before;
        if appended > 0 {
            let bytes = serde_json::to_vec_pretty(&found)?;
            write_atomic(&self.found_path, &bytes)?;
        }
        Ok(appended)
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> StorageResult<Option<T>> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(StorageError::io(path, e)),
    };

    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|source| StorageError::Corrupt {
            path: path.to_path_buf(),
            source,
        })
}

/// Writes `bytes` to `path` via a synced temporary file and a rename
pub fn write_atomic(path: &Path, bytes: &[u8]) -> StorageResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| StorageError::io(parent, e))?;
    }

    let tmp_path = path.with_extension("tmp");
    {
        let mut f = File::create(&tmp_path).map_err(|e| StorageError::io(&tmp_path, e))?;
        f.write_all(bytes).map_err(|e| StorageError::io(&tmp_path, e))?;
        f.sync_all().map_err(|e| StorageError::io(&tmp_path, e))?;
    }
    std::fs::rename(&tmp_path, path).map_err(|e| StorageError::io(path, e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tempfile::TempDir;

    fn storage(dir: &TempDir) -> JsonFileStorage {
        JsonFileStorage::new(
            dir.path().join("state/hunter_state.json"),
            dir.path().join("found_domains.json"),
        )
    }

    fn record(domain: &str) -> FoundRecord {
        FoundRecord {
            domain: domain.to_string(),
            length: domain.split('.').next().map_or(0, |t| t.len() as u32),
            found_at: Utc::now(),
        }
    }

    #[test]
    fn test_missing_files_are_empty() {
        let dir = TempDir::new().unwrap();
        let storage = storage(&dir);

        assert!(storage.load_checkpoint().unwrap().is_none());
        assert!(storage.load_found().unwrap().is_empty());
    }

    #[test]
    fn test_checkpoint_save_and_load() {
        let dir = TempDir::new().unwrap();
        let mut storage = storage(&dir);

        let checkpoint = Checkpoint {
            length: 4,
            tld_index: 2,
            combo_index: 500,
            total_checked: 12_345,
            total_found: 3,
            last_update: Utc::now(),
            config_hash: Some("abc123".to_string()),
        };
        storage.save_checkpoint(&checkpoint).unwrap();

        let loaded = storage.load_checkpoint().unwrap().unwrap();
        assert_eq!(loaded, checkpoint);
        assert!(!storage.checkpoint_path().with_extension("tmp").exists());
    }

    #[test]
    fn test_checkpoint_uses_snake_case_keys() {
        let dir = TempDir::new().unwrap();
        let mut storage = storage(&dir);
        storage.save_checkpoint(&Checkpoint::default()).unwrap();

        let raw = std::fs::read_to_string(storage.checkpoint_path()).unwrap();
        assert!(raw.contains("\"current_length\""));
        assert!(raw.contains("\"current_tld_index\""));
        assert!(raw.contains("\"total_checked\""));
    }

    #[test]
    fn test_corrupt_checkpoint_is_an_error() {
        let dir = TempDir::new().unwrap();
        let storage = storage(&dir);
        std::fs::create_dir_all(storage.checkpoint_path().parent().unwrap()).unwrap();
        std::fs::write(storage.checkpoint_path(), "{ not json").unwrap();

        assert!(matches!(
            storage.load_checkpoint(),
            Err(StorageError::Corrupt { .. })
        ));
    }

    #[test]
    fn test_append_found_skips_duplicates() {
        let dir = TempDir::new().unwrap();
        let mut storage = storage(&dir);

        assert_eq!(storage.append_found(&[record("abc.io"), record("xyz.ai")]).unwrap(), 2);
        assert_eq!(storage.append_found(&[record("abc.io"), record("qqq.me")]).unwrap(), 1);
        assert_eq!(storage.append_found(&[]).unwrap(), 0);

        let domains: Vec<String> = storage.load_found().unwrap().into_iter().map(|r| r.domain).collect();
        assert_eq!(domains, vec!["abc.io", "xyz.ai", "qqq.me"]);
    }
}
