//! Crash-safe workdir metadata
//!
//! Each workdir carries a JSON metadata file in a reserved
//! subdirectory. Writes go through an advisory lock plus atomic
//! temp-write-and-rename, so a crashed writer never leaves a torn
//! file behind.

pub mod lock;

pub use lock::{platform_lock, AdvisoryFileLock, LockGuard, MetadataLock, SettleLock};

use crate::error::{GroundworkError, GroundworkResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::Path;
use tracing::{debug, warn};

/// Reserved subdirectory inside every workdir. Excluded from content
/// hashing and never deleted by sync.
pub const METADATA_DIR: &str = ".groundwork";
/// Metadata file name inside [`METADATA_DIR`].
pub const METADATA_FILE: &str = "metadata.json";
/// Lock file name inside [`METADATA_DIR`].
pub const LOCK_FILE: &str = "metadata.lock";
/// Pre-0.3 layout kept metadata as a flat file in the workdir root.
pub const LEGACY_METADATA_FILE: &str = ".workdir-metadata.json";

/// Where a workdir's content came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Local,
    Remote,
}

/// Provenance record for one workdir.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkdirMetadata {
    pub component: String,
    pub stack: String,
    pub source_type: SourceType,
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default)]
    pub content_hash: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_accessed: Option<DateTime<Utc>>,
}

/// Reads and writes workdir metadata under a cross-process lock.
pub struct MetadataStore {
    lock: Box<dyn MetadataLock>,
}

impl Default for MetadataStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MetadataStore {
    pub fn new() -> Self {
        Self {
            lock: platform_lock(),
        }
    }

    pub fn with_lock(lock: Box<dyn MetadataLock>) -> Self {
        Self { lock }
    }

    /// Read metadata for a workdir. Missing or corrupt metadata, or a
    /// writer holding the lock, all read as absent.
    pub fn read(&self, workdir: &Path) -> GroundworkResult<Option<WorkdirMetadata>> {
        let meta_path = workdir.join(METADATA_DIR).join(METADATA_FILE);
        let legacy_path = workdir.join(LEGACY_METADATA_FILE);
        if !meta_path.exists() && !legacy_path.exists() {
            return Ok(None);
        }

        // The lock file lives in the metadata dir; a legacy-only
        // workdir has no such dir, so read it best-effort. Atomic
        // rename on write keeps even unlocked reads consistent.
        let _guard = if workdir.join(METADATA_DIR).is_dir() {
            match self.lock.shared(&workdir.join(METADATA_DIR).join(LOCK_FILE)) {
                Some(guard) => Some(guard),
                None => {
                    debug!(path = %workdir.display(), "metadata locked by writer, reading as absent");
                    return Ok(None);
                }
            }
        } else {
            None
        };

        Ok(read_unlocked(&meta_path, &legacy_path))
    }

    /// Write metadata atomically under an exclusive lock.
    pub fn write(&self, workdir: &Path, metadata: &WorkdirMetadata) -> GroundworkResult<()> {
        let meta_dir = workdir.join(METADATA_DIR);
        fs::create_dir_all(&meta_dir).map_err(|e| GroundworkError::WorkdirMetadata {
            path: meta_dir.clone(),
            reason: format!("creating metadata directory: {e}"),
        })?;

        let _guard = self.lock.exclusive(&meta_dir.join(LOCK_FILE))?;
        atomic_write_json(&meta_dir.join(METADATA_FILE), metadata)
    }

    /// Bump `last_accessed` to now. A workdir without metadata is
    /// left untouched. Legacy-layout metadata migrates to the current
    /// location on first touch.
    pub fn touch(&self, workdir: &Path) -> GroundworkResult<()> {
        let meta_path = workdir.join(METADATA_DIR).join(METADATA_FILE);
        let legacy_path = workdir.join(LEGACY_METADATA_FILE);
        if !meta_path.exists() && !legacy_path.exists() {
            return Ok(());
        }

        let meta_dir = workdir.join(METADATA_DIR);
        fs::create_dir_all(&meta_dir).map_err(|e| GroundworkError::WorkdirMetadata {
            path: meta_dir.clone(),
            reason: format!("creating metadata directory: {e}"),
        })?;
        let _guard = self.lock.exclusive(&meta_dir.join(LOCK_FILE))?;

        let Some(mut metadata) = read_unlocked(&meta_path, &legacy_path) else {
            return Ok(());
        };
        metadata.last_accessed = Some(Utc::now());
        atomic_write_json(&meta_path, &metadata)
    }
}

fn read_unlocked(meta_path: &Path, legacy_path: &Path) -> Option<WorkdirMetadata> {
    for path in [meta_path, legacy_path] {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(_) => continue,
        };
        match serde_json::from_str(&raw) {
            Ok(metadata) => return Some(metadata),
            Err(e) => {
                warn!("corrupt workdir metadata at {}: {e}", path.display());
                continue;
            }
        }
    }
    None
}

fn atomic_write_json(path: &Path, metadata: &WorkdirMetadata) -> GroundworkResult<()> {
    let parent = path
        .parent()
        .ok_or_else(|| GroundworkError::PathNotFound(path.to_path_buf()))?;
    let json = serde_json::to_string_pretty(metadata)?;
    let mut tmp =
        tempfile::NamedTempFile::new_in(parent).map_err(|e| GroundworkError::WorkdirMetadata {
            path: path.to_path_buf(),
            reason: format!("creating temp file: {e}"),
        })?;
    tmp.write_all(json.as_bytes())
        .map_err(|e| GroundworkError::WorkdirMetadata {
            path: path.to_path_buf(),
            reason: format!("writing metadata: {e}"),
        })?;
    tmp.persist(path).map_err(|e| GroundworkError::WorkdirMetadata {
        path: path.to_path_buf(),
        reason: format!("renaming into place: {e}"),
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample() -> WorkdirMetadata {
        WorkdirMetadata {
            component: "vpc".to_string(),
            stack: "dev".to_string(),
            source_type: SourceType::Local,
            source: "components/terraform/vpc".to_string(),
            version: None,
            content_hash: "abc123".to_string(),
            created_at: Utc::now(),
            updated_at: Some(Utc::now()),
            last_accessed: Some(Utc::now()),
        }
    }

    #[test]
    fn write_then_read_round_trips() {
        let dir = TempDir::new().unwrap();
        let store = MetadataStore::new();
        let metadata = sample();

        store.write(dir.path(), &metadata).unwrap();
        let loaded = store.read(dir.path()).unwrap().unwrap();
        assert_eq!(loaded, metadata);
    }

    #[test]
    fn metadata_lands_in_reserved_dir() {
        let dir = TempDir::new().unwrap();
        let store = MetadataStore::new();
        store.write(dir.path(), &sample()).unwrap();

        let path = dir.path().join(METADATA_DIR).join(METADATA_FILE);
        assert!(path.exists());
        let raw = fs::read_to_string(path).unwrap();
        assert!(raw.contains("\"component\": \"vpc\""));
        assert!(raw.contains("\"stack\": \"dev\""));
        assert!(raw.contains("\"source_type\": \"local\""));
        assert!(raw.contains("\"content_hash\": \"abc123\""));
    }

    #[test]
    fn missing_metadata_reads_as_none() {
        let dir = TempDir::new().unwrap();
        let store = MetadataStore::new();
        assert!(store.read(dir.path()).unwrap().is_none());
    }

    #[test]
    fn corrupt_metadata_reads_as_none() {
        let dir = TempDir::new().unwrap();
        let store = MetadataStore::new();
        let meta_dir = dir.path().join(METADATA_DIR);
        fs::create_dir_all(&meta_dir).unwrap();
        fs::write(meta_dir.join(METADATA_FILE), "not json{").unwrap();

        assert!(store.read(dir.path()).unwrap().is_none());
    }

    #[test]
    fn legacy_flat_file_is_readable() {
        let dir = TempDir::new().unwrap();
        let store = MetadataStore::new();
        let metadata = sample();
        fs::write(
            dir.path().join(LEGACY_METADATA_FILE),
            serde_json::to_string(&metadata).unwrap(),
        )
        .unwrap();

        let loaded = store.read(dir.path()).unwrap().unwrap();
        assert_eq!(loaded.component, "vpc");
    }

    #[test]
    fn touch_bumps_last_accessed() {
        let dir = TempDir::new().unwrap();
        let store = MetadataStore::new();
        let mut metadata = sample();
        metadata.last_accessed = Some(Utc::now() - chrono::Duration::days(3));
        store.write(dir.path(), &metadata).unwrap();

        store.touch(dir.path()).unwrap();
        let loaded = store.read(dir.path()).unwrap().unwrap();
        let age = Utc::now().signed_duration_since(loaded.last_accessed.unwrap());
        assert!(age.num_seconds() < 60);
    }

    #[test]
    fn touch_without_metadata_is_noop() {
        let dir = TempDir::new().unwrap();
        let store = MetadataStore::new();
        store.touch(dir.path()).unwrap();
        assert!(!dir.path().join(METADATA_DIR).exists());
    }

    #[test]
    fn touch_migrates_legacy_layout() {
        let dir = TempDir::new().unwrap();
        let store = MetadataStore::new();
        fs::write(
            dir.path().join(LEGACY_METADATA_FILE),
            serde_json::to_string(&sample()).unwrap(),
        )
        .unwrap();

        store.touch(dir.path()).unwrap();
        assert!(dir.path().join(METADATA_DIR).join(METADATA_FILE).exists());
    }

    #[test]
    fn optional_fields_default_when_absent() {
        let dir = TempDir::new().unwrap();
        let store = MetadataStore::new();
        let meta_dir = dir.path().join(METADATA_DIR);
        fs::create_dir_all(&meta_dir).unwrap();
        fs::write(
            meta_dir.join(METADATA_FILE),
            r#"{
                "component": "vpc",
                "stack": "dev",
                "source_type": "remote",
                "source": "github.com/org/repo",
                "created_at": "2026-01-01T00:00:00Z"
            }"#,
        )
        .unwrap();

        let loaded = store.read(dir.path()).unwrap().unwrap();
        assert_eq!(loaded.source_type, SourceType::Remote);
        assert!(loaded.updated_at.is_none());
        assert!(loaded.last_accessed.is_none());
        assert!(loaded.content_hash.is_empty());
    }

    #[test]
    fn concurrent_writes_leave_valid_metadata() {
        let dir = TempDir::new().unwrap();
        let workdir = dir.path().to_path_buf();
        let mut handles = Vec::new();
        for i in 0..4 {
            let workdir = workdir.clone();
            handles.push(std::thread::spawn(move || {
                let store = MetadataStore::new();
                let mut metadata = sample();
                metadata.content_hash = format!("hash-{i}");
                store.write(&workdir, &metadata).unwrap();
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        let store = MetadataStore::new();
        let loaded = store.read(&workdir).unwrap().unwrap();
        assert!(loaded.content_hash.starts_with("hash-"));
    }
}
