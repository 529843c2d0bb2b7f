//! Content-addressed source cache
//!
//! Blobs live under `<base>/blobs/<first-2-hex>/<key>/content` and a
//! single `index.json` at the cache root tracks every entry. The
//! cache is self-healing: a missing blob or an expired TTL is a miss,
//! never an error.

use crate::cache::policy::normalize_uri;
use crate::config::ConfigManager;
use crate::error::{GroundworkError, GroundworkResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, warn};

const INDEX_FILE: &str = "index.json";
const BLOBS_DIR: &str = "blobs";
const CONTENT_DIR: &str = "content";

/// One cached source in the index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    pub uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub path: PathBuf,
    pub created_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
    /// TTL in seconds; 0 means the entry never expires.
    #[serde(default)]
    pub ttl_secs: u64,
    #[serde(default)]
    pub content_hash: String,
}

impl CacheEntry {
    fn expired(&self, now: DateTime<Utc>) -> bool {
        if self.ttl_secs == 0 {
            return false;
        }
        let age = now.signed_duration_since(self.created_at);
        age.num_seconds() >= 0 && age.num_seconds() as u64 >= self.ttl_secs
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CacheIndex {
    entries: HashMap<String, CacheEntry>,
}

#[derive(Debug, Default)]
struct CacheInner {
    base: Option<PathBuf>,
    index: CacheIndex,
    loaded: bool,
}

/// Aggregate usage report for `cache info`.
#[derive(Debug, Clone)]
pub struct CacheUsage {
    pub base: PathBuf,
    pub entries: usize,
    pub total_bytes: u64,
}

/// Content-addressed cache of downloaded sources.
pub struct SourceCache {
    inner: Mutex<CacheInner>,
}

impl Default for SourceCache {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceCache {
    /// Cache rooted at the platform cache directory.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(CacheInner::default()),
        }
    }

    /// Cache rooted at an explicit path. Used by tests and by callers
    /// that manage their own cache location.
    pub fn with_base_path(base: impl Into<PathBuf>) -> Self {
        Self {
            inner: Mutex::new(CacheInner {
                base: Some(base.into()),
                ..CacheInner::default()
            }),
        }
    }

    /// Deterministic cache key for a source: SHA-256 over the
    /// normalized URI concatenated with the version.
    pub fn generate_key(uri: &str, version: Option<&str>) -> String {
        let mut hasher = Sha256::new();
        hasher.update(normalize_uri(uri).as_bytes());
        hasher.update(version.unwrap_or_default().as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Look up an entry, refreshing its last-access time on a hit.
    pub fn get(&self, key: &str) -> GroundworkResult<Option<CacheEntry>> {
        let mut inner = self.inner.lock().map_err(poisoned)?;
        let base = ensure_loaded(&mut inner)?;

        let Some(mut entry) = inner.index.entries.get(key).cloned() else {
            return Ok(None);
        };

        let now = Utc::now();
        if entry.expired(now) {
            debug!(key, "cache entry expired, evicting");
            evict(&mut inner, &base, key);
            return Ok(None);
        }
        if !entry.path.is_dir() {
            debug!(key, "cache blob missing, dropping index entry");
            evict(&mut inner, &base, key);
            return Ok(None);
        }

        if let Some(e) = inner.index.entries.get_mut(key) {
            e.last_accessed_at = now;
        }
        if let Err(e) = save_index(&base, &inner.index) {
            warn!("failed to record cache access time: {e}");
        }
        // Hand back the refreshed entry so callers and the index agree
        // on the access time.
        entry.last_accessed_at = now;
        Ok(Some(entry))
    }

    /// Store a source directory under `key`, replacing any existing
    /// blob, and persist the index. Returns the entry with its final
    /// blob path filled in.
    pub fn put(&self, source_dir: &Path, mut entry: CacheEntry) -> GroundworkResult<CacheEntry> {
        let mut inner = self.inner.lock().map_err(poisoned)?;
        let base = ensure_loaded(&mut inner)?;

        let content = content_path(&base, &entry.key);
        if content.exists() {
            fs::remove_dir_all(&content).map_err(|e| GroundworkError::CacheWrite {
                key: entry.key.clone(),
                reason: format!("removing stale blob: {e}"),
            })?;
        }
        if let Some(parent) = content.parent() {
            fs::create_dir_all(parent).map_err(|e| GroundworkError::CacheWrite {
                key: entry.key.clone(),
                reason: format!("creating blob directory: {e}"),
            })?;
        }
        copy_dir(source_dir, &content).map_err(|e| GroundworkError::CacheWrite {
            key: entry.key.clone(),
            reason: format!("copying source into cache: {e}"),
        })?;

        entry.path = content;
        inner.index.entries.insert(entry.key.clone(), entry.clone());
        save_index(&base, &inner.index)?;
        Ok(entry)
    }

    /// Drop a single entry and its blob. Missing entries are a no-op.
    pub fn remove(&self, key: &str) -> GroundworkResult<()> {
        let mut inner = self.inner.lock().map_err(poisoned)?;
        let base = ensure_loaded(&mut inner)?;

        let blob = content_path(&base, key);
        if let Some(blob_dir) = blob.parent() {
            if blob_dir.exists() {
                fs::remove_dir_all(blob_dir).map_err(|e| GroundworkError::CacheWrite {
                    key: key.to_string(),
                    reason: format!("removing blob: {e}"),
                })?;
            }
        }
        if inner.index.entries.remove(key).is_some() {
            save_index(&base, &inner.index)?;
        }
        Ok(())
    }

    /// Remove the entire cache directory and reset state.
    pub fn clear(&self) -> GroundworkResult<()> {
        let mut inner = self.inner.lock().map_err(poisoned)?;
        let base = ensure_loaded(&mut inner)?;
        if base.exists() {
            fs::remove_dir_all(&base)
                .map_err(|e| GroundworkError::io(format!("clearing cache at {}", base.display()), e))?;
        }
        inner.index.entries.clear();
        Ok(())
    }

    /// Blob content path for a known key, without touching access
    /// times.
    pub fn path(&self, key: &str) -> GroundworkResult<Option<PathBuf>> {
        let mut inner = self.inner.lock().map_err(poisoned)?;
        ensure_loaded(&mut inner)?;
        Ok(inner.index.entries.get(key).map(|e| e.path.clone()))
    }

    /// All current entries, sorted by creation time.
    pub fn entries(&self) -> GroundworkResult<Vec<CacheEntry>> {
        let mut inner = self.inner.lock().map_err(poisoned)?;
        ensure_loaded(&mut inner)?;
        let mut entries: Vec<_> = inner.index.entries.values().cloned().collect();
        entries.sort_by_key(|e| e.created_at);
        Ok(entries)
    }

    /// Disk usage summary.
    pub fn usage(&self) -> GroundworkResult<CacheUsage> {
        let mut inner = self.inner.lock().map_err(poisoned)?;
        let base = ensure_loaded(&mut inner)?;
        let mut total_bytes = 0;
        if base.exists() {
            for entry in walkdir::WalkDir::new(&base).into_iter().flatten() {
                if entry.file_type().is_file() {
                    if let Ok(meta) = entry.metadata() {
                        total_bytes += meta.len();
                    }
                }
            }
        }
        Ok(CacheUsage {
            base,
            entries: inner.index.entries.len(),
            total_bytes,
        })
    }
}

fn poisoned<T>(_: std::sync::PoisonError<T>) -> GroundworkError {
    GroundworkError::Internal("cache lock poisoned".to_string())
}

fn content_path(base: &Path, key: &str) -> PathBuf {
    let shard = key.get(..2).unwrap_or("00");
    base.join(BLOBS_DIR).join(shard).join(key).join(CONTENT_DIR)
}

/// Resolve the base path and lazily load the index. A missing index
/// file is an empty cache; a corrupt one is reset with a warning.
fn ensure_loaded(inner: &mut CacheInner) -> GroundworkResult<PathBuf> {
    let base = match &inner.base {
        Some(base) => base.clone(),
        None => {
            let base = ConfigManager::cache_root();
            inner.base = Some(base.clone());
            base
        }
    };
    if inner.loaded {
        return Ok(base);
    }
    let index_path = base.join(INDEX_FILE);
    if index_path.exists() {
        let raw = fs::read_to_string(&index_path)
            .map_err(|e| GroundworkError::io(format!("reading {}", index_path.display()), e))?;
        match serde_json::from_str(&raw) {
            Ok(index) => inner.index = index,
            Err(e) => {
                warn!("cache index at {} is corrupt, resetting: {e}", index_path.display());
                inner.index = CacheIndex::default();
            }
        }
    }
    inner.loaded = true;
    Ok(base)
}

fn evict(inner: &mut CacheInner, base: &Path, key: &str) {
    let blob = content_path(base, key);
    if let Some(blob_dir) = blob.parent() {
        if blob_dir.exists() {
            if let Err(e) = fs::remove_dir_all(blob_dir) {
                warn!(key, "failed to remove cache blob: {e}");
            }
        }
    }
    inner.index.entries.remove(key);
    if let Err(e) = save_index(base, &inner.index) {
        warn!(key, "failed to persist cache index after eviction: {e}");
    }
}

/// Rewrite the index wholesale via temp file and atomic rename.
fn save_index(base: &Path, index: &CacheIndex) -> GroundworkResult<()> {
    let index_path = base.join(INDEX_FILE);
    fs::create_dir_all(base).map_err(|e| GroundworkError::CacheIndex {
        path: index_path.clone(),
        reason: format!("creating cache directory: {e}"),
    })?;
    let json = serde_json::to_string_pretty(index)?;
    let mut tmp = tempfile::NamedTempFile::new_in(base).map_err(|e| GroundworkError::CacheIndex {
        path: index_path.clone(),
        reason: format!("creating temp file: {e}"),
    })?;
    tmp.write_all(json.as_bytes())
        .map_err(|e| GroundworkError::CacheIndex {
            path: index_path.clone(),
            reason: format!("writing index: {e}"),
        })?;
    tmp.persist(&index_path).map_err(|e| GroundworkError::CacheIndex {
        path: index_path.clone(),
        reason: format!("renaming into place: {e}"),
    })?;
    Ok(())
}

/// Recursive copy preserving permissions; symlinks are recreated
/// rather than followed.
pub(crate) fn copy_dir(src: &Path, dst: &Path) -> std::io::Result<()> {
    fs::create_dir_all(dst)?;
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            copy_dir(&src_path, &dst_path)?;
        } else if file_type.is_symlink() {
            #[cfg(unix)]
            {
                let target = fs::read_link(&src_path)?;
                std::os::unix::fs::symlink(target, &dst_path)?;
            }
            #[cfg(not(unix))]
            {
                fs::copy(&src_path, &dst_path)?;
            }
        } else {
            fs::copy(&src_path, &dst_path)?;
        }
    }
    Ok(())
}
