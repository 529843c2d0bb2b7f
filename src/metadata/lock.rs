//! Cross-process metadata locking strategies
//!
//! Advisory file locks guard metadata reads and writes across
//! processes. Platforms with unreliable advisory locking fall back to
//! a settle delay, selected once at startup.

use crate::error::{GroundworkError, GroundworkResult};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

const LOCK_ATTEMPTS: u32 = 10;
const LOCK_RETRY_DELAY: Duration = Duration::from_millis(50);

/// Held lock; released on drop.
#[derive(Debug)]
pub struct LockGuard {
    file: Option<File>,
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if let Some(file) = self.file.take() {
            let _ = FileExt::unlock(&file);
        }
    }
}

/// Strategy for serializing metadata access across processes.
pub trait MetadataLock: Send + Sync {
    /// Acquire an exclusive lock, retrying briefly before giving up.
    fn exclusive(&self, lock_path: &Path) -> GroundworkResult<LockGuard>;

    /// Try a shared lock without blocking. `None` means a writer
    /// holds the file and the caller should treat the data as absent.
    fn shared(&self, lock_path: &Path) -> Option<LockGuard>;
}

/// flock-based locking with bounded retry.
pub struct AdvisoryFileLock {
    attempts: u32,
    delay: Duration,
}

impl Default for AdvisoryFileLock {
    fn default() -> Self {
        Self {
            attempts: LOCK_ATTEMPTS,
            delay: LOCK_RETRY_DELAY,
        }
    }
}

impl AdvisoryFileLock {
    #[cfg(test)]
    pub fn with_retry(attempts: u32, delay: Duration) -> Self {
        Self { attempts, delay }
    }

    fn open(lock_path: &Path) -> GroundworkResult<File> {
        OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(lock_path)
            .map_err(|e| GroundworkError::io(format!("opening lock {}", lock_path.display()), e))
    }
}

impl MetadataLock for AdvisoryFileLock {
    fn exclusive(&self, lock_path: &Path) -> GroundworkResult<LockGuard> {
        let file = Self::open(lock_path)?;
        for attempt in 0..self.attempts {
            match file.try_lock_exclusive() {
                Ok(()) => return Ok(LockGuard { file: Some(file) }),
                Err(_) if attempt + 1 < self.attempts => {
                    debug!(path = %lock_path.display(), attempt, "lock busy, retrying");
                    std::thread::sleep(self.delay);
                }
                Err(_) => break,
            }
        }
        Err(GroundworkError::MetadataLock(lock_path.to_path_buf()))
    }

    fn shared(&self, lock_path: &Path) -> Option<LockGuard> {
        let file = Self::open(lock_path).ok()?;
        FileExt::try_lock_shared(&file).ok()?;
        Some(LockGuard { file: Some(file) })
    }
}

/// Fallback strategy: wait out in-flight writers instead of locking.
/// Atomic rename on write keeps readers consistent.
pub struct SettleLock {
    settle: Duration,
}

impl Default for SettleLock {
    fn default() -> Self {
        Self {
            settle: Duration::from_millis(100),
        }
    }
}

impl MetadataLock for SettleLock {
    fn exclusive(&self, _lock_path: &Path) -> GroundworkResult<LockGuard> {
        std::thread::sleep(self.settle);
        Ok(LockGuard { file: None })
    }

    fn shared(&self, _lock_path: &Path) -> Option<LockGuard> {
        Some(LockGuard { file: None })
    }
}

/// Pick the locking strategy for this platform.
pub fn platform_lock() -> Box<dyn MetadataLock> {
    if cfg!(windows) {
        Box::new(SettleLock::default())
    } else {
        Box::new(AdvisoryFileLock::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn exclusive_lock_acquires_and_releases() {
        let dir = TempDir::new().unwrap();
        let lock_path = dir.path().join("metadata.lock");
        let lock = AdvisoryFileLock::default();

        let guard = lock.exclusive(&lock_path).unwrap();
        drop(guard);
        // Reacquirable after release.
        lock.exclusive(&lock_path).unwrap();
    }

    #[test]
    fn exclusive_lock_times_out_when_held() {
        let dir = TempDir::new().unwrap();
        let lock_path = dir.path().join("metadata.lock");
        let lock = AdvisoryFileLock::with_retry(2, Duration::from_millis(5));

        let holder = File::create(&lock_path).unwrap();
        holder.try_lock_exclusive().unwrap();

        let err = lock.exclusive(&lock_path).unwrap_err();
        assert!(matches!(err, GroundworkError::MetadataLock(_)));
    }

    #[test]
    fn shared_lock_yields_none_under_writer() {
        let dir = TempDir::new().unwrap();
        let lock_path = dir.path().join("metadata.lock");
        let lock = AdvisoryFileLock::default();

        let holder = File::create(&lock_path).unwrap();
        holder.try_lock_exclusive().unwrap();

        assert!(lock.shared(&lock_path).is_none());
    }

    #[test]
    fn shared_locks_coexist() {
        let dir = TempDir::new().unwrap();
        let lock_path = dir.path().join("metadata.lock");
        let lock = AdvisoryFileLock::default();

        let a = lock.shared(&lock_path);
        let b = lock.shared(&lock_path);
        assert!(a.is_some());
        assert!(b.is_some());
    }

    #[test]
    fn settle_lock_always_succeeds() {
        let dir = TempDir::new().unwrap();
        let lock_path = dir.path().join("metadata.lock");
        let lock = SettleLock {
            settle: Duration::from_millis(1),
        };
        lock.exclusive(&lock_path).unwrap();
        assert!(lock.shared(&lock_path).is_some());
    }
}
