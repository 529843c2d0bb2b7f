//! Content hashing for files and directory trees
//!
//! Directory hashes are stable across platforms: entries are visited
//! in sorted relative-path order with `/` separators, and the reserved
//! metadata directory is excluded so bookkeeping writes never change
//! the content hash.

use crate::error::{GroundworkError, GroundworkResult};
use crate::metadata::METADATA_DIR;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use walkdir::WalkDir;

/// Content hasher used for cache keys, sync comparisons, and workdir
/// content hashes.
pub trait Hasher: Send + Sync {
    /// Hash a single file's contents.
    fn hash_file(&self, path: &Path) -> GroundworkResult<String>;

    /// Hash a directory tree, excluding the reserved metadata dir.
    fn hash_dir(&self, path: &Path) -> GroundworkResult<String>;
}

/// SHA-256 implementation of [`Hasher`].
#[derive(Debug, Default, Clone, Copy)]
pub struct Sha256Hasher;

impl Hasher for Sha256Hasher {
    fn hash_file(&self, path: &Path) -> GroundworkResult<String> {
        let mut file = File::open(path)
            .map_err(|e| GroundworkError::io(format!("opening {} for hashing", path.display()), e))?;
        let mut hasher = Sha256::new();
        let mut buf = [0u8; 64 * 1024];
        loop {
            let n = file
                .read(&mut buf)
                .map_err(|e| GroundworkError::io(format!("reading {}", path.display()), e))?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }
        Ok(hex::encode(hasher.finalize()))
    }

    fn hash_dir(&self, path: &Path) -> GroundworkResult<String> {
        let mut files = Vec::new();
        for entry in WalkDir::new(path)
            .into_iter()
            .filter_entry(|e| e.file_name() != METADATA_DIR)
        {
            let entry = entry.map_err(|e| {
                GroundworkError::io(
                    format!("walking {}", path.display()),
                    e.into_io_error()
                        .unwrap_or_else(|| std::io::Error::other("walk error")),
                )
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let rel = entry
                .path()
                .strip_prefix(path)
                .map_err(|_| GroundworkError::PathNotFound(entry.path().to_path_buf()))?;
            files.push((portable_path(rel), entry.path().to_path_buf()));
        }
        files.sort();

        let mut hasher = Sha256::new();
        for (rel, abs) in files {
            let file_hash = self.hash_file(&abs)?;
            hasher.update(rel.as_bytes());
            hasher.update(b":");
            hasher.update(file_hash.as_bytes());
            hasher.update(b"\n");
        }
        Ok(hex::encode(hasher.finalize()))
    }
}

fn portable_path(rel: &Path) -> String {
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
