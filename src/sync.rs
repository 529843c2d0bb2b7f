//! Incremental directory synchronization
//!
//! Two passes: copy files whose content hash differs from the
//! destination, then delete destination files with no source
//! counterpart. The reserved metadata directory in the destination is
//! never touched.

use crate::error::{GroundworkError, GroundworkResult};
use crate::hash::Hasher;
use crate::metadata::METADATA_DIR;
use glob::Pattern;
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use tracing::debug;
use walkdir::WalkDir;

/// Glob filter over slash-separated relative paths. An empty include
/// list means everything is included; excludes always win.
struct PathFilter {
    included: Vec<Pattern>,
    excluded: Vec<Pattern>,
}

impl PathFilter {
    fn compile(included: &[String], excluded: &[String]) -> GroundworkResult<Self> {
        Ok(Self {
            included: compile_patterns(included)?,
            excluded: compile_patterns(excluded)?,
        })
    }

    fn matches(&self, rel: &str) -> bool {
        if self.excluded.iter().any(|p| p.matches(rel)) {
            return false;
        }
        self.included.is_empty() || self.included.iter().any(|p| p.matches(rel))
    }
}

fn compile_patterns(patterns: &[String]) -> GroundworkResult<Vec<Pattern>> {
    patterns
        .iter()
        .map(|p| {
            Pattern::new(p).map_err(|e| GroundworkError::PatternInvalid {
                pattern: p.clone(),
                reason: e.to_string(),
            })
        })
        .collect()
}

/// Synchronize `dst` to mirror `src`. Returns whether anything
/// changed.
pub fn sync_dir(src: &Path, dst: &Path, hasher: &dyn Hasher) -> GroundworkResult<bool> {
    sync_dir_filtered(src, dst, hasher, &[], &[])
}

/// Synchronize with include/exclude glob filters applied to source
/// files. Filtered-out files are treated as absent from the source,
/// so stale copies in the destination are deleted.
pub fn sync_dir_filtered(
    src: &Path,
    dst: &Path,
    hasher: &dyn Hasher,
    included: &[String],
    excluded: &[String],
) -> GroundworkResult<bool> {
    let filter = PathFilter::compile(included, excluded)?;
    let mut changed = false;
    let mut seen: HashSet<String> = HashSet::new();

    // Forward pass: copy new or modified files.
    for entry in WalkDir::new(src) {
        let entry = entry.map_err(|e| walk_error(src, e))?;
        let rel = match entry.path().strip_prefix(src) {
            Ok(rel) if !rel.as_os_str().is_empty() => rel.to_path_buf(),
            _ => continue,
        };
        let rel_str = portable_path(&rel);

        if entry.file_type().is_dir() {
            continue;
        }
        if !filter.matches(&rel_str) {
            debug!(path = %rel_str, "filtered out of sync");
            continue;
        }
        seen.insert(rel_str.clone());

        let target = dst.join(&rel);
        if target.is_file() {
            let src_hash = hasher.hash_file(entry.path())?;
            let dst_hash = hasher.hash_file(&target)?;
            if src_hash == dst_hash {
                continue;
            }
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| GroundworkError::io(format!("creating {}", parent.display()), e))?;
        }
        // fs::copy carries permissions along with the bytes.
        fs::copy(entry.path(), &target).map_err(|e| {
            GroundworkError::io(format!("copying {} to {}", rel_str, target.display()), e)
        })?;
        debug!(path = %rel_str, "synced");
        changed = true;
    }

    // Reverse pass: delete orphan files, skipping the metadata dir.
    // Directories emptied by deletion are left in place.
    if dst.exists() {
        for entry in WalkDir::new(dst)
            .into_iter()
            .filter_entry(|e| e.file_name() != METADATA_DIR)
        {
            let entry = entry.map_err(|e| walk_error(dst, e))?;
            let rel = match entry.path().strip_prefix(dst) {
                Ok(rel) if !rel.as_os_str().is_empty() => rel.to_path_buf(),
                _ => continue,
            };
            let rel_str = portable_path(&rel);
            if entry.file_type().is_dir() {
                continue;
            }
            if !seen.contains(&rel_str) {
                fs::remove_file(entry.path())
                    .map_err(|e| GroundworkError::io(format!("removing {rel_str}"), e))?;
                debug!(path = %rel_str, "removed orphan");
                changed = true;
            }
        }
    }

    Ok(changed)
}

fn walk_error(root: &Path, e: walkdir::Error) -> GroundworkError {
    GroundworkError::io(
        format!("walking {}", root.display()),
        e.into_io_error()
            .unwrap_or_else(|| std::io::Error::other("walk error")),
    )
}

fn portable_path(rel: &Path) -> String {
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
