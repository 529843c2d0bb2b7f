//! Source downloaders
//!
//! The [`Downloader`] trait is the seam between provisioning and
//! transport. The built-in implementation shells out to `git`, which
//! covers `git::` and bare `github.com/...` style URIs.

use crate::cache::policy::{extract_ref, is_commit_sha};
use crate::error::{GroundworkError, GroundworkResult};
use async_trait::async_trait;
use std::path::Path;
use tokio::process::Command;
use tracing::debug;

/// Fetches a source URI into a destination directory.
#[async_trait]
pub trait Downloader: Send + Sync {
    /// Download `uri` into `dest`. `dest` exists and is empty.
    async fn fetch(&self, uri: &str, version: Option<&str>, dest: &Path) -> GroundworkResult<()>;
}

/// Git-based downloader using the system `git` binary.
#[derive(Debug, Default, Clone, Copy)]
pub struct GitDownloader;

impl GitDownloader {
    /// Strip the forced-scheme prefix and query, defaulting to https.
    fn clone_url(uri: &str) -> (String, Option<String>) {
        let trimmed = uri.trim();
        let stripped = trimmed.strip_prefix("git::").unwrap_or(trimmed);
        let wanted_ref = extract_ref(stripped);
        let base = stripped.split('?').next().unwrap_or(stripped);
        let url = if base.contains("://") || base.starts_with("git@") {
            base.to_string()
        } else {
            format!("https://{base}")
        };
        (url, wanted_ref)
    }
}

#[async_trait]
impl Downloader for GitDownloader {
    async fn fetch(&self, uri: &str, version: Option<&str>, dest: &Path) -> GroundworkResult<()> {
        let (url, ref_param) = Self::clone_url(uri);
        let wanted = version
            .map(str::to_string)
            .filter(|v| !v.is_empty())
            .or(ref_param);

        let mut clone = Command::new("git");
        clone.arg("clone").arg("--quiet");
        match &wanted {
            // Branches and tags support shallow clones; a bare commit
            // SHA needs history to check out.
            Some(v) if !is_commit_sha(v) => {
                clone.args(["--depth", "1", "--branch", v]);
            }
            Some(_) => {}
            None => {
                clone.args(["--depth", "1"]);
            }
        }
        clone.arg(&url).arg(dest);

        debug!(%url, ?wanted, "cloning source");
        run_git(clone, uri).await?;

        if let Some(sha) = wanted.filter(|v| is_commit_sha(v)) {
            let mut checkout = Command::new("git");
            checkout.arg("-C").arg(dest).args(["checkout", "--quiet", &sha]);
            run_git(checkout, uri).await?;
        }

        // The clone's own history is not part of the source content.
        let git_dir = dest.join(".git");
        if git_dir.exists() {
            tokio::fs::remove_dir_all(&git_dir)
                .await
                .map_err(|e| GroundworkError::io("removing .git from download", e))?;
        }
        Ok(())
    }
}

async fn run_git(mut command: Command, uri: &str) -> GroundworkResult<()> {
    let output = command
        .output()
        .await
        .map_err(|e| GroundworkError::Download {
            uri: uri.to_string(),
            reason: format!("failed to run git: {e}"),
        })?;
    if !output.status.success() {
        return Err(GroundworkError::Download {
            uri: uri.to_string(),
            reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clone_url_strips_git_prefix() {
        let (url, r) = GitDownloader::clone_url("git::https://github.com/org/repo.git");
        assert_eq!(url, "https://github.com/org/repo.git");
        assert!(r.is_none());
    }

    #[test]
    fn clone_url_defaults_to_https() {
        let (url, _) = GitDownloader::clone_url("github.com/org/repo");
        assert_eq!(url, "https://github.com/org/repo");
    }

    #[test]
    fn clone_url_preserves_ssh_form() {
        let (url, _) = GitDownloader::clone_url("git@github.com:org/repo.git");
        assert_eq!(url, "git@github.com:org/repo.git");
    }

    #[test]
    fn clone_url_extracts_ref_and_drops_query() {
        let (url, r) = GitDownloader::clone_url("github.com/org/repo?ref=v1.0.0");
        assert_eq!(url, "https://github.com/org/repo");
        assert_eq!(r.as_deref(), Some("v1.0.0"));
    }

    #[tokio::test]
    async fn fetch_from_unreachable_uri_errors() {
        let dir = tempfile::TempDir::new().unwrap();
        let err = GitDownloader
            .fetch("file:///nonexistent/groundwork-test-repo", None, dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err, GroundworkError::Download { .. }));
    }
}
