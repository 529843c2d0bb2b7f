//! Retention policy classification for cached sources
//!
//! Immutable versions (semver tags, commit SHAs) are cached forever;
//! mutable refs (branches, unpinned sources) get a TTL.

use semver::Version;

/// How long a cache entry may be served.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetentionPolicy {
    /// Immutable version, never expires.
    Permanent,
    /// Mutable ref, expires after the configured TTL.
    Ttl,
}

/// Normalize a source URI for key generation.
///
/// Trims whitespace and lowercases the scheme prefix (everything up
/// to the first `://`, covering stacked schemes like `GIT::https`).
/// Path and query are preserved verbatim since they may be
/// case-sensitive.
pub fn normalize_uri(uri: &str) -> String {
    let trimmed = uri.trim();
    match trimmed.find("://") {
        Some(pos) => {
            let (scheme, rest) = trimmed.split_at(pos);
            format!("{}{}", scheme.to_ascii_lowercase(), rest)
        }
        None => trimmed.to_string(),
    }
}

/// Classify a version string plus URI into a retention policy.
///
/// When no explicit version is given, a `ref=` query parameter in the
/// URI is consulted instead.
pub fn retention_policy(uri: &str, version: Option<&str>) -> RetentionPolicy {
    let pinned = version
        .map(str::to_string)
        .filter(|v| !v.is_empty())
        .or_else(|| extract_ref(uri));
    match pinned {
        Some(v) if is_semver(&v) || is_commit_sha(&v) => RetentionPolicy::Permanent,
        _ => RetentionPolicy::Ttl,
    }
}

/// True for MAJOR.MINOR.PATCH tags with an optional leading `v` and
/// optional prerelease/build suffix.
pub fn is_semver(value: &str) -> bool {
    let bare = value.strip_prefix('v').unwrap_or(value);
    Version::parse(bare).is_ok()
}

/// True for a bare commit SHA: 7 to 40 hex characters.
pub fn is_commit_sha(value: &str) -> bool {
    (7..=40).contains(&value.len()) && value.chars().all(|c| c.is_ascii_hexdigit())
}

/// Extract a `ref=` query parameter from a source URI, if present.
pub fn extract_ref(uri: &str) -> Option<String> {
    let after_query = uri.split_once('?')?.1;
    let query = after_query.split('#').next().unwrap_or(after_query);
    for param in query.split('&') {
        if let Some(value) = param.strip_prefix("ref=") {
            if !value.is_empty() {
                return Some(value.to_string());
            }
        }
    }
    None
}
