//! Content-addressed source cache
//!
//! Downloaded sources are stored once per (URI, version) pair and
//! reused across provisioning runs. Keys are SHA-256 over the
//! normalized URI plus version, so scheme casing never splits the
//! cache.
//!
//! # Retention
//!
//! | Version | Policy |
//! |---------|--------|
//! | semver tag (`v1.2.3`, `1.2.3-rc1`) | permanent |
//! | commit SHA (7-40 hex) | permanent |
//! | branch / unpinned | TTL |

pub mod policy;
pub mod store;

pub use policy::{extract_ref, is_commit_sha, is_semver, normalize_uri, retention_policy, RetentionPolicy};
pub use store::{CacheEntry, CacheUsage, SourceCache};
