//! Error types for Groundwork
//!
//! All modules use `GroundworkResult<T>` as their return type.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for Groundwork operations
pub type GroundworkResult<T> = Result<T, GroundworkError>;

/// All errors that can occur in Groundwork
#[derive(Error, Debug)]
pub enum GroundworkError {
    // Provisioning errors
    #[error("Failed to provision workdir for component '{component}': {reason}")]
    WorkdirProvision { component: String, reason: String },

    #[error("Failed to create workdir {path}: {source}")]
    WorkdirCreation {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to sync workdir for component '{component}': {reason}")]
    WorkdirSync { component: String, reason: String },

    // Metadata errors
    #[error("Failed to access workdir metadata at {path}: {reason}")]
    WorkdirMetadata { path: PathBuf, reason: String },

    #[error("Could not acquire metadata lock: {0}")]
    MetadataLock(PathBuf),

    // Cache errors
    #[error("Failed to store cache entry {key}: {reason}")]
    CacheWrite { key: String, reason: String },

    #[error("Failed to persist cache index at {path}: {reason}")]
    CacheIndex { path: PathBuf, reason: String },

    // Download errors
    #[error("Failed to download source '{uri}': {reason}")]
    Download { uri: String, reason: String },

    #[error("Download of '{uri}' timed out")]
    DownloadTimeout { uri: String },

    // Cleanup errors
    #[error("Cleanup failed for {} target(s) ({succeeded} succeeded): {}", .failures.len(), .failures.join("; "))]
    Clean {
        failures: Vec<String>,
        succeeded: usize,
    },

    // Hook errors
    #[error("Provisioner '{kind}' failed for event '{event}': {reason}")]
    ProvisionerFailed {
        kind: String,
        event: String,
        reason: String,
    },

    #[error("Invalid provisioner registration: {0}")]
    ProvisionerRegistration(String),

    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Failed to create config directory {path}: {source}")]
    ConfigDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid TTL '{value}': {reason}")]
    InvalidTtl { value: String, reason: String },

    #[error("Invalid path filter pattern '{pattern}': {reason}")]
    PatternInvalid { pattern: String, reason: String },

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl GroundworkError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create an invalid-TTL error
    pub fn invalid_ttl(value: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidTtl {
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::DownloadTimeout { .. } | Self::MetadataLock(_)
        )
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::DownloadTimeout { .. } => {
                Some("Increase download_timeout_secs in the configuration or retry")
            }
            Self::MetadataLock(_) => {
                Some("Another process may be provisioning the same workdir; retry shortly")
            }
            Self::InvalidTtl { .. } => {
                Some("Use raw seconds, <n>[smhd], or minute/hourly/daily/weekly/monthly/yearly")
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = GroundworkError::WorkdirProvision {
            component: "vpc".to_string(),
            reason: "no source".to_string(),
        };
        assert!(err.to_string().contains("vpc"));
        assert!(err.to_string().contains("no source"));
    }

    #[test]
    fn error_hint() {
        let err = GroundworkError::invalid_ttl("0", "must be positive");
        assert!(err.hint().is_some());
    }

    #[test]
    fn error_retryable() {
        let timeout = GroundworkError::DownloadTimeout {
            uri: "github.com/org/repo".to_string(),
        };
        assert!(timeout.is_retryable());

        let invalid = GroundworkError::invalid_ttl("abc", "unknown unit");
        assert!(!invalid.is_retryable());
    }

    #[test]
    fn clean_error_aggregates_failures() {
        let err = GroundworkError::Clean {
            failures: vec!["dev-vpc: permission denied".to_string()],
            succeeded: 2,
        };
        let msg = err.to_string();
        assert!(msg.contains("1 target(s)"));
        assert!(msg.contains("2 succeeded"));
        assert!(msg.contains("dev-vpc"));
    }
}
