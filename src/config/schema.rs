//! Configuration schema for Groundwork
//!
//! Configuration is stored at `~/.config/groundwork/config.toml`

use crate::error::{GroundworkError, GroundworkResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Workdir layout settings
    pub workdir: WorkdirConfig,

    /// Source cache settings
    pub cache: CacheConfig,

    /// Download settings
    pub download: DownloadConfig,
}

/// Workdir layout configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkdirConfig {
    /// Project base path; workdirs live under `<base>/.workdir`
    pub base_path: PathBuf,

    /// Where local terraform components live, relative to base
    pub terraform_base_path: String,
}

impl Default for WorkdirConfig {
    fn default() -> Self {
        Self {
            base_path: PathBuf::from("."),
            terraform_base_path: "components/terraform".to_string(),
        }
    }
}

/// Source cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// TTL applied to mutable refs (branches, unpinned sources)
    pub default_ttl: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl: "daily".to_string(),
        }
    }
}

/// Download configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    /// Per-download deadline in seconds; 0 disables the deadline
    pub timeout_secs: u64,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self { timeout_secs: 300 }
    }
}

/// Remote source description inside a component configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceSpec {
    pub uri: String,
    pub version: Option<String>,
    pub included_paths: Vec<String>,
    pub excluded_paths: Vec<String>,
}

/// Provisioning-relevant view of a component configuration, decoded
/// once at the boundary so the rest of the pipeline works with typed
/// fields instead of raw JSON.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProvisionSpec {
    pub enabled: bool,
    pub component: Option<String>,
    pub stack: Option<String>,
    pub component_path: Option<PathBuf>,
    pub source: Option<SourceSpec>,
}

impl ProvisionSpec {
    /// Decode from a component configuration value.
    ///
    /// The component name falls back through `component`,
    /// `metadata.component`, and `vars.component`; the first
    /// non-empty string wins.
    pub fn decode(value: &Value) -> GroundworkResult<Self> {
        let enabled = value
            .pointer("/provision/workdir/enabled")
            .and_then(Value::as_bool)
            .unwrap_or(false);

        let component = non_empty_str(value.get("component"))
            .or_else(|| non_empty_str(value.pointer("/metadata/component")))
            .or_else(|| non_empty_str(value.pointer("/vars/component")));

        let stack = non_empty_str(value.get("stack"));
        let component_path = non_empty_str(value.get("component_path")).map(PathBuf::from);

        let source = match value.get("source") {
            None | Some(Value::Null) => None,
            Some(raw) => {
                let spec: SourceSpec = serde_json::from_value(raw.clone()).map_err(|e| {
                    GroundworkError::WorkdirProvision {
                        component: component.clone().unwrap_or_default(),
                        reason: format!("invalid source block: {e}"),
                    }
                })?;
                if spec.uri.trim().is_empty() {
                    return Err(GroundworkError::WorkdirProvision {
                        component: component.unwrap_or_default(),
                        reason: "source block is missing a uri".to_string(),
                    });
                }
                Some(spec)
            }
        };

        Ok(Self {
            enabled,
            component,
            stack,
            component_path,
            source,
        })
    }
}

fn non_empty_str(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn default_config_values() {
        let config = Config::default();
        assert_eq!(config.workdir.base_path, PathBuf::from("."));
        assert_eq!(config.workdir.terraform_base_path, "components/terraform");
        assert_eq!(config.cache.default_ttl, "daily");
        assert_eq!(config.download.timeout_secs, 300);
    }

    #[test]
    fn config_toml_roundtrip() {
        let config = Config::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.cache.default_ttl, config.cache.default_ttl);
    }

    #[test]
    fn partial_toml_uses_defaults() {
        let parsed: Config = toml::from_str("[cache]\ndefault_ttl = \"weekly\"\n").unwrap();
        assert_eq!(parsed.cache.default_ttl, "weekly");
        assert_eq!(parsed.download.timeout_secs, 300);
    }

    #[test]
    fn decode_disabled_by_default() {
        let spec = ProvisionSpec::decode(&json!({"component": "vpc"})).unwrap();
        assert!(!spec.enabled);
    }

    #[test]
    fn decode_enabled_flag() {
        let spec = ProvisionSpec::decode(&json!({
            "component": "vpc",
            "provision": {"workdir": {"enabled": true}}
        }))
        .unwrap();
        assert!(spec.enabled);
    }

    #[test]
    fn component_name_fallback_chain() {
        let root = ProvisionSpec::decode(&json!({
            "component": "vpc",
            "metadata": {"component": "meta-vpc"},
            "vars": {"component": "vars-vpc"}
        }))
        .unwrap();
        assert_eq!(root.component.as_deref(), Some("vpc"));

        let meta = ProvisionSpec::decode(&json!({
            "metadata": {"component": "meta-vpc"},
            "vars": {"component": "vars-vpc"}
        }))
        .unwrap();
        assert_eq!(meta.component.as_deref(), Some("meta-vpc"));

        let vars = ProvisionSpec::decode(&json!({
            "vars": {"component": "vars-vpc"}
        }))
        .unwrap();
        assert_eq!(vars.component.as_deref(), Some("vars-vpc"));
    }

    #[test]
    fn empty_component_names_are_skipped() {
        let spec = ProvisionSpec::decode(&json!({
            "component": "",
            "metadata": {"component": "  "},
            "vars": {"component": "vars-vpc"}
        }))
        .unwrap();
        assert_eq!(spec.component.as_deref(), Some("vars-vpc"));
    }

    #[test]
    fn non_string_component_is_skipped() {
        let spec = ProvisionSpec::decode(&json!({
            "component": 42,
            "vars": {"component": "vars-vpc"}
        }))
        .unwrap();
        assert_eq!(spec.component.as_deref(), Some("vars-vpc"));
    }

    #[test]
    fn decode_source_block() {
        let spec = ProvisionSpec::decode(&json!({
            "component": "vpc",
            "source": {
                "uri": "github.com/org/repo",
                "version": "v1.0.0",
                "included_paths": ["*.tf"]
            }
        }))
        .unwrap();
        let source = spec.source.unwrap();
        assert_eq!(source.uri, "github.com/org/repo");
        assert_eq!(source.version.as_deref(), Some("v1.0.0"));
        assert_eq!(source.included_paths, vec!["*.tf"]);
        assert!(source.excluded_paths.is_empty());
    }

    #[test]
    fn source_without_uri_errors() {
        let err = ProvisionSpec::decode(&json!({
            "component": "vpc",
            "source": {"version": "v1.0.0"}
        }))
        .unwrap_err();
        assert!(err.to_string().contains("uri"));
    }

    #[test]
    fn malformed_source_errors() {
        assert!(ProvisionSpec::decode(&json!({
            "component": "vpc",
            "source": "github.com/org/repo"
        }))
        .is_err());
    }
}
