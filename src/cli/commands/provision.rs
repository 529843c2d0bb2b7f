//! Provision command - provision a component workdir

use crate::cli::args::ProvisionArgs;
use crate::config::Config;
use crate::download::GitDownloader;
use crate::error::{GroundworkError, GroundworkResult};
use crate::registry::{Provisioner, ProvisionerRegistry, BEFORE_TOOL_INIT};
use crate::workdir::{WorkdirProvisioner, WorkdirService, WORKDIR_PATH_KEY};
use console::style;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

/// Execute the provision command
pub async fn execute(args: ProvisionArgs, config: &Config) -> GroundworkResult<()> {
    let mut component_config = build_component_config(&args).await?;

    let registry = ProvisionerRegistry::new();
    let service = WorkdirService::new(Arc::new(GitDownloader));
    registry.register(Provisioner {
        kind: "workdir".to_string(),
        event: BEFORE_TOOL_INIT.to_string(),
        hook: Arc::new(WorkdirProvisioner::new(service)),
    })?;

    registry
        .execute(BEFORE_TOOL_INIT, config, &mut component_config)
        .await?;

    match component_config.get(WORKDIR_PATH_KEY).and_then(Value::as_str) {
        Some(path) => {
            println!("{} {}", style("Workdir:").green().bold(), path);
        }
        None => {
            println!("{}", style("Provisioning not enabled for this component.").dim());
        }
    }
    Ok(())
}

/// Assemble the component configuration from the spec file and flag
/// overrides. Invoking via flags alone implies provisioning is
/// wanted, so the enable flag is set for that path.
async fn build_component_config(args: &ProvisionArgs) -> GroundworkResult<Value> {
    let mut component_config = match &args.spec {
        Some(path) => {
            debug!("loading component config from {}", path.display());
            let raw = tokio::fs::read_to_string(path)
                .await
                .map_err(|e| GroundworkError::io(format!("reading {}", path.display()), e))?;
            let value: Value = serde_json::from_str(&raw)?;
            if !value.is_object() {
                return Err(GroundworkError::ConfigInvalid {
                    path: path.clone(),
                    reason: "component config must be a JSON object".to_string(),
                });
            }
            value
        }
        None => json!({
            "provision": {"workdir": {"enabled": true}}
        }),
    };

    if let Some(component) = &args.component {
        component_config["component"] = json!(component);
    }
    if let Some(stack) = &args.stack {
        component_config["stack"] = json!(stack);
    }
    Ok(component_config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn flags_build_enabled_config() {
        let args = ProvisionArgs {
            component: Some("vpc".to_string()),
            stack: Some("dev".to_string()),
            spec: None,
        };
        let value = build_component_config(&args).await.unwrap();
        assert_eq!(value["component"], "vpc");
        assert_eq!(value["stack"], "dev");
        assert_eq!(value["provision"]["workdir"]["enabled"], true);
    }

    #[tokio::test]
    async fn flags_override_spec_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("component.json");
        std::fs::write(
            &path,
            r#"{"component": "from-file", "stack": "staging", "vars": {"cidr": "10.0.0.0/16"}}"#,
        )
        .unwrap();

        let args = ProvisionArgs {
            component: None,
            stack: Some("dev".to_string()),
            spec: Some(path),
        };
        let value = build_component_config(&args).await.unwrap();
        assert_eq!(value["component"], "from-file");
        assert_eq!(value["stack"], "dev");
        assert_eq!(value["vars"]["cidr"], "10.0.0.0/16");
    }

    #[tokio::test]
    async fn non_object_spec_errors() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("component.json");
        std::fs::write(&path, "[1, 2]").unwrap();

        let args = ProvisionArgs {
            component: None,
            stack: None,
            spec: Some(path),
        };
        assert!(build_component_config(&args).await.is_err());
    }
}
