//! Lifecycle hook registry
//!
//! Provisioners subscribe to named lifecycle events and run in
//! registration order. Execution is fail-fast: the first failing hook
//! aborts the event.

use crate::config::Config;
use crate::error::{GroundworkError, GroundworkResult};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Fired before terraform/tofu init runs for a component.
pub const BEFORE_TOOL_INIT: &str = "before.terraform.init";

/// A hook that prepares a component before a lifecycle event.
#[async_trait]
pub trait ProvisionHook: Send + Sync {
    async fn run(&self, config: &Config, component_config: &mut Value) -> GroundworkResult<()>;
}

/// A registered hook plus its subscription.
#[derive(Clone)]
pub struct Provisioner {
    pub kind: String,
    pub event: String,
    pub hook: Arc<dyn ProvisionHook>,
}

/// Event-keyed registry of provisioners. Construct one per process
/// and pass it where needed; there is no global instance.
#[derive(Default)]
pub struct ProvisionerRegistry {
    inner: Mutex<HashMap<String, Vec<Provisioner>>>,
}

impl ProvisionerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provisioner for its event. Rejects empty kinds and
    /// events at registration time rather than failing at dispatch.
    pub fn register(&self, provisioner: Provisioner) -> GroundworkResult<()> {
        if provisioner.kind.trim().is_empty() {
            return Err(GroundworkError::ProvisionerRegistration(
                "provisioner kind must not be empty".to_string(),
            ));
        }
        if provisioner.event.trim().is_empty() {
            return Err(GroundworkError::ProvisionerRegistration(
                "provisioner event must not be empty".to_string(),
            ));
        }
        let mut inner = self.inner.lock().map_err(poisoned)?;
        inner
            .entry(provisioner.event.clone())
            .or_default()
            .push(provisioner);
        Ok(())
    }

    /// Snapshot of provisioners subscribed to an event, in
    /// registration order.
    pub fn for_event(&self, event: &str) -> GroundworkResult<Vec<Provisioner>> {
        let inner = self.inner.lock().map_err(poisoned)?;
        Ok(inner.get(event).cloned().unwrap_or_default())
    }

    /// Run every provisioner subscribed to `event`, stopping at the
    /// first failure.
    pub async fn execute(
        &self,
        event: &str,
        config: &Config,
        component_config: &mut Value,
    ) -> GroundworkResult<()> {
        let provisioners = self.for_event(event)?;
        debug!(event, count = provisioners.len(), "dispatching provisioners");
        for provisioner in provisioners {
            provisioner
                .hook
                .run(config, component_config)
                .await
                .map_err(|e| GroundworkError::ProvisionerFailed {
                    kind: provisioner.kind.clone(),
                    event: event.to_string(),
                    reason: e.to_string(),
                })?;
        }
        Ok(())
    }
}

fn poisoned<T>(_: std::sync::PoisonError<T>) -> GroundworkError {
    GroundworkError::Internal("provisioner registry lock poisoned".to_string())
}
