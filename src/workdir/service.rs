//! Workdir provisioning service
//!
//! Orchestrates one provisioning run: resolve the component, create
//! the workdir, sync content from a local path or the source cache,
//! record metadata, and expose the workdir path back into the
//! component configuration.

use crate::cache::{retention_policy, CacheEntry, RetentionPolicy, SourceCache};
use crate::config::{Config, ProvisionSpec, SourceSpec};
use crate::download::Downloader;
use crate::error::{GroundworkError, GroundworkResult};
use crate::hash::{Hasher, Sha256Hasher};
use crate::metadata::{MetadataStore, SourceType, WorkdirMetadata};
use crate::registry::ProvisionHook;
use crate::sync::sync_dir_filtered;
use crate::ttl::parse_ttl;
use crate::workdir::paths::{workdir_path, WORKDIR_PATH_KEY};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Provisions component workdirs. One instance serves all components.
pub struct WorkdirService {
    hasher: Arc<dyn Hasher>,
    cache: Arc<SourceCache>,
    metadata: MetadataStore,
    downloader: Arc<dyn Downloader>,
}

impl WorkdirService {
    pub fn new(downloader: Arc<dyn Downloader>) -> Self {
        Self {
            hasher: Arc::new(Sha256Hasher),
            cache: Arc::new(SourceCache::new()),
            metadata: MetadataStore::new(),
            downloader,
        }
    }

    /// Fully injected constructor for tests and embedding.
    pub fn with_deps(
        hasher: Arc<dyn Hasher>,
        cache: Arc<SourceCache>,
        metadata: MetadataStore,
        downloader: Arc<dyn Downloader>,
    ) -> Self {
        Self {
            hasher,
            cache,
            metadata,
            downloader,
        }
    }

    /// Provision the workdir for one component configuration.
    ///
    /// Disabled components and already-provisioned configurations
    /// (carrying a non-empty `workdir_path`) are a no-op.
    pub async fn provision(
        &self,
        config: &Config,
        component_config: &mut Value,
    ) -> GroundworkResult<()> {
        let spec = ProvisionSpec::decode(component_config)?;
        if !spec.enabled {
            debug!("workdir provisioning not enabled, skipping");
            return Ok(());
        }

        let component = spec.component.clone().ok_or_else(|| {
            GroundworkError::WorkdirProvision {
                component: String::new(),
                reason: "component name could not be resolved".to_string(),
            }
        })?;
        let stack = spec.stack.clone().ok_or_else(|| {
            GroundworkError::WorkdirProvision {
                component: component.clone(),
                reason: "stack is not set".to_string(),
            }
        })?;

        if let Some(existing) = component_config.get(WORKDIR_PATH_KEY).and_then(Value::as_str) {
            if !existing.is_empty() && !needs_provisioning(Path::new(existing)) {
                debug!(component, workdir = existing, "already provisioned, skipping");
                return Ok(());
            }
        }

        let workdir = workdir_path(&config.workdir.base_path, &stack, &component);
        fs::create_dir_all(&workdir).map_err(|e| GroundworkError::WorkdirCreation {
            path: workdir.clone(),
            source: e,
        })?;

        let (changed, source, source_type, version) = match &spec.source {
            Some(source) => {
                self.sync_from_cache(config, source, &workdir, &component)
                    .await?
            }
            None => self.sync_from_local(config, &spec, &workdir, &component)?,
        };

        // A hashing failure downgrades to a warning; provisioning
        // already succeeded and metadata can carry an empty hash.
        let content_hash = match self.hasher.hash_dir(&workdir) {
            Ok(hash) => hash,
            Err(e) => {
                warn!(component, "failed to hash workdir content: {e}");
                String::new()
            }
        };

        let now = Utc::now();
        let prior = self.metadata.read(&workdir)?;
        let metadata = WorkdirMetadata {
            component: component.clone(),
            stack: stack.clone(),
            source_type,
            source,
            version,
            content_hash,
            created_at: prior.as_ref().map(|m| m.created_at).unwrap_or(now),
            updated_at: if changed || prior.is_none() {
                Some(now)
            } else {
                prior.as_ref().and_then(|m| m.updated_at).or(Some(now))
            },
            last_accessed: Some(now),
        };
        self.metadata.write(&workdir, &metadata)?;

        let exposed = absolute(&workdir);
        component_config[WORKDIR_PATH_KEY] = Value::String(exposed.to_string_lossy().into_owned());
        info!(
            component,
            stack,
            workdir = %exposed.display(),
            changed,
            "workdir provisioned"
        );
        Ok(())
    }

    fn sync_from_local(
        &self,
        config: &Config,
        spec: &ProvisionSpec,
        workdir: &Path,
        component: &str,
    ) -> GroundworkResult<(bool, String, SourceType, Option<String>)> {
        let source_path = match &spec.component_path {
            Some(path) => config.workdir.base_path.join(path),
            None => config
                .workdir
                .base_path
                .join(&config.workdir.terraform_base_path)
                .join(component),
        };
        if !source_path.is_dir() {
            return Err(GroundworkError::WorkdirProvision {
                component: component.to_string(),
                reason: format!("local source {} does not exist", source_path.display()),
            });
        }

        let changed = sync_dir_filtered(&source_path, workdir, &*self.hasher, &[], &[])
            .map_err(|e| sync_error(component, e))?;
        Ok((
            changed,
            source_path.to_string_lossy().into_owned(),
            SourceType::Local,
            None,
        ))
    }

    async fn sync_from_cache(
        &self,
        config: &Config,
        source: &SourceSpec,
        workdir: &Path,
        component: &str,
    ) -> GroundworkResult<(bool, String, SourceType, Option<String>)> {
        let key = SourceCache::generate_key(&source.uri, source.version.as_deref());
        let entry = match self.cache.get(&key)? {
            Some(entry) => {
                debug!(component, key, "cache hit");
                entry
            }
            None => {
                debug!(component, key, "cache miss, downloading");
                self.download_into_cache(config, source, &key).await?
            }
        };

        let changed = sync_dir_filtered(
            &entry.path,
            workdir,
            &*self.hasher,
            &source.included_paths,
            &source.excluded_paths,
        )
        .map_err(|e| sync_error(component, e))?;
        Ok((
            changed,
            source.uri.clone(),
            SourceType::Remote,
            source.version.clone(),
        ))
    }

    async fn download_into_cache(
        &self,
        config: &Config,
        source: &SourceSpec,
        key: &str,
    ) -> GroundworkResult<CacheEntry> {
        let staging = tempfile::tempdir()
            .map_err(|e| GroundworkError::io("creating download staging directory", e))?;

        let fetch = self
            .downloader
            .fetch(&source.uri, source.version.as_deref(), staging.path());
        match config.download.timeout_secs {
            0 => fetch.await?,
            secs => {
                let deadline = std::time::Duration::from_secs(secs);
                tokio::time::timeout(deadline, fetch)
                    .await
                    .map_err(|_| GroundworkError::DownloadTimeout {
                        uri: source.uri.clone(),
                    })??
            }
        }

        let ttl_secs = match retention_policy(&source.uri, source.version.as_deref()) {
            RetentionPolicy::Permanent => 0,
            RetentionPolicy::Ttl => parse_ttl(&config.cache.default_ttl)?.as_secs(),
        };
        let content_hash = match self.hasher.hash_dir(staging.path()) {
            Ok(hash) => hash,
            Err(e) => {
                warn!(uri = source.uri, "failed to hash downloaded source: {e}");
                String::new()
            }
        };

        let now = Utc::now();
        let entry = CacheEntry {
            key: key.to_string(),
            uri: source.uri.clone(),
            version: source.version.clone(),
            path: PathBuf::new(),
            created_at: now,
            last_accessed_at: now,
            ttl_secs,
            content_hash,
        };
        self.cache.put(staging.path(), entry)
    }
}

fn sync_error(component: &str, e: GroundworkError) -> GroundworkError {
    match e {
        e @ GroundworkError::PatternInvalid { .. } => e,
        e => GroundworkError::WorkdirSync {
            component: component.to_string(),
            reason: e.to_string(),
        },
    }
}

/// A claimed workdir still needs provisioning if it vanished or is
/// empty, which happens when a cleanup ran between pipeline steps.
fn needs_provisioning(workdir: &Path) -> bool {
    match fs::read_dir(workdir) {
        Ok(mut entries) => entries.next().is_none(),
        Err(_) => true,
    }
}

fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Registry adapter so the service can subscribe to lifecycle events.
pub struct WorkdirProvisioner {
    service: WorkdirService,
}

impl WorkdirProvisioner {
    pub fn new(service: WorkdirService) -> Self {
        Self { service }
    }
}

#[async_trait]
impl ProvisionHook for WorkdirProvisioner {
    async fn run(&self, config: &Config, component_config: &mut Value) -> GroundworkResult<()> {
        self.service.provision(config, component_config).await
    }
}
