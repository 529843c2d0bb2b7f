//! Workdir cleanup
//!
//! Removes provisioned workdirs by component, wholesale, or by
//! expiry. Failures are accumulated so one stubborn directory does
//! not abort the rest of the run.

use crate::config::Config;
use crate::error::{GroundworkError, GroundworkResult};
use crate::metadata::MetadataStore;
use crate::ttl::parse_ttl;
use crate::workdir::paths::{terraform_root, workdir_path};
use chrono::{DateTime, Duration, Utc};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// What to clean. Precedence when several are set: expired, then
/// all, then a single component.
#[derive(Debug, Default, Clone)]
pub struct CleanOptions {
    pub component: Option<String>,
    pub stack: Option<String>,
    pub all: bool,
    pub expired: bool,
    pub ttl: Option<String>,
    pub dry_run: bool,
}

/// A workdir past its TTL.
#[derive(Debug, Clone)]
pub struct ExpiredWorkdir {
    pub path: PathBuf,
    pub name: String,
    pub last_accessed: DateTime<Utc>,
    pub age: Duration,
}

/// Dispatch a cleanup run according to the options.
pub fn clean(config: &Config, store: &MetadataStore, opts: &CleanOptions) -> GroundworkResult<()> {
    if opts.expired {
        let ttl = opts.ttl.as_deref().ok_or_else(|| {
            GroundworkError::invalid_ttl("", "expired cleanup requires a TTL")
        })?;
        return clean_expired(config, store, ttl, opts.dry_run);
    }
    if opts.all {
        return clean_all(config, opts.dry_run);
    }
    if let Some(component) = &opts.component {
        let stack = opts.stack.as_deref().ok_or_else(|| {
            GroundworkError::WorkdirProvision {
                component: component.clone(),
                reason: "cleaning a component requires a stack".to_string(),
            }
        })?;
        return clean_component(config, component, stack, opts.dry_run);
    }
    debug!("no cleanup target selected");
    Ok(())
}

/// Remove one component's workdir. Missing workdirs are a no-op.
pub fn clean_component(
    config: &Config,
    component: &str,
    stack: &str,
    dry_run: bool,
) -> GroundworkResult<()> {
    let path = workdir_path(&config.workdir.base_path, stack, component);
    if !path.exists() {
        debug!(component, stack, "workdir does not exist, nothing to clean");
        return Ok(());
    }
    if dry_run {
        info!("would remove {}", path.display());
        return Ok(());
    }
    fs::remove_dir_all(&path).map_err(|e| GroundworkError::Clean {
        failures: vec![format!("{stack}-{component}: {e}")],
        succeeded: 0,
    })?;
    info!(component, stack, "workdir removed");
    Ok(())
}

/// Remove every workdir. Each one is deleted independently so a
/// stubborn directory does not stop the rest; failures come back
/// accumulated with a partial-success count.
pub fn clean_all(config: &Config, dry_run: bool) -> GroundworkResult<()> {
    let root = config.workdir.base_path.join(crate::workdir::paths::WORKDIR_ROOT);
    if !root.exists() {
        debug!("workdir root does not exist, nothing to clean");
        return Ok(());
    }
    if dry_run {
        info!("would remove {}", root.display());
        return Ok(());
    }

    let mut failures = Vec::new();
    let mut succeeded = 0;
    let tf_root = terraform_root(&config.workdir.base_path);
    if tf_root.is_dir() {
        let entries = fs::read_dir(&tf_root)
            .map_err(|e| GroundworkError::io(format!("listing {}", tf_root.display()), e))?;
        for entry in entries {
            let entry = entry
                .map_err(|e| GroundworkError::io(format!("listing {}", tf_root.display()), e))?;
            let name = entry.file_name().to_string_lossy().into_owned();
            match fs::remove_dir_all(entry.path()) {
                Ok(()) => {
                    debug!(name = %name, "workdir removed");
                    succeeded += 1;
                }
                Err(e) => failures.push(format!("{name}: {e}")),
            }
        }
    }
    if !failures.is_empty() {
        return Err(GroundworkError::Clean {
            failures,
            succeeded,
        });
    }
    fs::remove_dir_all(&root).map_err(|e| GroundworkError::Clean {
        failures: vec![format!("{}: {e}", root.display())],
        succeeded,
    })?;
    info!("all workdirs removed");
    Ok(())
}

/// Remove every workdir whose last access is older than the TTL.
pub fn clean_expired(
    config: &Config,
    store: &MetadataStore,
    ttl: &str,
    dry_run: bool,
) -> GroundworkResult<()> {
    let ttl = parse_ttl(ttl)?;
    let ttl = Duration::from_std(ttl)
        .map_err(|_| GroundworkError::invalid_ttl(format!("{ttl:?}"), "TTL out of range"))?;

    let expired = find_expired(config, store, ttl)?;
    if expired.is_empty() {
        info!("no expired workdirs");
        return Ok(());
    }

    let mut failures = Vec::new();
    let mut succeeded = 0;
    for workdir in &expired {
        if dry_run {
            info!(
                "would remove {} (idle {})",
                workdir.path.display(),
                format_age(workdir.age)
            );
            continue;
        }
        match fs::remove_dir_all(&workdir.path) {
            Ok(()) => {
                info!(name = workdir.name, age = %format_age(workdir.age), "expired workdir removed");
                succeeded += 1;
            }
            Err(e) => failures.push(format!("{}: {e}", workdir.name)),
        }
    }
    if !failures.is_empty() {
        return Err(GroundworkError::Clean {
            failures,
            succeeded,
        });
    }
    Ok(())
}

/// Collect workdirs whose last access predates `now - ttl`.
pub fn find_expired(
    config: &Config,
    store: &MetadataStore,
    ttl: Duration,
) -> GroundworkResult<Vec<ExpiredWorkdir>> {
    let root = terraform_root(&config.workdir.base_path);
    if !root.is_dir() {
        return Ok(Vec::new());
    }

    let now = Utc::now();
    let cutoff = now - ttl;
    let mut expired = Vec::new();
    let entries = fs::read_dir(&root)
        .map_err(|e| GroundworkError::io(format!("listing {}", root.display()), e))?;
    for entry in entries {
        let entry =
            entry.map_err(|e| GroundworkError::io(format!("listing {}", root.display()), e))?;
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let last_accessed = last_accessed_time(store, &path);
        if last_accessed < cutoff {
            expired.push(ExpiredWorkdir {
                name: entry.file_name().to_string_lossy().into_owned(),
                age: now - last_accessed,
                last_accessed,
                path,
            });
        }
    }
    expired.sort_by_key(|w| w.last_accessed);
    Ok(expired)
}

/// Last-access fallback chain: metadata last_accessed, updated_at,
/// created_at, then directory mtime.
fn last_accessed_time(store: &MetadataStore, workdir: &Path) -> DateTime<Utc> {
    if let Ok(Some(metadata)) = store.read(workdir) {
        if let Some(at) = metadata.last_accessed.or(metadata.updated_at) {
            return at;
        }
        return metadata.created_at;
    }
    fs::metadata(workdir)
        .and_then(|m| m.modified())
        .map(DateTime::<Utc>::from)
        .unwrap_or_else(|_| Utc::now())
}

/// Human-readable idle duration: "45m", "3h 30m", "7d 5h".
pub fn format_age(age: Duration) -> String {
    let minutes = age.num_minutes();
    if minutes < 1 {
        return "< 1m".to_string();
    }
    if minutes < 60 {
        return format!("{minutes}m");
    }
    let hours = age.num_hours();
    if hours < 24 {
        let rem = minutes - hours * 60;
        if rem == 0 {
            return format!("{hours}h");
        }
        return format!("{hours}h {rem}m");
    }
    let days = age.num_days();
    let rem_hours = hours - days * 24;
    if rem_hours == 0 {
        return format!("{days}d");
    }
    format!("{days}d {rem_hours}h")
}
