//! Workdir path layout
//!
//! Workdirs live under `<base>/.workdir/terraform/<stack>-<component>`.

use std::path::{Path, PathBuf};

/// Root directory name for all workdirs under the project base.
pub const WORKDIR_ROOT: &str = ".workdir";
/// Tool namespace under the workdir root.
pub const TERRAFORM_DIR: &str = "terraform";
/// Reserved component-config key carrying the provisioned path.
pub const WORKDIR_PATH_KEY: &str = "workdir_path";

/// Directory holding every terraform workdir.
pub fn terraform_root(base: &Path) -> PathBuf {
    base.join(WORKDIR_ROOT).join(TERRAFORM_DIR)
}

/// Workdir for a (stack, component) pair.
pub fn workdir_path(base: &Path, stack: &str, component: &str) -> PathBuf {
    terraform_root(base).join(format!("{stack}-{component}"))
}
