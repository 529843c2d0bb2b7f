//! Workdir provisioning and cleanup
//!
//! A workdir is an isolated copy of a component's source that a tool
//! like terraform can run in without touching the original. Layout:
//!
//! ```text
//! <base>/.workdir/terraform/<stack>-<component>/
//!     main.tf ...           synced content
//!     .groundwork/          reserved metadata dir
//! ```

pub mod clean;
pub mod paths;
pub mod service;

pub use clean::{clean, find_expired, format_age, CleanOptions, ExpiredWorkdir};
pub use paths::{terraform_root, workdir_path, WORKDIR_PATH_KEY, WORKDIR_ROOT};
pub use service::{WorkdirProvisioner, WorkdirService};
