//! Groundwork - Workdir Provisioning and Source Caching
//!
//! Provisions isolated working directories for infrastructure
//! components from local or remote sources, with a content-addressed
//! source cache and crash-safe workdir metadata.

pub mod cache;
pub mod cli;
pub mod config;
pub mod download;
pub mod error;
pub mod hash;
pub mod metadata;
pub mod registry;
pub mod sync;
pub mod ttl;
pub mod workdir;

pub use error::{GroundworkError, GroundworkResult};
