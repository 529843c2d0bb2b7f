//! CLI command implementations

pub mod cache;
pub mod clean;
pub mod provision;

pub use cache::execute as cache;
pub use clean::execute as clean;
pub use provision::execute as provision;
