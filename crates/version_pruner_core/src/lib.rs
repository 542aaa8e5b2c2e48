//! Shared version pruning domain primitives.
//!
//! This crate owns the retention policy, version ordering, configuration
//! parsing and response contracts. It intentionally excludes AWS SDK and
//! Lambda runtime concerns.

pub mod config;
pub mod contract;
pub mod ordering;
pub mod policy;
