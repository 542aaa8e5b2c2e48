//! AWS-oriented adapters and handlers for the scheduled version pruner.
//!
//! This crate owns runtime integration details (the Lambda handler, the
//! function host adapter boundary and log setup) and re-exports the
//! AWS-free policy primitives as `runtime`.

pub mod adapters;
pub mod error;
pub mod handlers;
pub mod observability;

pub use version_pruner_core as runtime;
