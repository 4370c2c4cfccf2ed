//! Transformation and publication engine for twinseed provisioning runs.
//!
//! A run loads a test-data document, plans twins and their submodels, spreads
//! them over the configured providers and publishes them to content servers,
//! connectors and the twin registry.

pub mod config;
pub mod document;
pub mod endpoint;
pub mod errors;
pub mod ids;
pub mod orchestrator;
pub mod partition;
pub mod publisher;
pub mod reset;
pub mod result;
pub mod schema;
pub mod setup;
pub mod transform;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

// Re-export public API for convenience
pub use document::{DocumentError, TestDataDocument};
pub use errors::{ProvisionError, TransportError};
pub use orchestrator::{plan_summary, run_provisioning, run_with_transport, RunOptions};
pub use reset::{reset_environment, reset_with_transport};
pub use result::{ResetSummary, RunSummary};
