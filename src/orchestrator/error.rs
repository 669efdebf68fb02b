//! Errors surfaced by the Orchestrator's `route` entry point.

use thiserror::Error;

use crate::adapter::SystemError;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("routing failed: {0}")]
    Routing(#[from] crate::routing::RoutingError),

    #[error("key manager error: {0}")]
    KeyManager(#[from] crate::key::KeyManagerError),

    #[error("no adapter registered for provider: {0}")]
    NoAdapter(#[from] crate::adapter::AdapterRegistryError),

    #[error("cost controller error: {0}")]
    Cost(#[from] crate::cost::CostError),

    #[error("quota engine error: {0}")]
    Quota(#[from] crate::quota::QuotaError),

    /// Every retry attempt exhausted a provider call; carries the last
    /// `SystemError` seen.
    #[error("provider call failed after retries: {0}")]
    Provider(SystemError),
}
