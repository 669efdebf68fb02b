//! Errors surfaced by the Routing Engine.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RoutingError {
    #[error("no eligible keys for provider {provider_id}: {reason}")]
    NoEligibleKeys { provider_id: String, reason: String },

    #[error("key manager error: {0}")]
    KeyManager(#[from] crate::key::KeyManagerError),

    #[error("state store error: {0}")]
    Store(#[from] crate::store::StateStoreError),

    #[error("quota engine error: {0}")]
    Quota(#[from] crate::quota::QuotaError),
}
