//! Errors surfaced by the Quota Awareness Engine.

use thiserror::Error;

use crate::store::StateStoreError;

#[derive(Debug, Error)]
pub enum QuotaError {
    #[error("no quota state for key {0}")]
    NotFound(String),
    #[error(transparent)]
    Store(#[from] StateStoreError),
}
