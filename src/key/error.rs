//! Error types for Key Manager operations.

use super::model::KeyState;
use super::validation::ValidationError;
use crate::crypto::EncryptionError;
use crate::store::StateStoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum KeyManagerError {
    #[error("key registration failed: {0}")]
    Registration(String),

    #[error("invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: KeyState, to: KeyState },

    #[error("key not found: {0}")]
    NotFound(String),

    #[error("state store error: {0}")]
    Store(#[from] StateStoreError),
}

impl From<ValidationError> for KeyManagerError {
    fn from(e: ValidationError) -> Self {
        KeyManagerError::Registration(e.to_string())
    }
}

impl From<EncryptionError> for KeyManagerError {
    fn from(e: EncryptionError) -> Self {
        KeyManagerError::Registration(e.to_string())
    }
}
