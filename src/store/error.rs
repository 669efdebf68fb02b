//! Error type shared by every `StateStore` backing.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StateStoreError {
    #[error("entity not found: {0}")]
    NotFound(String),
    #[error("backing store unavailable: {0}")]
    Unavailable(String),
    #[error("serialization error: {0}")]
    Serialization(String),
}
