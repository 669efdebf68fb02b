use thiserror::Error;

#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("policy not found: {0}")]
    NotFound(String),
    #[error("invalid policy: {0}")]
    InvalidPolicy(String),
}
