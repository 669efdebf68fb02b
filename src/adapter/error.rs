//! Normalized provider error, shared by every adapter (spec §6).

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error categories the core recognizes, with a fixed retryability rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Authentication,
    Validation,
    RateLimit,
    Timeout,
    Network,
    Provider,
    Unknown,
}

impl ErrorCategory {
    /// Whether the Orchestrator should retry a failure in this category.
    /// `Provider` is retryable only for 5xx status codes — callers pass that
    /// distinction in via `SystemError::retryable` directly rather than
    /// deriving it here, since the category alone doesn't carry the status.
    pub fn default_retryable(&self) -> bool {
        matches!(
            self,
            ErrorCategory::RateLimit
                | ErrorCategory::Timeout
                | ErrorCategory::Network
                | ErrorCategory::Provider
        )
    }
}

#[derive(Debug, Clone, Error, Serialize, Deserialize)]
#[error("{category:?}: {message}")]
pub struct SystemError {
    pub category: ErrorCategory,
    pub message: String,
    pub retryable: bool,
    pub retry_after_secs: Option<u64>,
}

impl SystemError {
    pub fn new(category: ErrorCategory, message: impl Into<String>) -> Self {
        let retryable = category.default_retryable();
        Self {
            category,
            message: message.into(),
            retryable,
            retry_after_secs: None,
        }
    }

    pub fn rate_limit(message: impl Into<String>, retry_after_secs: Option<u64>) -> Self {
        Self {
            category: ErrorCategory::RateLimit,
            message: message.into(),
            retryable: true,
            retry_after_secs,
        }
    }

    pub fn authentication(message: impl Into<String>) -> Self {
        Self {
            category: ErrorCategory::Authentication,
            message: message.into(),
            retryable: false,
            retry_after_secs: None,
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self {
            category: ErrorCategory::Validation,
            message: message.into(),
            retryable: false,
            retry_after_secs: None,
        }
    }
}
