//! Provider adapters: the boundary the core routes through. Each adapter
//! owns its wire protocol and credential format; the core consumes only the
//! six methods below (spec §6).

pub mod anthropic;
pub mod error;
pub mod openai;
pub mod registry;
pub mod types;

pub use error::{ErrorCategory, SystemError};
pub use registry::{AdapterRegistry, AdapterRegistryError};
pub use types::{Capabilities, HealthState, Message, RequestIntent, Response, TokenUsage};

use async_trait::async_trait;

use crate::cost::model::CostEstimate;
use crate::key::model::Key;

/// Object-safe trait every provider integration implements. `Arc<dyn
/// ProviderAdapter>` is how the Orchestrator and Cost Controller hold onto
/// registered providers.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// `credential` is the decrypted key material. The Orchestrator decrypts
    /// via the injected `EncryptionService` immediately before this call and
    /// never persists or logs the plaintext; adapters must not retain it
    /// beyond the call either.
    async fn execute_request(
        &self,
        intent: &RequestIntent,
        key: &Key,
        credential: &str,
    ) -> Result<Response, SystemError>;

    fn normalize_response(&self, raw: Response) -> Response {
        raw
    }

    fn map_error(&self, err: &(dyn std::error::Error + Send + Sync)) -> SystemError {
        SystemError::new(ErrorCategory::Unknown, err.to_string())
    }

    fn get_capabilities(&self) -> Capabilities;

    async fn estimate_cost(&self, intent: &RequestIntent) -> Result<CostEstimate, SystemError>;

    async fn get_health(&self) -> HealthState;
}
