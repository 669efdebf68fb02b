//! Request/response types exchanged between the core and provider adapters
//! (spec §6: "Provider adapter (input contract)").

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::cost::model::CostEstimate;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

/// Normalized inference request the core builds and hands to an adapter.
/// Extra parameters are passed through to the adapter without interpretation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestIntent {
    pub model: String,
    pub messages: Vec<Message>,
    #[serde(default)]
    pub parameters: HashMap<String, serde_json::Value>,
    pub provider_id: String,
}

impl RequestIntent {
    /// Rough token estimate used by the cost heuristic fallback: total
    /// message character length divided by 4.
    pub fn estimated_input_tokens(&self) -> u32 {
        let chars: usize = self.messages.iter().map(|m| m.content.len()).sum();
        (chars / 4).max(1) as u32
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl TokenUsage {
    pub fn total(&self) -> u32 {
        self.input_tokens + self.output_tokens
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseMetadata {
    pub model_used: String,
    pub tokens_used: TokenUsage,
    pub response_time_ms: u64,
    pub provider_id: String,
    pub timestamp: DateTime<Utc>,
    pub finish_reason: Option<String>,
    #[serde(default)]
    pub request_id: String,
    #[serde(default)]
    pub correlation_id: String,
    #[serde(default)]
    pub additional_metadata: HashMap<String, serde_json::Value>,
}

/// Normalized inference response, produced by an adapter and stamped by the
/// Orchestrator with request/correlation identifiers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub content: String,
    pub metadata: ResponseMetadata,
    pub cost: Option<CostEstimate>,
    pub key_used: String,
    pub request_id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Capabilities {
    pub models: Vec<String>,
    pub supports_streaming: bool,
    pub supports_embeddings: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthState {
    Healthy,
    Degraded,
    Unhealthy,
}
