//! Reference adapter for the Anthropic Messages API.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::error::{ErrorCategory, SystemError};
use super::types::{Capabilities, HealthState, Response, ResponseMetadata, TokenUsage};
use super::{ProviderAdapter, RequestIntent};
use crate::cost::model::{CostEstimate, CostEstimationMethod};
use crate::key::model::Key;

const ANTHROPIC_VERSION: &str = "2023-06-01";

fn price_per_1k(model: &str) -> (Decimal, Decimal) {
    if model.contains("opus") {
        (Decimal::new(15, 3), Decimal::new(75, 3))
    } else if model.contains("sonnet") {
        (Decimal::new(3, 3), Decimal::new(15, 3))
    } else {
        (Decimal::new(25, 4), Decimal::new(125, 4))
    }
}

pub struct AnthropicAdapter {
    base_url: String,
    client: Arc<Client>,
}

impl AnthropicAdapter {
    pub fn new(base_url: impl Into<String>, client: Arc<Client>) -> Self {
        Self {
            base_url: base_url.into(),
            client,
        }
    }
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<AnthropicMessage<'a>>,
}

#[derive(Serialize)]
struct AnthropicMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    usage: Usage,
    stop_reason: Option<String>,
}

#[derive(Deserialize)]
struct ContentBlock {
    text: String,
}

#[derive(Deserialize)]
struct Usage {
    input_tokens: u32,
    output_tokens: u32,
}

#[derive(Deserialize)]
struct AnthropicErrorEnvelope {
    error: AnthropicErrorBody,
}

#[derive(Deserialize)]
struct AnthropicErrorBody {
    #[serde(rename = "type")]
    error_type: String,
    message: String,
}

#[async_trait]
impl ProviderAdapter for AnthropicAdapter {
    async fn execute_request(
        &self,
        intent: &RequestIntent,
        key: &Key,
        credential: &str,
    ) -> Result<Response, SystemError> {
        let started = Instant::now();

        let max_tokens = intent
            .parameters
            .get("max_tokens")
            .and_then(|v| v.as_u64())
            .unwrap_or(1024) as u32;

        let body = MessagesRequest {
            model: &intent.model,
            max_tokens,
            messages: intent
                .messages
                .iter()
                .map(|m| AnthropicMessage {
                    role: &m.role,
                    content: &m.content,
                })
                .collect(),
        };

        let resp = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", credential)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| map_reqwest_error(&e))?;

        let status = resp.status();
        let retry_after_secs = resp
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());

        if !status.is_success() {
            let retryable = status.as_u16() == 429 || status.is_server_error();
            let category = classify_status(status.as_u16());
            let message = match resp.json::<AnthropicErrorEnvelope>().await {
                Ok(env) => format!("{}: {}", env.error.error_type, env.error.message),
                Err(_) => format!("anthropic request failed with status {status}"),
            };
            return Err(SystemError {
                category,
                message,
                retryable,
                retry_after_secs,
            });
        }

        let parsed: MessagesResponse = resp
            .json()
            .await
            .map_err(|e| SystemError::new(ErrorCategory::Unknown, e.to_string()))?;

        let content = parsed
            .content
            .into_iter()
            .map(|b| b.text)
            .collect::<Vec<_>>()
            .join("");

        let (input_price, output_price) = price_per_1k(&intent.model);
        let amount = (Decimal::from(parsed.usage.input_tokens) * input_price
            + Decimal::from(parsed.usage.output_tokens) * output_price)
            / Decimal::from(1000);

        Ok(Response {
            content,
            metadata: ResponseMetadata {
                model_used: intent.model.clone(),
                tokens_used: TokenUsage {
                    input_tokens: parsed.usage.input_tokens,
                    output_tokens: parsed.usage.output_tokens,
                },
                response_time_ms: started.elapsed().as_millis() as u64,
                provider_id: key.provider_id.clone(),
                timestamp: chrono::Utc::now(),
                finish_reason: parsed.stop_reason,
                request_id: String::new(),
                correlation_id: String::new(),
                additional_metadata: Default::default(),
            },
            cost: Some(CostEstimate {
                amount,
                currency: "USD".to_string(),
                confidence: 1.0,
                method: CostEstimationMethod::AdapterReported,
                estimated_input_tokens: parsed.usage.input_tokens,
                estimated_output_tokens: parsed.usage.output_tokens,
                breakdown: None,
            }),
            key_used: key.id.clone(),
            request_id: String::new(),
        })
    }

    fn get_capabilities(&self) -> Capabilities {
        Capabilities {
            models: vec![
                "claude-opus-4".to_string(),
                "claude-sonnet-4".to_string(),
            ],
            supports_streaming: true,
            supports_embeddings: false,
        }
    }

    async fn estimate_cost(&self, intent: &RequestIntent) -> Result<CostEstimate, SystemError> {
        let input_tokens = intent.estimated_input_tokens();
        let output_tokens = input_tokens / 2;
        let (input_price, output_price) = price_per_1k(&intent.model);
        let amount = (Decimal::from(input_tokens) * input_price
            + Decimal::from(output_tokens) * output_price)
            / Decimal::from(1000);

        Ok(CostEstimate {
            amount,
            currency: "USD".to_string(),
            confidence: 0.6,
            method: CostEstimationMethod::TokenHeuristic,
            estimated_input_tokens: input_tokens,
            estimated_output_tokens: output_tokens,
            breakdown: None,
        })
    }

    async fn get_health(&self) -> HealthState {
        match self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&serde_json::json!({"model": "claude-sonnet-4", "max_tokens": 1, "messages": []}))
            .send()
            .await
        {
            // A lightweight probe without credentials; anything short of a
            // network failure means the endpoint is reachable.
            Ok(resp) if resp.status().as_u16() < 500 => HealthState::Healthy,
            Ok(_) => HealthState::Degraded,
            Err(_) => HealthState::Unhealthy,
        }
    }
}

fn classify_status(status: u16) -> ErrorCategory {
    match status {
        401 | 403 => ErrorCategory::Authentication,
        429 => ErrorCategory::RateLimit,
        400 | 404 | 422 => ErrorCategory::Validation,
        s if s >= 500 => ErrorCategory::Provider,
        _ => ErrorCategory::Unknown,
    }
}

fn map_reqwest_error(err: &reqwest::Error) -> SystemError {
    if err.is_timeout() {
        SystemError::new(ErrorCategory::Timeout, err.to_string())
    } else if err.is_connect() {
        SystemError::new(ErrorCategory::Network, err.to_string())
    } else {
        SystemError::new(ErrorCategory::Unknown, err.to_string())
    }
}
