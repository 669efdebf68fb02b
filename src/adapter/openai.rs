//! Reference adapter for the OpenAI chat completions API (and any
//! OpenAI-compatible endpoint: Azure OpenAI, local vLLM with `/v1` shim).

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

/// Per-model USD price per 1K tokens, used only for `estimate_cost`. Not
/// billing-accurate; a coarse heuristic the Cost Controller can act on
/// before the real invoice lands.
fn price_per_1k(model: &str) -> (Decimal, Decimal) {
    if model.starts_with("gpt-4") {
        (Decimal::new(3, 2), Decimal::new(6, 2))
    } else {
        (Decimal::new(5, 4), Decimal::new(15, 4))
    }
}

pub struct OpenAiAdapter {
    base_url: String,
    client: Arc<Client>,
}

impl OpenAiAdapter {
    pub fn new(base_url: impl Into<String>, client: Arc<Client>) -> Self {
        Self {
            base_url: base_url.into(),
            client,
        }
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    usage: Usage,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: String,
}

#[derive(Deserialize)]
struct Usage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[async_trait]
impl ProviderAdapter for OpenAiAdapter {
    async fn execute_request(
        &self,
        intent: &RequestIntent,
        key: &Key,
        credential: &str,
    ) -> Result<Response, SystemError> {
        let started = Instant::now();

        let body = ChatRequest {
            model: &intent.model,
            messages: intent
                .messages
                .iter()
                .map(|m| ChatMessage {
                    role: &m.role,
                    content: &m.content,
                })
                .collect(),
        };

        let resp = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .bearer_auth(credential)
            .json(&body)
            .send()
            .await
            .map_err(|e| map_reqwest_error(&e))?;

        let status = resp.status();
        if !status.is_success() {
            let retryable = status.as_u16() == 429 || status.is_server_error();
            let category = if status.as_u16() == 401 {
                ErrorCategory::Authentication
            } else if status.as_u16() == 429 {
                ErrorCategory::RateLimit
            } else if retryable {
                ErrorCategory::Provider
            } else {
                ErrorCategory::Validation
            };
            let text = resp.text().await.unwrap_or_default();
            return Err(SystemError {
                category,
                message: text,
                retryable,
                retry_after_secs: None,
            });
        }

        let parsed: ChatResponse = resp
            .json()
            .await
            .map_err(|e| SystemError::new(ErrorCategory::Unknown, e.to_string()))?;

        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| SystemError::new(ErrorCategory::Unknown, "empty choices array"))?;

        let (input_price, output_price) = price_per_1k(&intent.model);
        let amount = (Decimal::from(parsed.usage.prompt_tokens) * input_price
            + Decimal::from(parsed.usage.completion_tokens) * output_price)
            / Decimal::from(1000);

        Ok(Response {
            content: choice.message.content,
            metadata: ResponseMetadata {
                model_used: intent.model.clone(),
                tokens_used: TokenUsage {
                    input_tokens: parsed.usage.prompt_tokens,
                    output_tokens: parsed.usage.completion_tokens,
                },
                response_time_ms: started.elapsed().as_millis() as u64,
                provider_id: key.provider_id.clone(),
                timestamp: chrono::Utc::now(),
                finish_reason: choice.finish_reason,
                request_id: String::new(),
                correlation_id: String::new(),
                additional_metadata: Default::default(),
            },
            cost: Some(CostEstimate {
                amount,
                currency: "USD".to_string(),
                confidence: 1.0,
                method: CostEstimationMethod::AdapterReported,
                estimated_input_tokens: parsed.usage.prompt_tokens,
                estimated_output_tokens: parsed.usage.completion_tokens,
                breakdown: None,
            }),
            key_used: key.id.clone(),
            request_id: String::new(),
        })
    }

    fn get_capabilities(&self) -> Capabilities {
        Capabilities {
            models: vec!["gpt-4".to_string(), "gpt-3.5-turbo".to_string()],
            supports_streaming: true,
            supports_embeddings: true,
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
            .get(format!("{}/v1/models", self.base_url))
            .send()
            .await
        {
            Ok(resp) if resp.status().is_success() => HealthState::Healthy,
            Ok(_) => HealthState::Degraded,
            Err(_) => HealthState::Unhealthy,
        }
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
