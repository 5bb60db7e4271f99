use crate::{CompletionRequest, LlmProvider};
use explorer_core::{AiConfig, CoreError, LlmError, RetryConfig, RetryExecutor};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, error, warn};

const PROVIDER: &str = "openai";

/// Timeout for the whole request including the response body.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Provider for any OpenAI-compatible chat-completions endpoint.
#[derive(Debug)]
pub struct OpenAiProvider {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    retry: RetryExecutor,
}

impl OpenAiProvider {
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self, CoreError> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            retry: RetryExecutor::new(RetryConfig::llm()),
        })
    }

    /// Builds a provider from the `[ai]` config section; fails when no key is set.
    pub fn from_config(config: &AiConfig) -> Result<Self, CoreError> {
        let api_key = config
            .api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or(CoreError::Llm(LlmError::NotConfigured))?;
        Self::new(api_key, config.base_url.as_str(), config.model.as_str())
    }

    pub fn with_retry_config(mut self, config: RetryConfig) -> Self {
        self.retry = RetryExecutor::new(config);
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn build_request_body(&self, request: &CompletionRequest) -> Value {
        let mut body = serde_json::json!({
            "model": request.model.as_deref().unwrap_or(&self.model),
            "messages": [
                { "role": "system", "content": request.system_message },
                { "role": "user", "content": request.prompt },
            ],
            "temperature": request.temperature,
        });
        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = Value::from(max_tokens);
        }
        body
    }

    async fn send_once(&self, body: &Value) -> Result<String, CoreError> {
        let url = format!("{}/chat/completions", self.base_url);
        debug!("POST {}", url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CoreError::Llm(LlmError::RequestTimeout {
                        provider: PROVIDER.to_string(),
                    })
                } else {
                    CoreError::Network(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok());
            let body_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            error!("OpenAI request failed with status {}: {}", status, body_text);
            return Err(CoreError::Llm(status_to_error(
                status,
                retry_after,
                body_text,
                body["model"].as_str().unwrap_or(&self.model),
            )));
        }

        let json: Value = response.json().await.map_err(|e| {
            warn!("Undecodable completion response: {}", e);
            CoreError::Llm(LlmError::InvalidResponseFormat {
                provider: PROVIDER.to_string(),
            })
        })?;

        parse_completion(&json)
    }
}

impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, CoreError> {
        request.validate()?;
        let body = self.build_request_body(request);
        self.retry
            .execute("openai_chat_completion", || self.send_once(&body))
            .await
    }
}

fn status_to_error(status: StatusCode, retry_after: Option<u64>, body: String, model: &str) -> LlmError {
    let provider = PROVIDER.to_string();
    match status {
        StatusCode::UNAUTHORIZED => LlmError::InvalidApiKey { provider },
        StatusCode::PAYMENT_REQUIRED => LlmError::InsufficientCredits { provider },
        StatusCode::NOT_FOUND => LlmError::ModelNotAvailable {
            model: model.to_string(),
        },
        StatusCode::TOO_MANY_REQUESTS => LlmError::RateLimitExceeded {
            provider,
            retry_after: retry_after.unwrap_or(60),
        },
        s if s.is_server_error() => LlmError::ServiceUnavailable { provider },
        s => LlmError::RequestFailed {
            provider,
            status: s.as_u16(),
            body,
        },
    }
}

/// Extracts `choices[0].message.content`; a null content is an empty reply.
fn parse_completion(json: &Value) -> Result<String, CoreError> {
    let message = json
        .get("choices")
        .and_then(|c| c.as_array())
        .and_then(|arr| arr.first())
        .and_then(|choice| choice.get("message"))
        .ok_or(CoreError::Llm(LlmError::InvalidResponseFormat {
            provider: PROVIDER.to_string(),
        }))?;

    Ok(message
        .get("content")
        .and_then(|c| c.as_str())
        .unwrap_or_default()
        .to_string())
}
