//! Chat-completion providers and the AI assistant built on top of them.
//!
//! [`LlmProvider`] is the seam between prompt logic and transport: the
//! [`AiAssistant`] only builds prompts and parses replies, while
//! [`OpenAiProvider`] talks to any OpenAI-compatible endpoint.

pub mod assistant;
pub mod openai;
pub mod prompts;

pub use assistant::{AiAssistant, DigestSource, PostToCategorize};
pub use openai::OpenAiProvider;

use explorer_core::{CoreError, LlmError};

pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_MAX_TOKENS: u32 = 1000;

#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub system_message: String,
    pub prompt: String,
    /// Overrides the provider's configured model.
    pub model: Option<String>,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
}

impl CompletionRequest {
    pub fn new(system_message: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            system_message: system_message.into(),
            prompt: prompt.into(),
            model: None,
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: Some(DEFAULT_MAX_TOKENS),
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn validate(&self) -> Result<(), LlmError> {
        if self.system_message.trim().is_empty() || self.prompt.trim().is_empty() {
            return Err(LlmError::InvalidPrompt {
                reason: "system message and prompt are required".to_string(),
            });
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(LlmError::InvalidPrompt {
                reason: format!(
                    "temperature must be between 0.0 and 2.0, got {}",
                    self.temperature
                ),
            });
        }
        Ok(())
    }
}

#[allow(async_fn_in_trait)]
pub trait LlmProvider {
    /// Short provider name used in errors and logs.
    fn name(&self) -> &str;

    async fn complete(&self, request: &CompletionRequest) -> Result<String, CoreError>;
}
