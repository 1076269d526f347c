//! A provider bound to a model and sampling settings.

use sleuth_core::error::ProviderError;
use sleuth_core::message::Message;
use sleuth_core::provider::{Provider, ProviderRequest, ProviderResponse, ToolDefinition};
use std::sync::Arc;

#[derive(Clone)]
pub struct Engine {
    provider: Arc<dyn Provider>,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
}

impl Engine {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature: 0.7,
            max_tokens: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// The same engine with a different model.
    pub fn with_model(&self, model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..self.clone()
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn request(&self, messages: Vec<Message>, tools: Vec<ToolDefinition>) -> ProviderRequest {
        ProviderRequest {
            model: self.model.clone(),
            messages,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            tools,
        }
    }

    pub async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        self.provider.complete(request).await
    }

    /// One plain-text request; returns the reply content.
    pub async fn complete_text(&self, messages: Vec<Message>) -> Result<String, ProviderError> {
        let response = self.complete(self.request(messages, Vec::new())).await?;
        Ok(response.message.content)
    }
}
