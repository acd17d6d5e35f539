//! Model abstraction layer for Prism.
//!
//! This module defines the core trait and types every model backend speaks.
//! Concrete adapters live in `prism-models`; the report pipeline in
//! `prism-core` only ever sees `Arc<dyn Model>`.

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use thiserror::Error;

/// Represents an error that can occur when interacting with an AI model.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelError {
    /// An error occurred during the API request (e.g., network issues, invalid request).
    #[error("Request Error: {0}")]
    RequestError(String),

    /// The model returned an error (e.g., invalid input, rate limiting).
    #[error("Model Response Error: {0}")]
    ModelResponseError(String),

    /// An error occurred during serialization or deserialization.
    #[error("Serialization Error: {0}")]
    SerializationError(String),

    /// The model provider is not supported or configured.
    #[error("Unsupported Model Provider: {0}")]
    UnsupportedModelProvider(String),

    /// Provider quota exceeded or rate limit hit.
    #[error("Provider '{provider}' quota exceeded{}", message.as_ref().map(|m| format!(": {}", m)).unwrap_or_default())]
    QuotaExceeded {
        /// The provider name (e.g., "openai", "gemini").
        provider: String,
        /// Optional error message from the provider.
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },

    /// Other unexpected errors.
    #[error("Other Model Error: {0}")]
    Other(String),
}

/// Represents a message in a conversation with a chat model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// The role of the message sender (e.g., "user", "assistant", "system").
    pub role: String,
    /// The content of the message.
    pub content: String,
}

impl ChatMessage {
    /// Creates a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: "system".to_string(), content: content.into() }
    }

    /// Creates a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: "user".to_string(), content: content.into() }
    }

    /// Creates an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: "assistant".to_string(), content: content.into() }
    }
}

/// Requested shape of the model's output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ResponseFormat {
    /// Free-form text (provider default).
    Text,
    /// Any valid JSON object.
    Json,
    /// JSON constrained by a schema.
    JsonSchema {
        /// Schema name, reported to providers that require one.
        name: String,
        /// The JSON schema document.
        schema: serde_json::Value,
    },
}

/// Parameters for controlling the model's generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelParameters {
    /// What sampling temperature to use, between 0 and 2.
    pub temperature: Option<f32>,

    /// Nucleus sampling probability mass.
    pub top_p: Option<f32>,

    /// The maximum number of tokens to generate in the chat completion.
    pub max_tokens: Option<u32>,

    /// Up to 4 sequences where the API will stop generating further tokens.
    pub stop_sequences: Option<Vec<String>>,

    /// Requested output format. `None` means plain text.
    pub response_format: Option<ResponseFormat>,
}

impl Default for ModelParameters {
    fn default() -> Self {
        Self {
            temperature: Some(0.7),
            top_p: None,
            max_tokens: None,
            stop_sequences: None,
            response_format: None,
        }
    }
}

impl ModelParameters {
    /// Default parameters with the given sampling temperature.
    #[must_use]
    pub fn with_temperature(temperature: f32) -> Self {
        Self { temperature: Some(temperature), ..Self::default() }
    }

    /// Sets the requested response format.
    #[must_use]
    pub fn with_response_format(mut self, format: ResponseFormat) -> Self {
        self.response_format = Some(format);
        self
    }

    /// Returns the JSON schema if a schema-constrained response was requested.
    pub fn json_schema(&self) -> Option<(&str, &serde_json::Value)> {
        match &self.response_format {
            Some(ResponseFormat::JsonSchema { name, schema }) => Some((name.as_str(), schema)),
            _ => None,
        }
    }
}

/// The response from a text generation or chat completion model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelResponse {
    /// The generated content.
    pub content: String,

    /// Optional: The ID of the model used to generate the response.
    pub model_id: Option<String>,

    /// Optional: Usage statistics for the request.
    pub usage: Option<ModelUsage>,
}

/// Usage statistics for a model request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelUsage {
    /// Number of tokens in the prompt.
    pub prompt_tokens: u32,

    /// Number of tokens in the completion.
    pub completion_tokens: u32,

    /// Total number of tokens used.
    pub total_tokens: u32,
}

/// Text deltas of a streamed completion, in arrival order.
pub type ModelStream = Pin<Box<dyn Stream<Item = Result<String, ModelError>> + Send>>;

/// A trait for interacting with different AI models.
///
/// All models must be `Send + Sync` so one handle can be shared by the
/// concurrent pipeline runs.
#[async_trait]
pub trait Model: Send + Sync {
    /// Generates a text completion based on the given prompt.
    ///
    /// The default implementation wraps the prompt in a single user message.
    async fn generate_text(
        &self,
        prompt: &str,
        parameters: Option<ModelParameters>,
    ) -> Result<ModelResponse, ModelError> {
        let messages = [ChatMessage::user(prompt)];
        self.generate_chat_completion(&messages, parameters).await
    }

    /// Generates a chat completion based on the given conversation history.
    ///
    /// # Errors
    /// Returns a `ModelError` if generation fails.
    async fn generate_chat_completion(
        &self,
        messages: &[ChatMessage],
        parameters: Option<ModelParameters>,
    ) -> Result<ModelResponse, ModelError>;

    /// Streams a chat completion as incremental text deltas.
    ///
    /// The default implementation yields the whole non-streamed answer as a
    /// single delta.
    ///
    /// # Errors
    /// Returns a `ModelError` if the request cannot be started; failures
    /// after that arrive as stream items.
    async fn generate_chat_stream(
        &self,
        messages: &[ChatMessage],
        parameters: Option<ModelParameters>,
    ) -> Result<ModelStream, ModelError> {
        let response = self.generate_chat_completion(messages, parameters).await?;
        Ok(Box::pin(futures::stream::once(async move { Ok(response.content) })))
    }

    /// Returns the ID of the model.
    fn model_id(&self) -> &str;
}
