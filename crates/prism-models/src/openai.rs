//! OpenAI-compatible model implementation.
//!
//! One client serves every backend that speaks the OpenAI Chat Completions
//! dialect: OpenAI itself, DeepSeek, and self-hosted servers such as vLLM,
//! LocalAI or LM Studio. Only the base URL, the credential and the provider
//! label used in error messages differ.

use async_trait::async_trait;
use crate::sse::SseStream;
use prism_abstraction::{
    ChatMessage, Model, ModelError, ModelParameters, ModelResponse, ModelStream, ModelUsage,
    ResponseFormat,
};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error};

/// Default request timeout applied by the transport.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// OpenAI-compatible chat model.
#[derive(Debug, Clone)]
pub struct OpenAIModel {
    /// The model ID sent in the request body (e.g., "gpt-4o", "deepseek-chat").
    model_id: String,
    /// Base URL for the API endpoint (e.g., "https://api.openai.com/v1").
    base_url: String,
    /// Optional API key; local servers usually run without one.
    api_key: Option<String>,
    /// Provider label used in quota errors and logs.
    provider: String,
    /// HTTP client for requests.
    client: Client,
}

impl OpenAIModel {
    /// Creates a new client for the given endpoint.
    ///
    /// # Arguments
    /// * `model_id` - The model identifier
    /// * `base_url` - The base URL, without the `/chat/completions` suffix
    /// * `api_key` - Bearer token, if the server requires one
    #[must_use]
    pub fn new(model_id: String, base_url: String, api_key: Option<String>) -> Self {
        Self {
            model_id,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            provider: "openai".to_string(),
            client: build_client(DEFAULT_TIMEOUT),
        }
    }

    /// Sets the provider label reported in errors.
    #[must_use]
    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = provider.into();
        self
    }

    /// Replaces the transport timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.client = build_client(timeout);
        self
    }

    /// Returns the configured base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns the provider label.
    pub fn provider(&self) -> &str {
        &self.provider
    }

    /// Converts the requested response format to OpenAI's `response_format` field.
    ///
    /// `Text` and `None` produce no field at all. Schemas are sent in strict mode.
    pub fn convert_response_format(
        &self,
        format: &Option<ResponseFormat>,
    ) -> Result<Option<OpenAIResponseFormat>, ModelError> {
        match format {
            None | Some(ResponseFormat::Text) => Ok(None),
            Some(ResponseFormat::Json) => Ok(Some(OpenAIResponseFormat::JsonObject)),
            Some(ResponseFormat::JsonSchema { name, schema }) => {
                if !schema.is_object() {
                    return Err(ModelError::SerializationError(format!(
                        "Invalid JSON schema for '{}': expected an object",
                        name
                    )));
                }
                Ok(Some(OpenAIResponseFormat::JsonSchema {
                    json_schema: OpenAIJsonSchema {
                        name: name.clone(),
                        schema: schema.clone(),
                        strict: true,
                    },
                }))
            }
        }
    }

    fn map_error_status(&self, status: reqwest::StatusCode, error_text: String) -> ModelError {
        if status == 401 || status == 403 {
            return ModelError::UnsupportedModelProvider(format!(
                "Authentication failed ({}): {}",
                status, error_text
            ));
        }

        if status == 402 || status == 429 {
            return ModelError::QuotaExceeded {
                provider: self.provider.clone(),
                message: Some(error_text),
            };
        }

        if status.is_server_error() {
            return ModelError::ModelResponseError(format!(
                "Server error ({}): {}",
                status, error_text
            ));
        }

        ModelError::ModelResponseError(format!("API error ({}): {}", status, error_text))
    }
}

fn build_client(timeout: Duration) -> Client {
    Client::builder().timeout(timeout).build().unwrap_or_else(|_| Client::new())
}

impl OpenAIModel {
    fn build_request(
        &self,
        messages: &[ChatMessage],
        parameters: Option<ModelParameters>,
        stream: bool,
    ) -> Result<OpenAIRequest, ModelError> {
        let openai_messages: Vec<OpenAIMessage> = messages
            .iter()
            .map(|msg| OpenAIMessage { role: msg.role.clone(), content: msg.content.clone() })
            .collect();

        let mut request_body = OpenAIRequest {
            model: self.model_id.clone(),
            messages: openai_messages,
            temperature: None,
            top_p: None,
            max_tokens: None,
            stop: None,
            response_format: None,
            stream: stream.then_some(true),
        };

        if let Some(params) = parameters {
            request_body.response_format = self.convert_response_format(&params.response_format)?;
            request_body.temperature = params.temperature;
            request_body.top_p = params.top_p;
            request_body.max_tokens = params.max_tokens;
            request_body.stop = params.stop_sequences;
        }
        Ok(request_body)
    }

    /// Posts to `/chat/completions` and maps non-success statuses to errors.
    async fn send(&self, request_body: &OpenAIRequest) -> Result<reqwest::Response, ModelError> {
        let url = format!("{}/chat/completions", self.base_url);
        let mut request = self.client.post(&url).json(request_body);
        if let Some(ref api_key) = self.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request.send().await.map_err(|e| {
            error!(error = %e, url = %url, "Failed to send request to OpenAI-compatible API");
            ModelError::RequestError(format!("Network error: {}", e))
        })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            error!(
                status = %status,
                error = %error_text,
                url = %url,
                "OpenAI-compatible API returned error status"
            );
            return Err(self.map_error_status(status, error_text));
        }
        Ok(response)
    }
}

/// Text delta of one streamed chat chunk.
fn stream_delta(data: &str) -> Option<String> {
    match serde_json::from_str::<OpenAIStreamChunk>(data) {
        Ok(chunk) => chunk.choices.into_iter().next().and_then(|c| c.delta.content),
        Err(e) => {
            // Some servers interleave non-JSON keep-alive payloads.
            debug!(error = %e, "Skipping unparseable stream chunk");
            None
        }
    }
}

#[async_trait]
impl Model for OpenAIModel {
    async fn generate_chat_completion(
        &self,
        messages: &[ChatMessage],
        parameters: Option<ModelParameters>,
    ) -> Result<ModelResponse, ModelError> {
        debug!(
            model_id = %self.model_id,
            provider = %self.provider,
            message_count = messages.len(),
            parameters = ?parameters,
            "OpenAIModel generating chat completion"
        );

        let request_body = self.build_request(messages, parameters, false)?;
        let response = self.send(&request_body).await?;

        let openai_response: OpenAIResponse = response.json().await.map_err(|e| {
            error!(error = %e, model_id = %self.model_id, "Failed to parse OpenAI-compatible API response");
            ModelError::SerializationError(format!("Failed to parse response: {}", e))
        })?;

        let content = openai_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| {
                error!(model_id = %self.model_id, "No content in OpenAI-compatible API response");
                ModelError::ModelResponseError("No content in API response".to_string())
            })?;

        let usage = openai_response.usage.map(|u| ModelUsage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        });

        Ok(ModelResponse { content, model_id: Some(self.model_id.clone()), usage })
    }

    async fn generate_chat_stream(
        &self,
        messages: &[ChatMessage],
        parameters: Option<ModelParameters>,
    ) -> Result<ModelStream, ModelError> {
        debug!(
            model_id = %self.model_id,
            provider = %self.provider,
            message_count = messages.len(),
            "OpenAIModel streaming chat completion"
        );

        let request_body = self.build_request(messages, parameters, true)?;
        let response = self.send(&request_body).await?;
        Ok(Box::pin(SseStream::new(response, stream_delta)))
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

// OpenAI API request/response structures

#[derive(Debug, Serialize)]
struct OpenAIRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<OpenAIResponseFormat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
}

#[derive(Debug, Serialize)]
struct OpenAIMessage {
    role: String,
    content: String,
}

/// OpenAI `response_format` payload.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OpenAIResponseFormat {
    /// `{"type": "json_object"}`
    JsonObject,
    /// `{"type": "json_schema", "json_schema": {...}}`
    JsonSchema {
        /// Schema wrapper.
        json_schema: OpenAIJsonSchema,
    },
}

/// Named schema sent inside `response_format`.
#[derive(Debug, Clone, Serialize)]
pub struct OpenAIJsonSchema {
    name: String,
    schema: serde_json::Value,
    strict: bool,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
    usage: Option<OpenAIUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIResponseMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIStreamChunk {
    #[serde(default)]
    choices: Vec<OpenAIStreamChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAIStreamChoice {
    #[serde(default)]
    delta: OpenAIStreamDelta,
}

#[derive(Debug, Default, Deserialize)]
struct OpenAIStreamDelta {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
#[allow(clippy::struct_field_names)] // Matches API naming
struct OpenAIUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}
