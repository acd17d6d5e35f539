//! Google Gemini model implementation.
//!
//! This module provides an implementation of the `Model` trait for Google's
//! `generateContent` API, including schema-constrained JSON output and
//! server-sent-event streaming via `streamGenerateContent`.

use async_trait::async_trait;
use crate::sse::SseStream;
use prism_abstraction::{
    ChatMessage, Model, ModelError, ModelParameters, ModelResponse, ModelStream, ModelUsage,
    ResponseFormat,
};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

/// Public Gemini endpoint.
pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Google Gemini model implementation.
#[derive(Debug, Clone)]
pub struct GeminiModel {
    /// The model ID (e.g., "gemini-2.5-flash").
    model_id: String,
    /// The API key for authentication.
    api_key: String,
    /// The base URL for the Gemini API.
    base_url: String,
    /// HTTP client for making requests.
    client: Client,
}

impl GeminiModel {
    /// Creates a new `GeminiModel` with an explicit API key.
    #[must_use]
    pub fn with_api_key(model_id: String, api_key: String) -> Self {
        Self {
            model_id,
            api_key,
            base_url: GEMINI_BASE_URL.to_string(),
            client: Client::builder()
                .timeout(crate::openai::DEFAULT_TIMEOUT)
                .build()
                .unwrap_or_else(|_| Client::new()),
        }
    }

    /// Points the client at a different endpoint (proxies, tests).
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Converts our ChatMessage role to Gemini API role format.
    ///
    /// System messages are filtered out before this is called; they travel in
    /// `systemInstruction`.
    fn role_to_gemini(role: &str) -> String {
        match role {
            "assistant" => "model".to_string(),
            _ => "user".to_string(),
        }
    }

    /// Extracts system messages from the chat history and concatenates them.
    fn extract_system_messages(messages: &[ChatMessage]) -> Option<String> {
        let system_messages: Vec<&str> = messages
            .iter()
            .filter(|msg| msg.role == "system")
            .map(|msg| msg.content.as_str())
            .collect();

        if system_messages.is_empty() { None } else { Some(system_messages.join("\n\n")) }
    }

    fn generation_config(params: ModelParameters) -> GeminiGenerationConfig {
        let (response_mime_type, response_schema) = match params.response_format {
            Some(ResponseFormat::Json) => (Some("application/json".to_string()), None),
            Some(ResponseFormat::JsonSchema { schema, .. }) => {
                (Some("application/json".to_string()), Some(sanitize_schema(schema)))
            }
            Some(ResponseFormat::Text) | None => (None, None),
        };

        GeminiGenerationConfig {
            temperature: params.temperature,
            top_p: params.top_p,
            max_output_tokens: params.max_tokens,
            stop_sequences: params.stop_sequences,
            response_mime_type,
            response_schema,
        }
    }
}

/// Removes schema keywords Gemini's OpenAPI subset rejects.
pub fn sanitize_schema(schema: serde_json::Value) -> serde_json::Value {
    match schema {
        serde_json::Value::Object(map) => serde_json::Value::Object(
            map.into_iter()
                .filter(|(key, _)| key != "additionalProperties" && key != "$schema")
                .map(|(key, value)| (key, sanitize_schema(value)))
                .collect(),
        ),
        serde_json::Value::Array(items) => {
            serde_json::Value::Array(items.into_iter().map(sanitize_schema).collect())
        }
        other => other,
    }
}

impl GeminiModel {
    fn build_request(messages: &[ChatMessage], parameters: Option<ModelParameters>) -> GeminiRequest {
        let contents: Vec<GeminiContent> = messages
            .iter()
            .filter(|msg| msg.role != "system")
            .map(|msg| GeminiContent {
                role: Self::role_to_gemini(&msg.role),
                parts: vec![GeminiPart { text: msg.content.clone() }],
            })
            .collect();

        GeminiRequest {
            contents,
            generation_config: parameters.map(Self::generation_config),
            system_instruction: Self::extract_system_messages(messages)
                .map(|text| GeminiSystemInstruction { parts: vec![GeminiPart { text }] }),
        }
    }

    /// Posts `request_body` to `models/<id>:<method>` and maps error statuses.
    async fn send(
        &self,
        method: &str,
        query: &[(&str, &str)],
        request_body: &GeminiRequest,
    ) -> Result<reqwest::Response, ModelError> {
        let url = format!("{}/models/{}:{}", self.base_url, self.model_id, method);

        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .query(query)
            .json(request_body)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to send request to Gemini API");
                ModelError::RequestError(format!("Network error: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            error!(status = %status, error = %error_text, "Gemini API returned error status");

            if status == 402 || status == 429 {
                return Err(ModelError::QuotaExceeded {
                    provider: "gemini".to_string(),
                    message: Some(error_text),
                });
            }
            if status == 401 || status == 403 {
                return Err(ModelError::UnsupportedModelProvider(format!(
                    "Authentication failed ({}): {}",
                    status, error_text
                )));
            }
            return Err(ModelError::ModelResponseError(format!(
                "API error ({}): {}",
                status, error_text
            )));
        }
        Ok(response)
    }
}

/// Text of the first candidate of one streamed response chunk.
fn stream_delta(data: &str) -> Option<String> {
    match serde_json::from_str::<GeminiResponse>(data) {
        Ok(chunk) => chunk
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().map(|p| p.text).collect()),
        Err(e) => {
            debug!(error = %e, "Skipping unparseable Gemini stream chunk");
            None
        }
    }
}

#[async_trait]
impl Model for GeminiModel {
    async fn generate_chat_completion(
        &self,
        messages: &[ChatMessage],
        parameters: Option<ModelParameters>,
    ) -> Result<ModelResponse, ModelError> {
        debug!(
            model_id = %self.model_id,
            message_count = messages.len(),
            parameters = ?parameters,
            "GeminiModel generating chat completion"
        );

        let request_body = Self::build_request(messages, parameters);
        let response = self.send("generateContent", &[], &request_body).await?;

        let gemini_response: GeminiResponse = response.json().await.map_err(|e| {
            error!(error = %e, "Failed to parse Gemini API response");
            ModelError::SerializationError(format!("Failed to parse response: {}", e))
        })?;

        let candidate = gemini_response.candidates.into_iter().next().ok_or_else(|| {
            error!("No candidates in Gemini API response");
            ModelError::ModelResponseError("No content in API response".to_string())
        })?;

        let content: String = candidate
            .content
            .map(|c| c.parts.into_iter().map(|p| p.text).collect())
            .unwrap_or_default();
        if content.is_empty() {
            return Err(ModelError::ModelResponseError(format!(
                "Empty candidate (finish reason: {})",
                candidate.finish_reason.as_deref().unwrap_or("unknown")
            )));
        }

        let usage = gemini_response.usage_metadata.map(|meta| ModelUsage {
            prompt_tokens: meta.prompt_token_count.unwrap_or(0),
            completion_tokens: meta.candidates_token_count.unwrap_or(0),
            total_tokens: meta.total_token_count.unwrap_or(0),
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
            message_count = messages.len(),
            "GeminiModel streaming chat completion"
        );

        let request_body = Self::build_request(messages, parameters);
        let response =
            self.send("streamGenerateContent", &[("alt", "sse")], &request_body).await?;
        Ok(Box::pin(SseStream::new(response, stream_delta)))
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

// Gemini API request/response structures

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GeminiGenerationConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiSystemInstruction>,
}

#[derive(Debug, Serialize)]
struct GeminiSystemInstruction {
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(default)]
    role: String,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiPart {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop_sequences: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_schema: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    usage_metadata: Option<GeminiUsageMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    content: Option<GeminiContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
#[allow(clippy::struct_field_names)] // Matches API naming
struct GeminiUsageMetadata {
    prompt_token_count: Option<u32>,
    candidates_token_count: Option<u32>,
    total_token_count: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    #[test]
    fn test_role_conversion() {
        assert_eq!(GeminiModel::role_to_gemini("assistant"), "model");
        assert_eq!(GeminiModel::role_to_gemini("user"), "user");
    }

    #[test]
    fn test_extract_system_messages() {
        let messages = vec![
            ChatMessage::system("first"),
            ChatMessage::user("hello"),
            ChatMessage::system("second"),
        ];
        assert_eq!(
            GeminiModel::extract_system_messages(&messages),
            Some("first\n\nsecond".to_string())
        );
        assert_eq!(GeminiModel::extract_system_messages(&[ChatMessage::user("x")]), None);
    }

    #[test]
    fn test_sanitize_schema_strips_unsupported_keys() {
        let schema = json!({
            "type": "object",
            "additionalProperties": false,
            "properties": {
                "sections": {
                    "type": "array",
                    "items": {"type": "object", "additionalProperties": false}
                }
            }
        });
        let cleaned = sanitize_schema(schema);
        assert!(cleaned.get("additionalProperties").is_none());
        assert!(cleaned["properties"]["sections"]["items"].get("additionalProperties").is_none());
        assert_eq!(cleaned["properties"]["sections"]["type"], "array");
    }

    #[tokio::test]
    async fn test_generate_structured_content() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/models/gemini-2.5-flash:generateContent")
            .match_query(Matcher::UrlEncoded("key".to_string(), "test-key".to_string()))
            .match_body(Matcher::PartialJson(json!({
                "generationConfig": {"responseMimeType": "application/json"},
                "systemInstruction": {"parts": [{"text": "be terse"}]}
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{
                    "candidates": [{"content": {"role": "model", "parts": [{"text": "{\"title\":"}, {"text": "\"x\"}"}]}}],
                    "usageMetadata": {"promptTokenCount": 3, "candidatesTokenCount": 4, "totalTokenCount": 7}
                }"#,
            )
            .create_async()
            .await;

        let model = GeminiModel::with_api_key("gemini-2.5-flash".to_string(), "test-key".to_string())
            .with_base_url(server.url());
        let params = ModelParameters::with_temperature(0.5).with_response_format(
            ResponseFormat::JsonSchema { name: "r".to_string(), schema: json!({"type": "object"}) },
        );
        let response = model
            .generate_chat_completion(
                &[ChatMessage::system("be terse"), ChatMessage::user("go")],
                Some(params),
            )
            .await
            .unwrap();

        assert_eq!(response.content, r#"{"title":"x"}"#);
        assert_eq!(response.usage.unwrap().total_tokens, 7);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_resource_exhausted_maps_to_quota() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/models/gemini-2.5-flash:generateContent")
            .match_query(Matcher::Any)
            .with_status(429)
            .with_body(r#"{"error": {"status": "RESOURCE_EXHAUSTED"}}"#)
            .create_async()
            .await;

        let model = GeminiModel::with_api_key("gemini-2.5-flash".to_string(), "k".to_string())
            .with_base_url(server.url());
        let err = model.generate_text("hi", None).await.unwrap_err();
        assert!(matches!(err, ModelError::QuotaExceeded { ref provider, .. } if provider == "gemini"));
    }

    #[tokio::test]
    async fn test_empty_candidate_is_an_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/models/gemini-2.5-flash:generateContent")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"candidates": [{"finishReason": "SAFETY"}]}"#)
            .create_async()
            .await;

        let model = GeminiModel::with_api_key("gemini-2.5-flash".to_string(), "k".to_string())
            .with_base_url(server.url());
        let err = model.generate_text("hi", None).await.unwrap_err();
        match err {
            ModelError::ModelResponseError(msg) => assert!(msg.contains("SAFETY")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_stream_uses_sse_endpoint() {
        use futures::StreamExt;

        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/models/gemini-2.5-flash:streamGenerateContent")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("alt".into(), "sse".into()),
                Matcher::UrlEncoded("key".into(), "k".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "text/event-stream")
            .with_body(
                "data: {\"candidates\": [{\"content\": {\"parts\": [{\"text\": \"Electric \"}]}}]}\r\n\r\n\
data: {\"candidates\": [{\"content\": {\"parts\": [{\"text\": \"vehicles\"}]}, \"finishReason\": \"STOP\"}]}\r\n\r\n",
            )
            .create_async()
            .await;

        let model = GeminiModel::with_api_key("gemini-2.5-flash".to_string(), "k".to_string())
            .with_base_url(server.url());
        let stream = model.generate_chat_stream(&[ChatMessage::user("EV")], None).await.unwrap();
        let text: String = stream.map(Result::unwrap).collect::<Vec<_>>().await.concat();

        assert_eq!(text, "Electric vehicles");
        mock.assert_async().await;
    }
}
