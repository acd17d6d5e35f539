//! In-process mock model for offline runs and tests.
//!
//! The mock answers schema-constrained requests with a small, valid
//! structured report and plain requests with a few query lines. Identifiers
//! containing `fail` always return an error, which makes partial-failure
//! behaviour easy to exercise end to end.

use async_trait::async_trait;
use prism_abstraction::{ChatMessage, Model, ModelError, ModelParameters, ModelResponse, ModelUsage};
use serde_json::json;
use tracing::debug;

/// A mock implementation of the `Model` trait.
#[derive(Debug, Default)]
pub struct MockModel {
    id: String,
}

impl MockModel {
    /// Creates a new `MockModel` with the given ID.
    #[must_use]
    pub const fn new(id: String) -> Self {
        Self { id }
    }

    fn subject(messages: &[ChatMessage]) -> String {
        messages
            .iter()
            .rev()
            .find(|m| m.role == "user")
            .and_then(|m| m.content.lines().find(|l| !l.trim().is_empty()))
            .map(|l| l.trim().chars().take(60).collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Model for MockModel {
    async fn generate_chat_completion(
        &self,
        messages: &[ChatMessage],
        parameters: Option<ModelParameters>,
    ) -> Result<ModelResponse, ModelError> {
        debug!(
            model_id = %self.id,
            message_count = messages.len(),
            parameters = ?parameters,
            "MockModel generating chat completion"
        );

        if self.id.contains("fail") {
            return Err(ModelError::ModelResponseError(format!(
                "mock model '{}' is configured to fail",
                self.id
            )));
        }

        let subject = Self::subject(messages);
        let structured = parameters.as_ref().is_some_and(|p| p.json_schema().is_some());

        let content = if structured {
            json!({
                "title": format!("Mock report from {}", self.id),
                "introduction": format!("Generated offline for: {subject}"),
                "sections": [
                    {"title": "Overview", "content": "Deterministic mock content."},
                    {"title": "Outlook", "content": "No real model was consulted."}
                ],
                "conclusion": "This report was produced by the mock adapter."
            })
            .to_string()
        } else {
            format!("{subject} market size\n{subject} key players\n\n{subject} outlook\n")
        };

        let prompt_tokens = messages.iter().map(|m| count_tokens(&m.content)).sum::<u32>();
        let completion_tokens = count_tokens(&content);

        Ok(ModelResponse {
            content,
            model_id: Some(self.id.clone()),
            usage: Some(ModelUsage {
                prompt_tokens,
                completion_tokens,
                total_tokens: prompt_tokens + completion_tokens,
            }),
        })
    }

    fn model_id(&self) -> &str {
        &self.id
    }
}

/// Count tokens in a string (simplified: word count).
fn count_tokens(text: &str) -> u32 {
    text.split_whitespace().count() as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use prism_abstraction::ResponseFormat;

    #[tokio::test]
    async fn test_plain_request_returns_query_lines() {
        let model = MockModel::new("mock".to_string());
        let response = model.generate_text("Electric Vehicle Market", None).await.unwrap();
        let lines: Vec<&str> = response.content.lines().filter(|l| !l.trim().is_empty()).collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("Electric Vehicle Market"));
    }

    #[tokio::test]
    async fn test_structured_request_returns_report_json() {
        let model = MockModel::new("mock-a".to_string());
        let params = ModelParameters::default().with_response_format(ResponseFormat::JsonSchema {
            name: "structured_report".to_string(),
            schema: json!({"type": "object"}),
        });
        let response = model.generate_text("topic", Some(params)).await.unwrap();
        let value: serde_json::Value = serde_json::from_str(&response.content).unwrap();
        assert_eq!(value["title"], "Mock report from mock-a");
        assert_eq!(value["sections"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_fail_id_errors() {
        let model = MockModel::new("mock-fail".to_string());
        assert!(model.generate_text("x", None).await.is_err());
    }
}
