//! Conversational completions addressed by model alias.

use crate::error::{PrismError, Result};
use crate::provider::ModelProvider;
use prism_abstraction::{ChatMessage, Model, ModelParameters, ModelStream};
use prism_models::resolve_alias;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

/// Sampling temperature for chat replies.
pub const CHAT_TEMPERATURE: f32 = 0.7;

/// A chat answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatReply {
    /// Canonical model id the alias resolved to.
    pub model_id: String,
    pub content: String,
}

/// A chat answer arriving as text deltas.
pub struct ChatStream {
    /// Canonical model id the alias resolved to.
    pub model_id: String,
    pub deltas: ModelStream,
}

/// Forwards a conversation to the model behind an alias.
pub struct ChatService {
    provider: Arc<dyn ModelProvider>,
}

impl ChatService {
    pub fn new(provider: Arc<dyn ModelProvider>) -> Self {
        Self { provider }
    }

    /// Sends `messages` to the model named by `alias` and returns its reply.
    ///
    /// # Errors
    /// An unknown alias fails with `ResolveError::UnknownAlias` and an empty
    /// conversation with `PrismError::InvalidInput`, both before any model
    /// is contacted.
    pub async fn complete(&self, alias: &str, messages: &[ChatMessage]) -> Result<ChatReply> {
        let (model_id, model) = self.model_for_alias(alias, messages)?;

        let response = model
            .generate_chat_completion(messages, Some(ModelParameters::with_temperature(CHAT_TEMPERATURE)))
            .await?;
        info!(model_id = %model_id, reply_chars = response.content.chars().count(), "Chat reply received");

        Ok(ChatReply { model_id: model_id.to_string(), content: response.content })
    }

    /// Like [`complete`](Self::complete), but yields the reply as it is generated.
    ///
    /// # Errors
    /// Same up-front failures as `complete`; errors after the stream has
    /// started arrive as stream items.
    pub async fn complete_stream(&self, alias: &str, messages: &[ChatMessage]) -> Result<ChatStream> {
        let (model_id, model) = self.model_for_alias(alias, messages)?;

        let deltas = model
            .generate_chat_stream(messages, Some(ModelParameters::with_temperature(CHAT_TEMPERATURE)))
            .await?;
        Ok(ChatStream { model_id: model_id.to_string(), deltas })
    }

    fn model_for_alias(
        &self,
        alias: &str,
        messages: &[ChatMessage],
    ) -> Result<(&'static str, Arc<dyn Model>)> {
        let model_id = resolve_alias(alias)?;
        if messages.is_empty() {
            return Err(PrismError::InvalidInput("chat requires at least one message".to_string()));
        }

        let model = self.provider.model_for(model_id)?;
        debug!(alias = %alias, model_id = %model_id, message_count = messages.len(), "Sending chat request");
        Ok((model_id, model))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;
    use async_trait::async_trait;
    use futures::StreamExt;
    use prism_abstraction::{ModelError, ModelResponse};
    use prism_models::{MockModel, ResolveError};
    use std::sync::Mutex;

    /// Serves mock models and records what was asked for.
    #[derive(Default)]
    struct RecordingProvider {
        requested: Mutex<Vec<String>>,
    }

    impl ModelProvider for RecordingProvider {
        fn model_for(&self, model_id: &str) -> std::result::Result<Arc<dyn Model>, PipelineError> {
            self.requested.lock().unwrap().push(model_id.to_string());
            Ok(Arc::new(MockModel::new(format!("mock-{model_id}"))))
        }
    }

    #[tokio::test]
    async fn alias_resolves_before_model_call() {
        let provider = Arc::new(RecordingProvider::default());
        let service = ChatService::new(provider.clone());

        let reply = service.complete("deepseek", &[ChatMessage::user("Hello")]).await.unwrap();

        assert_eq!(reply.model_id, "deepseek-chat");
        assert!(reply.content.starts_with("Hello"));
        assert_eq!(*provider.requested.lock().unwrap(), vec!["deepseek-chat".to_string()]);
    }

    #[tokio::test]
    async fn unknown_alias_never_reaches_provider() {
        let provider = Arc::new(RecordingProvider::default());
        let service = ChatService::new(provider.clone());

        let err = service.complete("claude", &[ChatMessage::user("Hi")]).await.unwrap_err();

        assert!(matches!(err, PrismError::Resolve(ResolveError::UnknownAlias(ref a)) if a == "claude"));
        assert!(provider.requested.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_conversation_is_rejected() {
        let service = ChatService::new(Arc::new(RecordingProvider::default()));
        let err = service.complete("qwen", &[]).await.unwrap_err();
        assert!(matches!(err, PrismError::InvalidInput(_)));
    }

    /// Streams its answer word by word.
    struct WordStreamer;

    #[async_trait]
    impl Model for WordStreamer {
        async fn generate_chat_completion(
            &self,
            _messages: &[ChatMessage],
            _parameters: Option<ModelParameters>,
        ) -> std::result::Result<ModelResponse, ModelError> {
            Err(ModelError::Other("streaming only".to_string()))
        }

        async fn generate_chat_stream(
            &self,
            _messages: &[ChatMessage],
            parameters: Option<ModelParameters>,
        ) -> std::result::Result<ModelStream, ModelError> {
            assert_eq!(parameters.unwrap().temperature, Some(CHAT_TEMPERATURE));
            let words = ["Battery ", "costs ", "fell"].map(|w| Ok(w.to_string()));
            Ok(Box::pin(futures::stream::iter(words)))
        }

        fn model_id(&self) -> &str {
            "streamer"
        }
    }

    struct StreamingProvider;

    impl ModelProvider for StreamingProvider {
        fn model_for(&self, _model_id: &str) -> std::result::Result<Arc<dyn Model>, PipelineError> {
            Ok(Arc::new(WordStreamer))
        }
    }

    #[tokio::test]
    async fn stream_yields_deltas_in_order() {
        let service = ChatService::new(Arc::new(StreamingProvider));

        let stream = service.complete_stream("gemini", &[ChatMessage::user("EV")]).await.unwrap();
        assert_eq!(stream.model_id, "gemini-2.5-flash");

        let deltas: Vec<String> = stream.deltas.map(|d| d.unwrap()).collect().await;
        assert_eq!(deltas, vec!["Battery ", "costs ", "fell"]);
    }

    #[tokio::test]
    async fn stream_of_non_streaming_model_matches_complete() {
        let service = ChatService::new(Arc::new(RecordingProvider::default()));
        let messages = [ChatMessage::user("Hello")];

        let whole = service.complete("qwen", &messages).await.unwrap();
        let stream = service.complete_stream("qwen", &messages).await.unwrap();
        let streamed: String = stream.deltas.map(|d| d.unwrap()).collect::<Vec<_>>().await.concat();

        assert_eq!(streamed, whole.content);
    }

    #[tokio::test]
    async fn stream_rejects_unknown_alias_and_empty_conversation() {
        let service = ChatService::new(Arc::new(RecordingProvider::default()));
        assert!(matches!(
            service.complete_stream("claude", &[ChatMessage::user("Hi")]).await,
            Err(PrismError::Resolve(ResolveError::UnknownAlias(_)))
        ));
        assert!(matches!(
            service.complete_stream("qwen", &[]).await,
            Err(PrismError::InvalidInput(_))
        ));
    }
}
