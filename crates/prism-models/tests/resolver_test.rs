//! Integration tests for adapter resolution and construction.

use mockito::Matcher;
use prism_abstraction::{ChatMessage, Model};
use prism_models::{Dialect, ProviderSettings, ResolveError, resolve, resolve_alias};
use serde_json::json;

#[tokio::test]
async fn test_resolved_mock_adapter_generates() {
    let config = resolve("mock-a", &ProviderSettings::default()).unwrap();
    let model = config.build().unwrap();

    let response = model.generate_text("Electric Vehicle Market", None).await.unwrap();
    assert!(!response.content.is_empty());
    assert!(response.usage.is_some());
}

#[tokio::test]
async fn test_deepseek_adapter_talks_openai_dialect() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/chat/completions")
        .match_header("authorization", "Bearer ds-key")
        .match_body(Matcher::PartialJson(json!({"model": "deepseek-chat"})))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"choices": [{"message": {"content": "pong"}}]}"#)
        .create_async()
        .await;

    let settings = ProviderSettings {
        deepseek_api_key: Some("ds-key".to_string()),
        deepseek_base_url: format!("{}/v1", server.url()),
        ..ProviderSettings::default()
    };
    let config = resolve("deepseek-chat", &settings).unwrap();
    assert_eq!(config.dialect, Dialect::DeepSeek);

    let model = config.build().unwrap();
    let response =
        model.generate_chat_completion(&[ChatMessage::user("ping")], None).await.unwrap();
    assert_eq!(response.content, "pong");
    mock.assert_async().await;
}

#[tokio::test]
async fn test_unknown_model_uses_compatible_endpoint_without_key() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/chat/completions")
        .match_header("authorization", Matcher::Missing)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"choices": [{"message": {"content": "local"}}]}"#)
        .create_async()
        .await;

    let settings = ProviderSettings {
        compatible_base_url: Some(format!("{}/v1", server.url())),
        ..ProviderSettings::default()
    };
    let model = resolve("unknown-model", &settings).unwrap().build().unwrap();
    assert_eq!(model.model_id(), "unknown-model");
    assert_eq!(model.generate_text("hi", None).await.unwrap().content, "local");
    mock.assert_async().await;
}

#[test]
fn test_alias_then_resolve() {
    let canonical = resolve_alias("qwen").unwrap();
    let config = resolve(canonical, &ProviderSettings::default()).unwrap();
    assert_eq!(config.dialect, Dialect::OpenAICompatible);

    assert!(matches!(resolve_alias("nope"), Err(ResolveError::UnknownAlias(_))));
}
