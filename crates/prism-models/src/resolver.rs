//! Model adapter resolution.
//!
//! Maps a logical model identifier to the backend client configuration that
//! serves it, and maps short human-facing aliases to canonical identifiers.
//! The two lookups fail with different error kinds and must not be conflated.

use crate::{GeminiModel, MockModel, OpenAIModel};
use prism_abstraction::{Model, ModelError};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Static alias table used by the conversational endpoint.
pub const MODEL_ALIASES: &[(&str, &str)] = &[
    ("gemini", "gemini-2.5-flash"),
    ("deepseek", "deepseek-chat"),
    ("qwen", "Qwen/Qwen2.5-7B-Chat"),
];

/// Resolution failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    /// The identifier cannot be routed to any adapter.
    #[error("Unknown model: '{0}'")]
    UnknownModel(String),

    /// The alias is not present in the alias table.
    #[error("Unknown model alias: '{0}'")]
    UnknownAlias(String),
}

/// API dialect spoken by a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Dialect {
    /// Google Gemini `generateContent`.
    Gemini,
    /// OpenAI's hosted API.
    OpenAI,
    /// DeepSeek's OpenAI-compatible API.
    DeepSeek,
    /// Any other OpenAI-compatible server (vLLM, LocalAI, LM Studio, ...).
    OpenAICompatible,
    /// In-process mock adapter.
    Mock,
}

impl Dialect {
    /// Classifies a model identifier by substring and prefix.
    ///
    /// Returns `None` for identifiers no vendor token matches; callers fall
    /// back to [`Dialect::OpenAICompatible`].
    pub fn classify(model_id: &str) -> Option<Self> {
        let id = model_id.trim().to_lowercase();
        if id.starts_with("mock") {
            Some(Self::Mock)
        } else if id.contains("gemini") {
            Some(Self::Gemini)
        } else if id.contains("deepseek") {
            Some(Self::DeepSeek)
        } else if ["gpt-", "chatgpt", "o1", "o3", "o4"].iter().any(|p| id.starts_with(p)) {
            Some(Self::OpenAI)
        } else {
            None
        }
    }

    /// Provider label used in logs and quota errors.
    pub const fn provider(self) -> &'static str {
        match self {
            Self::Gemini => "gemini",
            Self::OpenAI => "openai",
            Self::DeepSeek => "deepseek",
            Self::OpenAICompatible => "openai-compatible",
            Self::Mock => "mock",
        }
    }
}

impl FromStr for Dialect {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "gemini" | "google" => Ok(Self::Gemini),
            "openai" => Ok(Self::OpenAI),
            "deepseek" => Ok(Self::DeepSeek),
            "universal" | "openai-compatible" | "local" | "vllm" => Ok(Self::OpenAICompatible),
            "mock" => Ok(Self::Mock),
            _ => Err(()),
        }
    }
}

/// Endpoints and credentials for every provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    /// Google API key for Gemini.
    pub google_api_key: Option<String>,
    /// OpenAI API key.
    pub openai_api_key: Option<String>,
    /// DeepSeek API key.
    pub deepseek_api_key: Option<String>,
    /// Optional key for self-hosted OpenAI-compatible servers.
    pub compatible_api_key: Option<String>,
    /// Gemini endpoint.
    pub gemini_base_url: String,
    /// OpenAI endpoint.
    pub openai_base_url: String,
    /// DeepSeek endpoint.
    pub deepseek_base_url: String,
    /// Self-hosted endpoint (e.g. a vLLM server). Falls back to OpenAI when unset.
    pub compatible_base_url: Option<String>,
    /// Transport timeout for every model call, in seconds.
    pub timeout_secs: u64,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            google_api_key: None,
            openai_api_key: None,
            deepseek_api_key: None,
            compatible_api_key: None,
            gemini_base_url: crate::gemini::GEMINI_BASE_URL.to_string(),
            openai_base_url: "https://api.openai.com/v1".to_string(),
            deepseek_base_url: "https://api.deepseek.com/v1".to_string(),
            compatible_base_url: None,
            timeout_secs: 120,
        }
    }
}

/// Concrete client configuration for one model identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterConfig {
    /// API dialect.
    pub dialect: Dialect,
    /// Identifier sent to the backend.
    pub model_id: String,
    /// Base URL of the backend.
    pub endpoint: String,
    /// Credential, if one is configured.
    pub api_key: Option<String>,
    /// Transport timeout.
    pub timeout: Duration,
}

impl AdapterConfig {
    /// Constructs the client described by this configuration.
    ///
    /// # Errors
    /// Returns `ModelError::UnsupportedModelProvider` when a vendor that
    /// requires a credential has none configured.
    pub fn build(&self) -> Result<Arc<dyn Model>, ModelError> {
        debug!(
            dialect = ?self.dialect,
            model_id = %self.model_id,
            endpoint = %self.endpoint,
            "Creating model instance"
        );

        match self.dialect {
            Dialect::Mock => Ok(Arc::new(MockModel::new(self.model_id.clone()))),
            Dialect::Gemini => {
                let api_key = self.require_key("GOOGLE_API_KEY")?;
                Ok(Arc::new(
                    GeminiModel::with_api_key(self.model_id.clone(), api_key)
                        .with_base_url(self.endpoint.clone()),
                ))
            }
            Dialect::OpenAI | Dialect::DeepSeek => {
                let env_name =
                    if self.dialect == Dialect::OpenAI { "OPENAI_API_KEY" } else { "DEEPSEEK_API_KEY" };
                let api_key = self.require_key(env_name)?;
                Ok(Arc::new(self.openai_client(Some(api_key))))
            }
            Dialect::OpenAICompatible => Ok(Arc::new(self.openai_client(self.api_key.clone()))),
        }
    }

    fn openai_client(&self, api_key: Option<String>) -> OpenAIModel {
        OpenAIModel::new(self.model_id.clone(), self.endpoint.clone(), api_key)
            .with_provider(self.dialect.provider())
            .with_timeout(self.timeout)
    }

    fn require_key(&self, env_name: &str) -> Result<String, ModelError> {
        self.api_key.clone().filter(|k| !k.trim().is_empty()).ok_or_else(|| {
            ModelError::UnsupportedModelProvider(format!(
                "{} is not configured for model '{}'",
                env_name, self.model_id
            ))
        })
    }
}

/// Resolves a model identifier to its adapter configuration.
///
/// Unmatched identifiers fall back to the OpenAI-compatible adapter so
/// self-hosted endpoints work without registration.
///
/// # Errors
/// Returns `ResolveError::UnknownModel` for a blank identifier.
pub fn resolve(model_id: &str, settings: &ProviderSettings) -> Result<AdapterConfig, ResolveError> {
    let model_id = model_id.trim();
    if model_id.is_empty() {
        return Err(ResolveError::UnknownModel(model_id.to_string()));
    }

    let dialect = Dialect::classify(model_id).unwrap_or(Dialect::OpenAICompatible);
    let (endpoint, api_key) = match dialect {
        Dialect::Mock => (String::new(), None),
        Dialect::Gemini => (settings.gemini_base_url.clone(), settings.google_api_key.clone()),
        Dialect::OpenAI => (settings.openai_base_url.clone(), settings.openai_api_key.clone()),
        Dialect::DeepSeek => (settings.deepseek_base_url.clone(), settings.deepseek_api_key.clone()),
        Dialect::OpenAICompatible => match &settings.compatible_base_url {
            Some(url) => (url.clone(), settings.compatible_api_key.clone()),
            None => (
                settings.openai_base_url.clone(),
                settings.compatible_api_key.clone().or_else(|| settings.openai_api_key.clone()),
            ),
        },
    };

    debug!(model_id = %model_id, dialect = ?dialect, "Resolved model adapter");

    Ok(AdapterConfig {
        dialect,
        model_id: model_id.to_string(),
        endpoint,
        api_key,
        timeout: Duration::from_secs(settings.timeout_secs),
    })
}

/// Maps a short alias (e.g. "gemini") to its canonical backend identifier.
///
/// # Errors
/// Returns `ResolveError::UnknownAlias` when the alias is not in [`MODEL_ALIASES`].
pub fn resolve_alias(alias: &str) -> Result<&'static str, ResolveError> {
    let key = alias.trim().to_lowercase();
    MODEL_ALIASES
        .iter()
        .find(|(name, _)| *name == key)
        .map(|(_, canonical)| *canonical)
        .ok_or_else(|| ResolveError::UnknownAlias(alias.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings_with_keys() -> ProviderSettings {
        ProviderSettings {
            google_api_key: Some("g".to_string()),
            openai_api_key: Some("o".to_string()),
            deepseek_api_key: Some("d".to_string()),
            ..ProviderSettings::default()
        }
    }

    #[test]
    fn test_classify_vendor_tokens() {
        assert_eq!(Dialect::classify("gemini-2.5-flash"), Some(Dialect::Gemini));
        assert_eq!(Dialect::classify("models/Gemini-Pro"), Some(Dialect::Gemini));
        assert_eq!(Dialect::classify("deepseek-chat"), Some(Dialect::DeepSeek));
        assert_eq!(Dialect::classify("gpt-4o-mini"), Some(Dialect::OpenAI));
        assert_eq!(Dialect::classify("mock-a"), Some(Dialect::Mock));
        assert_eq!(Dialect::classify("Qwen/Qwen2.5-7B-Chat"), None);
    }

    #[test]
    fn test_dialect_from_str() {
        assert_eq!(Dialect::from_str("Gemini"), Ok(Dialect::Gemini));
        assert_eq!(Dialect::from_str("vllm"), Ok(Dialect::OpenAICompatible));
        assert_eq!(Dialect::from_str("MOCK"), Ok(Dialect::Mock));
        assert_eq!(Dialect::from_str("unknown"), Err(()));
    }

    #[test]
    fn test_resolve_routes_to_vendor_endpoints() {
        let settings = settings_with_keys();

        let gemini = resolve("gemini-2.5-flash", &settings).unwrap();
        assert_eq!(gemini.dialect, Dialect::Gemini);
        assert_eq!(gemini.api_key.as_deref(), Some("g"));

        let deepseek = resolve("deepseek-chat", &settings).unwrap();
        assert_eq!(deepseek.endpoint, "https://api.deepseek.com/v1");
        assert_eq!(deepseek.api_key.as_deref(), Some("d"));
    }

    #[test]
    fn test_unknown_identifier_falls_back_to_compatible_adapter() {
        let config = resolve("unknown-model", &ProviderSettings::default()).unwrap();
        assert_eq!(config.dialect, Dialect::OpenAICompatible);
        assert_eq!(config.endpoint, "https://api.openai.com/v1");

        let settings = ProviderSettings {
            compatible_base_url: Some("http://localhost:8000/v1".to_string()),
            ..ProviderSettings::default()
        };
        let config = resolve("Qwen/Qwen2.5-7B-Chat", &settings).unwrap();
        assert_eq!(config.endpoint, "http://localhost:8000/v1");
        assert!(config.build().is_ok());
    }

    #[test]
    fn test_blank_identifier_is_unknown_model() {
        assert_eq!(
            resolve("   ", &ProviderSettings::default()),
            Err(ResolveError::UnknownModel(String::new()))
        );
    }

    #[test]
    fn test_build_requires_vendor_key() {
        let config = resolve("gemini-2.5-flash", &ProviderSettings::default()).unwrap();
        let err = config.build().err().unwrap();
        match err {
            ModelError::UnsupportedModelProvider(msg) => assert!(msg.contains("GOOGLE_API_KEY")),
            other => panic!("unexpected error: {other:?}"),
        }

        let config = resolve("gemini-2.5-flash", &settings_with_keys()).unwrap();
        assert_eq!(config.build().unwrap().model_id(), "gemini-2.5-flash");
    }

    #[test]
    fn test_build_mock() {
        let config = resolve("mock-b", &ProviderSettings::default()).unwrap();
        assert_eq!(config.build().unwrap().model_id(), "mock-b");
    }

    #[test]
    fn test_resolve_alias() {
        assert_eq!(resolve_alias("gemini"), Ok("gemini-2.5-flash"));
        assert_eq!(resolve_alias("DeepSeek"), Ok("deepseek-chat"));
        assert_eq!(resolve_alias("qwen"), Ok("Qwen/Qwen2.5-7B-Chat"));
        assert_eq!(resolve_alias("claude"), Err(ResolveError::UnknownAlias("claude".to_string())));
    }

    #[test]
    fn test_alias_miss_is_not_unknown_model() {
        let err = resolve_alias("unknown-model").unwrap_err();
        assert!(matches!(err, ResolveError::UnknownAlias(_)));
        assert!(resolve("unknown-model", &ProviderSettings::default()).is_ok());
    }
}
