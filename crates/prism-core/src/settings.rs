//! Configuration file support.
//!
//! Settings are read from `~/.prism/config.toml` and then `./prism.toml`,
//! with the local file overriding the global one. Provider credentials that
//! neither file sets are taken from the environment.

use prism_models::ProviderSettings;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Models queried when the caller does not choose any.
pub const DEFAULT_MODELS: &[&str] = &["gemini-2.5-flash", "deepseek-chat"];

/// Prism configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// Default model selection for report generation.
    #[serde(default)]
    pub models: Vec<String>,

    /// Directory holding the report database, vector index and report files.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,

    /// Log level
    #[serde(default)]
    pub log_level: Option<String>,

    /// Whole-pipeline retries per model after a failure.
    #[serde(default)]
    pub retries: Option<u32>,

    /// Provider endpoints and credentials
    #[serde(default)]
    pub providers: ProviderOverrides,

    /// Embedding backend
    #[serde(default)]
    pub embedding: EmbeddingSettings,
}

/// Optional provider settings as written in a configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderOverrides {
    #[serde(default)]
    pub google_api_key: Option<String>,
    #[serde(default)]
    pub openai_api_key: Option<String>,
    #[serde(default)]
    pub deepseek_api_key: Option<String>,
    #[serde(default)]
    pub compatible_api_key: Option<String>,
    #[serde(default)]
    pub gemini_base_url: Option<String>,
    #[serde(default)]
    pub openai_base_url: Option<String>,
    #[serde(default)]
    pub deepseek_base_url: Option<String>,
    #[serde(default)]
    pub compatible_base_url: Option<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

/// Embedding backend selection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmbeddingSettings {
    /// `hashing` (default, offline), `onnx` (local all-MiniLM-L6-v2, needs the
    /// `onnx-embeddings` feature) or `openai`.
    #[serde(default)]
    pub provider: Option<String>,

    /// Remote embedding model name.
    #[serde(default)]
    pub model: Option<String>,

    /// Directory holding `model.onnx` and `tokenizer.json` for the `onnx` provider.
    #[serde(default)]
    pub model_dir: Option<PathBuf>,
}

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// Configuration file not found.
    #[error("Configuration file not found: {0}")]
    NotFound(String),

    /// Failed to read configuration file.
    #[error("Failed to read configuration file: {0}")]
    ReadError(String),

    /// Failed to parse configuration file.
    #[error("Failed to parse configuration file: {0}")]
    ParseError(String),
}

/// Result type for configuration operations.
pub type SettingsResult<T> = std::result::Result<T, SettingsError>;

impl Settings {
    /// Load configuration from a TOML file.
    pub fn load_from_file(path: &Path) -> SettingsResult<Self> {
        if !path.exists() {
            return Err(SettingsError::NotFound(path.display().to_string()));
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| SettingsError::ReadError(format!("{}: {}", path.display(), e)))?;

        toml::from_str(&content)
            .map_err(|e| SettingsError::ParseError(format!("{}: {}", path.display(), e)))
    }

    /// Get default global configuration file path.
    pub fn default_global_path() -> PathBuf {
        home_dir().join(".prism").join("config.toml")
    }

    /// Get default local configuration file path.
    pub fn default_local_path() -> PathBuf {
        PathBuf::from("prism.toml")
    }

    /// Discover and load configuration files.
    ///
    /// A missing file is skipped; a file that exists but does not parse is
    /// an error.
    pub fn discover_and_load() -> SettingsResult<Self> {
        let mut settings = Self::default();

        for path in [Self::default_global_path(), Self::default_local_path()] {
            match Self::load_from_file(&path) {
                Ok(file_settings) => settings.merge(&file_settings),
                Err(SettingsError::NotFound(_)) => {}
                Err(e) => return Err(e),
            }
        }

        Ok(settings)
    }

    /// Merge another configuration into this one.
    ///
    /// Values from `other` override values in `self` if they are set.
    pub fn merge(&mut self, other: &Self) {
        if !other.models.is_empty() {
            self.models.clone_from(&other.models);
        }
        if other.data_dir.is_some() {
            self.data_dir.clone_from(&other.data_dir);
        }
        if other.log_level.is_some() {
            self.log_level.clone_from(&other.log_level);
        }
        if other.retries.is_some() {
            self.retries = other.retries;
        }
        self.providers.merge(&other.providers);
        if other.embedding.provider.is_some() {
            self.embedding.provider.clone_from(&other.embedding.provider);
        }
        if other.embedding.model.is_some() {
            self.embedding.model.clone_from(&other.embedding.model);
        }
        if other.embedding.model_dir.is_some() {
            self.embedding.model_dir.clone_from(&other.embedding.model_dir);
        }
    }

    /// Model selection to use when the caller gives none.
    pub fn model_selection(&self) -> Vec<String> {
        if self.models.is_empty() {
            DEFAULT_MODELS.iter().map(|m| (*m).to_string()).collect()
        } else {
            self.models.clone()
        }
    }

    /// Data directory, defaulting to `./prism_data`.
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(|| PathBuf::from("prism_data"))
    }

    /// Provider settings with process environment fallbacks applied.
    pub fn provider_settings(&self) -> ProviderSettings {
        self.provider_settings_with(|name| std::env::var(name).ok())
    }

    /// Provider settings, reading fallbacks through `env`.
    pub fn provider_settings_with<F>(&self, env: F) -> ProviderSettings
    where
        F: Fn(&str) -> Option<String>,
    {
        let p = &self.providers;
        let env_any = |names: &[&str]| {
            names.iter().find_map(|n| env(n).filter(|v| !v.trim().is_empty()))
        };
        let defaults = ProviderSettings::default();

        ProviderSettings {
            google_api_key: p
                .google_api_key
                .clone()
                .or_else(|| env_any(&["GOOGLE_API_KEY", "GEMINI_API_KEY"])),
            openai_api_key: p.openai_api_key.clone().or_else(|| env_any(&["OPENAI_API_KEY"])),
            deepseek_api_key: p
                .deepseek_api_key
                .clone()
                .or_else(|| env_any(&["DEEPSEEK_API_KEY"])),
            compatible_api_key: p
                .compatible_api_key
                .clone()
                .or_else(|| env_any(&["OPENAI_COMPATIBLE_API_KEY"])),
            gemini_base_url: p.gemini_base_url.clone().unwrap_or(defaults.gemini_base_url),
            openai_base_url: p.openai_base_url.clone().unwrap_or(defaults.openai_base_url),
            deepseek_base_url: p.deepseek_base_url.clone().unwrap_or(defaults.deepseek_base_url),
            compatible_base_url: p
                .compatible_base_url
                .clone()
                .or_else(|| env_any(&["VLLM_QWEN_URL"])),
            timeout_secs: p.timeout_secs.unwrap_or(defaults.timeout_secs),
        }
    }
}

impl ProviderOverrides {
    fn merge(&mut self, other: &Self) {
        macro_rules! take {
            ($($field:ident),*) => {
                $(if other.$field.is_some() {
                    self.$field.clone_from(&other.$field);
                })*
            };
        }
        take!(
            google_api_key,
            openai_api_key,
            deepseek_api_key,
            compatible_api_key,
            gemini_base_url,
            openai_base_url,
            deepseek_base_url,
            compatible_base_url,
            timeout_secs
        );
    }
}

fn home_dir() -> PathBuf {
    std::env::var("HOME").map(PathBuf::from).unwrap_or_else(|_| PathBuf::from("."))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_load_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("prism.toml");
        std::fs::write(
            &path,
            r#"
models = ["mock-a", "mock-b"]
retries = 2

[providers]
deepseek_api_key = "file-key"
compatible_base_url = "http://localhost:8000/v1"

[embedding]
provider = "onnx"
model_dir = "/opt/models/all-MiniLM-L6-v2"
"#,
        )
        .unwrap();

        let settings = Settings::load_from_file(&path).unwrap();
        assert_eq!(settings.model_selection(), vec!["mock-a", "mock-b"]);
        assert_eq!(settings.retries, Some(2));
        assert_eq!(settings.providers.deepseek_api_key.as_deref(), Some("file-key"));
        assert_eq!(settings.embedding.provider.as_deref(), Some("onnx"));
        assert_eq!(
            settings.embedding.model_dir.as_deref(),
            Some(Path::new("/opt/models/all-MiniLM-L6-v2"))
        );
    }

    #[test]
    fn test_load_missing_and_invalid() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("nope.toml");
        assert!(matches!(Settings::load_from_file(&missing), Err(SettingsError::NotFound(_))));

        let bad = temp_dir.path().join("bad.toml");
        std::fs::write(&bad, "models = [").unwrap();
        assert!(matches!(Settings::load_from_file(&bad), Err(SettingsError::ParseError(_))));
    }

    #[test]
    fn test_merge_local_overrides_global() {
        let mut global = Settings {
            models: vec!["gemini-2.5-flash".to_string()],
            log_level: Some("info".to_string()),
            ..Settings::default()
        };
        global.providers.openai_api_key = Some("global".to_string());

        let mut local = Settings { log_level: Some("debug".to_string()), ..Settings::default() };
        local.providers.openai_api_key = Some("local".to_string());

        global.merge(&local);
        assert_eq!(global.models, vec!["gemini-2.5-flash"]);
        assert_eq!(global.log_level.as_deref(), Some("debug"));
        assert_eq!(global.providers.openai_api_key.as_deref(), Some("local"));
    }

    #[test]
    fn test_default_model_selection() {
        assert_eq!(Settings::default().model_selection(), vec!["gemini-2.5-flash", "deepseek-chat"]);
    }

    #[test]
    fn test_provider_settings_env_fallback() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("GEMINI_API_KEY", "gem"),
            ("DEEPSEEK_API_KEY", "env-ds"),
            ("VLLM_QWEN_URL", "http://gpu-box:8000/v1"),
        ]);
        let mut settings = Settings::default();
        settings.providers.deepseek_api_key = Some("file-ds".to_string());

        let providers = settings.provider_settings_with(|n| env.get(n).map(|v| (*v).to_string()));
        assert_eq!(providers.google_api_key.as_deref(), Some("gem"));
        assert_eq!(providers.deepseek_api_key.as_deref(), Some("file-ds"));
        assert_eq!(providers.compatible_base_url.as_deref(), Some("http://gpu-box:8000/v1"));
        assert_eq!(providers.openai_api_key, None);
        assert_eq!(providers.deepseek_base_url, "https://api.deepseek.com/v1");
    }
}
