//! Model implementations for Prism.
//!
//! This crate provides concrete implementations of the `Model` trait and the
//! resolver that picks one for a model identifier.
//!
//! # Supported Providers
//!
//! - **Gemini**: Google's Gemini models (API key required)
//! - **OpenAI**: OpenAI's GPT models (API key required)
//! - **DeepSeek**: OpenAI dialect at `api.deepseek.com` (API key required)
//! - **OpenAI-compatible**: self-hosted servers such as vLLM (key optional)
//! - **Mock**: offline runs and tests

pub mod gemini;
pub mod mock;
pub mod openai;
pub mod resolver;
mod sse;

pub use gemini::GeminiModel;
pub use mock::MockModel;
pub use openai::OpenAIModel;
pub use resolver::{
    AdapterConfig, Dialect, MODEL_ALIASES, ProviderSettings, ResolveError, resolve, resolve_alias,
};
