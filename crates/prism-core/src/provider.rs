//! Source of model handles for pipeline runs and chat.

use crate::error::PipelineError;
use prism_abstraction::Model;
use prism_models::{ProviderSettings, resolve};
use std::sync::Arc;

/// Hands out a model client for an identifier.
pub trait ModelProvider: Send + Sync {
    /// Returns a client for `model_id`.
    ///
    /// # Errors
    /// Fails when the identifier cannot be resolved or its client cannot be
    /// constructed (for example a missing credential).
    fn model_for(&self, model_id: &str) -> Result<Arc<dyn Model>, PipelineError>;
}

/// Provider backed by the adapter resolver.
#[derive(Debug, Clone, Default)]
pub struct AdapterProvider {
    settings: ProviderSettings,
}

impl AdapterProvider {
    pub fn new(settings: ProviderSettings) -> Self {
        Self { settings }
    }
}

impl ModelProvider for AdapterProvider {
    fn model_for(&self, model_id: &str) -> Result<Arc<dyn Model>, PipelineError> {
        let config = resolve(model_id, &self.settings)?;
        config
            .build()
            .map_err(|source| PipelineError::Adapter { model_id: model_id.to_string(), source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prism_models::ResolveError;

    #[test]
    fn builds_mock_and_reports_missing_keys() {
        let provider = AdapterProvider::default();
        assert_eq!(provider.model_for("mock-a").unwrap().model_id(), "mock-a");

        let err = provider.model_for("deepseek-chat").err().unwrap();
        assert!(matches!(err, PipelineError::Adapter { ref model_id, .. } if model_id == "deepseek-chat"));

        let err = provider.model_for("").err().unwrap();
        assert!(matches!(err, PipelineError::Resolve(ResolveError::UnknownModel(_))));
    }
}
