//! Report generation entry point: fan-out plus rendering.

use crate::pipeline::{FanOutCoordinator, PipelineOutcome};
use crate::render::render_outcome;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

/// A request to generate one report per model.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportRequest {
    pub topic: String,
    /// Ordered model identifiers; defines output order.
    pub models: Vec<String>,
    /// Formatting instructions; blank means none.
    #[serde(default)]
    pub template_content: Option<String>,
}

/// One model's rendered result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderedReport {
    pub model_id: String,
    pub markdown: String,
    pub outcome: PipelineOutcome,
}

impl RenderedReport {
    fn from_outcome(outcome: PipelineOutcome) -> Self {
        Self {
            model_id: outcome.model_id().to_string(),
            markdown: render_outcome(&outcome),
            outcome,
        }
    }
}

/// Generates and renders reports for a set of models.
pub struct ReportService {
    coordinator: FanOutCoordinator,
}

impl ReportService {
    pub fn new(coordinator: FanOutCoordinator) -> Self {
        Self { coordinator }
    }

    /// Runs every requested model and renders each outcome.
    ///
    /// Always returns one entry per requested model, in request order.
    pub async fn generate(&self, request: &ReportRequest, cancel: &CancellationToken) -> Vec<RenderedReport> {
        self.coordinator
            .run_all(&request.topic, &request.models, request.template_content.as_deref(), cancel)
            .await
            .into_iter()
            .map(RenderedReport::from_outcome)
            .collect()
    }
}
