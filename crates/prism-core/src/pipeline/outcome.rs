use crate::error::PipelineError;
use crate::pipeline::Stage;
use crate::report::StructuredReport;
use serde::{Deserialize, Serialize};

/// Terminal result of one model's run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PipelineOutcome {
    Success {
        model_id: String,
        report: StructuredReport,
    },
    Failure {
        model_id: String,
        /// Stage that failed; `None` when the run never reached a stage
        /// (resolution, cancellation, panic).
        stage: Option<Stage>,
        error: String,
    },
}

impl PipelineOutcome {
    /// Builds a failure outcome from a run error.
    pub fn failure(model_id: impl Into<String>, error: &PipelineError) -> Self {
        let stage = match error {
            PipelineError::Stage { stage, .. } => Some(*stage),
            _ => None,
        };
        Self::Failure { model_id: model_id.into(), stage, error: error.to_string() }
    }

    pub fn model_id(&self) -> &str {
        match self {
            Self::Success { model_id, .. } | Self::Failure { model_id, .. } => model_id,
        }
    }

    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub const fn report(&self) -> Option<&StructuredReport> {
        match self {
            Self::Success { report, .. } => Some(report),
            Self::Failure { .. } => None,
        }
    }
}
