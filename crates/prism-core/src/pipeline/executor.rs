//! Drives one (topic, model) run through its stages.

use crate::error::{PipelineError, StageError};
use crate::knowledge::KnowledgeRetriever;
use crate::pipeline::stages;
use crate::pipeline::state::{Phase, RunState, Stage};
use crate::report::StructuredReport;
use prism_abstraction::Model;
use std::sync::Arc;
use tracing::{debug, warn};

/// Runs the stage sequence for a single model.
pub struct PipelineExecutor {
    model: Arc<dyn Model>,
    retriever: Option<Arc<KnowledgeRetriever>>,
}

impl PipelineExecutor {
    pub fn new(model: Arc<dyn Model>, retriever: Option<Arc<KnowledgeRetriever>>) -> Self {
        Self { model, retriever }
    }

    /// Runs the pipeline and returns the report or the failing stage's error.
    pub async fn run(
        &self,
        topic: &str,
        template_content: Option<&str>,
    ) -> Result<StructuredReport, PipelineError> {
        let state =
            RunState::new(topic, self.model.model_id(), template_content.map(str::to_string));
        let (phase, state) = self.drive(state).await;

        match phase {
            Phase::Failed { stage, error } => Err(PipelineError::Stage { stage, source: error }),
            _ => state.into_final_report().ok_or(PipelineError::Stage {
                stage: Stage::Generating,
                source: StageError::MissingInput("final_report"),
            }),
        }
    }

    /// Steps the state machine until it reaches a terminal phase.
    pub async fn drive(&self, mut state: RunState) -> (Phase, RunState) {
        let mut phase = Phase::Start;
        while !phase.is_terminal() {
            phase = self.step(phase, &mut state).await;
        }
        (phase, state)
    }

    async fn step(&self, phase: Phase, state: &mut RunState) -> Phase {
        let Some(stage) = phase.stage() else {
            return phase.successor();
        };
        debug!(model_id = %state.model_id(), stage = %stage, "Entering stage");

        let update = match stage {
            Stage::Expanding => stages::expand_queries(state, self.model.as_ref()).await,
            Stage::Retrieving => {
                Ok(stages::retrieve_context(state, self.retriever.as_deref()).await)
            }
            Stage::Generating => stages::generate_report(state, self.model.as_ref()).await,
        };

        match update.and_then(|u| state.apply(u)) {
            Ok(()) => phase.successor(),
            Err(error) => {
                warn!(model_id = %state.model_id(), stage = %stage, error = %error, "Stage failed");
                Phase::Failed { stage, error }
            }
        }
    }
}
