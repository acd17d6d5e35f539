//! Per-run state and the stage state machine.

use crate::error::StageError;
use crate::report::StructuredReport;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Expanding,
    Retrieving,
    Generating,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Expanding => "expanding",
            Self::Retrieving => "retrieving",
            Self::Generating => "generating",
        };
        f.write_str(name)
    }
}

/// Position of a run in its state machine.
///
/// `Start → Expanding → Retrieving → Generating → Done`; any stage may move
/// to `Failed`. `Done` and `Failed` are terminal.
#[derive(Debug)]
pub enum Phase {
    Start,
    Expanding,
    Retrieving,
    Generating,
    Done,
    Failed { stage: Stage, error: StageError },
}

impl Phase {
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed { .. })
    }

    /// The stage this phase executes, if any.
    pub const fn stage(&self) -> Option<Stage> {
        match self {
            Self::Expanding => Some(Stage::Expanding),
            Self::Retrieving => Some(Stage::Retrieving),
            Self::Generating => Some(Stage::Generating),
            _ => None,
        }
    }

    /// Phase entered after this one succeeds.
    pub fn successor(&self) -> Self {
        match self {
            Self::Start => Self::Expanding,
            Self::Expanding => Self::Retrieving,
            Self::Retrieving => Self::Generating,
            Self::Generating | Self::Done | Self::Failed { .. } => Self::Done,
        }
    }
}

/// The output of one stage, applied to [`RunState`] by the executor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateUpdate {
    ExpandedQueries(Vec<String>),
    RetrievedContext(String),
    FinalReport(StructuredReport),
}

/// State of one (topic, model) run.
///
/// Stage-owned fields start unset and are written exactly once through
/// [`RunState::apply`]; a second write is rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunState {
    topic: String,
    model_id: String,
    template_content: Option<String>,
    expanded_queries: Option<Vec<String>>,
    retrieved_context: Option<String>,
    final_report: Option<StructuredReport>,
}

impl RunState {
    /// Creates the initial state. A blank template counts as no template.
    pub fn new(
        topic: impl Into<String>,
        model_id: impl Into<String>,
        template_content: Option<String>,
    ) -> Self {
        Self {
            topic: topic.into(),
            model_id: model_id.into(),
            template_content: template_content.filter(|t| !t.trim().is_empty()),
            expanded_queries: None,
            retrieved_context: None,
            final_report: None,
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    pub fn template_content(&self) -> Option<&str> {
        self.template_content.as_deref()
    }

    pub fn expanded_queries(&self) -> Option<&[String]> {
        self.expanded_queries.as_deref()
    }

    pub fn retrieved_context(&self) -> Option<&str> {
        self.retrieved_context.as_deref()
    }

    pub fn final_report(&self) -> Option<&StructuredReport> {
        self.final_report.as_ref()
    }

    /// Takes the final report out of a finished run.
    pub fn into_final_report(self) -> Option<StructuredReport> {
        self.final_report
    }

    /// Writes a stage result into its field.
    ///
    /// # Errors
    /// Returns `StageError::AlreadyWritten` if the field is already set.
    pub fn apply(&mut self, update: StateUpdate) -> Result<(), StageError> {
        match update {
            StateUpdate::ExpandedQueries(queries) => {
                write_once(&mut self.expanded_queries, queries, "expanded_queries")
            }
            StateUpdate::RetrievedContext(context) => {
                write_once(&mut self.retrieved_context, context, "retrieved_context")
            }
            StateUpdate::FinalReport(report) => {
                write_once(&mut self.final_report, report, "final_report")
            }
        }
    }
}

fn write_once<T>(slot: &mut Option<T>, value: T, field: &'static str) -> Result<(), StageError> {
    if slot.is_some() {
        return Err(StageError::AlreadyWritten(field));
    }
    *slot = Some(value);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fields_are_write_once() {
        let mut state = RunState::new("EV", "mock-a", None);
        state.apply(StateUpdate::RetrievedContext("ctx".to_string())).unwrap();

        let err = state.apply(StateUpdate::RetrievedContext("other".to_string())).unwrap_err();
        assert!(matches!(err, StageError::AlreadyWritten("retrieved_context")));
        assert_eq!(state.retrieved_context(), Some("ctx"));
    }

    #[test]
    fn test_blank_template_is_no_template() {
        assert_eq!(RunState::new("t", "m", Some("  \n".to_string())).template_content(), None);
        assert_eq!(RunState::new("t", "m", Some("## A".to_string())).template_content(), Some("## A"));
    }

    #[test]
    fn test_phase_order() {
        let mut phase = Phase::Start;
        let mut seen = Vec::new();
        while !phase.is_terminal() {
            phase = phase.successor();
            if let Some(stage) = phase.stage() {
                seen.push(stage);
            }
        }
        assert_eq!(seen, vec![Stage::Expanding, Stage::Retrieving, Stage::Generating]);
        assert!(matches!(phase, Phase::Done));
    }
}
