//! The three pipeline stages.
//!
//! Each stage reads an immutable [`RunState`] snapshot plus the dependencies
//! it is handed and returns a [`StateUpdate`]; none of them touches shared
//! state.

use crate::error::StageError;
use crate::knowledge::KnowledgeRetriever;
use crate::pipeline::state::{RunState, StateUpdate};
use crate::prompts;
use crate::report::{REPORT_SCHEMA_NAME, StructuredReport, report_schema};
use prism_abstraction::{ChatMessage, Model, ModelParameters, ResponseFormat};
use tracing::{debug, info, warn};

/// Sampling temperature for query expansion.
pub const EXPANSION_TEMPERATURE: f32 = 0.3;
/// Sampling temperature for report generation.
pub const GENERATION_TEMPERATURE: f32 = 0.5;
/// Chunks kept from the knowledge base.
pub const RETRIEVAL_TOP_K: usize = 5;
/// Context used when retrieval yields nothing.
pub const NO_CONTEXT: &str = "No relevant context available.";
/// Separator between retrieved chunks.
pub const CONTEXT_SEPARATOR: &str = "\n\n---\n\n";

/// Expands the topic into search queries, one per non-empty answer line.
///
/// # Errors
/// Fails with `StageError::Generation` if the call fails or no query remains.
pub async fn expand_queries(state: &RunState, model: &dyn Model) -> Result<StateUpdate, StageError> {
    let prompt = prompts::topic_expansion(state.topic());
    let response = model
        .generate_text(&prompt, Some(ModelParameters::with_temperature(EXPANSION_TEMPERATURE)))
        .await
        .map_err(|e| StageError::Generation(format!("query expansion failed: {e}")))?;

    let queries: Vec<String> = response
        .content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect();

    if queries.is_empty() {
        return Err(StageError::Generation("query expansion returned no queries".to_string()));
    }

    debug!(model_id = %state.model_id(), queries = ?queries, "Expanded topic");
    Ok(StateUpdate::ExpandedQueries(queries))
}

/// Retrieves knowledge-base context for the expanded queries.
///
/// Never fails: a missing retriever, an empty result or any retrieval error
/// yields [`NO_CONTEXT`].
pub async fn retrieve_context(
    state: &RunState,
    retriever: Option<&KnowledgeRetriever>,
) -> StateUpdate {
    let Some(retriever) = retriever else {
        debug!(model_id = %state.model_id(), "No knowledge base configured, skipping retrieval");
        return StateUpdate::RetrievedContext(NO_CONTEXT.to_string());
    };
    let queries = state.expanded_queries().unwrap_or_default();

    let context = match retriever.search(queries, RETRIEVAL_TOP_K).await {
        Ok(hits) => {
            let documents: Vec<&str> = hits.iter().map(|h| h.document.as_str()).collect();
            documents.join(CONTEXT_SEPARATOR)
        }
        Err(e) => {
            warn!(model_id = %state.model_id(), error = %e, "Retrieval unavailable, continuing without context");
            String::new()
        }
    };

    if context.trim().is_empty() {
        StateUpdate::RetrievedContext(NO_CONTEXT.to_string())
    } else {
        info!(model_id = %state.model_id(), chars = context.chars().count(), "Retrieved context");
        StateUpdate::RetrievedContext(context)
    }
}

/// Builds the generation messages: template-guided when a template is set,
/// context-guided otherwise.
pub fn generation_messages(state: &RunState) -> Vec<ChatMessage> {
    let context = state.retrieved_context().unwrap_or(NO_CONTEXT);
    let user = match state.template_content() {
        Some(template) => prompts::template_report(state.topic(), template, context),
        None => prompts::context_report(state.topic(), context),
    };
    vec![ChatMessage::system(prompts::SYSTEM_INSTRUCTION), ChatMessage::user(user)]
}

/// Generates the structured report.
///
/// # Errors
/// Fails with `StageError::Generation` if the call fails or the answer is not
/// a valid report. There is no internal retry.
pub async fn generate_report(state: &RunState, model: &dyn Model) -> Result<StateUpdate, StageError> {
    if state.retrieved_context().is_none() {
        return Err(StageError::MissingInput("retrieved_context"));
    }

    let params = ModelParameters::with_temperature(GENERATION_TEMPERATURE).with_response_format(
        ResponseFormat::JsonSchema { name: REPORT_SCHEMA_NAME.to_string(), schema: report_schema() },
    );
    let response = model
        .generate_chat_completion(&generation_messages(state), Some(params))
        .await
        .map_err(|e| StageError::Generation(format!("report generation failed: {e}")))?;

    let report = StructuredReport::parse(&response.content)
        .map_err(|e| StageError::Generation(format!("model returned an invalid report: {e}")))?;

    info!(model_id = %state.model_id(), title = %report.title, "Report generated");
    Ok(StateUpdate::FinalReport(report))
}
