//! Error types for Prism Core.

use crate::knowledge::KnowledgeError;
use crate::pipeline::Stage;
use crate::settings::SettingsError;
use crate::storage::StorageError;
use prism_abstraction::ModelError;
use prism_models::ResolveError;
use thiserror::Error;

/// Failure of a single pipeline stage.
#[derive(Error, Debug)]
pub enum StageError {
    /// The model call failed or its output could not be used.
    #[error("Generation error: {0}")]
    Generation(String),

    /// A stage tried to write a run-state field that is already set.
    #[error("Run state field '{0}' has already been written")]
    AlreadyWritten(&'static str),

    /// A stage ran before its input was produced.
    #[error("Run state field '{0}' is missing")]
    MissingInput(&'static str),
}

/// Failure of one model's pipeline run.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// The model identifier could not be resolved.
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    /// The adapter for a resolved model could not be constructed.
    #[error("Failed to initialize model '{model_id}': {source}")]
    Adapter {
        /// Model identifier.
        model_id: String,
        /// Construction error.
        #[source]
        source: ModelError,
    },

    /// A stage failed.
    #[error("{stage} stage failed: {source}")]
    Stage {
        /// Stage that failed.
        stage: Stage,
        /// Stage error.
        #[source]
        source: StageError,
    },

    /// The run was cancelled before it finished.
    #[error("Run cancelled before completion")]
    Cancelled,

    /// The run's task panicked.
    #[error("Run panicked: {0}")]
    Panicked(String),
}

impl PipelineError {
    /// Whether re-running the whole pipeline could succeed.
    ///
    /// Resolution and construction errors are configuration problems and
    /// fail the same way every time.
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Stage { .. })
    }
}

/// Core error type for Prism operations.
#[derive(Error, Debug)]
pub enum PrismError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Settings(#[from] SettingsError),

    /// Storage-related errors
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Embedding or vector index errors
    #[error("Knowledge base error: {0}")]
    Knowledge(#[from] KnowledgeError),

    /// Alias or model resolution errors
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    /// Model-related errors
    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    /// A model client could not be obtained
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    /// Caller input was rejected before any work was done
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for Prism operations.
pub type Result<T> = std::result::Result<T, PrismError>;
