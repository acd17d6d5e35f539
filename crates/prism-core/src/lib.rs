//! Prism Core - Multi-model report generation.
//!
//! This crate provides the core functionality for Prism, including:
//! - The per-model generation pipeline and its concurrent fan-out
//! - Markdown rendering of structured reports
//! - A local knowledge base used as retrieval context
//! - The saved-report archive with similarity search
//! - Configuration management and error handling
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use prism_core::{AdapterProvider, FanOutCoordinator, ReportRequest, ReportService, Settings};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> prism_core::Result<()> {
//!     let settings = Settings::discover_and_load()?;
//!     let provider = Arc::new(AdapterProvider::new(settings.provider_settings()));
//!     let service = ReportService::new(FanOutCoordinator::new(provider));
//!     let request = ReportRequest {
//!         topic: "Electric Vehicle Market".to_string(),
//!         models: settings.model_selection(),
//!         template_content: None,
//!     };
//!     for report in service.generate(&request, &CancellationToken::new()).await {
//!         println!("{}", report.markdown);
//!     }
//!     Ok(())
//! }
//! ```

pub mod archive;
pub mod chat;
pub mod error;
pub mod knowledge;
pub mod pipeline;
pub mod prompts;
pub mod provider;
pub mod render;
pub mod report;
pub mod service;
pub mod settings;
pub mod storage;
pub mod template;

pub use archive::ReportArchive;
pub use chat::{ChatReply, ChatService, ChatStream};
pub use error::{PipelineError, PrismError, Result, StageError};
pub use knowledge::{
    Embedder, HashingEmbedder, IngestSummary, KnowledgeError, KnowledgeRetriever, OpenAIEmbedder,
    SqliteVectorIndex, TextChunker, VectorIndex, ingest_directory,
};
#[cfg(feature = "onnx-embeddings")]
pub use knowledge::OnnxEmbedder;
pub use pipeline::{FanOutCoordinator, PipelineExecutor, PipelineOutcome, RetryPolicy, Stage};
pub use provider::{AdapterProvider, ModelProvider};
pub use render::{render, render_failure, render_outcome};
pub use report::{Section, StructuredReport};
pub use service::{RenderedReport, ReportRequest, ReportService};
pub use settings::{Settings, SettingsError};
pub use storage::{Database, ReportFileStore, ReportRecord, StorageError};
pub use template::load_template;
