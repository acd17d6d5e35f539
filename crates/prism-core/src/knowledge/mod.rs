//! Local knowledge base: embeddings, vector index, chunking and ingestion.
//!
//! Two collections live in the index: [`KNOWLEDGE_COLLECTION`] holds chunks
//! of ingested documents and is read by the retrieval stage;
//! [`REPORTS_COLLECTION`] holds one topic embedding per saved report and
//! backs similarity search.

pub mod chunker;
pub mod embedder;
pub mod index;
pub mod ingest;
pub mod retriever;

use thiserror::Error;

pub use chunker::TextChunker;
pub use embedder::{EMBEDDING_DIM, Embedder, HashingEmbedder, OpenAIEmbedder};
#[cfg(feature = "onnx-embeddings")]
pub use embedder::OnnxEmbedder;
pub use index::{ScoredDocument, SqliteVectorIndex, VectorIndex, VectorRecord};
pub use ingest::{IngestSummary, ingest_directory};
pub use retriever::KnowledgeRetriever;

/// Collection of ingested document chunks.
pub const KNOWLEDGE_COLLECTION: &str = "local_knowledge_base";

/// Collection of saved report topics.
pub const REPORTS_COLLECTION: &str = "reports_collection";

/// Errors raised by embedders and the vector index.
#[derive(Debug, Error)]
pub enum KnowledgeError {
    /// The embedding backend failed.
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// The index database failed.
    #[error("Vector index error: {0}")]
    Index(#[from] rusqlite::Error),

    /// Stored metadata or vectors could not be (de)serialized.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Inputs are inconsistent (length or dimension mismatch).
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// A local embedding model file is missing.
    #[error("Embedding model file not found: {0}")]
    ModelNotFound(std::path::PathBuf),

    /// A local embedding model could not be initialized.
    #[error("Embedding model initialization failed: {0}")]
    ModelInit(String),

    /// Reading source documents failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The index lock was poisoned by a panicking writer.
    #[error("Vector index lock poisoned")]
    LockPoisoned,

    /// A blocking index or inference task did not complete.
    #[error("Blocking task failed: {0}")]
    Join(String),
}
