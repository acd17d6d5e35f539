//! CLI configuration loading and component wiring.

use anyhow::{Context, Result, bail};
use prism_core::knowledge::{KNOWLEDGE_COLLECTION, VectorIndex};
use prism_core::{
    AdapterProvider, Database, Embedder, FanOutCoordinator, HashingEmbedder, KnowledgeRetriever,
    OpenAIEmbedder, ReportArchive, ReportFileStore, RetryPolicy, Settings, SqliteVectorIndex,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Load configuration.
///
/// Configuration precedence:
/// 1. CLI arguments (handled by clap)
/// 2. An explicit `--config` file, which replaces discovery
/// 3. Local config file (./prism.toml)
/// 4. Global config file (~/.prism/config.toml)
/// 5. Environment variables for provider credentials
/// 6. Defaults
pub fn load_settings(path: Option<&Path>) -> Result<Settings> {
    let settings = match path {
        Some(path) => Settings::load_from_file(path)?,
        None => Settings::discover_and_load()?,
    };
    Ok(settings)
}

/// Model directory used by the `onnx` provider when none is configured.
const DEFAULT_ONNX_MODEL: &str = "all-MiniLM-L6-v2";

/// Embedder selected by `[embedding]`.
pub fn embedder(settings: &Settings) -> Result<Arc<dyn Embedder>> {
    match settings.embedding.provider.as_deref() {
        None | Some("hashing") => Ok(Arc::new(HashingEmbedder::new())),
        Some("openai") => {
            let providers = settings.provider_settings();
            let model = settings
                .embedding
                .model
                .clone()
                .unwrap_or_else(|| OpenAIEmbedder::DEFAULT_MODEL.to_string());
            Ok(Arc::new(OpenAIEmbedder::new(model, providers.openai_base_url, providers.openai_api_key)))
        }
        Some("onnx") => onnx_embedder(settings),
        Some(other) => bail!("Unknown embedding provider '{other}' (expected hashing, onnx or openai)"),
    }
}

fn onnx_model_dir(settings: &Settings) -> PathBuf {
    settings
        .embedding
        .model_dir
        .clone()
        .unwrap_or_else(|| settings.data_dir().join("models").join(DEFAULT_ONNX_MODEL))
}

#[cfg(feature = "onnx-embeddings")]
fn onnx_embedder(settings: &Settings) -> Result<Arc<dyn Embedder>> {
    let model_dir = onnx_model_dir(settings);
    let embedder = prism_core::OnnxEmbedder::load(&model_dir)
        .with_context(|| format!("Failed to load onnx embedding model from {}", model_dir.display()))?;
    Ok(Arc::new(embedder))
}

#[cfg(not(feature = "onnx-embeddings"))]
fn onnx_embedder(settings: &Settings) -> Result<Arc<dyn Embedder>> {
    bail!(
        "Embedding provider 'onnx' (model dir {}) needs prism built with the onnx-embeddings feature",
        onnx_model_dir(settings).display()
    )
}

fn ensure_data_dir(settings: &Settings) -> Result<PathBuf> {
    let dir = settings.data_dir();
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create data directory {}", dir.display()))?;
    Ok(dir)
}

/// Opens the vector index in the data directory.
pub fn vector_index(settings: &Settings) -> Result<Arc<SqliteVectorIndex>> {
    let path = ensure_data_dir(settings)?.join("vectors.db");
    let index = SqliteVectorIndex::open(&path)
        .with_context(|| format!("Failed to open vector index {}", path.display()))?;
    Ok(Arc::new(index))
}

/// Opens the report archive in the data directory.
pub fn archive(settings: &Settings) -> Result<ReportArchive> {
    let dir = ensure_data_dir(settings)?;
    let db_path = dir.join("reports.db");
    let db = Database::open(&db_path)
        .with_context(|| format!("Failed to open report database {}", db_path.display()))?;
    debug!(data_dir = %dir.display(), "Opened report archive");

    Ok(ReportArchive::new(
        db,
        ReportFileStore::new(dir.join("storage")),
        embedder(settings)?,
        vector_index(settings)?,
    ))
}

/// Builds the fan-out coordinator with retrieval over the knowledge base.
pub fn coordinator(settings: &Settings) -> Result<FanOutCoordinator> {
    let provider = Arc::new(AdapterProvider::new(settings.provider_settings()));
    let index = vector_index(settings)?;
    debug!(chunks = index.count(KNOWLEDGE_COLLECTION)?, "Knowledge base ready");

    let retriever = Arc::new(KnowledgeRetriever::new(embedder(settings)?, index));
    Ok(FanOutCoordinator::new(provider)
        .with_retriever(retriever)
        .with_retry_policy(RetryPolicy::with_retries(settings.retries.unwrap_or(0))))
}
