//! Knowledge-base ingestion from a directory of text documents.

use super::{Embedder, KNOWLEDGE_COLLECTION, KnowledgeError, TextChunker, VectorIndex, VectorRecord};
use serde_json::json;
use std::path::Path;
use tracing::{info, warn};
use walkdir::WalkDir;

const INGEST_EXTENSIONS: &[&str] = &["md", "markdown", "txt"];
const EMBED_BATCH: usize = 64;

/// Result of one ingestion run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IngestSummary {
    /// Documents read.
    pub documents: usize,
    /// Chunks written to the index.
    pub chunks: usize,
}

/// Rebuilds the knowledge collection from every text document under `dir`.
///
/// When no document is found the existing collection is left untouched.
pub async fn ingest_directory(
    dir: &Path,
    chunker: &TextChunker,
    embedder: &dyn Embedder,
    index: &dyn VectorIndex,
) -> Result<IngestSummary, KnowledgeError> {
    if !dir.is_dir() {
        return Err(KnowledgeError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("knowledge base directory not found: {}", dir.display()),
        )));
    }

    let mut paths: Vec<_> = WalkDir::new(dir)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(walkdir::DirEntry::into_path)
        .filter(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| INGEST_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        })
        .collect();
    paths.sort();

    let mut documents = 0;
    let mut pieces: Vec<(String, String)> = Vec::new();
    for path in &paths {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Skipping unreadable document");
                continue;
            }
        };
        documents += 1;
        let source = path.display().to_string();
        pieces.extend(chunker.split(&text).into_iter().map(|chunk| (source.clone(), chunk)));
    }

    if pieces.is_empty() {
        warn!(dir = %dir.display(), "No documents found to ingest");
        return Ok(IngestSummary { documents, chunks: 0 });
    }

    let mut records = Vec::with_capacity(pieces.len());
    for batch in pieces.chunks(EMBED_BATCH) {
        let texts: Vec<String> = batch.iter().map(|(_, text)| text.clone()).collect();
        let embeddings = embedder.embed(&texts).await?;
        if embeddings.len() != texts.len() {
            return Err(KnowledgeError::InvalidData(format!(
                "embedded {} of {} chunks",
                embeddings.len(),
                texts.len()
            )));
        }
        for ((source, text), embedding) in batch.iter().zip(embeddings) {
            records.push(VectorRecord {
                id: format!("chunk_{}", records.len()),
                document: text.clone(),
                metadata: json!({ "source": source }),
                embedding,
            });
        }
    }

    index.clear(KNOWLEDGE_COLLECTION)?;
    index.add(KNOWLEDGE_COLLECTION, &records)?;

    info!(documents, chunks = records.len(), "Knowledge base ingested");
    Ok(IngestSummary { documents, chunks: records.len() })
}
