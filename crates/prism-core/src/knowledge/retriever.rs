use super::{Embedder, KNOWLEDGE_COLLECTION, KnowledgeError, ScoredDocument, VectorIndex};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Multi-query search over one collection of the knowledge base.
///
/// Shared read-only by every concurrent pipeline run.
#[derive(Clone)]
pub struct KnowledgeRetriever {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    collection: String,
}

impl KnowledgeRetriever {
    /// Searches the knowledge collection.
    pub fn new(embedder: Arc<dyn Embedder>, index: Arc<dyn VectorIndex>) -> Self {
        Self::for_collection(embedder, index, KNOWLEDGE_COLLECTION)
    }

    pub fn for_collection(
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
        collection: impl Into<String>,
    ) -> Self {
        Self { embedder, index, collection: collection.into() }
    }

    /// Returns the `top_k` best chunks over all queries.
    ///
    /// Every query is searched independently; a chunk hit by several
    /// queries keeps its best score.
    pub async fn search(
        &self,
        queries: &[String],
        top_k: usize,
    ) -> Result<Vec<ScoredDocument>, KnowledgeError> {
        if queries.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }

        let embeddings = self.embedder.embed(queries).await?;
        let index = Arc::clone(&self.index);
        let collection = self.collection.clone();
        let per_query = tokio::task::spawn_blocking(move || {
            embeddings
                .iter()
                .map(|embedding| index.query(&collection, embedding, top_k))
                .collect::<Result<Vec<_>, KnowledgeError>>()
        })
        .await
        .map_err(|e| KnowledgeError::Join(e.to_string()))??;

        let mut best: HashMap<String, ScoredDocument> = HashMap::new();
        for hit in per_query.into_iter().flatten() {
            match best.get(&hit.id) {
                Some(existing) if existing.score >= hit.score => {}
                _ => {
                    best.insert(hit.id.clone(), hit);
                }
            }
        }

        let mut merged: Vec<ScoredDocument> = best.into_values().collect();
        merged.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.id.cmp(&b.id)));
        merged.truncate(top_k);

        debug!(
            collection = %self.collection,
            queries = queries.len(),
            hits = merged.len(),
            "Knowledge search complete"
        );
        Ok(merged)
    }
}
