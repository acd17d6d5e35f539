use super::KnowledgeError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error};

/// Dimension of the local embedders (hashing and all-MiniLM-L6-v2).
pub const EMBEDDING_DIM: usize = 384;

/// Turns text into dense vectors.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embeds a batch of texts, one vector per input, in input order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, KnowledgeError>;

    /// Embeds a single text.
    async fn embed_one(&self, text: &str) -> Result<Vec<f32>, KnowledgeError> {
        self.embed(&[text.to_string()])
            .await?
            .pop()
            .ok_or_else(|| KnowledgeError::Embedding("embedder returned no vector".to_string()))
    }

    /// Output dimension.
    fn dimension(&self) -> usize;
}

/// Deterministic local embedder based on feature hashing.
///
/// Each lowercase word and each character trigram is hashed into one of
/// `dimension` buckets with a signed weight; the result is L2-normalized.
/// Texts sharing vocabulary land close together, which is enough for topic
/// similarity without a model download.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    pub fn new() -> Self {
        Self { dimension: EMBEDDING_DIM }
    }

    pub fn with_dimension(dimension: usize) -> Self {
        Self { dimension: dimension.max(1) }
    }

    fn vectorize(&self, text: &str) -> Vec<f32> {
        let mut vec = vec![0.0f32; self.dimension];
        let lowered = text.to_lowercase();

        for word in lowered.split(|c: char| !c.is_alphanumeric()).filter(|w| !w.is_empty()) {
            self.add_feature(&mut vec, word.as_bytes(), 1.0);

            let chars: Vec<char> = word.chars().collect();
            for gram in chars.windows(3) {
                let gram: String = gram.iter().collect();
                self.add_feature(&mut vec, gram.as_bytes(), 0.5);
            }
        }

        let norm: f32 = vec.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for val in &mut vec {
                *val /= norm;
            }
        }
        vec
    }

    fn add_feature(&self, vec: &mut [f32], feature: &[u8], weight: f32) {
        let hash = fnv1a(feature);
        let bucket = (hash % self.dimension as u64) as usize;
        let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
        vec[bucket] += sign * weight;
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Embedder for HashingEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, KnowledgeError> {
        Ok(texts.iter().map(|t| self.vectorize(t)).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for b in bytes {
        hash ^= u64::from(*b);
        hash = hash.wrapping_mul(0x0100_0000_01b3);
    }
    hash
}

/// Remote embedder speaking the OpenAI `/embeddings` API.
#[derive(Debug, Clone)]
pub struct OpenAIEmbedder {
    model: String,
    base_url: String,
    api_key: Option<String>,
    dimension: usize,
    client: Client,
}

impl OpenAIEmbedder {
    /// Default remote embedding model.
    pub const DEFAULT_MODEL: &'static str = "text-embedding-3-small";

    pub fn new(model: impl Into<String>, base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            model: model.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            dimension: 1536,
            client: Client::builder()
                .timeout(Duration::from_secs(60))
                .build()
                .unwrap_or_else(|_| Client::new()),
        }
    }

    /// Declares the vector size the configured model returns.
    #[must_use]
    pub fn with_dimension(mut self, dimension: usize) -> Self {
        self.dimension = dimension;
        self
    }
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

#[async_trait]
impl Embedder for OpenAIEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, KnowledgeError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        debug!(model = %self.model, count = texts.len(), "Requesting embeddings");

        let url = format!("{}/embeddings", self.base_url);
        let mut request =
            self.client.post(&url).json(&EmbeddingRequest { model: &self.model, input: texts });
        if let Some(ref api_key) = self.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request.send().await.map_err(|e| {
            error!(error = %e, url = %url, "Failed to send embedding request");
            KnowledgeError::Embedding(format!("Network error: {}", e))
        })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            error!(status = %status, error = %error_text, "Embedding API returned error status");
            return Err(KnowledgeError::Embedding(format!("API error ({}): {}", status, error_text)));
        }

        let mut body: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| KnowledgeError::Embedding(format!("Failed to parse response: {}", e)))?;

        if body.data.len() != texts.len() {
            return Err(KnowledgeError::InvalidData(format!(
                "requested {} embeddings, received {}",
                texts.len(),
                body.data.len()
            )));
        }
        body.data.sort_by_key(|d| d.index);
        Ok(body.data.into_iter().map(|d| d.embedding).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

#[cfg(feature = "onnx-embeddings")]
mod onnx {
    use super::{EMBEDDING_DIM, Embedder, KnowledgeError};
    use async_trait::async_trait;
    use ort::session::Session;
    use ort::value::TensorRef;
    use std::path::Path;
    use std::sync::{Arc, Mutex};
    use tracing::info;

    struct Runtime {
        // `Session::run` takes `&mut self`.
        session: Mutex<Session>,
        tokenizer: tokenizers::Tokenizer,
    }

    /// Local all-MiniLM-L6-v2 embedder on ONNX Runtime.
    ///
    /// The model directory must hold `model.onnx` and `tokenizer.json`.
    /// Token embeddings are mean-pooled over the attention mask and
    /// L2-normalized, giving 384-dimensional vectors.
    #[derive(Clone)]
    pub struct OnnxEmbedder {
        runtime: Arc<Runtime>,
    }

    impl OnnxEmbedder {
        pub fn load(model_dir: &Path) -> Result<Self, KnowledgeError> {
            let model_path = model_dir.join("model.onnx");
            let tokenizer_path = model_dir.join("tokenizer.json");
            for required in [&model_path, &tokenizer_path] {
                if !required.exists() {
                    return Err(KnowledgeError::ModelNotFound(required.clone()));
                }
            }

            let session = Session::builder()
                .map_err(|e: ort::Error| KnowledgeError::ModelInit(e.to_string()))?
                .with_intra_threads(2)
                .map_err(|e: ort::Error| KnowledgeError::ModelInit(e.to_string()))?
                .commit_from_file(&model_path)
                .map_err(|e: ort::Error| KnowledgeError::ModelInit(format!("ONNX load failed: {e}")))?;
            let tokenizer = tokenizers::Tokenizer::from_file(&tokenizer_path)
                .map_err(|e| KnowledgeError::ModelInit(format!("tokenizer load failed: {e}")))?;

            info!(model_dir = %model_dir.display(), "ONNX embedder loaded");
            Ok(Self { runtime: Arc::new(Runtime { session: Mutex::new(session), tokenizer }) })
        }
    }

    impl Runtime {
        fn infer(&self, text: &str) -> Result<Vec<f32>, KnowledgeError> {
            let encoding = self
                .tokenizer
                .encode(text, true)
                .map_err(|e| KnowledgeError::Embedding(format!("tokenization failed: {e}")))?;

            let widen = |values: &[u32]| values.iter().map(|&v| i64::from(v)).collect::<Vec<i64>>();
            let attention_mask = widen(encoding.get_attention_mask());
            let seq_len = attention_mask.len();

            let as_batch = |values: Vec<i64>| {
                ndarray::Array2::from_shape_vec((1, seq_len), values)
                    .map_err(|e| KnowledgeError::Embedding(e.to_string()))
            };
            let ids = as_batch(widen(encoding.get_ids()))?;
            let mask = as_batch(attention_mask.clone())?;
            let types = as_batch(widen(encoding.get_type_ids()))?;

            let ids_tensor = TensorRef::from_array_view(&ids)
                .map_err(|e| KnowledgeError::Embedding(e.to_string()))?;
            let mask_tensor = TensorRef::from_array_view(&mask)
                .map_err(|e| KnowledgeError::Embedding(e.to_string()))?;
            let type_tensor = TensorRef::from_array_view(&types)
                .map_err(|e| KnowledgeError::Embedding(e.to_string()))?;

            let mut session = self.session.lock().map_err(|_| KnowledgeError::LockPoisoned)?;
            let outputs = session
                .run(ort::inputs![ids_tensor, mask_tensor, type_tensor])
                .map_err(|e| KnowledgeError::Embedding(format!("ONNX inference failed: {e}")))?;
            let (shape, hidden) = outputs[0]
                .try_extract_tensor::<f32>()
                .map_err(|e| KnowledgeError::Embedding(format!("output extraction failed: {e}")))?;

            if shape.len() != 3 || usize::try_from(shape[2]).ok() != Some(EMBEDDING_DIM) {
                return Err(KnowledgeError::Embedding(format!(
                    "unexpected output shape {shape:?}, expected [1, {seq_len}, {EMBEDDING_DIM}]"
                )));
            }

            Ok(mean_pool(hidden, &attention_mask))
        }
    }

    /// Attention-masked mean over token rows, then L2 normalization.
    fn mean_pool(hidden: &[f32], attention_mask: &[i64]) -> Vec<f32> {
        let mut pooled = vec![0.0f32; EMBEDDING_DIM];
        let mut mask_sum = 0.0f32;
        for (row, &mask) in hidden.chunks_exact(EMBEDDING_DIM).zip(attention_mask) {
            let weight = mask as f32;
            mask_sum += weight;
            for (p, h) in pooled.iter_mut().zip(row) {
                *p += h * weight;
            }
        }
        if mask_sum > 0.0 {
            pooled.iter_mut().for_each(|p| *p /= mask_sum);
        }

        let norm = pooled.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            pooled.iter_mut().for_each(|p| *p /= norm);
        }
        pooled
    }

    #[async_trait]
    impl Embedder for OnnxEmbedder {
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, KnowledgeError> {
            let runtime = Arc::clone(&self.runtime);
            let texts = texts.to_vec();
            tokio::task::spawn_blocking(move || texts.iter().map(|t| runtime.infer(t)).collect())
                .await
                .map_err(|e| KnowledgeError::Join(e.to_string()))?
        }

        fn dimension(&self) -> usize {
            EMBEDDING_DIM
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use tempfile::TempDir;

        #[test]
        fn load_reports_missing_model_files() {
            let dir = TempDir::new().unwrap();
            let err = OnnxEmbedder::load(dir.path()).err().unwrap();
            assert!(matches!(err, KnowledgeError::ModelNotFound(ref p) if p.ends_with("model.onnx")));

            std::fs::write(dir.path().join("model.onnx"), b"").unwrap();
            let err = OnnxEmbedder::load(dir.path()).err().unwrap();
            assert!(matches!(err, KnowledgeError::ModelNotFound(ref p) if p.ends_with("tokenizer.json")));
        }

        #[test]
        fn mean_pool_ignores_masked_tokens() {
            let mut hidden = vec![0.0f32; EMBEDDING_DIM * 2];
            hidden[0] = 3.0;
            hidden[EMBEDDING_DIM + 1] = 100.0;

            let pooled = mean_pool(&hidden, &[1, 0]);
            assert!((pooled[0] - 1.0).abs() < 1e-6);
            assert!(pooled[1].abs() < 1e-6);
        }
    }
}

#[cfg(feature = "onnx-embeddings")]
pub use onnx::OnnxEmbedder;

/// Cosine similarity of two vectors; zero when either is all zeros.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 { 0.0 } else { dot / (norm_a * norm_b) }
}
