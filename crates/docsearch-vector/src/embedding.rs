//! Embedding client for generating vector representations
//!
//! The default provider runs `sentence-transformers/all-MiniLM-L6-v2`
//! in-process through fastembed. An Ollama-backed provider is available
//! for hosts where the ONNX runtime cannot be used.
//!
//! Author: hephaex@gmail.com

use async_trait::async_trait;
use docsearch_core::{DocsearchError, EmbeddingConfig, EmbeddingProvider, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

// ============================================================================
// Embedding Trait
// ============================================================================

/// Trait for embedding generation
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    /// Generate embedding for a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let results = self.embed_batch(&[text.to_string()]).await?;
        results
            .into_iter()
            .next()
            .ok_or_else(|| DocsearchError::EmbeddingError("No embedding returned".to_string()))
    }

    /// Generate embeddings for multiple texts, one per input in order
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Get embedding dimension
    fn dimension(&self) -> usize;

    /// Model identifier
    fn model_name(&self) -> &str;
}

// ============================================================================
// Local (fastembed) Embedding Client
// ============================================================================

/// In-process sentence-transformer model
#[cfg(feature = "local-embeddings")]
pub struct LocalEmbedding {
    model: Arc<std::sync::Mutex<fastembed::TextEmbedding>>,
    model_name: String,
    dimension: usize,
}

#[cfg(feature = "local-embeddings")]
impl LocalEmbedding {
    /// Load the model, downloading weights on first use
    pub fn new(model_name: &str) -> Result<Self> {
        let (model, dimension) = fastembed_model(model_name)?;

        let embedding = fastembed::TextEmbedding::try_new(
            fastembed::InitOptions::new(model).with_show_download_progress(false),
        )
        .map_err(|e| {
            DocsearchError::EmbeddingError(format!("Failed to load model {model_name}: {e}"))
        })?;

        tracing::info!("Loaded embedding model {} ({} dims)", model_name, dimension);

        Ok(Self {
            model: Arc::new(std::sync::Mutex::new(embedding)),
            model_name: model_name.to_string(),
            dimension,
        })
    }
}

#[cfg(feature = "local-embeddings")]
fn fastembed_model(name: &str) -> Result<(fastembed::EmbeddingModel, usize)> {
    match name.to_lowercase().as_str() {
        "sentence-transformers/all-minilm-l6-v2" | "all-minilm-l6-v2" => {
            Ok((fastembed::EmbeddingModel::AllMiniLML6V2, 384))
        }
        "baai/bge-small-en-v1.5" | "bge-small-en-v1.5" => {
            Ok((fastembed::EmbeddingModel::BGESmallENV15, 384))
        }
        "baai/bge-base-en-v1.5" | "bge-base-en-v1.5" => {
            Ok((fastembed::EmbeddingModel::BGEBaseENV15, 768))
        }
        other => Err(DocsearchError::ConfigError(format!(
            "Unsupported local embedding model: {other}"
        ))),
    }
}

#[cfg(feature = "local-embeddings")]
#[async_trait]
impl EmbeddingClient for LocalEmbedding {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let model = Arc::clone(&self.model);
        let texts = texts.to_vec();

        tokio::task::spawn_blocking(move || {
            let mut model = model.lock().map_err(|_| {
                DocsearchError::EmbeddingError("Embedding model lock poisoned".to_string())
            })?;
            model
                .embed(texts, None)
                .map_err(|e| DocsearchError::EmbeddingError(format!("Local embedding failed: {e}")))
        })
        .await
        .map_err(|e| DocsearchError::EmbeddingError(format!("Embedding task failed: {e}")))?
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

// ============================================================================
// Ollama Embedding Client
// ============================================================================

/// Ollama embedding API client
pub struct OllamaEmbedding {
    client: Client,
    base_url: String,
    model: String,
    dimension: usize,
}

#[derive(Debug, Serialize)]
struct OllamaEmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct OllamaEmbeddingResponse {
    embeddings: Vec<Vec<f32>>,
}

impl OllamaEmbedding {
    /// Create a new Ollama embedding client
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        let model = model.into();
        let dimension = match model.as_str() {
            "nomic-embed-text" => 768,
            "mxbai-embed-large" => 1024,
            "all-minilm" => 384,
            _ => 384,
        };

        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model,
            dimension,
        }
    }

    /// Create from config
    pub fn from_config(config: &EmbeddingConfig) -> Self {
        Self::new(config.ollama_url.clone(), config.model.clone())
    }
}

#[async_trait]
impl EmbeddingClient for OllamaEmbedding {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let request = OllamaEmbeddingRequest {
            model: &self.model,
            input: texts,
        };

        let response = self
            .client
            .post(format!("{}/api/embed", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                DocsearchError::EmbeddingError(format!("Ollama embedding request failed: {e}"))
            })?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(DocsearchError::EmbeddingError(format!(
                "Ollama embedding error: {error_text}"
            )));
        }

        let result: OllamaEmbeddingResponse = response.json().await.map_err(|e| {
            DocsearchError::EmbeddingError(format!("Failed to parse embedding response: {e}"))
        })?;

        if result.embeddings.len() != texts.len() {
            return Err(DocsearchError::EmbeddingError(format!(
                "Expected {} embeddings, got {}",
                texts.len(),
                result.embeddings.len()
            )));
        }

        Ok(result.embeddings)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

// ============================================================================
// Hashing Embedding Client (tests)
// ============================================================================

/// Deterministic bag-of-words embedder.
///
/// Each lowercase alphanumeric token is hashed into a bucket and the
/// resulting vector is L2-normalised, so texts sharing words end up close
/// under cosine distance.
#[cfg(any(test, feature = "test-utils"))]
pub struct HashEmbedding {
    dimension: usize,
}

#[cfg(any(test, feature = "test-utils"))]
impl HashEmbedding {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];

        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let hash = fnv1a(token.to_lowercase().as_bytes());
            vector[(hash % self.dimension as u64) as usize] += 1.0;
        }

        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|x| *x /= norm);
        }
        vector
    }
}

#[cfg(any(test, feature = "test-utils"))]
impl Default for HashEmbedding {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(any(test, feature = "test-utils"))]
fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0xcbf29ce484222325u64, |hash, byte| {
        (hash ^ *byte as u64).wrapping_mul(0x100000001b3)
    })
}

#[cfg(any(test, feature = "test-utils"))]
#[async_trait]
impl EmbeddingClient for HashEmbedding {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        "hash"
    }
}

// ============================================================================
// Factory function
// ============================================================================

/// Create an embedding client from config.
///
/// Loading the local model can take a while on first run; callers treat a
/// failure here as fatal.
pub fn create_embedding_client(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingClient>> {
    match config.provider {
        #[cfg(feature = "local-embeddings")]
        EmbeddingProvider::Local => Ok(Arc::new(LocalEmbedding::new(&config.model)?)),
        #[cfg(not(feature = "local-embeddings"))]
        EmbeddingProvider::Local => Err(DocsearchError::ConfigError(
            "local embeddings require the `local-embeddings` feature".to_string(),
        )),
        EmbeddingProvider::Ollama => Ok(Arc::new(OllamaEmbedding::from_config(config))),
    }
}

// ============================================================================
// Tests
// ============================================================================
