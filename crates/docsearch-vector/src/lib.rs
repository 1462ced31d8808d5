//! docsearch Vector - Vector store and embedding abstraction
//!
//! Provides the `VectorStore` trait over a Chroma server, the
//! `EmbeddingClient` trait over sentence-embedding models, and the
//! startup liveness wait used before either is put to work.
//!
//! Author: hephaex@gmail.com

use async_trait::async_trait;
use docsearch_core::{DocsearchError, Metadata, Result, SearchHit};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub mod chroma_store;
pub mod embedding;
#[cfg(any(test, feature = "test-utils"))]
pub mod memory_store;

pub use chroma_store::ChromaStore;
pub use embedding::{create_embedding_client, EmbeddingClient};
#[cfg(any(test, feature = "test-utils"))]
pub use embedding::HashEmbedding;
#[cfg(any(test, feature = "test-utils"))]
pub use memory_store::MemoryStore;

// ============================================================================
// Store Types
// ============================================================================

/// A named collection as reported by the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Collection {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub metadata: Option<Metadata>,
}

/// `hnsw:space` setting of every collection this crate creates
pub const DISTANCE_SPACE: &str = "cosine";

/// Parallel lists of records written in one store call.
///
/// All four lists always have the same length; [`RecordBatch::new`]
/// refuses anything else.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RecordBatch {
    ids: Vec<String>,
    documents: Vec<String>,
    metadatas: Vec<Metadata>,
    embeddings: Vec<Vec<f32>>,
}

impl RecordBatch {
    /// Build a batch, checking the lists line up
    pub fn new(
        ids: Vec<String>,
        documents: Vec<String>,
        metadatas: Vec<Metadata>,
        embeddings: Vec<Vec<f32>>,
    ) -> Result<Self> {
        let len = ids.len();
        if documents.len() != len || metadatas.len() != len || embeddings.len() != len {
            return Err(DocsearchError::ValidationError(format!(
                "batch lists differ in length: ids={}, documents={}, metadatas={}, embeddings={}",
                len,
                documents.len(),
                metadatas.len(),
                embeddings.len()
            )));
        }

        Ok(Self {
            ids,
            documents,
            metadatas,
            embeddings,
        })
    }

    /// A batch holding a single record
    pub fn single(
        id: impl Into<String>,
        document: impl Into<String>,
        metadata: Metadata,
        embedding: Vec<f32>,
    ) -> Self {
        Self {
            ids: vec![id.into()],
            documents: vec![document.into()],
            metadatas: vec![metadata],
            embeddings: vec![embedding],
        }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    /// Iterate `(id, document, metadata, embedding)` rows
    pub fn rows(&self) -> impl Iterator<Item = (&String, &String, &Metadata, &Vec<f32>)> {
        self.ids
            .iter()
            .zip(&self.documents)
            .zip(&self.metadatas)
            .zip(&self.embeddings)
            .map(|(((id, doc), meta), emb)| (id, doc, meta, emb))
    }
}

// ============================================================================
// Store Trait
// ============================================================================

/// Trait for vector database operations
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Liveness check, returns the server's heartbeat value
    async fn heartbeat(&self) -> Result<u64>;

    /// Create a collection indexed for cosine distance
    async fn create_collection(&self, name: &str) -> Result<Collection>;

    /// Drop a collection; a missing collection is not an error
    async fn delete_collection(&self, name: &str) -> Result<()>;

    /// Look up a collection, `NotFound` when absent
    async fn get_collection(&self, name: &str) -> Result<Collection>;

    /// Append records
    async fn add(&self, collection: &Collection, batch: RecordBatch) -> Result<()>;

    /// Nearest records to `embedding`, ascending by distance
    async fn query(
        &self,
        collection: &Collection,
        embedding: &[f32],
        n_results: usize,
    ) -> Result<Vec<SearchHit>>;

    /// Delete records by id; unknown ids are ignored
    async fn delete(&self, collection: &Collection, ids: &[String]) -> Result<()>;

    /// Ids of stored records, restricted to `ids` when given
    async fn get_ids(&self, collection: &Collection, ids: Option<&[String]>)
        -> Result<Vec<String>>;

    /// Number of stored records
    async fn count(&self, collection: &Collection) -> Result<usize>;
}

// ============================================================================
// Startup
// ============================================================================

/// Wait until the store answers a heartbeat.
///
/// Tries `attempts` times with `delay` between attempts and fails once
/// every attempt has been used.
pub async fn wait_for_store(store: &dyn VectorStore, attempts: u32, delay: Duration) -> Result<()> {
    for attempt in 1..=attempts {
        match store.heartbeat().await {
            Ok(_) => {
                tracing::info!("Successfully connected to vector store");
                return Ok(());
            }
            Err(e) => {
                tracing::warn!(
                    "Waiting for vector store to be ready... (attempt {}/{}): {}",
                    attempt,
                    attempts,
                    e
                );
                if attempt < attempts {
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    Err(DocsearchError::StoreError(format!(
        "Could not connect to vector store after {attempts} attempts"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_batch_rejects_mismatched_lengths() {
        let result = RecordBatch::new(
            vec!["a".to_string(), "b".to_string()],
            vec!["doc a".to_string()],
            vec![Metadata::new(), Metadata::new()],
            vec![vec![0.0], vec![1.0]],
        );
        assert!(matches!(result, Err(DocsearchError::ValidationError(_))));
    }

    #[test]
    fn test_record_batch_rows() {
        let batch = RecordBatch::new(
            vec!["a".to_string(), "b".to_string()],
            vec!["doc a".to_string(), "doc b".to_string()],
            vec![Metadata::new(), Metadata::new()],
            vec![vec![0.0], vec![1.0]],
        )
        .unwrap();

        assert_eq!(batch.len(), 2);
        let ids: Vec<&String> = batch.rows().map(|(id, _, _, _)| id).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_wait_for_store_reachable() {
        let store = MemoryStore::new();
        assert!(wait_for_store(&store, 3, Duration::from_millis(1)).await.is_ok());
    }

    #[tokio::test]
    async fn test_wait_for_store_gives_up() {
        let store = MemoryStore::new();
        store.set_reachable(false);

        let err = wait_for_store(&store, 3, Duration::from_millis(1))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("after 3 attempts"));
        assert_eq!(store.heartbeat_calls(), 3);
    }
}
