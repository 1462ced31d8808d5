//! docsearch Pipeline - Ingestion and search orchestration
//!
//! Ties the parser, embedding client and vector store together:
//! - Directory ingestion (drop, recreate, extract, embed, batch write)
//! - Semantic search over the collection
//! - Ad hoc resource add and delete
//! - Collection statistics
//!
//! Author: hephaex@gmail.com

use docsearch_core::{
    CollectionStats, DocsearchError, IngestConfig, ResourceRecord, Result, SearchHit,
    COLLECTION_NAME,
};
use docsearch_parser::DocumentParser;
use docsearch_vector::{Collection, EmbeddingClient, RecordBatch, VectorStore};
use std::sync::Arc;

pub mod ingest;

pub use ingest::{DirectoryDiagnostics, IngestError, IngestReport};

// ============================================================================
// Pipeline
// ============================================================================

/// Orchestrates every operation against the single document collection
pub struct DocumentPipeline {
    /// Vector store backend
    store: Arc<dyn VectorStore>,

    /// Embedding model
    embedder: Arc<dyn EmbeddingClient>,

    /// Text extractor for ingested files
    parser: Arc<dyn DocumentParser>,

    /// Ingestion settings
    config: IngestConfig,
}

impl DocumentPipeline {
    /// Create a new pipeline
    pub fn new(
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn EmbeddingClient>,
        parser: Arc<dyn DocumentParser>,
        config: IngestConfig,
    ) -> Self {
        Self {
            store,
            embedder,
            parser,
            config,
        }
    }

    /// Ingestion settings in use
    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    /// Underlying vector store
    pub fn store(&self) -> &Arc<dyn VectorStore> {
        &self.store
    }

    /// The collection every operation works against
    async fn collection(&self) -> Result<Collection> {
        self.store.get_collection(COLLECTION_NAME).await
    }

    /// Embed `query` and return the `top_k` nearest records
    pub async fn search(&self, query: &str, top_k: usize) -> Result<Vec<SearchHit>> {
        if top_k == 0 {
            return Err(DocsearchError::ValidationError(
                "top_k must be at least 1".to_string(),
            ));
        }

        let collection = self.collection().await?;
        let embedding = self.embedder.embed(query).await?;
        let hits = self.store.query(&collection, &embedding, top_k).await?;

        tracing::debug!("Search for {:?} returned {} hits", query, hits.len());
        Ok(hits)
    }

    /// Store one resource record.
    ///
    /// The composed `about skills tags` text is embedded and stored as the
    /// record's document. An id that is already present is rejected.
    pub async fn add_resource(&self, record: ResourceRecord) -> Result<()> {
        record.validate()?;

        let collection = self.collection().await?;

        let existing = self
            .store
            .get_ids(&collection, Some(std::slice::from_ref(&record.resource_id)))
            .await?;
        if !existing.is_empty() {
            return Err(DocsearchError::AlreadyExists(format!(
                "Resource {} already exists",
                record.resource_id
            )));
        }

        let text = record.composed_text();
        let embedding = self.embedder.embed(&text).await?;

        let batch = RecordBatch::single(
            record.resource_id.clone(),
            text,
            record.to_metadata(),
            embedding,
        );
        self.store.add(&collection, batch).await?;

        tracing::info!("Added resource {}", record.resource_id);
        Ok(())
    }

    /// Delete a record by id; an unknown id is not an error
    pub async fn delete_record(&self, id: &str) -> Result<()> {
        let collection = self.collection().await?;
        self.store.delete(&collection, &[id.to_string()]).await?;

        tracing::info!("Deleted resource {}", id);
        Ok(())
    }

    /// Number of stored records
    pub async fn stats(&self) -> Result<CollectionStats> {
        let collection = self.collection().await?;
        let total_rows = self.store.count(&collection).await?;

        Ok(CollectionStats {
            total_rows,
            collection_name: collection.name,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docsearch_parser::PlainTextParser;
    use docsearch_vector::{HashEmbedding, MemoryStore};

    async fn pipeline_with_collection() -> DocumentPipeline {
        let store = Arc::new(MemoryStore::new());
        store.create_collection(COLLECTION_NAME).await.unwrap();

        DocumentPipeline::new(
            store,
            Arc::new(HashEmbedding::default()),
            Arc::new(PlainTextParser),
            IngestConfig::default(),
        )
    }

    fn pipeline_without_collection() -> DocumentPipeline {
        DocumentPipeline::new(
            Arc::new(MemoryStore::new()),
            Arc::new(HashEmbedding::default()),
            Arc::new(PlainTextParser),
            IngestConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_add_then_search_finds_resource() {
        let pipeline = pipeline_with_collection().await;

        pipeline
            .add_resource(
                ResourceRecord::new("r1")
                    .with_about("tax attorney")
                    .with_skills("audits")
                    .with_tags("finance"),
            )
            .await
            .unwrap();
        pipeline
            .add_resource(ResourceRecord::new("r2").with_about("eviction defense lawyer"))
            .await
            .unwrap();

        let hits = pipeline.search("tax audits", 5).await.unwrap();
        assert_eq!(hits[0].id, "r1");
        assert_eq!(hits[0].document.as_deref(), Some("tax attorney audits finance"));
        assert_eq!(hits[0].metadata["about"], "tax attorney");
    }

    #[tokio::test]
    async fn test_duplicate_resource_rejected() {
        let pipeline = pipeline_with_collection().await;
        pipeline
            .add_resource(ResourceRecord::new("r1").with_about("first"))
            .await
            .unwrap();

        let result = pipeline
            .add_resource(ResourceRecord::new("r1").with_about("second"))
            .await;
        assert!(matches!(result, Err(DocsearchError::AlreadyExists(_))));
        assert_eq!(pipeline.stats().await.unwrap().total_rows, 1);
    }

    #[tokio::test]
    async fn test_empty_resource_id_rejected() {
        let pipeline = pipeline_with_collection().await;
        let result = pipeline.add_resource(ResourceRecord::new("  ")).await;
        assert!(matches!(result, Err(DocsearchError::ValidationError(_))));
    }

    #[tokio::test]
    async fn test_delete_removes_from_search() {
        let pipeline = pipeline_with_collection().await;
        pipeline
            .add_resource(ResourceRecord::new("r1").with_about("landlord disputes"))
            .await
            .unwrap();

        pipeline.delete_record("r1").await.unwrap();
        pipeline.delete_record("never-existed").await.unwrap();

        let hits = pipeline.search("landlord disputes", 5).await.unwrap();
        assert!(hits.iter().all(|h| h.id != "r1"));
        assert_eq!(pipeline.stats().await.unwrap().total_rows, 0);
    }

    #[tokio::test]
    async fn test_search_respects_top_k() {
        let pipeline = pipeline_with_collection().await;
        for i in 0..4 {
            pipeline
                .add_resource(ResourceRecord::new(format!("r{i}")).with_about(format!("topic {i}")))
                .await
                .unwrap();
        }

        let hits = pipeline.search("topic", 2).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert!(hits[0].distance <= hits[1].distance);

        assert!(matches!(
            pipeline.search("topic", 0).await,
            Err(DocsearchError::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn test_operations_require_collection() {
        let pipeline = pipeline_without_collection();

        assert!(matches!(
            pipeline.search("anything", 5).await,
            Err(DocsearchError::NotFound(_))
        ));
        assert!(pipeline
            .add_resource(ResourceRecord::new("r1"))
            .await
            .is_err());
        assert!(pipeline.delete_record("r1").await.is_err());
        assert!(pipeline.stats().await.is_err());
    }

    #[tokio::test]
    async fn test_stats_reports_collection_name() {
        let pipeline = pipeline_with_collection().await;
        let stats = pipeline.stats().await.unwrap();
        assert_eq!(stats.collection_name, COLLECTION_NAME);
        assert_eq!(stats.total_rows, 0);
    }
}
