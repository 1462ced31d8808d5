//! Chroma implementation for vector storage
//!
//! Talks to a Chroma server over its HTTP API (v2). Embeddings are always
//! computed client-side and sent with each record, so the server never
//! needs an embedding function of its own.
//!
//! Author: hephaex@gmail.com

use async_trait::async_trait;
use docsearch_core::{ChromaConfig, DocsearchError, Metadata, Result, SearchHit};
use reqwest::{Client, Response, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;

use crate::{Collection, RecordBatch, VectorStore, DISTANCE_SPACE};

/// Chroma vector store implementation
pub struct ChromaStore {
    client: Client,
    base_url: String,
    tenant: String,
    database: String,
}

impl ChromaStore {
    /// Create a client for the configured server (no request is made)
    pub fn new(config: &ChromaConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| DocsearchError::StoreError(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url(),
            tenant: config.tenant.clone(),
            database: config.database.clone(),
        })
    }

    fn collections_url(&self) -> String {
        format!(
            "{}/api/v2/tenants/{}/databases/{}/collections",
            self.base_url, self.tenant, self.database
        )
    }

    /// URL of a collection, addressed by name or id depending on the call
    fn collection_url(&self, key: &str, action: Option<&str>) -> String {
        match action {
            Some(action) => format!("{}/{}/{}", self.collections_url(), key, action),
            None => format!("{}/{}", self.collections_url(), key),
        }
    }

    async fn post<B: Serialize>(&self, url: String, body: &B, context: &str) -> Result<Response> {
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| DocsearchError::StoreError(format!("{context}: {e}")))?;
        check_response(response, context).await
    }

    async fn get(&self, url: String, context: &str) -> Result<Response> {
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| DocsearchError::StoreError(format!("{context}: {e}")))?;
        check_response(response, context).await
    }
}

/// Turn non-2xx responses into errors, keeping the server's message
async fn check_response(response: Response, context: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    if is_missing_collection(status, &body) {
        return Err(DocsearchError::NotFound(format!("{context}: {body}")));
    }

    Err(DocsearchError::StoreError(format!(
        "{context} ({status}): {body}"
    )))
}

/// Whether an error response reports a missing collection.
///
/// Older servers answer with 4xx/5xx and a "Collection ... does not exist"
/// message instead of 404. Missing tenants and databases stay store errors.
fn is_missing_collection(status: StatusCode, body: &str) -> bool {
    let body = body.to_lowercase();
    let names_collection = body.contains("collection");
    let missing = body.contains("does not exist") || body.contains("not found");

    names_collection && (status == StatusCode::NOT_FOUND || missing)
}

async fn parse_json<T: DeserializeOwned>(response: Response, context: &str) -> Result<T> {
    response
        .json()
        .await
        .map_err(|e| DocsearchError::StoreError(format!("{context}: invalid response: {e}")))
}

#[derive(Debug, Deserialize)]
struct HeartbeatResponse {
    #[serde(rename = "nanosecond heartbeat")]
    nanosecond_heartbeat: u64,
}

#[derive(Debug, Deserialize)]
struct GetResponse {
    ids: Vec<String>,
}

/// Column-oriented query response; one inner list per query embedding
#[derive(Debug, Default, Deserialize)]
struct QueryResponse {
    ids: Vec<Vec<String>>,
    #[serde(default)]
    documents: Option<Vec<Vec<Option<String>>>>,
    #[serde(default)]
    metadatas: Option<Vec<Vec<Option<Metadata>>>>,
    #[serde(default)]
    distances: Option<Vec<Vec<Option<f32>>>>,
}

impl QueryResponse {
    /// Rows for the first (only) query embedding
    fn into_hits(self) -> Vec<SearchHit> {
        let ids = self.ids.into_iter().next().unwrap_or_default();
        let mut documents = first_row(self.documents).into_iter();
        let mut metadatas = first_row(self.metadatas).into_iter();
        let mut distances = first_row(self.distances).into_iter();

        ids.into_iter()
            .map(|id| SearchHit {
                id,
                document: documents.next().flatten(),
                metadata: metadatas.next().flatten().unwrap_or_default(),
                distance: distances.next().flatten(),
            })
            .collect()
    }
}

fn first_row<T>(column: Option<Vec<Vec<Option<T>>>>) -> Vec<Option<T>> {
    column
        .and_then(|rows| rows.into_iter().next())
        .unwrap_or_default()
}

#[async_trait]
impl VectorStore for ChromaStore {
    async fn heartbeat(&self) -> Result<u64> {
        let url = format!("{}/api/v2/heartbeat", self.base_url);
        let response = self.get(url, "Heartbeat failed").await?;
        let beat: HeartbeatResponse = parse_json(response, "Heartbeat failed").await?;
        Ok(beat.nanosecond_heartbeat)
    }

    async fn create_collection(&self, name: &str) -> Result<Collection> {
        let body = json!({
            "name": name,
            "metadata": { "hnsw:space": DISTANCE_SPACE },
            "get_or_create": false,
        });

        let response = self
            .post(self.collections_url(), &body, "Failed to create collection")
            .await?;
        let collection: Collection = parse_json(response, "Failed to create collection").await?;

        tracing::info!("Created new collection: {} ({})", collection.name, collection.id);
        Ok(collection)
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        let response = self
            .client
            .delete(self.collection_url(name, None))
            .send()
            .await
            .map_err(|e| DocsearchError::StoreError(format!("Failed to delete collection: {e}")))?;

        match check_response(response, "Failed to delete collection").await {
            Ok(_) => Ok(()),
            Err(DocsearchError::NotFound(msg)) => {
                tracing::debug!("No existing collection to delete: {}", msg);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn get_collection(&self, name: &str) -> Result<Collection> {
        let context = format!("Failed to get collection {name}");
        let response = self
            .get(self.collection_url(name, None), &context)
            .await
            .map_err(|e| match e {
                DocsearchError::NotFound(_) => {
                    DocsearchError::NotFound(format!("Collection {name} does not exist"))
                }
                other => other,
            })?;
        parse_json(response, &context).await
    }

    async fn add(&self, collection: &Collection, batch: RecordBatch) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }

        // Field names match the add endpoint's request body
        self.post(
            self.collection_url(&collection.id, Some("add")),
            &batch,
            "Failed to add records",
        )
        .await?;

        Ok(())
    }

    async fn query(
        &self,
        collection: &Collection,
        embedding: &[f32],
        n_results: usize,
    ) -> Result<Vec<SearchHit>> {
        let body = json!({
            "query_embeddings": [embedding],
            "n_results": n_results,
            "include": ["metadatas", "documents", "distances"],
        });

        let response = self
            .post(
                self.collection_url(&collection.id, Some("query")),
                &body,
                "Vector search failed",
            )
            .await?;
        let result: QueryResponse = parse_json(response, "Vector search failed").await?;

        Ok(result.into_hits())
    }

    async fn delete(&self, collection: &Collection, ids: &[String]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }

        self.post(
            self.collection_url(&collection.id, Some("delete")),
            &json!({ "ids": ids }),
            "Failed to delete records",
        )
        .await?;

        Ok(())
    }

    async fn get_ids(
        &self,
        collection: &Collection,
        ids: Option<&[String]>,
    ) -> Result<Vec<String>> {
        let mut body = json!({ "include": [] });
        if let Some(ids) = ids {
            body["ids"] = json!(ids);
        }

        let response = self
            .post(
                self.collection_url(&collection.id, Some("get")),
                &body,
                "Failed to get records",
            )
            .await?;
        let result: GetResponse = parse_json(response, "Failed to get records").await?;

        Ok(result.ids)
    }

    async fn count(&self, collection: &Collection) -> Result<usize> {
        let response = self
            .get(
                self.collection_url(&collection.id, Some("count")),
                "Failed to count records",
            )
            .await?;
        parse_json(response, "Failed to count records").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> ChromaStore {
        ChromaStore::new(&ChromaConfig::default()).unwrap()
    }

    #[test]
    fn test_collection_urls() {
        let store = store();
        assert_eq!(
            store.collections_url(),
            "http://localhost:8000/api/v2/tenants/default_tenant/databases/default_database/collections"
        );
        assert!(store
            .collection_url("abc-123", Some("query"))
            .ends_with("/collections/abc-123/query"));
        assert!(store
            .collection_url("document_logs", None)
            .ends_with("/collections/document_logs"));
    }

    #[test]
    fn test_query_response_to_hits() {
        let response: QueryResponse = serde_json::from_value(json!({
            "ids": [["tenant_faq", "lease_guide"]],
            "documents": [["Tenants may...", null]],
            "metadatas": [[{"title": "Tenant FAQ"}, null]],
            "distances": [[0.12, 0.48]]
        }))
        .unwrap();

        let hits = response.into_hits();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, "tenant_faq");
        assert_eq!(hits[0].document.as_deref(), Some("Tenants may..."));
        assert_eq!(hits[0].metadata["title"], "Tenant FAQ");
        assert_eq!(hits[1].document, None);
        assert!(hits[1].metadata.is_empty());
        assert_eq!(hits[1].distance, Some(0.48));
    }

    #[test]
    fn test_query_response_without_distances() {
        let response: QueryResponse = serde_json::from_value(json!({
            "ids": [["only"]],
        }))
        .unwrap();

        let hits = response.into_hits();
        assert_eq!(hits[0].distance, None);
    }

    #[test]
    fn test_record_batch_body_shape() {
        let batch = RecordBatch::single("r1", "text", Metadata::new(), vec![0.5, 0.25]);
        let body = serde_json::to_value(&batch).unwrap();
        assert_eq!(body["ids"], json!(["r1"]));
        assert_eq!(body["documents"], json!(["text"]));
        assert_eq!(body["embeddings"], json!([[0.5, 0.25]]));
        assert_eq!(body["metadatas"], json!([{}]));
    }

    #[test]
    fn test_missing_collection_classification() {
        assert!(is_missing_collection(
            StatusCode::NOT_FOUND,
            "Collection document_logs not found"
        ));
        assert!(is_missing_collection(
            StatusCode::INTERNAL_SERVER_ERROR,
            "ValueError('Collection document_logs does not exist.')"
        ));
        assert!(is_missing_collection(
            StatusCode::BAD_REQUEST,
            r#"{"error":"InvalidCollection","message":"Collection [abc] does not exist"}"#
        ));

        assert!(!is_missing_collection(
            StatusCode::NOT_FOUND,
            "Tenant default_tenant does not exist"
        ));
        assert!(!is_missing_collection(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Database default_database does not exist"
        ));
        assert!(!is_missing_collection(
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal error"
        ));
    }

    #[tokio::test]
    async fn test_unreachable_server_is_store_error() {
        // Nothing listens on port 1, so the connection is refused
        let store = ChromaStore::new(&ChromaConfig {
            port: 1,
            request_timeout_secs: 2,
            ..ChromaConfig::default()
        })
        .unwrap();

        match store.get_collection("document_logs").await {
            Err(DocsearchError::StoreError(msg)) => {
                assert!(msg.contains("Failed to get collection document_logs"));
                assert!(!msg.contains("does not exist"));
            }
            other => panic!("expected a store error, got {other:?}"),
        }

        assert!(matches!(
            store.delete_collection("document_logs").await,
            Err(DocsearchError::StoreError(_))
        ));
    }

    #[tokio::test]
    #[ignore = "requires a running Chroma server"]
    async fn test_live_collection_roundtrip() {
        let store = store();
        store.heartbeat().await.unwrap();

        let name = "docsearch_live_test";
        store.delete_collection(name).await.unwrap();
        let collection = store
            .create_collection(name)
            .await
            .unwrap();

        store
            .add(
                &collection,
                RecordBatch::single("a", "hello", Metadata::new(), vec![1.0, 0.0, 0.0]),
            )
            .await
            .unwrap();
        assert_eq!(store.count(&collection).await.unwrap(), 1);

        let hits = store.query(&collection, &[1.0, 0.0, 0.0], 5).await.unwrap();
        assert_eq!(hits[0].id, "a");

        store.delete_collection(name).await.unwrap();
        assert!(matches!(
            store.get_collection(name).await,
            Err(DocsearchError::NotFound(_))
        ));
    }
}
