//! Search handlers
//!
//! Author: hephaex@gmail.com

use crate::error::AppError;
use crate::state::AppState;
use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use docsearch_core::{Metadata, SearchHit, DEFAULT_TOP_K};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

/// Search request
#[derive(Debug, Deserialize, ToSchema)]
pub struct SearchRequest {
    /// Text to search for
    #[serde(default)]
    #[schema(example = "How do I contest an eviction notice?")]
    pub query: String,

    /// Maximum number of results
    #[serde(default = "default_top_k")]
    #[schema(example = 5, minimum = 1)]
    pub top_k: usize,
}

fn default_top_k() -> usize {
    DEFAULT_TOP_K
}

/// A ranked search result
#[derive(Debug, Serialize, ToSchema)]
pub struct SearchResultItem {
    pub id: String,

    #[schema(value_type = Object)]
    pub metadata: Metadata,

    pub document: Option<String>,

    /// Cosine distance, lower is closer
    pub distance: Option<f32>,
}

impl From<SearchHit> for SearchResultItem {
    fn from(hit: SearchHit) -> Self {
        Self {
            id: hit.id,
            metadata: hit.metadata,
            document: hit.document,
            distance: hit.distance,
        }
    }
}

/// Search response
#[derive(Debug, Serialize, ToSchema)]
pub struct SearchResponse {
    /// Results in ascending distance
    pub results: Vec<SearchResultItem>,

    #[schema(example = "success")]
    pub status: String,
}

/// Semantic search over the collection
#[utoipa::path(
    post,
    path = "/search",
    tag = "search",
    request_body = SearchRequest,
    responses(
        (status = 200, description = "Nearest records", body = SearchResponse),
        (status = 500, description = "Search failed", body = crate::error::ApiError)
    )
)]
pub async fn search(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<SearchRequest>, JsonRejection>,
) -> Result<Json<SearchResponse>, AppError> {
    let Json(request) = payload?;

    let _guard = state.collection_lock.read().await;
    let hits = state.pipeline.search(&request.query, request.top_k).await?;

    Ok(Json(SearchResponse {
        results: hits.into_iter().map(SearchResultItem::from).collect(),
        status: "success".to_string(),
    }))
}
