//! Collection statistics handler
//!
//! Author: hephaex@gmail.com

use crate::error::AppError;
use crate::state::AppState;
use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;

/// Collection statistics
#[derive(Debug, Serialize, ToSchema)]
pub struct StatsResponse {
    /// Number of stored records
    #[schema(example = 42)]
    pub total_rows: usize,

    #[schema(example = "document_logs")]
    pub collection_name: String,

    #[schema(example = "success")]
    pub status: String,
}

#[utoipa::path(
    get,
    path = "/database-stats",
    tag = "documents",
    responses(
        (status = 200, description = "Collection statistics", body = StatsResponse),
        (status = 500, description = "Missing collection or store failure", body = crate::error::ApiError)
    )
)]
pub async fn database_stats(
    State(state): State<Arc<AppState>>,
) -> Result<Json<StatsResponse>, AppError> {
    let _guard = state.collection_lock.read().await;
    let stats = state.pipeline.stats().await?;

    Ok(Json(StatsResponse {
        total_rows: stats.total_rows,
        collection_name: stats.collection_name,
        status: "success".to_string(),
    }))
}
