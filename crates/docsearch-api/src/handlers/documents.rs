//! Document management handlers
//!
//! Author: hephaex@gmail.com

use crate::error::AppError;
use crate::state::AppState;
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};
use docsearch_core::ResourceRecord;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use utoipa::openapi::schema::{AdditionalProperties, SchemaType};
use utoipa::openapi::{ArrayBuilder, ObjectBuilder, OneOfBuilder, RefOr, Schema};
use utoipa::ToSchema;

/// Generic success response
#[derive(Debug, Serialize, ToSchema)]
pub struct MessageResponse {
    #[schema(example = "Document added successfully")]
    pub message: String,

    #[schema(example = "success")]
    pub status: String,
}

impl MessageResponse {
    fn success(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: "success".to_string(),
        }
    }
}

/// Ingestion result
#[derive(Debug, Serialize, ToSchema)]
pub struct LoadDataResponse {
    #[schema(example = "Data loaded successfully")]
    pub message: String,

    /// PDF files found in the directory
    #[schema(example = 12)]
    pub files_processed: usize,

    /// Records written to the collection
    #[schema(example = 11)]
    pub documents_loaded: usize,

    #[schema(example = "success")]
    pub status: String,
}

/// Body of `/add-file`, deserialized straight into a [`ResourceRecord`].
///
/// The schema is written by hand because the record accepts either a
/// string or a list of strings for its text fields, and keeps any other
/// fields as metadata.
#[derive(Debug, Deserialize)]
#[serde(transparent)]
pub struct AddFileRequest(pub ResourceRecord);

impl<'s> ToSchema<'s> for AddFileRequest {
    fn schema() -> (&'s str, RefOr<Schema>) {
        let text_or_list = |example: &str| {
            OneOfBuilder::new()
                .item(ObjectBuilder::new().schema_type(SchemaType::String))
                .item(
                    ArrayBuilder::new()
                        .items(ObjectBuilder::new().schema_type(SchemaType::String)),
                )
                .example(Some(json!(example)))
        };

        let schema = ObjectBuilder::new()
            .description(Some(
                "A resource record. Lists are joined with \", \" and other fields are stored as metadata.",
            ))
            .property(
                "resource_id",
                ObjectBuilder::new()
                    .schema_type(SchemaType::String)
                    .example(Some(json!("attorney-042"))),
            )
            .required("resource_id")
            .property("about", text_or_list("Housing attorney in Oakland"))
            .property("skills", text_or_list("eviction defense, lease review"))
            .property("tags", text_or_list("housing, tenants"))
            .additional_properties(Some(AdditionalProperties::FreeForm(true)));

        ("AddFileRequest", schema.into())
    }
}

/// Rebuild the collection from the PDF directory
#[utoipa::path(
    post,
    path = "/load-data",
    tag = "documents",
    responses(
        (status = 200, description = "Documents ingested", body = LoadDataResponse),
        (status = 500, description = "Ingestion failed, with directory diagnostics", body = crate::error::ApiError)
    )
)]
pub async fn load_data(
    State(state): State<Arc<AppState>>,
) -> Result<Json<LoadDataResponse>, AppError> {
    let _guard = state.collection_lock.write().await;

    tracing::info!(
        "Loading documents from {}",
        state.pipeline.config().pdf_dir.display()
    );
    let report = state.pipeline.load_directory().await?;

    Ok(Json(LoadDataResponse {
        message: "Data loaded successfully".to_string(),
        files_processed: report.files_processed,
        documents_loaded: report.documents_loaded,
        status: "success".to_string(),
    }))
}

/// Add a single resource record
#[utoipa::path(
    post,
    path = "/add-file",
    tag = "documents",
    request_body = AddFileRequest,
    responses(
        (status = 200, description = "Record added", body = MessageResponse),
        (status = 500, description = "Invalid body, duplicate id or missing collection", body = crate::error::ApiError)
    )
)]
pub async fn add_file(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<AddFileRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, AppError> {
    let Json(AddFileRequest(record)) = payload?;

    let _guard = state.collection_lock.write().await;
    state.pipeline.add_resource(record).await?;

    Ok(Json(MessageResponse::success("Document added successfully")))
}

/// Delete a record by id
#[utoipa::path(
    delete,
    path = "/delete-file/{resource_id}",
    tag = "documents",
    params(
        ("resource_id" = String, Path, description = "Record identifier")
    ),
    responses(
        (status = 200, description = "Record deleted (or never existed)", body = MessageResponse),
        (status = 500, description = "Missing collection", body = crate::error::ApiError)
    )
)]
pub async fn delete_file(
    State(state): State<Arc<AppState>>,
    Path(resource_id): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    let _guard = state.collection_lock.read().await;
    state.pipeline.delete_record(&resource_id).await?;

    Ok(Json(MessageResponse::success(format!(
        "Resource {resource_id} deleted successfully"
    ))))
}
