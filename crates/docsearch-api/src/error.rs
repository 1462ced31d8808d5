//! API error handling
//!
//! Every failure is answered with HTTP 500 and the same JSON envelope,
//! `{"error": ..., "status": "error"}`, plus `details` when there is
//! something more to report.
//!
//! Author: hephaex@gmail.com

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use docsearch_core::DocsearchError;
use docsearch_pipeline::{DirectoryDiagnostics, IngestError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

/// API error response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    /// Human-readable message
    #[schema(example = "Collection document_logs does not exist")]
    pub error: String,

    /// Always `"error"`
    #[schema(example = "error")]
    pub status: String,

    /// Additional details
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub details: Option<Value>,
}

impl ApiError {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            status: "error".to_string(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }
}

/// Application error type
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{message}")]
    Ingest {
        message: String,
        diagnostics: DirectoryDiagnostics,
    },

    #[error("Vector store error: {0}")]
    Store(String),

    #[error("{0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        tracing::error!("Request failed: {}", self);

        let error = match self {
            AppError::Ingest {
                message,
                diagnostics,
            } => {
                let details = serde_json::to_value(&diagnostics).unwrap_or(Value::Null);
                ApiError::new(message).with_details(details)
            }
            other => ApiError::new(other.to_string()),
        };

        (StatusCode::INTERNAL_SERVER_ERROR, Json(error)).into_response()
    }
}

impl From<DocsearchError> for AppError {
    fn from(err: DocsearchError) -> Self {
        match err {
            DocsearchError::NotFound(msg) => AppError::NotFound(msg),
            DocsearchError::AlreadyExists(msg) => AppError::Conflict(msg),
            DocsearchError::ValidationError(msg) => AppError::BadRequest(msg),
            DocsearchError::StoreError(msg) => AppError::Store(msg),
            other => AppError::Internal(other.to_string()),
        }
    }
}

impl From<IngestError> for AppError {
    fn from(err: IngestError) -> Self {
        AppError::Ingest {
            message: err.source.to_string(),
            diagnostics: err.diagnostics,
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(response: Response) -> Value {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_every_error_is_500_envelope() {
        let errors = vec![
            AppError::BadRequest("missing field".to_string()),
            AppError::NotFound("Collection document_logs does not exist".to_string()),
            AppError::Conflict("Resource r1 already exists".to_string()),
            AppError::Store("connection refused".to_string()),
        ];

        for error in errors {
            let response = error.into_response();
            assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

            let json = body_json(response).await;
            assert_eq!(json["status"], "error");
            assert!(json["error"].is_string());
            assert!(json.get("details").is_none());
        }
    }

    #[tokio::test]
    async fn test_ingest_error_carries_diagnostics() {
        let error = AppError::Ingest {
            message: "IO error".to_string(),
            diagnostics: DirectoryDiagnostics {
                pdf_dir: "/srv/Resources".to_string(),
                exists: false,
                files_in_directory: vec![],
            },
        };

        let json = body_json(error.into_response()).await;
        assert_eq!(json["details"]["pdf_dir"], "/srv/Resources");
        assert_eq!(json["details"]["exists"], false);
        assert_eq!(json["details"]["files_in_directory"], serde_json::json!([]));
    }

    #[test]
    fn test_core_error_mapping() {
        let err: AppError = DocsearchError::AlreadyExists("Resource r1 already exists".into()).into();
        assert!(matches!(err, AppError::Conflict(_)));
        assert_eq!(err.to_string(), "Resource r1 already exists");
    }
}
