//! docsearch API - HTTP search service
//!
//! Exposes ingestion, search, record management and statistics over the
//! document collection. Interactive documentation is served at
//! `/swagger-ui` with the OpenAPI document at `/api-docs/openapi.json`.
//!
//! Author: hephaex@gmail.com

pub mod error;
pub mod handlers;
pub mod state;

use axum::{
    http::HeaderValue,
    routing::{delete, get, post},
    Router,
};
use handlers::{documents, health, search, stats};
use state::AppState;
use std::sync::Arc;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// OpenAPI document for every route
#[derive(OpenApi)]
#[openapi(
    info(
        title = "docsearch API",
        description = "PDF ingestion and semantic search over a Chroma collection"
    ),
    paths(
        health::health_check,
        health::probe,
        documents::load_data,
        documents::add_file,
        documents::delete_file,
        search::search,
        stats::database_stats,
    ),
    components(schemas(
        health::HealthResponse,
        health::ProbeResponse,
        documents::MessageResponse,
        documents::LoadDataResponse,
        documents::AddFileRequest,
        search::SearchRequest,
        search::SearchResponse,
        search::SearchResultItem,
        stats::StatsResponse,
        error::ApiError,
    )),
    tags(
        (name = "health", description = "Liveness checks"),
        (name = "documents", description = "Ingestion and record management"),
        (name = "search", description = "Semantic search")
    )
)]
pub struct ApiDoc;

/// Build the application router
pub fn create_router(state: Arc<AppState>) -> Router {
    let mut router = Router::new()
        .route("/", get(health::health_check))
        .route("/test", get(health::probe))
        .route("/load-data", post(documents::load_data))
        .route("/add-file", post(documents::add_file))
        .route("/delete-file/:resource_id", delete(documents::delete_file))
        .route("/search", post(search::search))
        .route("/database-stats", get(stats::database_stats))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http());

    if let Some(cors) = cors_layer(&state.config.server.cors_origins) {
        router = router.layer(cors);
    }

    router.with_state(state)
}

/// CORS layer for the configured origins; `*` allows any origin
fn cors_layer(origins: &[String]) -> Option<CorsLayer> {
    if origins.is_empty() {
        return None;
    }

    let allow_origin = if origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        let values: Vec<HeaderValue> = origins
            .iter()
            .filter_map(|origin| match origin.parse::<HeaderValue>() {
                Ok(value) => Some(value),
                Err(_) => {
                    tracing::warn!("Ignoring invalid CORS origin: {}", origin);
                    None
                }
            })
            .collect();
        AllowOrigin::list(values)
    };

    Some(
        CorsLayer::new()
            .allow_origin(allow_origin)
            .allow_methods(Any)
            .allow_headers(Any),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cors_disabled_without_origins() {
        assert!(cors_layer(&[]).is_none());
        assert!(cors_layer(&["*".to_string()]).is_some());
        assert!(cors_layer(&["http://localhost:3000".to_string()]).is_some());
    }

    #[test]
    fn test_openapi_lists_routes() {
        let doc = ApiDoc::openapi();
        for path in [
            "/",
            "/test",
            "/load-data",
            "/add-file",
            "/delete-file/{resource_id}",
            "/search",
            "/database-stats",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }

    #[test]
    fn test_add_file_schema_matches_record() {
        let doc = serde_json::to_value(ApiDoc::openapi()).unwrap();
        let schema = &doc["components"]["schemas"]["AddFileRequest"];

        assert_eq!(schema["required"], serde_json::json!(["resource_id"]));
        assert_eq!(schema["additionalProperties"], true);
        for field in ["about", "skills", "tags"] {
            let variants = schema["properties"][field]["oneOf"].as_array().unwrap();
            assert_eq!(variants.len(), 2, "{field}");
            assert_eq!(variants[1]["type"], "array");
        }

        let body = &doc["paths"]["/add-file"]["post"]["requestBody"]["content"]["application/json"];
        assert_eq!(
            body["schema"]["$ref"],
            "#/components/schemas/AddFileRequest"
        );
    }
}
