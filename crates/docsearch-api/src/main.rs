//! docsearch API Server
//!
//! Waits for the vector store, loads the embedding model and serves the
//! HTTP API. Either dependency failing at startup is fatal.
//!
//! Author: hephaex@gmail.com

use docsearch_api::{create_router, state::AppState};
use docsearch_core::{AppConfig, LoggingConfig};
use docsearch_parser::PdfParser;
use docsearch_pipeline::DocumentPipeline;
use docsearch_vector::{create_embedding_client, wait_for_store, ChromaStore};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

fn init_tracing(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{},tower_http=debug", config.level)));

    if config.json_format {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = AppConfig::load()?;
    init_tracing(&config.logging);

    // Vector store
    let store = Arc::new(ChromaStore::new(&config.chroma)?);
    tracing::info!("Connecting to Chroma at {}", config.chroma.base_url());
    wait_for_store(
        store.as_ref(),
        config.chroma.connect_attempts,
        config.chroma.retry_delay(),
    )
    .await?;

    // Embedding model
    let embedding_config = config.embedding.clone();
    let embedder =
        tokio::task::spawn_blocking(move || create_embedding_client(&embedding_config)).await??;
    tracing::info!("Embedding model ready: {}", embedder.model_name());

    let pipeline = DocumentPipeline::new(
        store,
        embedder,
        Arc::new(PdfParser::new()),
        config.ingest.clone(),
    );

    let addr = config.server.bind_addr();
    let state = Arc::new(AppState::new(config, pipeline));
    let app = create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("docsearch API starting on http://{}", addr);
    tracing::info!("Swagger UI available at http://{}/swagger-ui/", addr);
    tracing::info!("OpenAPI spec at http://{}/api-docs/openapi.json", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
