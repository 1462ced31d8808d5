//! docsearch CLI - Command-line interface
//!
//! Usage:
//!   docsearch load [--dir <path>]
//!   docsearch search <query> [--top-k N]
//!   docsearch add --id <id> [--about ..] [--skills ..] [--tags ..]
//!   docsearch delete <id>
//!   docsearch stats
//!   docsearch health

use anyhow::Context;
use clap::{Parser, Subcommand};
use docsearch_core::{AppConfig, ResourceRecord, SearchHit, DEFAULT_TOP_K};
use docsearch_parser::PdfParser;
use docsearch_pipeline::DocumentPipeline;
use docsearch_vector::{create_embedding_client, wait_for_store, ChromaStore, VectorStore};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "docsearch")]
#[command(about = "PDF ingestion and semantic search over Chroma")]
#[command(version)]
struct Cli {
    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rebuild the collection from a directory of PDFs
    Load {
        /// Directory to read instead of the configured one
        #[arg(long)]
        dir: Option<PathBuf>,
    },
    /// Search the collection
    Search {
        /// Text to search for
        query: String,

        /// Number of results
        #[arg(long, default_value_t = DEFAULT_TOP_K)]
        top_k: usize,
    },
    /// Add a single resource record
    Add {
        #[arg(long)]
        id: String,
        #[arg(long, default_value = "")]
        about: String,
        #[arg(long, default_value = "")]
        skills: String,
        #[arg(long, default_value = "")]
        tags: String,
    },
    /// Delete a record by id
    Delete { id: String },
    /// Show collection statistics
    Stats,
    /// Check vector store connectivity
    Health,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let store = Arc::new(ChromaStore::new(&config.chroma)?);

    if let Commands::Health = cli.command {
        let connected = store.heartbeat().await.is_ok();
        let status = if connected { "connected" } else { "disconnected" };
        if cli.json {
            println!("{}", serde_json::json!({ "chroma_status": status }));
        } else {
            println!("Chroma at {}: {}", config.chroma.base_url(), status);
        }
        return Ok(());
    }

    tracing::info!("Connecting to Chroma at {}", config.chroma.base_url());
    wait_for_store(
        store.as_ref(),
        config.chroma.connect_attempts,
        config.chroma.retry_delay(),
    )
    .await?;

    let embedding_config = config.embedding.clone();
    let embedder = tokio::task::spawn_blocking(move || create_embedding_client(&embedding_config))
        .await??;

    let pipeline = DocumentPipeline::new(
        store,
        embedder,
        Arc::new(PdfParser::new()),
        config.ingest.clone(),
    );

    match cli.command {
        Commands::Load { dir } => {
            let dir = dir.unwrap_or_else(|| config.ingest.pdf_dir.clone());
            println!("Loading PDFs from: {}", dir.display());

            let report = match pipeline.load_from(&dir).await {
                Ok(report) => report,
                Err(e) => {
                    eprintln!("Directory: {}", e.diagnostics.pdf_dir);
                    eprintln!("Exists: {}", e.diagnostics.exists);
                    eprintln!("Files: {:?}", e.diagnostics.files_in_directory);
                    return Err(e).context("Ingestion failed");
                }
            };

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!(
                    "Processed {} files, loaded {} documents",
                    report.files_processed, report.documents_loaded
                );
                for file in &report.skipped_files {
                    println!("  skipped: {}", file);
                }
            }
        }
        Commands::Search { query, top_k } => {
            let hits = pipeline.search(&query, top_k).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&hits)?);
            } else {
                print_hits(&hits);
            }
        }
        Commands::Add {
            id,
            about,
            skills,
            tags,
        } => {
            let record = ResourceRecord::new(id.clone())
                .with_about(about)
                .with_skills(skills)
                .with_tags(tags);
            pipeline.add_resource(record).await?;
            println!("Added resource {}", id);
        }
        Commands::Delete { id } => {
            pipeline.delete_record(&id).await?;
            println!("Deleted resource {}", id);
        }
        Commands::Stats => {
            let stats = pipeline.stats().await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                println!("{}: {} rows", stats.collection_name, stats.total_rows);
            }
        }
        Commands::Health => {}
    }

    Ok(())
}

fn print_hits(hits: &[SearchHit]) {
    if hits.is_empty() {
        println!("No results");
        return;
    }

    for (rank, hit) in hits.iter().enumerate() {
        let distance = hit
            .distance
            .map(|d| format!("{d:.4}"))
            .unwrap_or_else(|| "-".to_string());
        println!("{}. {} (distance {})", rank + 1, hit.id, distance);

        if let Some(title) = hit.metadata.get("title").and_then(|t| t.as_str()) {
            println!("   {}", title);
        }
        if let Some(document) = &hit.document {
            let snippet: String = document.chars().take(120).collect();
            println!("   {}", snippet.replace('\n', " "));
        }
    }
}
