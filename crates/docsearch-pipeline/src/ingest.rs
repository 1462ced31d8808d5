//! Directory ingestion
//!
//! A run is destructive: the collection is dropped and recreated before the
//! directory is read, and records are then written in fixed-size batches
//! with no rollback if a later batch fails.

use docsearch_core::{
    document_id_from_stem, DocsearchError, DocumentMetadata, Metadata, Result, COLLECTION_NAME,
};
use docsearch_parser::{extract_text_or_empty, is_pdf_path};
use docsearch_vector::RecordBatch;
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

use crate::DocumentPipeline;

// ============================================================================
// Results
// ============================================================================

/// Outcome of a successful ingestion run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    /// PDF files found in the directory
    pub files_processed: usize,

    /// Records written to the store
    pub documents_loaded: usize,

    /// Files skipped for empty text or a clashing id
    pub skipped_files: Vec<String>,
}

/// State of the ingestion directory, reported when a run fails
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirectoryDiagnostics {
    /// Absolute path of the directory
    pub pdf_dir: String,

    pub exists: bool,

    /// Entry names, sorted; empty when the directory cannot be read
    pub files_in_directory: Vec<String>,
}

impl DirectoryDiagnostics {
    /// Inspect `dir` without failing
    pub fn collect(dir: &Path) -> Self {
        let absolute = if dir.is_absolute() {
            dir.to_path_buf()
        } else {
            std::env::current_dir()
                .map(|cwd| cwd.join(dir))
                .unwrap_or_else(|_| dir.to_path_buf())
        };

        let mut files_in_directory: Vec<String> = std::fs::read_dir(dir)
            .map(|entries| {
                entries
                    .filter_map(|entry| entry.ok())
                    .map(|entry| entry.file_name().to_string_lossy().into_owned())
                    .collect()
            })
            .unwrap_or_default();
        files_in_directory.sort();

        Self {
            pdf_dir: absolute.display().to_string(),
            exists: dir.exists(),
            files_in_directory,
        }
    }
}

/// A failed ingestion run with the directory state at the time
#[derive(Debug, Error)]
#[error("{source}")]
pub struct IngestError {
    #[source]
    pub source: DocsearchError,
    pub diagnostics: DirectoryDiagnostics,
}

/// A file whose text survived extraction, ready to embed
struct PendingDocument {
    id: String,
    text: String,
    metadata: Metadata,
}

// ============================================================================
// Ingestion
// ============================================================================

impl DocumentPipeline {
    /// Rebuild the collection from the configured PDF directory
    pub async fn load_directory(&self) -> std::result::Result<IngestReport, IngestError> {
        self.load_from(&self.config.pdf_dir).await
    }

    /// Rebuild the collection from the PDFs in `dir`
    pub async fn load_from(&self, dir: &Path) -> std::result::Result<IngestReport, IngestError> {
        match self.run_ingest(dir).await {
            Ok(report) => Ok(report),
            Err(source) => {
                let diagnostics = DirectoryDiagnostics::collect(dir);
                tracing::error!(
                    pdf_dir = %diagnostics.pdf_dir,
                    exists = diagnostics.exists,
                    error = %source,
                    "Ingestion failed"
                );
                Err(IngestError {
                    source,
                    diagnostics,
                })
            }
        }
    }

    async fn run_ingest(&self, dir: &Path) -> Result<IngestReport> {
        self.store.delete_collection(COLLECTION_NAME).await?;
        let collection = self.store.create_collection(COLLECTION_NAME).await?;

        let files = list_pdf_files(dir)?;
        tracing::info!("Found {} PDF files in {}", files.len(), dir.display());

        let mut report = IngestReport {
            files_processed: files.len(),
            ..Default::default()
        };

        let extracted = self.extract_all(files).await?;
        let pending = self.prepare_documents(extracted, &mut report);

        if pending.is_empty() {
            tracing::info!("No documents with extractable text");
            return Ok(report);
        }

        let texts: Vec<String> = pending.iter().map(|doc| doc.text.clone()).collect();
        let embeddings = self.embedder.embed_batch(&texts).await?;
        if embeddings.len() != pending.len() {
            return Err(DocsearchError::EmbeddingError(format!(
                "Expected {} embeddings, got {}",
                pending.len(),
                embeddings.len()
            )));
        }

        let batch_size = self.config.batch_size.max(1);
        let mut rows = pending.into_iter().zip(embeddings);

        loop {
            let mut ids = Vec::with_capacity(batch_size);
            let mut documents = Vec::with_capacity(batch_size);
            let mut metadatas = Vec::with_capacity(batch_size);
            let mut vectors = Vec::with_capacity(batch_size);

            for (doc, embedding) in rows.by_ref().take(batch_size) {
                ids.push(doc.id);
                documents.push(doc.text);
                metadatas.push(doc.metadata);
                vectors.push(embedding);
            }

            if ids.is_empty() {
                break;
            }

            let batch = RecordBatch::new(ids, documents, metadatas, vectors)?;
            let written = batch.len();
            self.store.add(&collection, batch).await?;

            report.documents_loaded += written;
            tracing::debug!("Wrote batch of {} ({} total)", written, report.documents_loaded);
        }

        tracing::info!(
            "Loaded {} of {} documents",
            report.documents_loaded,
            report.files_processed
        );
        Ok(report)
    }

    /// Extract text from every file on the blocking pool
    async fn extract_all(&self, files: Vec<PathBuf>) -> Result<Vec<(PathBuf, String)>> {
        let parser = Arc::clone(&self.parser);

        tokio::task::spawn_blocking(move || {
            files
                .into_iter()
                .map(|path| {
                    let text = extract_text_or_empty(parser.as_ref(), &path);
                    (path, text)
                })
                .collect()
        })
        .await
        .map_err(|e| DocsearchError::Other(anyhow::anyhow!("Extraction task failed: {e}")))
    }

    /// Drop empty texts and clashing ids, build metadata for the rest
    fn prepare_documents(
        &self,
        extracted: Vec<(PathBuf, String)>,
        report: &mut IngestReport,
    ) -> Vec<PendingDocument> {
        let mut seen = HashSet::new();
        let mut pending = Vec::with_capacity(extracted.len());

        for (path, text) in extracted {
            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();

            if text.is_empty() {
                tracing::warn!("No text extracted from {}, skipping", file_name);
                report.skipped_files.push(file_name);
                continue;
            }

            let stem = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            let id = document_id_from_stem(&stem);

            if !seen.insert(id.clone()) {
                tracing::warn!("{} maps to existing id {}, skipping", file_name, id);
                report.skipped_files.push(file_name);
                continue;
            }

            let metadata = DocumentMetadata {
                file_name,
                title: stem,
                file_path: path.display().to_string(),
                doc_type: self.config.document_type.clone(),
            }
            .into_metadata();

            pending.push(PendingDocument { id, text, metadata });
        }

        pending
    }
}

/// PDF files directly inside `dir`, sorted by name
fn list_pdf_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir).map_err(|e| DocsearchError::IoError {
        path: dir.display().to_string(),
        source: e,
    })?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| DocsearchError::IoError {
            path: dir.display().to_string(),
            source: e,
        })?;
        let path = entry.path();
        if path.is_file() && is_pdf_path(&path) {
            files.push(path);
        }
    }

    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}
