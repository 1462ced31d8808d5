//! docsearch Core - Shared models, configuration and error types
//!
//! This crate defines the types used across the docsearch workspace:
//! - Common error type and `Result` alias
//! - Record metadata for ingested PDFs and ad hoc resources
//! - Search and statistics result shapes
//! - Configuration management
//!
//! Author: hephaex@gmail.com

pub mod config;

pub use config::{
    AppConfig, ChromaConfig, ConfigError, EmbeddingConfig, EmbeddingProvider, IngestConfig,
    LoggingConfig, ServerConfig,
};

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Name of the single collection every deployment works against
pub const COLLECTION_NAME: &str = "document_logs";

/// Default number of search results
pub const DEFAULT_TOP_K: usize = 5;

/// Flat metadata map attached to a stored record
pub type Metadata = serde_json::Map<String, Value>;

// ============================================================================
// Error Types
// ============================================================================

/// Core error types for docsearch operations
#[derive(Error, Debug)]
pub enum DocsearchError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Vector store error: {0}")]
    StoreError(String),

    #[error("Embedding error: {0}")]
    EmbeddingError(String),

    #[error("IO error at {path}: {source}")]
    IoError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, DocsearchError>;

// ============================================================================
// Document Records
// ============================================================================

/// Metadata stored with every PDF-derived record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    /// Original file name including extension
    pub file_name: String,

    /// File stem, used as a human readable title
    pub title: String,

    /// Path the file was read from
    pub file_path: String,

    /// Fixed document category tag
    #[serde(rename = "type")]
    pub doc_type: String,
}

impl DocumentMetadata {
    /// Convert into the flat map the vector store expects
    pub fn into_metadata(self) -> Metadata {
        let mut map = Metadata::new();
        map.insert("file_name".to_string(), Value::String(self.file_name));
        map.insert("title".to_string(), Value::String(self.title));
        map.insert("file_path".to_string(), Value::String(self.file_path));
        map.insert("type".to_string(), Value::String(self.doc_type));
        map
    }
}

/// Derive a record identifier from a file stem.
///
/// Spaces become underscores and the result is lowercased, so
/// `"Tenant Rights FAQ"` maps to `"tenant_rights_faq"`.
pub fn document_id_from_stem(stem: &str) -> String {
    stem.replace(' ', "_").to_lowercase()
}

// ============================================================================
// Resource Records
// ============================================================================

/// An ad hoc record added through the API rather than ingested from disk
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourceRecord {
    /// Caller supplied identifier
    pub resource_id: String,

    #[serde(default, deserialize_with = "string_or_list")]
    pub about: String,

    #[serde(default, deserialize_with = "string_or_list")]
    pub skills: String,

    #[serde(default, deserialize_with = "string_or_list")]
    pub tags: String,

    /// Any other fields sent by the caller
    #[serde(flatten)]
    pub extra: Metadata,
}

impl ResourceRecord {
    /// Create a record with only an identifier
    pub fn new(resource_id: impl Into<String>) -> Self {
        Self {
            resource_id: resource_id.into(),
            ..Default::default()
        }
    }

    pub fn with_about(mut self, about: impl Into<String>) -> Self {
        self.about = about.into();
        self
    }

    pub fn with_skills(mut self, skills: impl Into<String>) -> Self {
        self.skills = skills.into();
        self
    }

    pub fn with_tags(mut self, tags: impl Into<String>) -> Self {
        self.tags = tags.into();
        self
    }

    /// Text that gets embedded and stored as the record's document
    pub fn composed_text(&self) -> String {
        format!("{} {} {}", self.about, self.skills, self.tags)
            .trim()
            .to_string()
    }

    /// Check the record can be stored
    pub fn validate(&self) -> Result<()> {
        if self.resource_id.trim().is_empty() {
            return Err(DocsearchError::ValidationError(
                "resource_id cannot be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Flatten the record into store metadata.
    ///
    /// The store only accepts scalar values: nulls are dropped and nested
    /// arrays or objects are stored as their JSON text.
    pub fn to_metadata(&self) -> Metadata {
        let mut map = Metadata::new();

        for (key, value) in &self.extra {
            match value {
                Value::Null => {}
                Value::Array(_) | Value::Object(_) => {
                    map.insert(key.clone(), Value::String(value.to_string()));
                }
                scalar => {
                    map.insert(key.clone(), scalar.clone());
                }
            }
        }

        map.insert(
            "resource_id".to_string(),
            Value::String(self.resource_id.clone()),
        );
        map.insert("about".to_string(), Value::String(self.about.clone()));
        map.insert("skills".to_string(), Value::String(self.skills.clone()));
        map.insert("tags".to_string(), Value::String(self.tags.clone()));
        map
    }
}

/// Accept either a string or a list of strings (joined with ", ")
fn string_or_list<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrList {
        One(String),
        Many(Vec<String>),
        Missing(()),
    }

    Ok(match StringOrList::deserialize(deserializer)? {
        StringOrList::One(s) => s,
        StringOrList::Many(items) => items.join(", "),
        StringOrList::Missing(()) => String::new(),
    })
}

// ============================================================================
// Query Results
// ============================================================================

/// A single ranked search result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: String,
    pub metadata: Metadata,
    pub document: Option<String>,
    /// Cosine distance to the query, lower is closer
    pub distance: Option<f32>,
}

/// Collection statistics
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionStats {
    pub total_rows: usize,
    pub collection_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_document_id_from_stem() {
        assert_eq!(document_id_from_stem("Tenant Rights FAQ"), "tenant_rights_faq");
        assert_eq!(document_id_from_stem("already_lower"), "already_lower");
        assert_eq!(document_id_from_stem("Two  Spaces"), "two__spaces");
    }

    #[test]
    fn test_document_metadata_uses_type_key() {
        let metadata = DocumentMetadata {
            file_name: "Lease Guide.pdf".to_string(),
            title: "Lease Guide".to_string(),
            file_path: "Resources/Lease Guide.pdf".to_string(),
            doc_type: "legal_faq".to_string(),
        }
        .into_metadata();

        assert_eq!(metadata["type"], "legal_faq");
        assert_eq!(metadata["title"], "Lease Guide");
        assert_eq!(metadata.len(), 4);
    }

    #[test]
    fn test_resource_composed_text() {
        let record = ResourceRecord::new("r1")
            .with_about("Housing lawyer")
            .with_skills("eviction defence")
            .with_tags("tenants");
        assert_eq!(
            record.composed_text(),
            "Housing lawyer eviction defence tenants"
        );

        let sparse = ResourceRecord::new("r2").with_tags("only tags");
        assert_eq!(sparse.composed_text(), "only tags");
    }

    #[test]
    fn test_resource_deserialize_lists_and_extras() {
        let record: ResourceRecord = serde_json::from_value(json!({
            "resource_id": "clinic-7",
            "about": "Free legal clinic",
            "tags": ["housing", "immigration"],
            "rating": 4.5,
            "address": {"city": "Toronto"},
            "note": null
        }))
        .unwrap();

        assert_eq!(record.tags, "housing, immigration");
        assert_eq!(record.skills, "");

        let metadata = record.to_metadata();
        assert_eq!(metadata["resource_id"], "clinic-7");
        assert_eq!(metadata["rating"], 4.5);
        assert_eq!(metadata["address"], r#"{"city":"Toronto"}"#);
        assert!(!metadata.contains_key("note"));
    }

    #[test]
    fn test_resource_validation() {
        assert!(ResourceRecord::new("ok").validate().is_ok());
        assert!(ResourceRecord::new("   ").validate().is_err());
    }

    #[test]
    fn test_resource_requires_id() {
        let result: std::result::Result<ResourceRecord, _> =
            serde_json::from_value(json!({"about": "no id"}));
        assert!(result.is_err());
    }
}
