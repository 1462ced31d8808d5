//! docsearch Configuration Management
//!
//! Handles configuration from an optional TOML file and environment
//! variables, with defaults that match a local development setup
//! (Chroma on `localhost:8000`, PDFs under `./Resources`).

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Environment variable naming an optional TOML config file
pub const CONFIG_PATH_ENV: &str = "DOCSEARCH_CONFIG";

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// HTTP server configuration
    pub server: ServerConfig,

    /// Chroma connection
    pub chroma: ChromaConfig,

    /// Embedding model configuration
    pub embedding: EmbeddingConfig,

    /// PDF ingestion configuration
    pub ingest: IngestConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load the config file named by `DOCSEARCH_CONFIG` (if any), then
    /// apply environment overrides and validate.
    pub fn load() -> Result<Self, ConfigError> {
        let base = match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) => Self::from_file(path)?,
            Err(_) => Self::default(),
        };

        let config = base.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::FileReadError {
            path: path.clone(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path,
            message: e.to_string(),
        })
    }

    /// Override values from a variable lookup (env takes precedence over file)
    pub fn apply_env<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Server
        if let Some(host) = lookup("API_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("API_PORT") {
            self.server.port = parse_value("API_PORT", port)?;
        }
        if let Some(origins) = lookup("CORS_ORIGINS") {
            self.server.cors_origins = origins
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        // Chroma
        if let Some(host) = lookup("CHROMA_HOST") {
            self.chroma.host = host;
        }
        if let Some(port) = lookup("CHROMA_PORT") {
            self.chroma.port = parse_value("CHROMA_PORT", port)?;
        }
        if let Some(tenant) = lookup("CHROMA_TENANT") {
            self.chroma.tenant = tenant;
        }
        if let Some(database) = lookup("CHROMA_DATABASE") {
            self.chroma.database = database;
        }

        // Embedding
        if let Some(provider) = lookup("EMBEDDING_PROVIDER") {
            self.embedding.provider = provider.parse()?;
        }
        if let Some(model) = lookup("EMBEDDING_MODEL") {
            self.embedding.model = model;
        }
        if let Some(url) = lookup("OLLAMA_URL") {
            self.embedding.ollama_url = url;
        }

        // Ingestion
        if let Some(dir) = lookup("PDF_DIR") {
            self.ingest.pdf_dir = PathBuf::from(dir);
        }

        // Logging
        if let Some(level) = lookup("LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = lookup("LOG_FORMAT") {
            self.logging.json_format = format.eq_ignore_ascii_case("json");
        }

        Ok(self)
    }

    /// Reject settings that would make the service misbehave at runtime
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ingest.batch_size == 0 {
            return Err(ConfigError::InvalidValue {
                key: "ingest.batch_size".to_string(),
                value: "0".to_string(),
            });
        }
        if self.chroma.connect_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                key: "chroma.connect_attempts".to_string(),
                value: "0".to_string(),
            });
        }
        Ok(())
    }
}

fn parse_value<T: std::str::FromStr>(key: &str, value: String) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value,
    })
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Allowed origins for CORS (empty disables CORS)
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            cors_origins: vec![],
        }
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Chroma connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChromaConfig {
    pub host: String,
    pub port: u16,
    pub tenant: String,
    pub database: String,

    /// Heartbeat attempts before startup gives up
    pub connect_attempts: u32,

    /// Delay between heartbeat attempts in milliseconds
    pub connect_retry_delay_ms: u64,

    /// Per-request HTTP timeout in seconds
    pub request_timeout_secs: u64,
}

impl Default for ChromaConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 8000,
            tenant: "default_tenant".to_string(),
            database: "default_database".to_string(),
            connect_attempts: 30,
            connect_retry_delay_ms: 1000,
            request_timeout_secs: 60,
        }
    }
}

impl ChromaConfig {
    /// Base URL of the Chroma server
    pub fn base_url(&self) -> String {
        if self.host.starts_with("http://") || self.host.starts_with("https://") {
            format!("{}:{}", self.host.trim_end_matches('/'), self.port)
        } else {
            format!("http://{}:{}", self.host, self.port)
        }
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.connect_retry_delay_ms)
    }
}

/// Embedding model configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Embedding backend
    pub provider: EmbeddingProvider,

    /// Model identifier
    pub model: String,

    /// Ollama server URL (ollama provider only)
    pub ollama_url: String,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProvider::Local,
            model: "sentence-transformers/all-MiniLM-L6-v2".to_string(),
            ollama_url: "http://localhost:11434".to_string(),
        }
    }
}

/// Supported embedding backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    /// In-process sentence-transformer model
    Local,
    /// Ollama embedding endpoint
    Ollama,
}

impl std::str::FromStr for EmbeddingProvider {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "ollama" => Ok(Self::Ollama),
            _ => Err(ConfigError::InvalidValue {
                key: "EMBEDDING_PROVIDER".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

/// PDF ingestion configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Directory scanned (non-recursively) for PDFs
    pub pdf_dir: PathBuf,

    /// Records written per store call
    pub batch_size: usize,

    /// Value of the `type` metadata field on ingested documents
    pub document_type: String,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            pdf_dir: PathBuf::from("Resources"),
            batch_size: 5,
            document_type: "legal_faq".to_string(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// JSON format for logs
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.chroma.base_url(), "http://localhost:8000");
        assert_eq!(config.chroma.connect_attempts, 30);
        assert_eq!(config.chroma.retry_delay(), Duration::from_secs(1));
        assert_eq!(config.ingest.batch_size, 5);
        assert_eq!(config.ingest.pdf_dir, PathBuf::from("Resources"));
        assert_eq!(config.embedding.provider, EmbeddingProvider::Local);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let config = AppConfig::default()
            .apply_env(lookup_from(&[
                ("CHROMA_HOST", "chroma"),
                ("CHROMA_PORT", "8001"),
                ("PDF_DIR", "/data/pdfs"),
                ("EMBEDDING_PROVIDER", "Ollama"),
                ("CORS_ORIGINS", "http://a.test, ,http://b.test"),
                ("LOG_FORMAT", "JSON"),
            ]))
            .unwrap();

        assert_eq!(config.chroma.base_url(), "http://chroma:8001");
        assert_eq!(config.ingest.pdf_dir, PathBuf::from("/data/pdfs"));
        assert_eq!(config.embedding.provider, EmbeddingProvider::Ollama);
        assert_eq!(config.server.cors_origins, vec!["http://a.test", "http://b.test"]);
        assert!(config.logging.json_format);
    }

    #[test]
    fn test_invalid_port_rejected() {
        let err = AppConfig::default()
            .apply_env(lookup_from(&[("CHROMA_PORT", "not-a-port")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "CHROMA_PORT"));
    }

    #[test]
    fn test_embedding_provider_parse() {
        assert_eq!(
            "local".parse::<EmbeddingProvider>().unwrap(),
            EmbeddingProvider::Local
        );
        assert_eq!(
            "ollama".parse::<EmbeddingProvider>().unwrap(),
            EmbeddingProvider::Ollama
        );
        assert!("openai".parse::<EmbeddingProvider>().is_err());
    }

    #[test]
    fn test_base_url_keeps_scheme() {
        let chroma = ChromaConfig {
            host: "https://chroma.internal/".to_string(),
            port: 443,
            ..Default::default()
        };
        assert_eq!(chroma.base_url(), "https://chroma.internal:443");
    }

    #[test]
    fn test_zero_batch_size_invalid() {
        let mut config = AppConfig::default();
        config.ingest.batch_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_file_partial() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[chroma]\nhost = \"vector-db\"\n\n[ingest]\npdf_dir = \"docs\"\nbatch_size = 10"
        )
        .unwrap();

        let config = AppConfig::from_file(file.path()).unwrap();
        assert_eq!(config.chroma.host, "vector-db");
        assert_eq!(config.chroma.port, 8000);
        assert_eq!(config.ingest.batch_size, 10);
        assert_eq!(config.ingest.document_type, "legal_faq");
    }
}
