//! Application state management
//!
//! Author: hephaex@gmail.com

use docsearch_core::AppConfig;
use docsearch_pipeline::DocumentPipeline;
use std::time::Instant;
use tokio::sync::RwLock;

/// Application state shared across handlers
pub struct AppState {
    /// Application configuration
    pub config: AppConfig,

    /// Ingestion and search over the collection
    pub pipeline: DocumentPipeline,

    /// Guards the collection. Ingestion and adds take the write half so
    /// nothing observes the collection while it is being recreated.
    pub collection_lock: RwLock<()>,

    /// Server start time
    pub start_time: Instant,
}

impl AppState {
    /// Create new application state
    pub fn new(config: AppConfig, pipeline: DocumentPipeline) -> Self {
        Self {
            config,
            pipeline,
            collection_lock: RwLock::new(()),
            start_time: Instant::now(),
        }
    }

    /// Get uptime in seconds
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
