//! In-memory vector store used by tests
//!
//! Mirrors the Chroma behaviours the pipeline relies on: collection lookup
//! by name, records addressed through the collection id, cosine distance
//! ranking and silent deletes of unknown ids.

use async_trait::async_trait;
use docsearch_core::{DocsearchError, Metadata, Result, SearchHit};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::{Collection, RecordBatch, VectorStore, DISTANCE_SPACE};

#[derive(Debug, Clone)]
struct StoredRecord {
    id: String,
    document: String,
    metadata: Metadata,
    embedding: Vec<f32>,
}

#[derive(Debug)]
struct StoredCollection {
    collection: Collection,
    records: Vec<StoredRecord>,
}

/// Vector store kept entirely in process memory
#[derive(Debug)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, StoredCollection>>,
    next_id: AtomicU64,
    reachable: AtomicBool,
    heartbeat_calls: AtomicUsize,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            reachable: AtomicBool::new(true),
            heartbeat_calls: AtomicUsize::new(0),
        }
    }

    /// Simulate the server going away (or coming back)
    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    /// Number of heartbeats received so far
    pub fn heartbeat_calls(&self) -> usize {
        self.heartbeat_calls.load(Ordering::SeqCst)
    }

    fn check_reachable(&self) -> Result<()> {
        if self.reachable.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(DocsearchError::StoreError(
                "Connection refused: vector store unreachable".to_string(),
            ))
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<String, StoredCollection>>> {
        self.check_reachable()?;
        self.collections
            .read()
            .map_err(|_| DocsearchError::StoreError("Store lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<String, StoredCollection>>> {
        self.check_reachable()?;
        self.collections
            .write()
            .map_err(|_| DocsearchError::StoreError("Store lock poisoned".to_string()))
    }
}

/// Find a collection by id; a dropped collection's handle no longer resolves
fn by_id<'a>(
    collections: &'a HashMap<String, StoredCollection>,
    collection: &Collection,
) -> Result<&'a StoredCollection> {
    collections
        .values()
        .find(|c| c.collection.id == collection.id)
        .ok_or_else(|| {
            DocsearchError::NotFound(format!("Collection {} does not exist", collection.name))
        })
}

fn by_id_mut<'a>(
    collections: &'a mut HashMap<String, StoredCollection>,
    collection: &Collection,
) -> Result<&'a mut StoredCollection> {
    collections
        .values_mut()
        .find(|c| c.collection.id == collection.id)
        .ok_or_else(|| {
            DocsearchError::NotFound(format!("Collection {} does not exist", collection.name))
        })
}

/// Cosine distance; a zero vector is treated as orthogonal to everything
fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 1.0;
    }
    1.0 - dot / (norm_a * norm_b)
}

#[async_trait]
impl VectorStore for MemoryStore {
    async fn heartbeat(&self) -> Result<u64> {
        self.heartbeat_calls.fetch_add(1, Ordering::SeqCst);
        self.check_reachable()?;
        Ok(self.next_id.load(Ordering::SeqCst))
    }

    async fn create_collection(&self, name: &str) -> Result<Collection> {
        let mut collections = self.write()?;
        if collections.contains_key(name) {
            return Err(DocsearchError::AlreadyExists(format!(
                "Collection {name} already exists"
            )));
        }

        let mut metadata = Metadata::new();
        metadata.insert("hnsw:space".to_string(), DISTANCE_SPACE.into());

        let collection = Collection {
            id: format!("mem-{}", self.next_id.fetch_add(1, Ordering::SeqCst)),
            name: name.to_string(),
            metadata: Some(metadata),
        };

        collections.insert(
            name.to_string(),
            StoredCollection {
                collection: collection.clone(),
                records: Vec::new(),
            },
        );
        Ok(collection)
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        self.write()?.remove(name);
        Ok(())
    }

    async fn get_collection(&self, name: &str) -> Result<Collection> {
        self.read()?
            .get(name)
            .map(|c| c.collection.clone())
            .ok_or_else(|| DocsearchError::NotFound(format!("Collection {name} does not exist")))
    }

    async fn add(&self, collection: &Collection, batch: RecordBatch) -> Result<()> {
        let mut collections = self.write()?;
        let stored = by_id_mut(&mut collections, collection)?;

        for (id, document, metadata, embedding) in batch.rows() {
            // Existing ids are left untouched, as Chroma does on add
            if stored.records.iter().any(|r| &r.id == id) {
                continue;
            }
            stored.records.push(StoredRecord {
                id: id.clone(),
                document: document.clone(),
                metadata: metadata.clone(),
                embedding: embedding.clone(),
            });
        }
        Ok(())
    }

    async fn query(
        &self,
        collection: &Collection,
        embedding: &[f32],
        n_results: usize,
    ) -> Result<Vec<SearchHit>> {
        let collections = self.read()?;
        let stored = by_id(&collections, collection)?;

        let mut scored: Vec<(f32, &StoredRecord)> = stored
            .records
            .iter()
            .map(|r| (cosine_distance(embedding, &r.embedding), r))
            .collect();
        scored.sort_by(|a, b| a.0.total_cmp(&b.0));

        Ok(scored
            .into_iter()
            .take(n_results)
            .map(|(distance, r)| SearchHit {
                id: r.id.clone(),
                metadata: r.metadata.clone(),
                document: Some(r.document.clone()),
                distance: Some(distance),
            })
            .collect())
    }

    async fn delete(&self, collection: &Collection, ids: &[String]) -> Result<()> {
        let mut collections = self.write()?;
        let stored = by_id_mut(&mut collections, collection)?;
        stored.records.retain(|r| !ids.contains(&r.id));
        Ok(())
    }

    async fn get_ids(
        &self,
        collection: &Collection,
        ids: Option<&[String]>,
    ) -> Result<Vec<String>> {
        let collections = self.read()?;
        let stored = by_id(&collections, collection)?;

        Ok(stored
            .records
            .iter()
            .filter(|r| ids.map_or(true, |wanted| wanted.contains(&r.id)))
            .map(|r| r.id.clone())
            .collect())
    }

    async fn count(&self, collection: &Collection) -> Result<usize> {
        let collections = self.read()?;
        Ok(by_id(&collections, collection)?.records.len())
    }
}
