//! Vector Store Abstraction Layer
//!
//! Two layers live here:
//!
//! - [`VectorStore`] is the backend trait: create a collection if absent,
//!   describe it, upsert points, run a similarity search.
//! - [`VectorIndex`] binds one collection (name, dimension, metric) to a
//!   store and adds the guarantees the pipeline relies on: the collection is
//!   ensured exactly once, vector lengths are checked, `k` is clamped and
//!   results come back in descending score order.
//!
//! ```text
//!   RagPipeline ──► VectorIndex ──► dyn VectorStore
//!                                     ├── QdrantVectorStore   (feature "qdrant")
//!                                     └── InMemoryVectorStore (tests, provider = "memory")
//! ```
//!
//! Scores are always similarities: higher means closer. Backends that
//! natively report a distance (euclidean) return it negated.
//!
//! # Example
//!
//! ```rust,ignore
//! use docqa::db::vectorstore::{DistanceMetric, InMemoryVectorStore, IndexSettings, VectorIndex};
//!
//! let index = VectorIndex::new(
//!     Arc::new(InMemoryVectorStore::new()),
//!     IndexSettings::new("pdf_docs", 384),
//! );
//! index.ensure_collection().await?;
//! index.upsert(&entries).await?;
//! let hits = index.search(&query_vector, 4).await?;
//! ```

use crate::types::{AppError, IndexEntry, Result, SearchHit};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::sync::Arc;
use uuid::Uuid;

// ============================================================================
// Vector Store Provider Configuration
// ============================================================================

/// Which backend to talk to.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "provider", rename_all = "lowercase")]
pub enum VectorStoreProvider {
    /// Qdrant server reachable over gRPC.
    Qdrant {
        url: String,
        #[serde(default)]
        api_key: Option<String>,
    },
    /// Process-local store; contents vanish on exit.
    Memory,
}

impl VectorStoreProvider {
    /// Connect to the configured backend.
    pub async fn create_store(&self) -> Result<Arc<dyn VectorStore>> {
        match self {
            #[cfg(feature = "qdrant")]
            VectorStoreProvider::Qdrant { url, api_key } => Ok(Arc::new(
                super::qdrant::QdrantVectorStore::new(url, api_key.clone())?,
            )),

            #[cfg(not(feature = "qdrant"))]
            VectorStoreProvider::Qdrant { .. } => Err(AppError::InvalidConfiguration(
                "the qdrant vector store requires the `qdrant` feature".into(),
            )),

            VectorStoreProvider::Memory => Ok(Arc::new(InMemoryVectorStore::new())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            VectorStoreProvider::Qdrant { .. } => "qdrant",
            VectorStoreProvider::Memory => "memory",
        }
    }
}

// ============================================================================
// Collection Types
// ============================================================================

/// Similarity metric, fixed when the collection is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    #[default]
    Cosine,
    Dot,
    Euclidean,
}

impl DistanceMetric {
    /// Similarity of `a` and `b`; larger is closer.
    pub fn similarity(&self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            DistanceMetric::Cosine => cosine_similarity(a, b),
            DistanceMetric::Dot => a.iter().zip(b).map(|(x, y)| x * y).sum(),
            DistanceMetric::Euclidean => -a
                .iter()
                .zip(b)
                .map(|(x, y)| (x - y) * (x - y))
                .sum::<f32>()
                .sqrt(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            DistanceMetric::Cosine => "cosine",
            DistanceMetric::Dot => "dot",
            DistanceMetric::Euclidean => "euclidean",
        }
    }
}

/// Calculate cosine similarity between two vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

/// Information about an existing collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionInfo {
    pub name: String,
    pub dimensions: usize,
    pub distance: DistanceMetric,
    pub point_count: usize,
}

// ============================================================================
// Vector Store Trait
// ============================================================================

/// Abstract trait for vector database operations.
///
/// # Implementors
///
/// - `QdrantVectorStore` - Qdrant server
/// - `InMemoryVectorStore` - process-local, for tests and throwaway runs
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Get the name of this vector store provider.
    fn provider_name(&self) -> &'static str;

    /// Create the collection if it does not exist.
    ///
    /// Returns `true` when this call created it and `false` when it was
    /// already there. Never fails just because the collection exists.
    async fn create_collection(
        &self,
        name: &str,
        dimensions: usize,
        distance: DistanceMetric,
    ) -> Result<bool>;

    /// Describe a collection, or `None` if it does not exist.
    async fn collection_info(&self, name: &str) -> Result<Option<CollectionInfo>>;

    /// Insert or overwrite points by id. Returns the number written.
    async fn upsert(&self, collection: &str, points: &[IndexEntry]) -> Result<usize>;

    /// Up to `limit` nearest points, best first.
    async fn search(&self, collection: &str, vector: &[f32], limit: usize)
        -> Result<Vec<SearchHit>>;

    /// Count points in a collection (0 when it does not exist).
    async fn count(&self, collection: &str) -> Result<usize> {
        Ok(self
            .collection_info(collection)
            .await?
            .map(|info| info.point_count)
            .unwrap_or(0))
    }
}

// ============================================================================
// In-Memory Vector Store
// ============================================================================

use parking_lot::RwLock;
use std::collections::HashMap;

/// In-memory vector store.
///
/// Data is not persisted and will be lost when the process exits. Points keep
/// their first-insertion order, so equal scores come back in a fixed order.
pub struct InMemoryVectorStore {
    collections: Arc<RwLock<HashMap<String, InMemoryCollection>>>,
}

struct InMemoryCollection {
    dimensions: usize,
    distance: DistanceMetric,
    points: Vec<IndexEntry>,
    positions: HashMap<String, usize>,
}

impl InMemoryVectorStore {
    /// Create a new in-memory vector store.
    pub fn new() -> Self {
        Self {
            collections: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for InMemoryVectorStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    fn provider_name(&self) -> &'static str {
        "in-memory"
    }

    async fn create_collection(
        &self,
        name: &str,
        dimensions: usize,
        distance: DistanceMetric,
    ) -> Result<bool> {
        let mut collections = self.collections.write();
        if collections.contains_key(name) {
            return Ok(false);
        }
        collections.insert(
            name.to_string(),
            InMemoryCollection {
                dimensions,
                distance,
                points: Vec::new(),
                positions: HashMap::new(),
            },
        );
        Ok(true)
    }

    async fn collection_info(&self, name: &str) -> Result<Option<CollectionInfo>> {
        let collections = self.collections.read();
        Ok(collections.get(name).map(|col| CollectionInfo {
            name: name.to_string(),
            dimensions: col.dimensions,
            distance: col.distance,
            point_count: col.points.len(),
        }))
    }

    async fn upsert(&self, collection: &str, points: &[IndexEntry]) -> Result<usize> {
        let mut collections = self.collections.write();
        let col = collections
            .get_mut(collection)
            .ok_or_else(|| AppError::NotFound(format!("Collection '{}' not found", collection)))?;

        for point in points {
            if point.vector.len() != col.dimensions {
                return Err(AppError::DimensionMismatch {
                    expected: col.dimensions,
                    actual: point.vector.len(),
                });
            }
        }

        for point in points {
            match col.positions.get(&point.id) {
                Some(&pos) => col.points[pos] = point.clone(),
                None => {
                    col.positions.insert(point.id.clone(), col.points.len());
                    col.points.push(point.clone());
                }
            }
        }

        Ok(points.len())
    }

    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        limit: usize,
    ) -> Result<Vec<SearchHit>> {
        let collections = self.collections.read();
        let col = collections
            .get(collection)
            .ok_or_else(|| AppError::NotFound(format!("Collection '{}' not found", collection)))?;

        if vector.len() != col.dimensions {
            return Err(AppError::DimensionMismatch {
                expected: col.dimensions,
                actual: vector.len(),
            });
        }

        let mut results: Vec<SearchHit> = col
            .points
            .iter()
            .map(|point| SearchHit {
                id: point.id.clone(),
                score: col.distance.similarity(vector, &point.vector),
                payload: point.payload.clone(),
            })
            .collect();

        // Sort by score descending
        results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        results.truncate(limit);

        Ok(results)
    }
}

// ============================================================================
// Vector Index
// ============================================================================

/// Collection parameters for a [`VectorIndex`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSettings {
    pub collection: String,
    pub dimensions: usize,
    pub distance: DistanceMetric,
    /// Upper bound for `k` in [`VectorIndex::search`].
    pub max_top_k: usize,
}

impl IndexSettings {
    pub fn new(collection: impl Into<String>, dimensions: usize) -> Self {
        Self {
            collection: collection.into(),
            dimensions,
            distance: DistanceMetric::Cosine,
            max_top_k: 10,
        }
    }
}

/// One collection on one store, with the pipeline's guarantees applied.
pub struct VectorIndex {
    store: Arc<dyn VectorStore>,
    settings: IndexSettings,
    ensured: tokio::sync::Mutex<bool>,
}

impl VectorIndex {
    pub fn new(store: Arc<dyn VectorStore>, settings: IndexSettings) -> Self {
        Self {
            store,
            settings,
            ensured: tokio::sync::Mutex::new(false),
        }
    }

    pub fn settings(&self) -> &IndexSettings {
        &self.settings
    }

    pub fn provider_name(&self) -> &'static str {
        self.store.provider_name()
    }

    /// Make sure the collection exists with the configured dimension.
    ///
    /// Serialized by a mutex: concurrent callers wait for the first one and
    /// then return immediately. An existing collection with another
    /// dimension is a `DimensionMismatch`; one with another distance metric
    /// is an `InvalidConfiguration`.
    pub async fn ensure_collection(&self) -> Result<()> {
        let mut ensured = self.ensured.lock().await;
        if *ensured {
            return Ok(());
        }

        let IndexSettings {
            collection,
            dimensions,
            distance,
            ..
        } = &self.settings;

        let existing = match self.store.collection_info(collection).await? {
            Some(info) => info,
            None => {
                let created = self
                    .store
                    .create_collection(collection, *dimensions, *distance)
                    .await?;
                if created {
                    tracing::info!(
                        collection = %collection,
                        dimensions = *dimensions,
                        distance = distance.name(),
                        "Created vector collection"
                    );
                }
                self.store
                    .collection_info(collection)
                    .await?
                    .ok_or_else(|| {
                        AppError::StoreUnavailable(format!(
                            "collection '{}' missing right after creation",
                            collection
                        ))
                    })?
            }
        };

        if existing.dimensions != *dimensions {
            return Err(AppError::DimensionMismatch {
                expected: *dimensions,
                actual: existing.dimensions,
            });
        }
        if existing.distance != *distance {
            return Err(AppError::InvalidConfiguration(format!(
                "collection '{}' uses {} distance but {} is configured",
                collection,
                existing.distance.name(),
                distance.name()
            )));
        }

        *ensured = true;
        Ok(())
    }

    /// Write points after checking every vector has the collection's length.
    pub async fn upsert(&self, points: &[IndexEntry]) -> Result<usize> {
        for point in points {
            self.check_dimensions(&point.vector)?;
        }
        self.ensure_collection().await?;
        if points.is_empty() {
            return Ok(0);
        }
        self.store.upsert(&self.settings.collection, points).await
    }

    /// Top-`k` hits in descending score order, `k` clamped to `[1, max_top_k]`.
    pub async fn search(&self, vector: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        self.check_dimensions(vector)?;
        self.ensure_collection().await?;

        let limit = self.clamp_top_k(k);
        let mut hits = self
            .store
            .search(&self.settings.collection, vector, limit)
            .await?;

        // Stable, so ties keep the order the store returned them in.
        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        hits.truncate(limit);
        Ok(hits)
    }

    pub async fn count(&self) -> Result<usize> {
        self.store.count(&self.settings.collection).await
    }

    pub fn clamp_top_k(&self, k: usize) -> usize {
        k.clamp(1, self.settings.max_top_k.max(1))
    }

    fn check_dimensions(&self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.settings.dimensions {
            return Err(AppError::DimensionMismatch {
                expected: self.settings.dimensions,
                actual: vector.len(),
            });
        }
        Ok(())
    }
}

/// Point id for a chunk: a UUIDv5 over source name, content digest and
/// chunk index, so distinct documents never share ids.
pub fn point_id(source: &str, digest: &str, chunk_index: usize) -> String {
    let name = format!("{}\0{}\0{}", source, digest, chunk_index);
    Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes()).to_string()
}

// ============================================================================
// Tests
// ============================================================================
