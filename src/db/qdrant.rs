use crate::types::{AppError, ChunkPayload, IndexEntry, Result, SearchHit};
use async_trait::async_trait;
use qdrant_client::{
    qdrant::{
        point_id::PointIdOptions, vectors_config::Config, CreateCollectionBuilder, Distance,
        PointStruct, SearchPointsBuilder, UpsertPointsBuilder, Value, VectorParamsBuilder,
    },
    Qdrant,
};
use parking_lot::RwLock;
use std::collections::HashMap;

use super::vectorstore::{CollectionInfo, DistanceMetric, VectorStore};

/// Qdrant vector store implementation.
///
/// Provides vector storage and similarity search using a Qdrant server.
/// Requires a running Qdrant instance. The distance metric of every
/// collection it creates or describes is remembered for scoring searches.
pub struct QdrantVectorStore {
    client: Qdrant,
    metrics: RwLock<HashMap<String, DistanceMetric>>,
}

fn store_error(action: &str, e: impl std::fmt::Display) -> AppError {
    AppError::StoreUnavailable(format!("Failed to {}: {}", action, e))
}

impl QdrantVectorStore {
    pub fn new(url: &str, api_key: Option<String>) -> Result<Self> {
        let mut builder = Qdrant::from_url(url);
        if let Some(key) = api_key {
            builder = builder.api_key(key);
        }
        let client = builder
            .build()
            .map_err(|e| store_error("create Qdrant client", e))?;

        Ok(Self {
            client,
            metrics: RwLock::new(HashMap::new()),
        })
    }

    fn remember_metric(&self, collection: &str, distance: DistanceMetric) {
        self.metrics.write().insert(collection.to_string(), distance);
    }

    fn cached_metric(&self, collection: &str) -> Option<DistanceMetric> {
        self.metrics.read().get(collection).copied()
    }

    fn to_qdrant_distance(distance: DistanceMetric) -> Distance {
        match distance {
            DistanceMetric::Cosine => Distance::Cosine,
            DistanceMetric::Dot => Distance::Dot,
            DistanceMetric::Euclidean => Distance::Euclid,
        }
    }

    fn from_qdrant_distance(distance: i32) -> DistanceMetric {
        match Distance::try_from(distance) {
            Ok(Distance::Dot) => DistanceMetric::Dot,
            Ok(Distance::Euclid) => DistanceMetric::Euclidean,
            _ => DistanceMetric::Cosine,
        }
    }

    fn to_payload(payload: &ChunkPayload) -> HashMap<String, Value> {
        let mut map: HashMap<String, Value> = HashMap::new();
        map.insert("source".to_string(), payload.source.clone().into());
        map.insert("chunk_index".to_string(), (payload.chunk_index as i64).into());
        map.insert("preview".to_string(), payload.preview.clone().into());
        map.insert("text".to_string(), payload.text.clone().into());
        map
    }

    fn from_payload(payload: &HashMap<String, Value>) -> Option<ChunkPayload> {
        let source = payload.get("source")?.as_str()?.to_string();
        let chunk_index = usize::try_from(payload.get("chunk_index")?.as_integer()?).ok()?;
        let preview = payload
            .get("preview")
            .and_then(|v| v.as_str())
            .cloned()
            .unwrap_or_default();
        let text = payload
            .get("text")
            .and_then(|v| v.as_str())
            .cloned()
            .unwrap_or_default();

        Some(ChunkPayload {
            source,
            chunk_index,
            preview,
            text,
        })
    }
}

// ============================================================================
// VectorStore Trait Implementation
// ============================================================================

#[async_trait]
impl VectorStore for QdrantVectorStore {
    fn provider_name(&self) -> &'static str {
        "qdrant"
    }

    async fn create_collection(
        &self,
        name: &str,
        dimensions: usize,
        distance: DistanceMetric,
    ) -> Result<bool> {
        let request = CreateCollectionBuilder::new(name).vectors_config(VectorParamsBuilder::new(
            dimensions as u64,
            Self::to_qdrant_distance(distance),
        ));

        match self.client.create_collection(request).await {
            Ok(_) => {
                self.remember_metric(name, distance);
                Ok(true)
            }
            // Another writer got there first; the server resolved the race.
            Err(e) if e.to_string().contains("already exists") => Ok(false),
            Err(e) => Err(store_error("create collection", e)),
        }
    }

    async fn collection_info(&self, name: &str) -> Result<Option<CollectionInfo>> {
        let exists = self
            .client
            .collection_exists(name)
            .await
            .map_err(|e| store_error("check collection", e))?;
        if !exists {
            return Ok(None);
        }

        let info = self
            .client
            .collection_info(name)
            .await
            .map_err(|e| store_error("get collection info", e))?;

        let result = info
            .result
            .ok_or_else(|| AppError::StoreUnavailable("Collection info missing".to_string()))?;

        let point_count = result.points_count.unwrap_or(0) as usize;
        let params = result
            .config
            .and_then(|c| c.params)
            .and_then(|p| p.vectors_config)
            .and_then(|v| match v.config {
                Some(Config::Params(p)) => Some(p),
                _ => None,
            })
            .ok_or_else(|| {
                AppError::StoreUnavailable(format!(
                    "Collection '{}' has no single unnamed vector config",
                    name
                ))
            })?;

        let distance = Self::from_qdrant_distance(params.distance);
        self.remember_metric(name, distance);

        Ok(Some(CollectionInfo {
            name: name.to_string(),
            dimensions: params.size as usize,
            distance,
            point_count,
        }))
    }

    async fn upsert(&self, collection: &str, points: &[IndexEntry]) -> Result<usize> {
        let qdrant_points: Vec<PointStruct> = points
            .iter()
            .map(|point| {
                PointStruct::new(
                    point.id.clone(),
                    point.vector.clone(),
                    Self::to_payload(&point.payload),
                )
            })
            .collect();

        let count = qdrant_points.len();
        self.client
            .upsert_points(UpsertPointsBuilder::new(collection, qdrant_points).wait(true))
            .await
            .map_err(|e| store_error("upsert points", e))?;

        Ok(count)
    }

    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        limit: usize,
    ) -> Result<Vec<SearchHit>> {
        let metric = match self.cached_metric(collection) {
            Some(metric) => metric,
            None => self
                .collection_info(collection)
                .await?
                .map(|info| info.distance)
                .unwrap_or_default(),
        };

        let response = self
            .client
            .search_points(
                SearchPointsBuilder::new(collection, vector.to_vec(), limit as u64)
                    .with_payload(true),
            )
            .await
            .map_err(|e| store_error("search", e))?;

        Ok(response
            .result
            .into_iter()
            .filter_map(|scored_point| {
                let payload = Self::from_payload(&scored_point.payload)?;
                let id = match scored_point.id?.point_id_options? {
                    PointIdOptions::Num(num) => num.to_string(),
                    PointIdOptions::Uuid(uuid) => uuid,
                };
                let score = match metric {
                    DistanceMetric::Euclidean => -scored_point.score,
                    _ => scored_point.score,
                };
                Some(SearchHit { id, score, payload })
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_round_trip_keeps_text() {
        let payload = ChunkPayload {
            source: "guide.txt".to_string(),
            chunk_index: 3,
            preview: "The permit".to_string(),
            text: "The permit application is due on March 3rd.".to_string(),
        };

        let map = QdrantVectorStore::to_payload(&payload);
        assert_eq!(QdrantVectorStore::from_payload(&map), Some(payload));
    }

    #[test]
    fn test_payload_without_text_still_parses() {
        let mut map: HashMap<String, Value> = HashMap::new();
        map.insert("source".to_string(), "old.txt".to_string().into());
        map.insert("chunk_index".to_string(), 0i64.into());

        let payload = QdrantVectorStore::from_payload(&map).unwrap();
        assert_eq!(payload.source_label(), "old.txt#p1");
        assert!(payload.text.is_empty());
    }

    #[tokio::test]
    async fn test_metric_is_cached_per_collection() {
        let store = QdrantVectorStore::new("http://localhost:6334", None).unwrap();
        assert_eq!(store.cached_metric("pdf_docs"), None);

        store.remember_metric("pdf_docs", DistanceMetric::Euclidean);
        store.remember_metric("notes", DistanceMetric::Dot);

        assert_eq!(
            store.cached_metric("pdf_docs"),
            Some(DistanceMetric::Euclidean)
        );
        assert_eq!(store.cached_metric("notes"), Some(DistanceMetric::Dot));
    }

    #[test]
    fn test_distance_mapping() {
        for metric in [
            DistanceMetric::Cosine,
            DistanceMetric::Dot,
            DistanceMetric::Euclidean,
        ] {
            let qdrant = QdrantVectorStore::to_qdrant_distance(metric) as i32;
            assert_eq!(QdrantVectorStore::from_qdrant_distance(qdrant), metric);
        }
    }
}
