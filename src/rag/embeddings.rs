//! Text Embeddings
//!
//! Chunks and questions go through the same [`Embedder`] so their vectors are
//! comparable. Every backend's output is re-normalized to unit length, which
//! makes cosine similarity equal to the dot product downstream.
//!
//! Models are heavy, so each one is loaded at most once per process: the
//! [`LazyEmbedder`] handle looks up a shared slot keyed by provider and model
//! id and initializes it on first use.

use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;

use crate::types::{AppError, Result};

// ============================================================================
// Embedder Trait
// ============================================================================

#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed one text into a unit-length vector
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Length of every vector this embedder produces
    fn dimensions(&self) -> usize;

    fn model_name(&self) -> &str;
}

/// Scale `vector` to unit L2 norm in place. A zero vector is left as is.
pub fn normalize_l2(vector: &mut [f32]) {
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        for x in vector.iter_mut() {
            *x /= norm;
        }
    }
}

/// Dimensions of the feature-extraction models we know by name.
pub fn known_dimensions(model_id: &str) -> Option<usize> {
    match model_id {
        "sentence-transformers/all-MiniLM-L6-v2"
        | "Xenova/all-MiniLM-L6-v2"
        | "all-MiniLM-L6-v2"
        | "BAAI/bge-small-en-v1.5"
        | "Xenova/bge-small-en-v1.5"
        | "all-minilm" => Some(384),
        "BAAI/bge-base-en-v1.5" | "Xenova/bge-base-en-v1.5" | "nomic-embed-text" => Some(768),
        "mxbai-embed-large" => Some(1024),
        _ => None,
    }
}

// ============================================================================
// Provider Selection
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    /// Local ONNX model via fastembed (feature `local-embeddings`)
    #[default]
    FastEmbed,
    /// Ollama `/api/embed` endpoint (feature `ollama`)
    Ollama,
}

impl EmbeddingProvider {
    pub fn name(&self) -> &'static str {
        match self {
            EmbeddingProvider::FastEmbed => "fastembed",
            EmbeddingProvider::Ollama => "ollama",
        }
    }
}

/// Everything needed to build an embedder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddingSpec {
    pub provider: EmbeddingProvider,
    pub model: String,
    pub base_url: String,
    /// Expected vector length; checked against the first produced vector.
    pub dimensions: usize,
}

impl EmbeddingSpec {
    fn registry_key(&self) -> String {
        format!("{}:{}@{}", self.provider.name(), self.model, self.base_url)
    }

    /// Build the concrete backend. Loading failures are `ModelUnavailable`.
    pub async fn load(&self) -> Result<Arc<dyn Embedder>> {
        match self.provider {
            #[cfg(feature = "local-embeddings")]
            EmbeddingProvider::FastEmbed => Ok(Arc::new(FastEmbedder::load(&self.model).await?)),

            #[cfg(not(feature = "local-embeddings"))]
            EmbeddingProvider::FastEmbed => Err(AppError::InvalidConfiguration(
                "the fastembed provider requires the `local-embeddings` feature".into(),
            )),

            #[cfg(feature = "ollama")]
            EmbeddingProvider::Ollama => Ok(Arc::new(OllamaEmbedder::new(
                &self.base_url,
                self.model.clone(),
                self.dimensions,
            ))),

            #[cfg(not(feature = "ollama"))]
            EmbeddingProvider::Ollama => Err(AppError::InvalidConfiguration(
                "the ollama embedding provider requires the `ollama` feature".into(),
            )),
        }
    }
}

// ============================================================================
// Process-wide Registry
// ============================================================================

type Slot = Arc<OnceCell<Arc<dyn Embedder>>>;

static REGISTRY: LazyLock<Mutex<HashMap<String, Slot>>> = LazyLock::new(Default::default);

fn registry_slot(key: String) -> Slot {
    REGISTRY.lock().entry(key).or_default().clone()
}

/// Embedder handle that loads its model on first use and shares it with every
/// other handle for the same model.
pub struct LazyEmbedder {
    spec: EmbeddingSpec,
    slot: Slot,
}

impl LazyEmbedder {
    pub fn new(spec: EmbeddingSpec) -> Self {
        let slot = registry_slot(spec.registry_key());
        Self { spec, slot }
    }

    pub fn is_loaded(&self) -> bool {
        self.slot.initialized()
    }

    async fn inner(&self) -> Result<Arc<dyn Embedder>> {
        self.slot
            .get_or_try_init(|| async {
                tracing::info!(
                    provider = self.spec.provider.name(),
                    model = %self.spec.model,
                    "Loading embedding model"
                );
                self.spec.load().await
            })
            .await
            .cloned()
    }
}

#[async_trait]
impl Embedder for LazyEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let vector = self.inner().await?.embed(text).await?;
        if vector.len() != self.spec.dimensions {
            return Err(AppError::DimensionMismatch {
                expected: self.spec.dimensions,
                actual: vector.len(),
            });
        }
        Ok(vector)
    }

    fn dimensions(&self) -> usize {
        self.spec.dimensions
    }

    fn model_name(&self) -> &str {
        &self.spec.model
    }
}

// ============================================================================
// Local ONNX backend
// ============================================================================

#[cfg(feature = "local-embeddings")]
pub use local::FastEmbedder;

#[cfg(feature = "local-embeddings")]
mod local {
    use super::*;
    use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};

    fn resolve_model(model_id: &str) -> Result<(EmbeddingModel, usize)> {
        let model = match model_id {
            "sentence-transformers/all-MiniLM-L6-v2"
            | "Xenova/all-MiniLM-L6-v2"
            | "all-MiniLM-L6-v2" => EmbeddingModel::AllMiniLML6V2,
            "BAAI/bge-small-en-v1.5" | "Xenova/bge-small-en-v1.5" => EmbeddingModel::BGESmallENV15,
            "BAAI/bge-base-en-v1.5" | "Xenova/bge-base-en-v1.5" => EmbeddingModel::BGEBaseENV15,
            other => {
                return Err(AppError::InvalidConfiguration(format!(
                    "unsupported local embedding model: {}",
                    other
                )))
            }
        };
        let dims = known_dimensions(model_id).unwrap_or(384);
        Ok((model, dims))
    }

    /// Mean-pooled, normalized sentence embeddings computed in-process.
    pub struct FastEmbedder {
        model: Arc<tokio::sync::Mutex<TextEmbedding>>,
        model_name: String,
        dimensions: usize,
    }

    impl FastEmbedder {
        pub async fn load(model_id: &str) -> Result<Self> {
            let (kind, dimensions) = resolve_model(model_id)?;
            let model = tokio::task::spawn_blocking(move || {
                TextEmbedding::try_new(InitOptions::new(kind).with_show_download_progress(false))
            })
            .await
            .map_err(|e| AppError::Internal(format!("Embedding load task failed: {}", e)))?
            .map_err(|e| AppError::ModelUnavailable(format!("Failed to load embeddings: {}", e)))?;

            Ok(Self {
                model: Arc::new(tokio::sync::Mutex::new(model)),
                model_name: model_id.to_string(),
                dimensions,
            })
        }
    }

    #[async_trait]
    impl Embedder for FastEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            let model = Arc::clone(&self.model);
            let text = text.to_string();

            let mut vectors = tokio::task::spawn_blocking(move || {
                let mut model = model.blocking_lock();
                model.embed(vec![text], None)
            })
            .await
            .map_err(|e| AppError::Internal(format!("Embedding task failed: {}", e)))?
            .map_err(|e| AppError::ModelUnavailable(format!("Embedding failed: {}", e)))?;

            let mut vector = vectors
                .pop()
                .ok_or_else(|| AppError::ModelUnavailable("model returned no embedding".into()))?;
            normalize_l2(&mut vector);
            Ok(vector)
        }

        fn dimensions(&self) -> usize {
            self.dimensions
        }

        fn model_name(&self) -> &str {
            &self.model_name
        }
    }
}

// ============================================================================
// Ollama backend
// ============================================================================

#[cfg(feature = "ollama")]
pub use remote::OllamaEmbedder;

#[cfg(feature = "ollama")]
mod remote {
    use super::*;
    use ollama_rs::generation::embeddings::request::{EmbeddingsInput, GenerateEmbeddingsRequest};
    use ollama_rs::Ollama;

    pub struct OllamaEmbedder {
        client: Ollama,
        model: String,
        dimensions: usize,
    }

    impl OllamaEmbedder {
        pub fn new(base_url: &str, model: String, dimensions: usize) -> Self {
            Self {
                client: crate::llm::ollama::connect(base_url),
                model,
                dimensions,
            }
        }
    }

    #[async_trait]
    impl Embedder for OllamaEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            let request = GenerateEmbeddingsRequest::new(
                self.model.clone(),
                EmbeddingsInput::Single(text.to_string()),
            );
            let response = self
                .client
                .generate_embeddings(request)
                .await
                .map_err(|e| AppError::ModelUnavailable(format!("Ollama embeddings error: {}", e)))?;

            let mut vector = response
                .embeddings
                .into_iter()
                .next()
                .ok_or_else(|| AppError::ModelUnavailable("Ollama returned no embedding".into()))?;
            normalize_l2(&mut vector);
            Ok(vector)
        }

        fn dimensions(&self) -> usize {
            self.dimensions
        }

        fn model_name(&self) -> &str {
            &self.model
        }
    }
}
