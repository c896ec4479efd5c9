//! TOML-based configuration for DocQA
//!
//! Every field has a default, so an empty (or missing) `docqa.toml` gives a
//! working setup against a local Qdrant and Ollama. The environment variables
//! of the original deployment (`PORT`, `CACHE_SIZE`, `COLLECTION_NAME`,
//! `QDRANT_URL`, `EMBEDDING_MODEL`, `GENERATION_MODEL`) override the file.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::db::vectorstore::{DistanceMetric, IndexSettings, VectorStoreProvider};
use crate::llm::Provider;
use crate::rag::cache::CacheConfig;
use crate::rag::chunker::TextChunker;
use crate::rag::embeddings::{known_dimensions, EmbeddingProvider, EmbeddingSpec};
use crate::rag::pipeline::PipelineSettings;
use crate::types::AppError;

/// Default configuration file name
pub const DEFAULT_CONFIG_PATH: &str = "docqa.toml";

/// Root configuration structure loaded from docqa.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocqaConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub vector_store: VectorStoreConfig,

    #[serde(default)]
    pub embedding: EmbeddingConfig,

    #[serde(default)]
    pub generation: GenerationConfig,

    #[serde(default)]
    pub chunking: ChunkingConfig,

    #[serde(default)]
    pub retrieval: RetrievalConfig,

    #[serde(default)]
    pub cache: AnswerCacheConfig,

    #[serde(default)]
    pub query_log: QueryLogConfig,
}

// ============= Server Configuration =============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub log_format: LogFormat,

    /// Maximum request body size (uploads included)
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    4000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_body_limit() -> usize {
    10 * 1024 * 1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            log_level: default_log_level(),
            log_format: LogFormat::default(),
            body_limit_bytes: default_body_limit(),
        }
    }
}

// ============= Vector Store Configuration =============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum VectorStoreKind {
    #[default]
    Qdrant,
    Memory,
}

impl VectorStoreKind {
    pub fn name(&self) -> &'static str {
        match self {
            VectorStoreKind::Qdrant => "qdrant",
            VectorStoreKind::Memory => "memory",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorStoreConfig {
    #[serde(default)]
    pub provider: VectorStoreKind,

    #[serde(default = "default_qdrant_url")]
    pub url: String,

    /// Environment variable holding the Qdrant API key
    #[serde(default)]
    pub api_key_env: Option<String>,

    #[serde(default = "default_collection")]
    pub collection: String,

    #[serde(default = "default_dimension")]
    pub dimension: usize,

    #[serde(default)]
    pub distance: DistanceMetric,
}

fn default_qdrant_url() -> String {
    "http://localhost:6334".to_string()
}

fn default_collection() -> String {
    "pdf_docs".to_string()
}

fn default_dimension() -> usize {
    384
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            provider: VectorStoreKind::default(),
            url: default_qdrant_url(),
            api_key_env: None,
            collection: default_collection(),
            dimension: default_dimension(),
            distance: DistanceMetric::default(),
        }
    }
}

// ============= Embedding Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_provider")]
    pub provider: EmbeddingProvider,

    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Ollama server for the `ollama` provider
    #[serde(default = "default_ollama_url")]
    pub base_url: String,
}

fn default_embedding_provider() -> EmbeddingProvider {
    if cfg!(feature = "local-embeddings") {
        EmbeddingProvider::FastEmbed
    } else {
        EmbeddingProvider::Ollama
    }
}

fn default_embedding_model() -> String {
    match default_embedding_provider() {
        EmbeddingProvider::FastEmbed => "sentence-transformers/all-MiniLM-L6-v2".to_string(),
        EmbeddingProvider::Ollama => "all-minilm".to_string(),
    }
}

fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: default_embedding_model(),
            base_url: default_ollama_url(),
        }
    }
}

// ============= Generation Configuration =============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum GenerationProviderKind {
    #[default]
    Ollama,
    #[serde(rename = "openai")]
    OpenAI,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    #[serde(default)]
    pub provider: GenerationProviderKind,

    #[serde(default = "default_generation_model")]
    pub model: String,

    /// Defaults to the provider's usual endpoint when unset
    #[serde(default)]
    pub base_url: Option<String>,

    /// Environment variable holding the API key (OpenAI-compatible providers)
    #[serde(default)]
    pub api_key_env: Option<String>,

    #[serde(default = "default_max_new_tokens")]
    pub max_new_tokens: usize,
}

fn default_generation_model() -> String {
    "llama3.2".to_string()
}

fn default_max_new_tokens() -> usize {
    180
}

fn default_openai_base() -> String {
    "https://api.openai.com/v1".to_string()
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: GenerationProviderKind::default(),
            model: default_generation_model(),
            base_url: None,
            api_key_env: None,
            max_new_tokens: default_max_new_tokens(),
        }
    }
}

// ============= Chunking / Retrieval / Cache / Query Log =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,

    #[serde(default = "default_preview_chars")]
    pub preview_chars: usize,
}

fn default_chunk_size() -> usize {
    1000
}

fn default_chunk_overlap() -> usize {
    200
}

fn default_preview_chars() -> usize {
    180
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            preview_chars: default_preview_chars(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub default_top_k: usize,

    #[serde(default = "default_max_top_k")]
    pub max_top_k: usize,

    /// Deadline for each embedder, store and generator call
    #[serde(default = "default_call_timeout")]
    pub call_timeout_secs: u64,
}

fn default_top_k() -> usize {
    4
}

fn default_max_top_k() -> usize {
    10
}

fn default_call_timeout() -> u64 {
    120
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            default_top_k: default_top_k(),
            max_top_k: default_max_top_k(),
            call_timeout_secs: default_call_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerCacheConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_cache_entries")]
    pub max_entries: usize,

    #[serde(default = "default_cache_ttl")]
    pub ttl_secs: u64,
}

fn default_true() -> bool {
    true
}

fn default_cache_entries() -> usize {
    200
}

fn default_cache_ttl() -> u64 {
    30 * 60
}

impl Default for AnswerCacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_entries: default_cache_entries(),
            ttl_secs: default_cache_ttl(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryLogConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_log_path")]
    pub path: PathBuf,

    #[serde(default = "default_log_preview_chars")]
    pub preview_chars: usize,
}

fn default_log_path() -> PathBuf {
    PathBuf::from("logs/queries.jsonl")
}

fn default_log_preview_chars() -> usize {
    400
}

impl Default for QueryLogConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: default_log_path(),
            preview_chars: default_log_preview_chars(),
        }
    }
}

// ============= Configuration Loading & Validation =============

/// Errors that can occur during configuration loading
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Environment variable '{0}' referenced in config is not set")]
    MissingEnvVar(String),

    #[error("Environment variable '{name}' has an invalid value: {value}")]
    InvalidEnvVar { name: String, value: String },
}

impl From<ConfigError> for AppError {
    fn from(err: ConfigError) -> Self {
        AppError::InvalidConfiguration(err.to_string())
    }
}

impl DocqaConfig {
    /// Load and validate configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config = Self::read(path.as_ref())?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML string without validating it
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// File (or defaults when it is absent), then process environment, then validation.
    pub fn from_file_and_env<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            Self::read(path)?
        } else {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            Self::default()
        };
        config.apply_env_overrides(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    fn read(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Apply the deployment environment variables through `lookup`.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup("PORT") {
            self.server.port = parse_env("PORT", &port)?;
        }
        if let Some(size) = lookup("CACHE_SIZE") {
            self.cache.max_entries = parse_env("CACHE_SIZE", &size)?;
        }
        if let Some(collection) = lookup("COLLECTION_NAME") {
            self.vector_store.collection = collection;
        }
        if let Some(url) = lookup("QDRANT_URL") {
            self.vector_store.url = url;
        }
        if let Some(model) = lookup("EMBEDDING_MODEL") {
            self.embedding.model = model;
        }
        if let Some(model) = lookup("GENERATION_MODEL") {
            self.generation.model = model;
        }
        Ok(())
    }

    /// Validate the configuration for internal consistency and env var availability
    pub fn validate(&self) -> Result<(), ConfigError> {
        let chunking = &self.chunking;
        if chunking.chunk_size == 0 {
            return Err(ConfigError::ValidationError(
                "chunking.chunk_size must be greater than 0".into(),
            ));
        }
        if chunking.chunk_overlap >= chunking.chunk_size {
            return Err(ConfigError::ValidationError(format!(
                "chunking.chunk_overlap ({}) must be smaller than chunk_size ({})",
                chunking.chunk_overlap, chunking.chunk_size
            )));
        }

        if self.cache.max_entries == 0 {
            return Err(ConfigError::ValidationError(
                "cache.max_entries must be greater than 0".into(),
            ));
        }
        if self.cache.ttl_secs == 0 {
            return Err(ConfigError::ValidationError(
                "cache.ttl_secs must be greater than 0".into(),
            ));
        }

        if self.vector_store.dimension == 0 {
            return Err(ConfigError::ValidationError(
                "vector_store.dimension must be greater than 0".into(),
            ));
        }
        if self.vector_store.collection.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "vector_store.collection must not be empty".into(),
            ));
        }
        if let Some(dims) = known_dimensions(&self.embedding.model) {
            if dims != self.vector_store.dimension {
                return Err(ConfigError::ValidationError(format!(
                    "embedding model '{}' produces {}-dimensional vectors but vector_store.dimension is {}",
                    self.embedding.model, dims, self.vector_store.dimension
                )));
            }
        }

        let retrieval = &self.retrieval;
        if retrieval.default_top_k == 0 || retrieval.default_top_k > retrieval.max_top_k {
            return Err(ConfigError::ValidationError(format!(
                "retrieval.default_top_k ({}) must be between 1 and max_top_k ({})",
                retrieval.default_top_k, retrieval.max_top_k
            )));
        }
        if retrieval.call_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "retrieval.call_timeout_secs must be greater than 0".into(),
            ));
        }

        if self.generation.max_new_tokens == 0 {
            return Err(ConfigError::ValidationError(
                "generation.max_new_tokens must be greater than 0".into(),
            ));
        }

        if let Some(ref env) = self.vector_store.api_key_env {
            self.validate_env_var(env)?;
        }
        if let Some(ref env) = self.generation.api_key_env {
            self.validate_env_var(env)?;
        }

        Ok(())
    }

    fn validate_env_var(&self, name: &str) -> Result<(), ConfigError> {
        std::env::var(name).map_err(|_| ConfigError::MissingEnvVar(name.to_string()))?;
        Ok(())
    }

    /// Get a resolved value from an env var reference
    pub fn resolve_env(&self, env_name: &str) -> Option<String> {
        std::env::var(env_name).ok()
    }

    // ============= Component settings =============

    pub fn chunker(&self) -> Result<TextChunker, AppError> {
        TextChunker::new(self.chunking.chunk_size, self.chunking.chunk_overlap)
    }

    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig {
            max_entries: self.cache.max_entries,
            ttl: Duration::from_secs(self.cache.ttl_secs),
            enabled: self.cache.enabled,
        }
    }

    pub fn embedding_spec(&self) -> EmbeddingSpec {
        EmbeddingSpec {
            provider: self.embedding.provider,
            model: self.embedding.model.clone(),
            base_url: self.embedding.base_url.clone(),
            dimensions: self.vector_store.dimension,
        }
    }

    pub fn generation_provider(&self) -> Result<Provider, ConfigError> {
        let generation = &self.generation;
        Ok(match generation.provider {
            GenerationProviderKind::Ollama => Provider::Ollama {
                base_url: generation
                    .base_url
                    .clone()
                    .unwrap_or_else(default_ollama_url),
                model: generation.model.clone(),
            },
            GenerationProviderKind::OpenAI => {
                let api_key = match &generation.api_key_env {
                    Some(env) => self
                        .resolve_env(env)
                        .ok_or_else(|| ConfigError::MissingEnvVar(env.clone()))?,
                    None => String::new(),
                };
                Provider::OpenAI {
                    api_key,
                    api_base: generation
                        .base_url
                        .clone()
                        .unwrap_or_else(default_openai_base),
                    model: generation.model.clone(),
                }
            }
        })
    }

    pub fn vector_store_provider(&self) -> Result<VectorStoreProvider, ConfigError> {
        Ok(match self.vector_store.provider {
            VectorStoreKind::Memory => VectorStoreProvider::Memory,
            VectorStoreKind::Qdrant => {
                let api_key = match &self.vector_store.api_key_env {
                    Some(env) => Some(
                        self.resolve_env(env)
                            .ok_or_else(|| ConfigError::MissingEnvVar(env.clone()))?,
                    ),
                    None => None,
                };
                VectorStoreProvider::Qdrant {
                    url: self.vector_store.url.clone(),
                    api_key,
                }
            }
        })
    }

    pub fn index_settings(&self) -> IndexSettings {
        IndexSettings {
            collection: self.vector_store.collection.clone(),
            dimensions: self.vector_store.dimension,
            distance: self.vector_store.distance,
            max_top_k: self.retrieval.max_top_k,
        }
    }

    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            default_top_k: self.retrieval.default_top_k,
            max_new_tokens: self.generation.max_new_tokens,
            preview_chars: self.chunking.preview_chars,
            log_preview_chars: self.query_log.preview_chars,
            call_timeout: Duration::from_secs(self.retrieval.call_timeout_secs),
        }
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidEnvVar {
        name: name.to_string(),
        value: value.to_string(),
    })
}
