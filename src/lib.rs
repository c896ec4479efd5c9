//! # DocQA - Grounded Question Answering over Your Documents
//!
//! DocQA indexes a corpus of text documents into a vector database and answers
//! natural-language questions using only the passages it retrieves. When the
//! retrieved context does not contain the answer, it says "I don't know."
//!
//! ## Overview
//!
//! DocQA can be used in two ways:
//!
//! 1. **As a standalone server** - Run the `docqa-server` binary
//! 2. **As a library** - Build a [`RagPipeline`] and call it directly
//!
//! ### Basic Example
//!
//! ```rust,ignore
//! use docqa::{build_state, DocqaConfig};
//! use docqa::types::Document;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = DocqaConfig::from_file_and_env("docqa.toml")?;
//!     let state = build_state(config).await?;
//!
//!     state.pipeline.ingest(&Document::new("handbook.txt", "...")).await?;
//!     let answer = state.pipeline.ask("When are timesheets due?", None).await?;
//!     println!("{}", answer.text);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `ollama` | Ollama generation and embeddings (default) |
//! | `qdrant` | Qdrant vector database (default) |
//! | `local-embeddings` | In-process ONNX embeddings via fastembed |
//!
//! ## Modules
//!
//! - [`api`] - REST API handlers and routes
//! - [`db`] - Vector store abstraction and backends
//! - [`llm`] - Text-generation clients
//! - [`rag`] - Chunking, embeddings, cache, corpus and the pipeline
//! - [`querylog`] - Per-question log for analytics
//! - [`types`] - Common types and error handling

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(rustdoc::missing_crate_level_docs)]

/// HTTP API handlers and routes.
pub mod api;
/// Command-line interface.
pub mod cli;
/// Vector stores (Qdrant, in-memory).
pub mod db;
/// Text-generation provider clients.
pub mod llm;
/// Query log collaborator.
pub mod querylog;
/// Retrieval Augmented Generation (RAG) components.
pub mod rag;
/// Core types (requests, responses, errors).
pub mod types;
/// Configuration utilities.
pub mod utils;

// Re-export commonly used types
pub use llm::{LLMClient, LazyGenerator, Provider};
pub use rag::pipeline::{IngestReport, RagPipeline};
pub use types::{AppError, Result};
pub use utils::toml_config::DocqaConfig;

use std::sync::Arc;

use axum::{extract::DefaultBodyLimit, Router};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};

use crate::db::vectorstore::VectorIndex;
use crate::querylog::{JsonlQueryLog, QueryLog};
use crate::rag::embeddings::LazyEmbedder;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Effective configuration
    pub config: Arc<DocqaConfig>,
    /// The RAG pipeline
    pub pipeline: Arc<RagPipeline>,
    /// Query log, when enabled
    pub query_log: Option<Arc<dyn QueryLog>>,
}

/// Wire every component described by `config` into an [`AppState`].
///
/// Models are not loaded here: the embedder and generator initialize on
/// first use.
pub async fn build_state(config: DocqaConfig) -> Result<AppState> {
    let store = config.vector_store_provider()?.create_store().await?;
    let index = Arc::new(VectorIndex::new(store, config.index_settings()));
    let cache = rag::cache::from_config(config.cache_config())?;
    let embedder = Arc::new(LazyEmbedder::new(config.embedding_spec()));
    let generator = Arc::new(LazyGenerator::new(config.generation_provider()?));

    let query_log: Option<Arc<dyn QueryLog>> = if config.query_log.enabled {
        Some(Arc::new(JsonlQueryLog::open(&config.query_log.path).await?))
    } else {
        None
    };

    let mut pipeline = RagPipeline::new(
        config.chunker()?,
        embedder,
        index,
        cache,
        generator,
        config.pipeline_settings(),
    );
    if let Some(log) = &query_log {
        pipeline = pipeline.with_query_log(Arc::clone(log));
    }

    Ok(AppState {
        config: Arc::new(config),
        pipeline: Arc::new(pipeline),
        query_log,
    })
}

/// The full HTTP application: `/api` routes plus CORS, tracing and a body limit.
pub fn create_app(state: AppState) -> Router {
    let body_limit = state.config.server.body_limit_bytes;

    Router::new()
        .nest("/api", api::routes::create_router())
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive())
                .layer(DefaultBodyLimit::disable()),
        )
        .with_state(state)
}
