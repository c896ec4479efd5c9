//! Retrieval Augmented Generation (RAG) Pipeline
//!
//! # Module Structure
//!
//! - [`rag::chunker`](crate::rag::chunker) - Fixed-size overlapping character windows
//! - [`rag::embeddings`](crate::rag::embeddings) - Unit-length text embeddings (fastembed, Ollama)
//! - [`rag::cache`](crate::rag::cache) - LRU + TTL answer cache keyed on question and corpus
//! - [`rag::corpus`](crate::rag::corpus) - The indexed document set and its fingerprint
//! - [`rag::pipeline`](crate::rag::pipeline) - Ingestion and question answering
//!
//! # RAG Pipeline
//!
//! 1. **Ingestion** - Documents are chunked and every chunk embedded
//! 2. **Storage** - Vectors and payloads upserted into the collection
//! 3. **Retrieval** - The question is embedded and the top-k chunks retrieved
//! 4. **Generation** - The model answers from the retrieved context only
//! 5. **Caching** - The answer is stored until the TTL passes or the corpus changes
//!
//! # Example
//!
//! ```ignore
//! use docqa::rag::pipeline::RagPipeline;
//! use docqa::types::Document;
//!
//! pipeline.ingest(&Document::new("permits.txt", text)).await?;
//! let answer = pipeline.ask("When is the permit due?", Some(4)).await?;
//! println!("{} ({:?})", answer.text, answer.sources);
//! ```

pub mod cache;
pub mod chunker;
pub mod corpus;
pub mod embeddings;
pub mod pipeline;
