//! Vector stores.
//!
//! - `memory` - process-local store, always available
//! - `qdrant` - Qdrant server (cargo feature `qdrant`)
//!
//! Enable providers via Cargo features:
//! ```toml
//! docqa-server = { version = "*", features = ["qdrant"] }
//! ```

#![allow(missing_docs)]

// Vector store abstraction layer
pub mod vectorstore;

#[cfg(feature = "qdrant")]
pub mod qdrant;

// Re-exports
pub use vectorstore::{
    point_id, CollectionInfo, DistanceMetric, InMemoryVectorStore, IndexSettings, VectorIndex,
    VectorStore, VectorStoreProvider,
};

#[cfg(feature = "qdrant")]
pub use qdrant::QdrantVectorStore;
