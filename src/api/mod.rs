//! HTTP API Handlers and Routes
//!
//! A thin axum layer over [`RagPipeline`](crate::rag::pipeline::RagPipeline).
//!
//! # API Endpoints
//!
//! - `GET /api/health` - Liveness plus document and point counts
//! - `POST /api/upload` - Multipart upload (field `files`) of UTF-8 text documents
//! - `POST /api/documents` - JSON ingestion of pre-extracted text or pages
//! - `GET /api/documents` - Indexed document names
//! - `POST /api/ask` - `{question, topK}` → `{answer, sources, topK, cached}`
//! - `GET /api/logs?limit=N` - Recent query-log records

/// Request and response handlers for all API endpoints.
pub mod handlers;
/// Router configuration and route definitions.
pub mod routes;
