//! API request handlers.

/// Question answering.
pub mod ask;
/// Document upload, JSON ingestion and listing.
pub mod documents;
/// Liveness and index size.
pub mod health;
/// Recent query-log records.
pub mod logs;
