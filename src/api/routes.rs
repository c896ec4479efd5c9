use crate::api::handlers::{ask, documents, health, logs};
use crate::AppState;
use axum::{
    routing::{get, post},
    Router,
};

/// Routes mounted under `/api`.
pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .route("/upload", post(documents::upload))
        .route(
            "/documents",
            get(documents::list).post(documents::ingest),
        )
        .route("/ask", post(ask::ask))
        .route("/logs", get(logs::recent))
}
