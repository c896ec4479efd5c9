use crate::{types::HealthResponse, AppState};
use axum::{extract::State, Json};

/// Health check. Reports the point count when the store answers, and omits it otherwise.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let points = match state.pipeline.index().count().await {
        Ok(points) => Some(points),
        Err(e) => {
            tracing::warn!(error = %e, "Vector store did not report a point count");
            None
        }
    };

    Json(HealthResponse {
        ok: true,
        documents: state.pipeline.documents().len(),
        points,
    })
}
