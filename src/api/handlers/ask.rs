use crate::{
    types::{AskRequest, AskResponse, Result},
    AppState,
};
use axum::{extract::State, Json};

/// Answer a question from the indexed documents
pub async fn ask(
    State(state): State<AppState>,
    Json(payload): Json<AskRequest>,
) -> Result<Json<AskResponse>> {
    let answer = state
        .pipeline
        .ask(&payload.question, payload.top_k)
        .await?;
    Ok(Json(answer.into()))
}
