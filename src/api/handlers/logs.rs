use crate::{
    querylog::QueryLogRecord,
    types::{LogsQuery, Result},
    AppState,
};
use axum::{
    extract::{Query, State},
    Json,
};

const DEFAULT_LOG_LIMIT: usize = 50;
const MAX_LOG_LIMIT: usize = 1000;

/// Recent query-log records, oldest first
pub async fn recent(
    State(state): State<AppState>,
    Query(params): Query<LogsQuery>,
) -> Result<Json<Vec<QueryLogRecord>>> {
    let Some(log) = &state.query_log else {
        return Ok(Json(Vec::new()));
    };

    let limit = params
        .limit
        .unwrap_or(DEFAULT_LOG_LIMIT)
        .min(MAX_LOG_LIMIT);
    Ok(Json(log.recent(limit).await?))
}
