//! Worker run log endpoints

use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use super::ApiResult;
use crate::db::PaginatedLogs;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct LogsQuery {
    #[serde(default)]
    pub page: Option<i64>,
}

#[derive(Debug, Serialize)]
struct ClearedResponse {
    ok: bool,
    deleted: u64,
}

async fn list_logs(
    State(state): State<AppState>,
    Query(query): Query<LogsQuery>,
) -> ApiResult<Json<PaginatedLogs>> {
    let page = query.page.unwrap_or(1);
    let logs = state.engine.logs().page(page).await?;
    Ok(Json(logs))
}

async fn clear_logs(State(state): State<AppState>) -> ApiResult<Json<ClearedResponse>> {
    let deleted = state.engine.logs().clear().await?;
    tracing::info!(deleted, "Cleared log entries");
    Ok(Json(ClearedResponse { ok: true, deleted }))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/api/logs", get(list_logs).delete(clear_logs))
}
