//! Match listing and hard-delete endpoints

use axum::extract::{Path, State};
use axum::routing::{delete, get};
use axum::{Json, Router};

use super::{ApiResult, OkResponse};
use crate::db::MatchRow;
use crate::AppState;

async fn list_matches(State(state): State<AppState>) -> ApiResult<Json<Vec<MatchRow>>> {
    let matches = state.engine.matches().list_recent().await?;
    Ok(Json(matches))
}

async fn delete_match(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<OkResponse>> {
    state.engine.matches().delete(id).await?;
    Ok(OkResponse::ok())
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/matches", get(list_matches))
        .route("/api/matches/{id}", delete(delete_match))
}
