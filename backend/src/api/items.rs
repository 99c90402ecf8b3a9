//! Watchlist item CRUD endpoints

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, put};
use axum::{Form, Json, Router};
use serde::{Deserialize, Serialize};

use super::{bad_request, ApiResult, ErrorResponse, OkResponse};
use crate::db::ItemRecord;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ItemForm {
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Serialize)]
struct CreatedResponse {
    id: i64,
}

async fn list_items(State(state): State<AppState>) -> ApiResult<Json<Vec<ItemRecord>>> {
    let items = state.engine.items().list().await?;
    Ok(Json(items))
}

async fn create_item(
    State(state): State<AppState>,
    Form(form): Form<ItemForm>,
) -> ApiResult<Response> {
    let text = form.text.trim();
    if text.is_empty() {
        return Ok(bad_request("text required"));
    }

    match state.engine.items().create(text).await? {
        Some(id) => Ok((StatusCode::CREATED, Json(CreatedResponse { id })).into_response()),
        None => Ok((
            StatusCode::CONFLICT,
            Json(ErrorResponse {
                error: "Item already exists".to_string(),
            }),
        )
            .into_response()),
    }
}

async fn update_item(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Form(form): Form<ItemForm>,
) -> ApiResult<Response> {
    let text = form.text.trim();
    if text.is_empty() {
        return Ok(bad_request("text required"));
    }

    state.engine.items().update(id, text).await?;
    Ok(OkResponse::ok().into_response())
}

async fn delete_item(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Json<OkResponse>> {
    state.engine.items().delete(id).await?;
    Ok(OkResponse::ok())
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/items", get(list_items).post(create_item))
        .route("/api/items/{id}", put(update_item).delete(delete_item))
}
