//! REST and WebSocket endpoints consumed by the frontends

pub mod health;
pub mod items;
pub mod logs;
pub mod matches;
pub mod sites;
pub mod worker;
pub mod ws;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use serde::Serialize;

use crate::AppState;

/// Assemble the full API router
pub fn router() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(items::router())
        .merge(sites::router())
        .merge(matches::router())
        .merge(logs::router())
        .merge(worker::router())
        .merge(ws::router())
}

/// Standard `{ok:true}` body for mutations
#[derive(Debug, Serialize)]
pub struct OkResponse {
    pub ok: bool,
}

impl OkResponse {
    pub fn ok() -> Json<Self> {
        Json(Self { ok: true })
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Wrapper turning internal errors into a 500 JSON body
pub struct ApiError(anyhow::Error);

impl<E> From<E> for ApiError
where
    E: Into<anyhow::Error>,
{
    fn from(e: E) -> Self {
        Self(e.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        tracing::error!(error = %self.0, "Request failed");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: self.0.to_string(),
            }),
        )
            .into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// 400 with a message, for form validation failures
pub fn bad_request(message: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: message.to_string(),
        }),
    )
        .into_response()
}
