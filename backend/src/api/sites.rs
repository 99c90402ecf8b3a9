//! Scrape target (site) CRUD endpoints
//!
//! Exposed under /api/urls for compatibility with the existing frontends.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, put};
use axum::{Form, Json, Router};
use serde::{Deserialize, Serialize};

use super::{bad_request, ApiResult, ErrorResponse, OkResponse};
use crate::db::SiteRecord;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct SiteForm {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    /// JSON blob with selector overrides and extraction steps
    #[serde(default)]
    pub config: Option<String>,
}

impl SiteForm {
    fn url(&self) -> Option<&str> {
        self.url.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }

    fn display_name(&self) -> Option<&str> {
        self.display_name
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    fn config(&self) -> Option<&str> {
        self.config
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

#[derive(Debug, Serialize)]
struct CreatedResponse {
    id: i64,
}

async fn list_sites(State(state): State<AppState>) -> ApiResult<Json<Vec<SiteRecord>>> {
    let sites = state.engine.sites().list().await?;
    Ok(Json(sites))
}

async fn create_site(
    State(state): State<AppState>,
    Form(form): Form<SiteForm>,
) -> ApiResult<Response> {
    let Some(url) = form.url() else {
        return Ok(bad_request("url required"));
    };

    match state
        .engine
        .sites()
        .create(url, form.display_name(), form.config())
        .await?
    {
        Some(id) => Ok((StatusCode::CREATED, Json(CreatedResponse { id })).into_response()),
        None => Ok((
            StatusCode::CONFLICT,
            Json(ErrorResponse {
                error: "URL already exists".to_string(),
            }),
        )
            .into_response()),
    }
}

/// Partial update: any non-empty subset of the fields is applied
async fn update_site(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Form(form): Form<SiteForm>,
) -> ApiResult<Response> {
    if form.url().is_none() && form.display_name().is_none() && form.config().is_none() {
        return Ok(bad_request("url, display_name, or config required"));
    }

    state
        .engine
        .sites()
        .update(id, form.url(), form.display_name(), form.config())
        .await?;
    Ok(OkResponse::ok().into_response())
}

async fn delete_site(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Json<OkResponse>> {
    state.engine.sites().delete(id).await?;
    Ok(OkResponse::ok())
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/urls", get(list_sites).post(create_site))
        .route("/api/urls/{id}", put(update_site).delete(delete_site))
}
