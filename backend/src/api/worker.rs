//! Worker trigger and status endpoints

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;

use crate::jobs::{self, TriggerOutcome};
use crate::AppState;

#[derive(Debug, Serialize)]
struct TriggerResponse {
    status: &'static str,
    message: &'static str,
}

#[derive(Debug, Serialize)]
struct StatusResponse {
    running: bool,
}

async fn trigger_worker(State(state): State<AppState>) -> Json<TriggerResponse> {
    match jobs::trigger(&state.engine) {
        TriggerOutcome::Triggered => Json(TriggerResponse {
            status: "triggered",
            message: "Worker triggered successfully",
        }),
        TriggerOutcome::AlreadyRunning => Json(TriggerResponse {
            status: "already_running",
            message: "Worker is already running",
        }),
    }
}

async fn worker_status(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        running: state.engine.worker_running(),
    })
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/trigger-worker", post(trigger_worker))
        .route("/api/worker-status", get(worker_status))
}
