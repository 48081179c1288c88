//! `GET /api/health` (`spec.md` §4.6): liveness plus a snapshot merging
//! Model Manager and queue telemetry.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};

use crate::api::models::HealthResponse;
use crate::api::server::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health))
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        whisper: state.model_manager.status().await,
        queue: state.processor.queue_status().await,
    })
}
