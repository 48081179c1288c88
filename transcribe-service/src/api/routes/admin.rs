//! `/api/admin/*` routes (`spec.md` §4.6). Mounted behind
//! [`crate::api::middleware::require_admin`] by the parent router.

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::api::error::ApiResult;
use crate::api::models::{AdminStatsResponse, CleanupResponse};
use crate::api::server::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/stats", get(stats))
        .route("/cleanup", post(cleanup))
        .route("/model/load", post(model_load))
        .route("/model/unload", post(model_unload))
}

async fn stats(State(state): State<AppState>) -> ApiResult<Json<AdminStatsResponse>> {
    let counts = state.store.counts_by_status().await?;
    let counts = counts
        .into_iter()
        .map(|(status, count)| (status.to_string(), count))
        .collect();

    Ok(Json(AdminStatsResponse {
        counts,
        whisper: state.model_manager.status().await,
        queue: state.processor.queue_status().await,
    }))
}

async fn cleanup(State(state): State<AppState>) -> ApiResult<Json<CleanupResponse>> {
    let deleted_count = state.processor.run_retention_gc().await?;
    Ok(Json(CleanupResponse { deleted_count }))
}

async fn model_load(State(state): State<AppState>) -> ApiResult<axum::http::StatusCode> {
    state.model_manager.load().await?;
    Ok(axum::http::StatusCode::NO_CONTENT)
}

async fn model_unload(State(state): State<AppState>) -> ApiResult<axum::http::StatusCode> {
    state.model_manager.unload().await?;
    Ok(axum::http::StatusCode::NO_CONTENT)
}
