//! API server setup and router assembly (`spec.md` §4.6).
//!
//! Grounded on the teacher's `api::server::ApiServer`/`AppState` shape —
//! `TraceLayer` + CORS layered over a `Router` built from per-area route
//! modules, served with `axum::serve` and a cancellation-token-driven
//! graceful shutdown.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::app::AppContext;
use crate::config::Settings;
use crate::database::JobStore;
use crate::model_manager::ModelManager;
use crate::processor::JobProcessor;
use crate::Result;

use super::routes;

/// Shared handler state. Cheap to clone — every field is an `Arc` or a
/// plain value (`spec.md` §9: "no hidden globals").
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub store: Arc<dyn JobStore>,
    pub model_manager: ModelManager,
    pub processor: Arc<JobProcessor>,
}

impl AppState {
    pub fn from_context(ctx: &AppContext) -> Self {
        Self {
            settings: Arc::new(ctx.settings.clone()),
            store: ctx.store.clone(),
            model_manager: ctx.model_manager.clone(),
            processor: ctx.processor.clone(),
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    let body_limit = state.settings.max_upload_size_bytes as usize;

    let router = routes::create_router(state)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http());

    router
}

/// Bind and serve the router until `shutdown` is cancelled.
pub async fn serve(settings: &Settings, router: Router, shutdown: CancellationToken) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", settings.host, settings.port)
        .parse()
        .map_err(|e| crate::Error::Configuration(format!("invalid host/port: {e}")))?;

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| crate::Error::io_path("bind HTTP listener", format!("{addr}"), e))?;

    tracing::info!(%addr, "HTTP API listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            shutdown.cancelled().await;
            tracing::info!("HTTP API shutting down");
        })
        .await
        .map_err(|e| crate::Error::Other(format!("server error: {e}")))?;

    Ok(())
}
