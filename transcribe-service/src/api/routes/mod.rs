//! API route modules, organized by resource type (`spec.md` §4.6).

pub mod admin;
pub mod health;
pub mod jobs;

use axum::Router;
use axum::middleware;

use crate::api::middleware::require_admin;
use crate::api::server::AppState;

/// Build the full router: open routes merged with an admin-gated nest.
pub fn create_router(state: AppState) -> Router {
    let admin_routes = Router::new()
        .merge(admin::router())
        .route_layer(middleware::from_fn_with_state(state.clone(), require_admin));

    Router::new()
        .nest("/api", jobs::router())
        .nest("/api", health::router())
        .nest("/api/admin", admin_routes)
        .with_state(state)
}
