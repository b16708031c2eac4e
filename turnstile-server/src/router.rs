//! Route definitions for the queue HTTP API.

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

/// Build the router with every route and middleware layer.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(queue_routes())
        .merge(health_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn queue_routes() -> Router<AppState> {
    Router::new()
        .route("/queue/join", post(handlers::queue::join))
        .route("/queue/status/{user_id}", get(handlers::queue::status))
        .route("/queue/confirm", post(handlers::queue::confirm))
        .route("/queue/leave", post(handlers::queue::leave))
        .route("/queue/idle", post(handlers::queue::idle))
        .route("/queue/metrics", get(handlers::queue::metrics))
}

fn health_routes() -> Router<AppState> {
    let router = Router::new().route("/health", get(handlers::health::health));
    #[cfg(feature = "metrics")]
    let router = router.route("/metrics/prometheus", get(handlers::health::prometheus));
    router
}
