use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::{handlers, middleware as api_middleware, store, torrents};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    let api_routes = Router::new()
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config))
        .route(
            "/store/magnets/check",
            get(store::check_magnets).post(store::check_magnets_batch),
        )
        .route(
            "/torrents",
            get(torrents::list_torrents).post(torrents::push_torrents),
        )
        .with_state(state.clone());

    Router::new()
        .nest("/v0", api_routes)
        .route("/metrics", get(handlers::metrics))
        .with_state(state)
        .layer(axum::middleware::from_fn(api_middleware::metrics_middleware))
        .layer(TraceLayer::new_for_http())
}
