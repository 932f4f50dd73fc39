use crate::interface_adapters::net::{health_handler, room_info_handler, ws_handler};
use crate::interface_adapters::state::AppState;
use axum::{Router, routing::get};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(health_handler))
        .route("/rooms/{room_id}", get(room_info_handler))
        // The browser client is served from its own origin.
        .layer(CorsLayer::permissive())
        .with_state(state)
}
