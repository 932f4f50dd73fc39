use crate::interface_adapters::http::error_response;
use crate::interface_adapters::protocol::{ElementDto, history_dto};
use crate::interface_adapters::state::AppState;
use crate::use_cases::RoomError;

use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use std::sync::Arc;
use tracing::warn;

#[derive(Debug, serde::Serialize)]
struct HealthResponse {
    status: &'static str,
}

#[derive(Debug, serde::Serialize)]
struct RoomInfoResponse {
    room_id: String,
    // Connections currently joined to the room.
    participants: usize,
    elements: Vec<ElementDto>,
}

pub async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse { status: "ok" })
}

pub async fn room_info_handler(
    State(state): State<Arc<AppState>>,
    Path(room_id): Path<String>,
) -> impl IntoResponse {
    match state.room_registry.summary(room_id.trim()).await {
        Ok(summary) => (
            StatusCode::OK,
            Json(RoomInfoResponse {
                room_id: summary.room_id.to_string(),
                participants: summary.participants,
                elements: history_dto(&summary.elements),
            }),
        )
            .into_response(),
        Err(RoomError::NotFound(_)) => error_response(StatusCode::NOT_FOUND, "room not found"),
        Err(e @ RoomError::Closed(_)) => {
            // Evicted between lookup and snapshot.
            warn!(error = %e, "room closed during inspection");
            error_response(StatusCode::SERVICE_UNAVAILABLE, "room unavailable")
        }
    }
}
