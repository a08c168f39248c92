use axum::{
    extract::{Path, State},
    Json,
};
use tracing::{debug, info, instrument};

use super::types::{HealthResponse, RoomResponse};
use crate::shared::{AppError, AppState};

/// HTTP handler for listing all live rooms
///
/// GET /rooms
#[instrument(name = "list_rooms", skip(state))]
pub async fn list_rooms(State(state): State<AppState>) -> Json<Vec<RoomResponse>> {
    let rooms: Vec<RoomResponse> = state
        .registry
        .list()
        .into_iter()
        .map(RoomResponse::from)
        .collect();

    info!(room_count = rooms.len(), "Rooms listed successfully");
    Json(rooms)
}

/// HTTP handler for inspecting one room
///
/// GET /rooms/:room_code
#[instrument(name = "get_room", skip(state))]
pub async fn get_room(
    State(state): State<AppState>,
    Path(room_code): Path<String>,
) -> Result<Json<RoomResponse>, AppError> {
    let room = state.registry.get_if_exists(&room_code).ok_or_else(|| {
        debug!(room_code = %room_code, "Room not found");
        AppError::NotFound(format!("Room {} not found", room_code))
    })?;

    Ok(Json(RoomResponse::from(room.snapshot())))
}

/// GET /health
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        rooms: state.registry.len(),
    })
}
