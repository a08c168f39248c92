use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::room::{self, RoomRegistry};
use crate::websockets::{self, EventRouter};

/// Shared application state containing all dependencies
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<RoomRegistry>,
    pub event_router: EventRouter,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(event_router: EventRouter, config: Arc<Config>) -> Self {
        Self {
            registry: Arc::clone(event_router.registry()),
            event_router,
            config,
        }
    }
}

/// Build the HTTP and WebSocket routes
pub fn build_router(state: AppState) -> Router {
    let cors = state.config.cors_layer();

    Router::new()
        .route("/", get(|| async { "Room relay is running" }))
        .route("/health", get(room::health))
        .route("/rooms", get(room::list_rooms))
        .route("/rooms/:room_code", get(room::get_room))
        .route("/ws", get(websockets::websocket_handler))
        .route("/ws/:room_code", get(websockets::room_websocket_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
        };

        let body = Json(json!({
            "error": error_message
        }));

        (status, body).into_response()
    }
}
