use async_trait::async_trait;
use axum::{
    extract::{ws::WebSocket, FromRequestParts, Path, Query, State, WebSocketUpgrade},
    http::request::Parts,
    response::Response,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};

use super::connection::{ChannelConnection, ConnectionHandle};
use super::messages::ServerEvent;
use super::router::{validate_username, ConnectionSession, EventRouter};
use super::socket::Connection;
use crate::room::{RoomCode, Username};
use crate::shared::{AppError, AppState};

/// Optional query parameters on the WebSocket endpoint
#[derive(Debug, Default, Deserialize)]
pub struct ConnectParams {
    /// Join the path's room under this name as soon as the socket opens
    pub username: Option<String>,
}

/// Username from `?username=`, validated before the upgrade is accepted
#[derive(Debug, Default)]
pub struct ImplicitJoin(pub Option<Username>);

#[async_trait]
impl<S> FromRequestParts<S> for ImplicitJoin
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(params) = Query::<ConnectParams>::from_request_parts(parts, state)
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?;

        if let Some(username) = &params.username {
            if let Err(e) = validate_username(username) {
                warn!(error = %e, "Rejecting connection with invalid username");
                return Err(AppError::BadRequest(e.to_string()));
            }
        }
        Ok(Self(params.username))
    }
}

/// WebSocket endpoint without a room; every event must carry `roomCode`
/// GET /ws
pub async fn websocket_handler(ws: WebSocketUpgrade, State(app_state): State<AppState>) -> Response {
    info!("WebSocket connection requested");
    ws.on_upgrade(move |socket| handle_websocket_connection(socket, None, None, app_state))
}

/// WebSocket endpoint bound to a room code
/// GET /ws/:room_code?username=alice
///
/// The upgrade extractor comes last so a bad username is refused with 400
/// before any upgrade handshake is checked.
pub async fn room_websocket_handler(
    Path(room_code): Path<String>,
    ImplicitJoin(username): ImplicitJoin,
    State(app_state): State<AppState>,
    ws: WebSocketUpgrade,
) -> Response {
    info!(
        room_code = %room_code,
        username = ?username,
        "WebSocket connection requested"
    );

    ws.on_upgrade(move |socket| {
        handle_websocket_connection(socket, Some(room_code), username, app_state)
    })
}

/// Start a session for a new connection, joining `room_code` as `username` when given
///
/// A rejected implicit join is reported to the client and the connection is closed.
pub(crate) fn open_session(
    router: &EventRouter,
    connection: Arc<dyn ConnectionHandle>,
    room_code: Option<RoomCode>,
    username: Option<Username>,
) -> ConnectionSession {
    let mut session = router.session(Arc::clone(&connection), room_code);

    if let Some(username) = username {
        if let Err(e) = session.join(None, username) {
            warn!(connection_id = %connection.id(), error = %e, "Implicit join rejected, closing");
            if let Err(send_error) = connection.send(&ServerEvent::error(e.to_string())) {
                warn!(connection_id = %connection.id(), error = %send_error, "Could not report rejection");
            }
            connection.close();
        }
    }
    session
}

/// Handle the upgraded WebSocket connection
async fn handle_websocket_connection(
    socket: WebSocket,
    room_code: Option<String>,
    username: Option<String>,
    app_state: AppState,
) {
    // Create the outbound channel (rooms -> client)
    let (channel, outbound_receiver) = ChannelConnection::new();
    let connection: Arc<dyn ConnectionHandle> = Arc::new(channel);
    let connection_id = connection.id();

    info!(
        connection_id = %connection_id,
        room_code = ?room_code,
        "WebSocket connection established"
    );

    let session = open_session(&app_state.event_router, connection, room_code, username);

    // Wrap the axum WebSocket in our simple interface and run until disconnect
    let connection = Connection::new(Box::new(socket), outbound_receiver, session);
    match connection.run().await {
        Ok(()) => {
            info!(connection_id = %connection_id, "WebSocket connection closed cleanly");
        }
        Err(e) => {
            warn!(
                connection_id = %connection_id,
                error = %e,
                "WebSocket connection error"
            );
        }
    }
}
